//! Request authentication: resolve a session cookie or API key to a user

use hyper::header::{HeaderMap, AUTHORIZATION, COOKIE};
use tracing::warn;

use crate::auth::token::hash_token;
use crate::db::{self, GoalDb, UserRow};
use crate::error::{MandalartError, Result};

pub const SESSION_COOKIE: &str = "mandalart_session";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMethod {
    Session,
    ApiKey,
}

impl AuthMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthMethod::Session => "session",
            AuthMethod::ApiKey => "apiKey",
        }
    }
}

/// The resolved caller of an authenticated request.
#[derive(Debug, Clone)]
pub struct Identity {
    pub user: UserRow,
    pub method: AuthMethod,
}

/// Resolve the caller from request headers. An API key takes precedence
/// over a session cookie when both are present, so scripted clients are
/// unaffected by a stale cookie in the same jar.
pub fn authenticate(db: &GoalDb, headers: &HeaderMap) -> Result<Identity> {
    if let Some(key) = api_key_from_headers(headers) {
        let hash = hash_token(&key);
        return match db.with_conn(|conn| db::find_user_by_key_hash(conn, &hash))? {
            Some((key_id, user)) => {
                db.with_conn(|conn| db::touch_api_key(conn, &key_id))?;
                Ok(Identity {
                    user,
                    method: AuthMethod::ApiKey,
                })
            }
            None => {
                warn!("Rejected request with unknown API key");
                Err(MandalartError::Auth("Invalid API key".to_string()))
            }
        };
    }

    if let Some(token) = session_token_from_headers(headers) {
        let hash = hash_token(&token);
        return match db.with_conn(|conn| db::find_session_user(conn, &hash))? {
            Some((session_id, user)) => {
                db.with_conn(|conn| db::touch_session(conn, &session_id))?;
                Ok(Identity {
                    user,
                    method: AuthMethod::Session,
                })
            }
            None => {
                warn!("Rejected request with invalid or expired session");
                Err(MandalartError::Auth(
                    "Invalid or expired session".to_string(),
                ))
            }
        };
    }

    Err(MandalartError::Auth("Authentication required".to_string()))
}

/// API key from `X-Api-Key` or `Authorization: Bearer`.
fn api_key_from_headers(headers: &HeaderMap) -> Option<String> {
    if let Some(value) = headers.get("x-api-key").and_then(|v| v.to_str().ok()) {
        if !value.is_empty() {
            return Some(value.to_string());
        }
    }
    if let Some(value) = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()) {
        if let Some(token) = value.strip_prefix("Bearer ") {
            if !token.is_empty() {
                return Some(token.to_string());
            }
        }
    }
    None
}

/// Session token from the Cookie header.
pub fn session_token_from_headers(headers: &HeaderMap) -> Option<String> {
    let cookies = headers.get(COOKIE)?.to_str().ok()?;
    for part in cookies.split(';') {
        let part = part.trim();
        if let Some(token) = part
            .strip_prefix(SESSION_COOKIE)
            .and_then(|rest| rest.strip_prefix('='))
        {
            if !token.is_empty() {
                return Some(token.to_string());
            }
        }
    }
    None
}

/// Set-Cookie value for a fresh session. `Secure` is dropped in dev mode
/// so the cookie works over plain http on localhost.
pub fn session_cookie(token: &str, ttl_hours: u64, dev_mode: bool) -> String {
    let mut cookie = format!(
        "{}={}; HttpOnly; SameSite=Lax; Path=/; Max-Age={}",
        SESSION_COOKIE,
        token,
        ttl_hours * 3600
    );
    if !dev_mode {
        cookie.push_str("; Secure");
    }
    cookie
}

/// Set-Cookie value that expires the session cookie immediately.
pub fn clear_session_cookie(dev_mode: bool) -> String {
    let mut cookie = format!(
        "{}=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0",
        SESSION_COOKIE
    );
    if !dev_mode {
        cookie.push_str("; Secure");
    }
    cookie
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::token::{generate_api_key, generate_token};
    use crate::db::users::{create_session, create_user};
    use crate::db::{create_api_key, GoalDb};
    use hyper::header::HeaderValue;

    fn db_with_user() -> (GoalDb, String) {
        let db = GoalDb::open_in_memory().unwrap();
        let user = db
            .with_conn_mut(|conn| create_user(conn, "miyo", "hash", None))
            .unwrap();
        (db, user.id)
    }

    #[test]
    fn cookie_header_parsing_survives_other_cookies() {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_static("theme=dark; mandalart_session=tok123 ; lang=ja"),
        );
        assert_eq!(
            session_token_from_headers(&headers).as_deref(),
            Some("tok123")
        );

        let mut none = HeaderMap::new();
        none.insert(COOKIE, HeaderValue::from_static("theme=dark"));
        assert_eq!(session_token_from_headers(&none), None);
    }

    #[test]
    fn session_cookie_roundtrips_through_authenticate() {
        let (db, user_id) = db_with_user();
        let token = generate_token();
        db.with_conn(|conn| create_session(conn, &user_id, &hash_token(&token), 24))
            .unwrap();

        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_str(&format!("{}={}", SESSION_COOKIE, token)).unwrap(),
        );

        let identity = authenticate(&db, &headers).unwrap();
        assert_eq!(identity.user.username, "miyo");
        assert_eq!(identity.method, AuthMethod::Session);
    }

    #[test]
    fn expired_sessions_are_rejected() {
        let (db, user_id) = db_with_user();
        let token = generate_token();
        db.with_conn(|conn| create_session(conn, &user_id, &hash_token(&token), 0))
            .unwrap();

        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_str(&format!("{}={}", SESSION_COOKIE, token)).unwrap(),
        );

        let err = authenticate(&db, &headers).unwrap_err();
        assert!(matches!(err, MandalartError::Auth(_)));
    }

    #[test]
    fn api_key_works_from_either_header() {
        let (db, user_id) = db_with_user();
        let (key, hash) = generate_api_key();
        db.with_conn_mut(|conn| create_api_key(conn, &user_id, "ci", &hash))
            .unwrap();

        let mut headers = HeaderMap::new();
        headers.insert("x-api-key", HeaderValue::from_str(&key).unwrap());
        let identity = authenticate(&db, &headers).unwrap();
        assert_eq!(identity.method, AuthMethod::ApiKey);

        let mut bearer = HeaderMap::new();
        bearer.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", key)).unwrap(),
        );
        let identity = authenticate(&db, &bearer).unwrap();
        assert_eq!(identity.user.username, "miyo");
    }

    #[test]
    fn api_key_wins_over_session_cookie() {
        let (db, user_id) = db_with_user();
        let (key, hash) = generate_api_key();
        db.with_conn_mut(|conn| create_api_key(conn, &user_id, "ci", &hash))
            .unwrap();
        let token = generate_token();
        db.with_conn(|conn| create_session(conn, &user_id, &hash_token(&token), 24))
            .unwrap();

        let mut headers = HeaderMap::new();
        headers.insert("x-api-key", HeaderValue::from_str(&key).unwrap());
        headers.insert(
            COOKIE,
            HeaderValue::from_str(&format!("{}={}", SESSION_COOKIE, token)).unwrap(),
        );

        let identity = authenticate(&db, &headers).unwrap();
        assert_eq!(identity.method, AuthMethod::ApiKey);
    }

    #[test]
    fn missing_credentials_are_an_auth_error() {
        let (db, _) = db_with_user();
        let err = authenticate(&db, &HeaderMap::new()).unwrap_err();
        assert!(matches!(err, MandalartError::Auth(msg) if msg == "Authentication required"));
    }

    #[test]
    fn secure_flag_follows_dev_mode() {
        assert!(session_cookie("tok", 24, false).contains("; Secure"));
        assert!(!session_cookie("tok", 24, true).contains("; Secure"));
        assert!(clear_session_cookie(false).contains("Max-Age=0"));
    }
}
