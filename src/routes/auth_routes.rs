//! Account endpoints: register, login, logout, whoami
//!
//! Register and login are the only unauthenticated `/api/*` routes. Both
//! set the session cookie on success so browser clients are signed in
//! immediately.

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::{header, http::HeaderValue, Request, Response};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::auth;
use crate::db;
use crate::error::MandalartError;
use crate::routes::{parse_json_body, response};
use crate::server::AppState;
use crate::views::UserView;

// =============================================================================
// Request Types
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

fn valid_username(username: &str) -> bool {
    (3..=32).contains(&username.len())
        && username
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
}

/// Open a session for the user and attach its cookie to the response.
fn with_session_cookie(
    state: &AppState,
    user_id: &str,
    mut resp: Response<Full<Bytes>>,
) -> Response<Full<Bytes>> {
    let token = auth::generate_token();
    let ttl = state.args.session_ttl_hours;
    if let Err(e) = state
        .db
        .with_conn(|conn| db::create_session(conn, user_id, &auth::hash_token(&token), ttl))
    {
        return response::error_response(&e);
    }

    let cookie = auth::session_cookie(&token, ttl, state.args.dev_mode);
    match HeaderValue::from_str(&cookie) {
        Ok(value) => {
            resp.headers_mut().append(header::SET_COOKIE, value);
            resp
        }
        Err(e) => response::error_response(&MandalartError::Internal(format!(
            "Failed to build session cookie: {}",
            e
        ))),
    }
}

// =============================================================================
// Route Handlers
// =============================================================================

/// POST /api/auth/register
pub async fn handle_register(req: Request<Incoming>, state: &AppState) -> Response<Full<Bytes>> {
    let body: RegisterRequest = match parse_json_body(req).await {
        Ok(b) => b,
        Err(e) => return response::error_response(&e),
    };

    let username = body.username.trim().to_lowercase();
    if !valid_username(&username) {
        return response::error_response(&MandalartError::InvalidInput(
            "Username must be 3-32 characters of a-z, 0-9, '-' or '_'".to_string(),
        ));
    }
    if body.password.len() < 8 {
        return response::error_response(&MandalartError::InvalidInput(
            "Password must be at least 8 characters".to_string(),
        ));
    }

    let password_hash = match auth::hash_password(&body.password) {
        Ok(h) => h,
        Err(e) => return response::error_response(&e),
    };

    let display_name = body.display_name.as_deref().map(str::trim).filter(|s| !s.is_empty());
    let user = match state
        .db
        .with_conn_mut(|conn| db::create_user(conn, &username, &password_hash, display_name))
    {
        Ok(u) => u,
        Err(e) => return response::error_response(&e),
    };

    info!("Registered new user: {}", username);

    let user_id = user.id.clone();
    let resp = response::created(&UserView::from(user));
    with_session_cookie(state, &user_id, resp)
}

/// POST /api/auth/login
pub async fn handle_login(req: Request<Incoming>, state: &AppState) -> Response<Full<Bytes>> {
    let body: LoginRequest = match parse_json_body(req).await {
        Ok(b) => b,
        Err(e) => return response::error_response(&e),
    };

    let username = body.username.trim().to_lowercase();
    let user = match state
        .db
        .with_conn(|conn| db::get_user_by_username(conn, &username))
    {
        Ok(Some(u)) => u,
        Ok(None) => {
            warn!("Login failed, unknown user: {}", username);
            return response::error_response(&MandalartError::Auth(
                "Invalid credentials".to_string(),
            ));
        }
        Err(e) => return response::error_response(&e),
    };

    match auth::verify_password(&body.password, &user.password_hash) {
        Ok(true) => {}
        Ok(false) => {
            warn!("Login failed, wrong password: {}", username);
            return response::error_response(&MandalartError::Auth(
                "Invalid credentials".to_string(),
            ));
        }
        Err(e) => return response::error_response(&e),
    }

    // each login is a cheap moment to clear out dead sessions
    match state.db.with_conn(db::purge_expired_sessions) {
        Ok(purged) if purged > 0 => debug!("Purged {} expired sessions", purged),
        Ok(_) => {}
        Err(e) => warn!("Session purge failed: {}", e),
    }

    info!("Login successful: {}", username);

    let user_id = user.id.clone();
    let resp = response::ok(&UserView::from(user));
    with_session_cookie(state, &user_id, resp)
}

/// POST /api/auth/logout
pub async fn handle_logout(req: Request<Incoming>, state: &AppState) -> Response<Full<Bytes>> {
    if let Some(token) = auth::identity::session_token_from_headers(req.headers()) {
        let hash = auth::hash_token(&token);
        match state
            .db
            .with_conn(|conn| db::delete_session_by_token_hash(conn, &hash))
        {
            Ok(true) => debug!("Session deleted on logout"),
            Ok(false) => {}
            Err(e) => return response::error_response(&e),
        }
    }

    let mut resp = response::ok(&serde_json::json!({"loggedOut": true}));
    let cookie = auth::clear_session_cookie(state.args.dev_mode);
    if let Ok(value) = HeaderValue::from_str(&cookie) {
        resp.headers_mut().append(header::SET_COOKIE, value);
    }
    resp
}

/// GET /api/auth/me
pub async fn handle_me(req: Request<Incoming>, state: &AppState) -> Response<Full<Bytes>> {
    let identity = match auth::authenticate(&state.db, req.headers()) {
        Ok(identity) => identity,
        Err(e) => return response::error_response(&e),
    };

    response::ok(&serde_json::json!({
        "user": UserView::from(identity.user),
        "authMethod": identity.method.as_str(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn username_rules() {
        assert!(valid_username("miyo"));
        assert!(valid_username("run-2026_spring"));
        assert!(!valid_username("ab"));
        assert!(!valid_username("Uppercase"));
        assert!(!valid_username("spaces here"));
        assert!(!valid_username(&"x".repeat(33)));
    }
}
