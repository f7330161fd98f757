//! User accounts and browser sessions

use rusqlite::{params, Connection, Row};
use uuid::Uuid;

use crate::error::{MandalartError, Result};

#[derive(Debug, Clone)]
pub struct UserRow {
    pub id: String,
    pub username: String,
    pub password_hash: String,
    pub display_name: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl UserRow {
    pub(crate) fn from_row(row: &Row) -> std::result::Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            username: row.get("username")?,
            password_hash: row.get("password_hash")?,
            display_name: row.get("display_name")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

/// Create a user. The username must already be normalized to lowercase
/// and the password hashed; duplicate usernames are a conflict.
pub fn create_user(
    conn: &mut Connection,
    username: &str,
    password_hash: &str,
    display_name: Option<&str>,
) -> Result<UserRow> {
    let tx = conn
        .transaction()
        .map_err(|e| MandalartError::Database(format!("Transaction failed: {}", e)))?;

    let exists: bool = tx
        .query_row(
            "SELECT 1 FROM users WHERE username = ?1",
            params![username],
            |_| Ok(true),
        )
        .unwrap_or(false);
    if exists {
        return Err(MandalartError::Conflict(
            "An account with this username already exists".to_string(),
        ));
    }

    let id = Uuid::new_v4().to_string();
    tx.execute(
        "INSERT INTO users (id, username, password_hash, display_name) VALUES (?1, ?2, ?3, ?4)",
        params![id, username, password_hash, display_name],
    )
    .map_err(|e| MandalartError::Database(format!("Insert failed: {}", e)))?;

    tx.commit()
        .map_err(|e| MandalartError::Database(format!("Commit failed: {}", e)))?;

    get_user_by_id(conn, &id)?
        .ok_or_else(|| MandalartError::Internal("User not found after insert".to_string()))
}

pub fn get_user_by_id(conn: &Connection, id: &str) -> Result<Option<UserRow>> {
    let mut stmt = conn
        .prepare("SELECT * FROM users WHERE id = ?1")
        .map_err(|e| MandalartError::Database(format!("Prepare failed: {}", e)))?;
    let mut rows = stmt
        .query(params![id])
        .map_err(|e| MandalartError::Database(format!("Query failed: {}", e)))?;

    match rows
        .next()
        .map_err(|e| MandalartError::Database(format!("Row fetch failed: {}", e)))?
    {
        Some(row) => Ok(Some(UserRow::from_row(row).map_err(|e| {
            MandalartError::Database(format!("Row parse failed: {}", e))
        })?)),
        None => Ok(None),
    }
}

pub fn get_user_by_username(conn: &Connection, username: &str) -> Result<Option<UserRow>> {
    let mut stmt = conn
        .prepare("SELECT * FROM users WHERE username = ?1")
        .map_err(|e| MandalartError::Database(format!("Prepare failed: {}", e)))?;
    let mut rows = stmt
        .query(params![username])
        .map_err(|e| MandalartError::Database(format!("Query failed: {}", e)))?;

    match rows
        .next()
        .map_err(|e| MandalartError::Database(format!("Row fetch failed: {}", e)))?
    {
        Some(row) => Ok(Some(UserRow::from_row(row).map_err(|e| {
            MandalartError::Database(format!("Row parse failed: {}", e))
        })?)),
        None => Ok(None),
    }
}

/// Record a new session for the user; the caller keeps the plaintext
/// token, only its hash is stored.
pub fn create_session(
    conn: &Connection,
    user_id: &str,
    token_hash: &str,
    ttl_hours: u64,
) -> Result<()> {
    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO sessions (id, user_id, token_hash, expires_at)
         VALUES (?1, ?2, ?3, datetime('now', ?4))",
        params![id, user_id, token_hash, format!("+{} hours", ttl_hours)],
    )
    .map_err(|e| MandalartError::Database(format!("Insert failed: {}", e)))?;
    Ok(())
}

/// Resolve an unexpired session to its user. Returns the session id so the
/// caller can bump `last_seen_at`.
pub fn find_session_user(conn: &Connection, token_hash: &str) -> Result<Option<(String, UserRow)>> {
    let mut stmt = conn
        .prepare(
            "SELECT s.id AS session_id, u.*
             FROM sessions s
             JOIN users u ON u.id = s.user_id
             WHERE s.token_hash = ?1 AND s.expires_at > datetime('now')",
        )
        .map_err(|e| MandalartError::Database(format!("Prepare failed: {}", e)))?;
    let mut rows = stmt
        .query(params![token_hash])
        .map_err(|e| MandalartError::Database(format!("Query failed: {}", e)))?;

    match rows
        .next()
        .map_err(|e| MandalartError::Database(format!("Row fetch failed: {}", e)))?
    {
        Some(row) => {
            let session_id: String = row
                .get("session_id")
                .map_err(|e| MandalartError::Database(format!("Row parse failed: {}", e)))?;
            let user = UserRow::from_row(row)
                .map_err(|e| MandalartError::Database(format!("Row parse failed: {}", e)))?;
            Ok(Some((session_id, user)))
        }
        None => Ok(None),
    }
}

pub fn touch_session(conn: &Connection, session_id: &str) -> Result<()> {
    conn.execute(
        "UPDATE sessions SET last_seen_at = datetime('now') WHERE id = ?1",
        params![session_id],
    )
    .map_err(|e| MandalartError::Database(format!("Update failed: {}", e)))?;
    Ok(())
}

/// Delete the session behind a cookie token (logout); false if none matched
pub fn delete_session_by_token_hash(conn: &Connection, token_hash: &str) -> Result<bool> {
    let changes = conn
        .execute(
            "DELETE FROM sessions WHERE token_hash = ?1",
            params![token_hash],
        )
        .map_err(|e| MandalartError::Database(format!("Delete failed: {}", e)))?;
    Ok(changes > 0)
}

/// Drop sessions past their expiry; returns how many were removed
pub fn purge_expired_sessions(conn: &Connection) -> Result<usize> {
    let changes = conn
        .execute(
            "DELETE FROM sessions WHERE expires_at <= datetime('now')",
            [],
        )
        .map_err(|e| MandalartError::Database(format!("Delete failed: {}", e)))?;
    Ok(changes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::GoalDb;

    fn test_db() -> GoalDb {
        GoalDb::open_in_memory().unwrap()
    }

    #[test]
    fn create_and_fetch_user() {
        let db = test_db();
        let user = db
            .with_conn_mut(|conn| create_user(conn, "miyo", "hash", Some("Miyo")))
            .unwrap();
        assert_eq!(user.username, "miyo");
        assert_eq!(user.display_name.as_deref(), Some("Miyo"));

        let fetched = db
            .with_conn(|conn| get_user_by_username(conn, "miyo"))
            .unwrap()
            .unwrap();
        assert_eq!(fetched.id, user.id);
    }

    #[test]
    fn duplicate_username_is_a_conflict() {
        let db = test_db();
        db.with_conn_mut(|conn| create_user(conn, "miyo", "hash", None))
            .unwrap();
        let err = db
            .with_conn_mut(|conn| create_user(conn, "miyo", "other", None))
            .unwrap_err();
        assert!(matches!(err, MandalartError::Conflict(_)));
    }

    #[test]
    fn session_roundtrip_and_logout() {
        let db = test_db();
        let user = db
            .with_conn_mut(|conn| create_user(conn, "miyo", "hash", None))
            .unwrap();

        db.with_conn(|conn| create_session(conn, &user.id, "tokenhash", 24))
            .unwrap();

        let (session_id, found) = db
            .with_conn(|conn| find_session_user(conn, "tokenhash"))
            .unwrap()
            .unwrap();
        assert_eq!(found.id, user.id);

        db.with_conn(|conn| touch_session(conn, &session_id))
            .unwrap();

        assert!(db
            .with_conn(|conn| delete_session_by_token_hash(conn, "tokenhash"))
            .unwrap());
        assert!(db
            .with_conn(|conn| find_session_user(conn, "tokenhash"))
            .unwrap()
            .is_none());
    }

    #[test]
    fn expired_sessions_are_invisible_and_purged() {
        let db = test_db();
        let user = db
            .with_conn_mut(|conn| create_user(conn, "miyo", "hash", None))
            .unwrap();

        // TTL 0 expires immediately
        db.with_conn(|conn| create_session(conn, &user.id, "stale", 0))
            .unwrap();

        assert!(db
            .with_conn(|conn| find_session_user(conn, "stale"))
            .unwrap()
            .is_none());
        assert_eq!(
            db.with_conn(|conn| purge_expired_sessions(conn)).unwrap(),
            1
        );
    }

    #[test]
    fn deleting_a_user_cascades_to_sessions() {
        let db = test_db();
        let user = db
            .with_conn_mut(|conn| create_user(conn, "miyo", "hash", None))
            .unwrap();
        db.with_conn(|conn| create_session(conn, &user.id, "tokenhash", 24))
            .unwrap();

        db.with_conn(|conn| {
            conn.execute("DELETE FROM users WHERE id = ?1", params![user.id])
                .map_err(|e| MandalartError::Database(e.to_string()))?;
            Ok(())
        })
        .unwrap();

        assert!(db
            .with_conn(|conn| find_session_user(conn, "tokenhash"))
            .unwrap()
            .is_none());
    }
}
