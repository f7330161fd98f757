//! API keys for external agents

use rusqlite::{params, Connection, Row};
use uuid::Uuid;

use crate::db::users::UserRow;
use crate::error::{MandalartError, Result};

#[derive(Debug, Clone)]
pub struct ApiKeyRow {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub is_active: i64,
    pub created_at: String,
    pub last_used_at: Option<String>,
}

impl ApiKeyRow {
    fn from_row(row: &Row) -> std::result::Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            user_id: row.get("user_id")?,
            name: row.get("name")?,
            is_active: row.get("is_active")?,
            created_at: row.get("created_at")?,
            last_used_at: row.get("last_used_at")?,
        })
    }
}

/// Store a new key; only the SHA-256 hash of the plaintext is persisted
pub fn create_api_key(
    conn: &mut Connection,
    user_id: &str,
    name: &str,
    key_hash: &str,
) -> Result<ApiKeyRow> {
    let tx = conn
        .transaction()
        .map_err(|e| MandalartError::Database(format!("Transaction failed: {}", e)))?;

    let id = Uuid::new_v4().to_string();
    tx.execute(
        "INSERT INTO api_keys (id, user_id, name, key_hash) VALUES (?1, ?2, ?3, ?4)",
        params![id, user_id, name, key_hash],
    )
    .map_err(|e| MandalartError::Database(format!("Insert failed: {}", e)))?;

    tx.commit()
        .map_err(|e| MandalartError::Database(format!("Commit failed: {}", e)))?;

    get_api_key(conn, user_id, &id)?
        .ok_or_else(|| MandalartError::Internal("API key not found after insert".to_string()))
}

pub fn get_api_key(conn: &Connection, user_id: &str, id: &str) -> Result<Option<ApiKeyRow>> {
    let mut stmt = conn
        .prepare("SELECT * FROM api_keys WHERE id = ?1 AND user_id = ?2")
        .map_err(|e| MandalartError::Database(format!("Prepare failed: {}", e)))?;
    let mut rows = stmt
        .query(params![id, user_id])
        .map_err(|e| MandalartError::Database(format!("Query failed: {}", e)))?;

    match rows
        .next()
        .map_err(|e| MandalartError::Database(format!("Row fetch failed: {}", e)))?
    {
        Some(row) => Ok(Some(ApiKeyRow::from_row(row).map_err(|e| {
            MandalartError::Database(format!("Row parse failed: {}", e))
        })?)),
        None => Ok(None),
    }
}

pub fn list_api_keys(conn: &Connection, user_id: &str) -> Result<Vec<ApiKeyRow>> {
    let mut stmt = conn
        .prepare("SELECT * FROM api_keys WHERE user_id = ?1 ORDER BY created_at ASC")
        .map_err(|e| MandalartError::Database(format!("Prepare failed: {}", e)))?;

    let keys = stmt
        .query_map(params![user_id], |row| ApiKeyRow::from_row(row))
        .map_err(|e| MandalartError::Database(format!("Query failed: {}", e)))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| MandalartError::Database(format!("Row parse failed: {}", e)))?;

    Ok(keys)
}

/// Resolve an active key hash to its owner. Returns the key id so the
/// caller can bump `last_used_at`.
pub fn find_user_by_key_hash(conn: &Connection, key_hash: &str) -> Result<Option<(String, UserRow)>> {
    let mut stmt = conn
        .prepare(
            "SELECT k.id AS key_id, u.*
             FROM api_keys k
             JOIN users u ON u.id = k.user_id
             WHERE k.key_hash = ?1 AND k.is_active = 1",
        )
        .map_err(|e| MandalartError::Database(format!("Prepare failed: {}", e)))?;
    let mut rows = stmt
        .query(params![key_hash])
        .map_err(|e| MandalartError::Database(format!("Query failed: {}", e)))?;

    match rows
        .next()
        .map_err(|e| MandalartError::Database(format!("Row fetch failed: {}", e)))?
    {
        Some(row) => {
            let key_id: String = row
                .get("key_id")
                .map_err(|e| MandalartError::Database(format!("Row parse failed: {}", e)))?;
            let user = UserRow::from_row(row)
                .map_err(|e| MandalartError::Database(format!("Row parse failed: {}", e)))?;
            Ok(Some((key_id, user)))
        }
        None => Ok(None),
    }
}

pub fn touch_api_key(conn: &Connection, key_id: &str) -> Result<()> {
    conn.execute(
        "UPDATE api_keys SET last_used_at = datetime('now') WHERE id = ?1",
        params![key_id],
    )
    .map_err(|e| MandalartError::Database(format!("Update failed: {}", e)))?;
    Ok(())
}

/// Revoke a key by deleting its row; false if it was not the caller's
pub fn delete_api_key(conn: &Connection, user_id: &str, id: &str) -> Result<bool> {
    let changes = conn
        .execute(
            "DELETE FROM api_keys WHERE id = ?1 AND user_id = ?2",
            params![id, user_id],
        )
        .map_err(|e| MandalartError::Database(format!("Delete failed: {}", e)))?;
    Ok(changes > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::users::create_user;
    use crate::db::GoalDb;

    fn db_with_user() -> (GoalDb, String) {
        let db = GoalDb::open_in_memory().unwrap();
        let user = db
            .with_conn_mut(|conn| create_user(conn, "miyo", "hash", None))
            .unwrap();
        (db, user.id)
    }

    #[test]
    fn create_list_and_lookup() {
        let (db, user_id) = db_with_user();
        let key = db
            .with_conn_mut(|conn| create_api_key(conn, &user_id, "reporting bot", "keyhash"))
            .unwrap();
        assert_eq!(key.name, "reporting bot");
        assert_eq!(key.is_active, 1);
        assert!(key.last_used_at.is_none());

        let listed = db.with_conn(|conn| list_api_keys(conn, &user_id)).unwrap();
        assert_eq!(listed.len(), 1);

        let (key_id, owner) = db
            .with_conn(|conn| find_user_by_key_hash(conn, "keyhash"))
            .unwrap()
            .unwrap();
        assert_eq!(key_id, key.id);
        assert_eq!(owner.id, user_id);
    }

    #[test]
    fn touch_records_last_use() {
        let (db, user_id) = db_with_user();
        let key = db
            .with_conn_mut(|conn| create_api_key(conn, &user_id, "bot", "keyhash"))
            .unwrap();

        db.with_conn(|conn| touch_api_key(conn, &key.id)).unwrap();

        let refreshed = db
            .with_conn(|conn| get_api_key(conn, &user_id, &key.id))
            .unwrap()
            .unwrap();
        assert!(refreshed.last_used_at.is_some());
    }

    #[test]
    fn deleted_keys_no_longer_authenticate() {
        let (db, user_id) = db_with_user();
        let key = db
            .with_conn_mut(|conn| create_api_key(conn, &user_id, "bot", "keyhash"))
            .unwrap();

        assert!(db
            .with_conn(|conn| delete_api_key(conn, &user_id, &key.id))
            .unwrap());
        assert!(db
            .with_conn(|conn| find_user_by_key_hash(conn, "keyhash"))
            .unwrap()
            .is_none());
    }

    #[test]
    fn delete_is_scoped_to_the_owner() {
        let (db, user_id) = db_with_user();
        let other = db
            .with_conn_mut(|conn| create_user(conn, "rival", "hash", None))
            .unwrap();
        let key = db
            .with_conn_mut(|conn| create_api_key(conn, &user_id, "bot", "keyhash"))
            .unwrap();

        assert!(!db
            .with_conn(|conn| delete_api_key(conn, &other.id, &key.id))
            .unwrap());
    }
}
