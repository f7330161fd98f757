//! SQLite schema for the mandalart store

use rusqlite::Connection;
use tracing::info;

use crate::error::{MandalartError, Result};

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

/// Accounts and the credentials that unlock them
const ACCOUNTS_SCHEMA: &str = r#"
-- Registered users
CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY,
    username TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,
    display_name TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Browser sessions; token_hash is the SHA-256 hex of the cookie value
CREATE TABLE IF NOT EXISTS sessions (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    token_hash TEXT NOT NULL UNIQUE,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    expires_at TEXT NOT NULL,
    last_seen_at TEXT,
    FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
);

-- API keys for external agents; key_hash is the SHA-256 hex of the full key
CREATE TABLE IF NOT EXISTS api_keys (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    name TEXT NOT NULL,
    key_hash TEXT NOT NULL UNIQUE,
    is_active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    last_used_at TEXT,
    FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
);
"#;

/// The board hierarchy: goal -> 8 sub-goals -> 8 actions each.
/// Position 0 is reserved as the reorder sentinel and only ever
/// exists inside an open transaction.
const BOARD_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS primary_goals (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    title TEXT NOT NULL,
    description TEXT,
    status TEXT NOT NULL DEFAULT 'active' CHECK (status IN ('active', 'achieved', 'archived')),
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS sub_goals (
    id TEXT PRIMARY KEY,
    goal_id TEXT NOT NULL,
    position INTEGER NOT NULL CHECK (position BETWEEN 0 AND 8),
    title TEXT NOT NULL,
    description TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    FOREIGN KEY (goal_id) REFERENCES primary_goals(id) ON DELETE CASCADE,
    UNIQUE (goal_id, position)
);

CREATE TABLE IF NOT EXISTS action_items (
    id TEXT PRIMARY KEY,
    sub_goal_id TEXT NOT NULL,
    position INTEGER NOT NULL CHECK (position BETWEEN 0 AND 8),
    title TEXT NOT NULL,
    description TEXT,
    completed INTEGER NOT NULL DEFAULT 0,
    completed_at TEXT,
    due_date TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    FOREIGN KEY (sub_goal_id) REFERENCES sub_goals(id) ON DELETE CASCADE,
    UNIQUE (sub_goal_id, position)
);
"#;

/// Free-form progress records attached to action items
const LOGS_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS activity_logs (
    id TEXT PRIMARY KEY,
    action_item_id TEXT NOT NULL,
    log_type TEXT NOT NULL DEFAULT 'note' CHECK (log_type IN ('note', 'metric', 'media', 'link')),
    body TEXT,
    value REAL,
    url TEXT,
    logged_at TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    FOREIGN KEY (action_item_id) REFERENCES action_items(id) ON DELETE CASCADE
);
"#;

/// Visitor comments; at most one of the three target columns is set,
/// all NULL targets the board itself
const GUESTBOOK_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS guestbook (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    author_name TEXT NOT NULL,
    body TEXT NOT NULL,
    goal_id TEXT,
    sub_goal_id TEXT,
    action_item_id TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE,
    FOREIGN KEY (goal_id) REFERENCES primary_goals(id) ON DELETE CASCADE,
    FOREIGN KEY (sub_goal_id) REFERENCES sub_goals(id) ON DELETE CASCADE,
    FOREIGN KEY (action_item_id) REFERENCES action_items(id) ON DELETE CASCADE,
    CHECK ((goal_id IS NOT NULL) + (sub_goal_id IS NOT NULL) + (action_item_id IS NOT NULL) <= 1)
);
"#;

const INDEXES_SCHEMA: &str = r#"
CREATE INDEX IF NOT EXISTS idx_sessions_user ON sessions(user_id);
CREATE INDEX IF NOT EXISTS idx_sessions_expires ON sessions(expires_at);
CREATE INDEX IF NOT EXISTS idx_api_keys_user ON api_keys(user_id);
CREATE INDEX IF NOT EXISTS idx_goals_user ON primary_goals(user_id);
CREATE INDEX IF NOT EXISTS idx_sub_goals_goal ON sub_goals(goal_id);
CREATE INDEX IF NOT EXISTS idx_actions_sub_goal ON action_items(sub_goal_id);
CREATE INDEX IF NOT EXISTS idx_logs_action ON activity_logs(action_item_id);
CREATE INDEX IF NOT EXISTS idx_logs_logged_at ON activity_logs(logged_at);
CREATE INDEX IF NOT EXISTS idx_guestbook_user ON guestbook(user_id);
"#;

/// Initialize the schema, creating tables on first run and migrating
/// older databases forward.
pub fn init_schema(conn: &Connection) -> Result<()> {
    let version = get_schema_version(conn)?;

    if version == 0 {
        info!("Creating mandalart schema (version {})", SCHEMA_VERSION);
        create_tables(conn)?;
        set_schema_version(conn, SCHEMA_VERSION)?;
    } else if version < SCHEMA_VERSION {
        info!(
            "Migrating mandalart schema from version {} to {}",
            version, SCHEMA_VERSION
        );
        migrate_schema(conn, version)?;
    }

    Ok(())
}

fn create_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(ACCOUNTS_SCHEMA)
        .map_err(|e| MandalartError::Database(format!("Failed to create account tables: {}", e)))?;
    conn.execute_batch(BOARD_SCHEMA)
        .map_err(|e| MandalartError::Database(format!("Failed to create board tables: {}", e)))?;
    conn.execute_batch(LOGS_SCHEMA)
        .map_err(|e| MandalartError::Database(format!("Failed to create log table: {}", e)))?;
    conn.execute_batch(GUESTBOOK_SCHEMA)
        .map_err(|e| MandalartError::Database(format!("Failed to create guestbook table: {}", e)))?;
    conn.execute_batch(INDEXES_SCHEMA)
        .map_err(|e| MandalartError::Database(format!("Failed to create indexes: {}", e)))?;
    Ok(())
}

/// Read the stored schema version, 0 if the database is empty
pub fn get_schema_version(conn: &Connection) -> Result<i32> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)",
        [],
    )
    .map_err(|e| MandalartError::Database(format!("Failed to create version table: {}", e)))?;

    let version = conn
        .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
            row.get::<_, i32>(0)
        })
        .unwrap_or(0);

    Ok(version)
}

fn set_schema_version(conn: &Connection, version: i32) -> Result<()> {
    conn.execute("DELETE FROM schema_version", [])
        .map_err(|e| MandalartError::Database(format!("Failed to clear version: {}", e)))?;
    conn.execute(
        "INSERT INTO schema_version (version) VALUES (?1)",
        [version],
    )
    .map_err(|e| MandalartError::Database(format!("Failed to set version: {}", e)))?;
    Ok(())
}

fn migrate_schema(_conn: &Connection, from_version: i32) -> Result<()> {
    // Version 1 is the first release; nothing to migrate from yet.
    Err(MandalartError::Internal(format!(
        "No migration path from schema version {}",
        from_version
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_creates_tables_and_records_version() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();

        assert_eq!(get_schema_version(&conn).unwrap(), SCHEMA_VERSION);

        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN \
                 ('users', 'sessions', 'api_keys', 'primary_goals', 'sub_goals', \
                  'action_items', 'activity_logs', 'guestbook')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 8);
    }

    #[test]
    fn init_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        init_schema(&conn).unwrap();
        assert_eq!(get_schema_version(&conn).unwrap(), SCHEMA_VERSION);
    }
}
