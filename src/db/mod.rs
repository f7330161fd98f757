//! SQLite-backed store for boards, logs, and identities
//!
//! A single `Mutex<Connection>` serializes all access; handlers borrow the
//! connection through `with_conn` / `with_conn_mut` closures.

pub mod api_keys;
pub mod goals;
pub mod guestbook;
pub mod logs;
pub mod schema;
pub mod users;

use std::path::Path;
use std::sync::Mutex;

use rusqlite::Connection;
use serde::Serialize;
use tracing::info;

use crate::error::{MandalartError, Result};

/// Database connection wrapper
pub struct GoalDb {
    conn: Mutex<Connection>,
}

impl GoalDb {
    /// Open (or create) the database at the given path
    pub fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        info!("Opening mandalart database at {:?}", db_path);
        let conn = Connection::open(db_path)
            .map_err(|e| MandalartError::Database(format!("Failed to open database: {}", e)))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA foreign_keys = ON;",
        )
        .map_err(|e| MandalartError::Database(format!("Failed to set pragmas: {}", e)))?;

        schema::init_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// In-memory database for tests
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| MandalartError::Database(format!("Failed to open database: {}", e)))?;

        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .map_err(|e| MandalartError::Database(format!("Failed to set pragmas: {}", e)))?;

        schema::init_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Run a read-only closure against the connection
    pub fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|e| MandalartError::Internal(format!("Lock poisoned: {}", e)))?;
        f(&conn)
    }

    /// Run a closure that needs a mutable connection (transactions)
    pub fn with_conn_mut<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T>,
    {
        let mut conn = self
            .conn
            .lock()
            .map_err(|e| MandalartError::Internal(format!("Lock poisoned: {}", e)))?;
        f(&mut conn)
    }

    /// Row counts for the health endpoint
    pub fn stats(&self) -> Result<DbStats> {
        self.with_conn(|conn| {
            let count = |table: &str| -> Result<i64> {
                conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
                    row.get(0)
                })
                .map_err(|e| MandalartError::Database(format!("Count failed: {}", e)))
            };

            Ok(DbStats {
                users: count("users")?,
                goals: count("primary_goals")?,
                sub_goals: count("sub_goals")?,
                action_items: count("action_items")?,
                activity_logs: count("activity_logs")?,
                guestbook_entries: count("guestbook")?,
            })
        })
    }
}

/// Table counts reported by `/health`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DbStats {
    pub users: i64,
    pub goals: i64,
    pub sub_goals: i64,
    pub action_items: i64,
    pub activity_logs: i64,
    pub guestbook_entries: i64,
}

pub use api_keys::{
    create_api_key, delete_api_key, find_user_by_key_hash, list_api_keys, touch_api_key, ApiKeyRow,
};
pub use goals::{
    create_action_item, create_goal, create_sub_goal, delete_action_item, delete_goal,
    delete_sub_goal, export_board, get_action_item, get_goal, get_goal_tree, get_sub_goal,
    import_board, list_action_items, list_goals, list_sub_goals, move_action_item, move_sub_goal,
    set_action_completed, update_action_item, update_goal, update_sub_goal, ActionItemRow,
    BoardDocument, CreateActionInput, CreateGoalInput, CreateSubGoalInput, GoalRow, GoalTree,
    SubGoalRow, SubGoalTree, UpdateActionInput, UpdateGoalInput, UpdateSubGoalInput,
};
pub use guestbook::{
    create_guestbook_entry, delete_guestbook_entry, list_guestbook_entries, CreateGuestbookInput,
    GuestbookRow,
};
pub use logs::{create_log, delete_log, list_logs, ActivityLogRow, CreateLogInput};
pub use users::{
    create_session, create_user, delete_session_by_token_hash, find_session_user,
    get_user_by_username, purge_expired_sessions, touch_session, UserRow,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_start_at_zero() {
        let db = GoalDb::open_in_memory().unwrap();
        let stats = db.stats().unwrap();
        assert_eq!(stats.users, 0);
        assert_eq!(stats.goals, 0);
        assert_eq!(stats.guestbook_entries, 0);
    }

    #[test]
    fn open_creates_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("mandalart.db");
        let db = GoalDb::open(&path).unwrap();
        assert!(path.exists());
        drop(db);
    }
}
