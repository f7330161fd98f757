//! Guestbook entries: short signed messages pinned to a board or one of its cells

use rusqlite::{params, Connection, Row};
use uuid::Uuid;

use crate::error::{MandalartError, Result};

#[derive(Debug, Clone)]
pub struct GuestbookRow {
    pub id: String,
    pub user_id: String,
    pub author_name: String,
    pub body: String,
    pub goal_id: Option<String>,
    pub sub_goal_id: Option<String>,
    pub action_item_id: Option<String>,
    pub created_at: String,
}

impl GuestbookRow {
    fn from_row(row: &Row) -> std::result::Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            user_id: row.get("user_id")?,
            author_name: row.get("author_name")?,
            body: row.get("body")?,
            goal_id: row.get("goal_id")?,
            sub_goal_id: row.get("sub_goal_id")?,
            action_item_id: row.get("action_item_id")?,
            created_at: row.get("created_at")?,
        })
    }
}

#[derive(Debug, Clone, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGuestbookInput {
    pub author_name: String,
    pub body: String,
    #[serde(default)]
    pub goal_id: Option<String>,
    #[serde(default)]
    pub sub_goal_id: Option<String>,
    #[serde(default)]
    pub action_item_id: Option<String>,
}

pub fn create_guestbook_entry(
    conn: &Connection,
    user_id: &str,
    input: &CreateGuestbookInput,
) -> Result<GuestbookRow> {
    if input.author_name.trim().is_empty() {
        return Err(MandalartError::InvalidInput(
            "Author name must not be empty".to_string(),
        ));
    }
    if input.body.trim().is_empty() {
        return Err(MandalartError::InvalidInput(
            "Body must not be empty".to_string(),
        ));
    }

    let targets = [
        input.goal_id.is_some(),
        input.sub_goal_id.is_some(),
        input.action_item_id.is_some(),
    ]
    .iter()
    .filter(|set| **set)
    .count();
    if targets > 1 {
        return Err(MandalartError::InvalidInput(
            "A guestbook entry may reference at most one target".to_string(),
        ));
    }

    if let Some(goal_id) = &input.goal_id {
        let exists: bool = conn
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM primary_goals WHERE id = ?1 AND user_id = ?2)",
                params![goal_id, user_id],
                |row| row.get(0),
            )
            .map_err(|e| MandalartError::Database(format!("Query failed: {}", e)))?;
        if !exists {
            return Err(MandalartError::NotFound("Goal not found".to_string()));
        }
    }
    if let Some(sub_goal_id) = &input.sub_goal_id {
        let exists: bool = conn
            .query_row(
                "SELECT EXISTS(
                     SELECT 1 FROM sub_goals sg
                     JOIN primary_goals g ON g.id = sg.goal_id
                     WHERE sg.id = ?1 AND g.user_id = ?2
                 )",
                params![sub_goal_id, user_id],
                |row| row.get(0),
            )
            .map_err(|e| MandalartError::Database(format!("Query failed: {}", e)))?;
        if !exists {
            return Err(MandalartError::NotFound("Sub-goal not found".to_string()));
        }
    }
    if let Some(action_item_id) = &input.action_item_id {
        let exists: bool = conn
            .query_row(
                "SELECT EXISTS(
                     SELECT 1 FROM action_items a
                     JOIN sub_goals sg ON sg.id = a.sub_goal_id
                     JOIN primary_goals g ON g.id = sg.goal_id
                     WHERE a.id = ?1 AND g.user_id = ?2
                 )",
                params![action_item_id, user_id],
                |row| row.get(0),
            )
            .map_err(|e| MandalartError::Database(format!("Query failed: {}", e)))?;
        if !exists {
            return Err(MandalartError::NotFound(
                "Action item not found".to_string(),
            ));
        }
    }

    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO guestbook
             (id, user_id, author_name, body, goal_id, sub_goal_id, action_item_id)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            id,
            user_id,
            input.author_name.trim(),
            input.body.trim(),
            input.goal_id,
            input.sub_goal_id,
            input.action_item_id
        ],
    )
    .map_err(|e| MandalartError::Database(format!("Insert failed: {}", e)))?;

    get_guestbook_entry(conn, &id)?
        .ok_or_else(|| MandalartError::Internal("Entry not found after insert".to_string()))
}

fn get_guestbook_entry(conn: &Connection, id: &str) -> Result<Option<GuestbookRow>> {
    let mut stmt = conn
        .prepare("SELECT * FROM guestbook WHERE id = ?1")
        .map_err(|e| MandalartError::Database(format!("Prepare failed: {}", e)))?;
    let mut rows = stmt
        .query(params![id])
        .map_err(|e| MandalartError::Database(format!("Query failed: {}", e)))?;

    match rows
        .next()
        .map_err(|e| MandalartError::Database(format!("Row fetch failed: {}", e)))?
    {
        Some(row) => Ok(Some(GuestbookRow::from_row(row).map_err(|e| {
            MandalartError::Database(format!("Row parse failed: {}", e))
        })?)),
        None => Ok(None),
    }
}

/// Newest-first page of the caller's entries, optionally narrowed to one target
pub fn list_guestbook_entries(
    conn: &Connection,
    user_id: &str,
    goal_id: Option<&str>,
    sub_goal_id: Option<&str>,
    action_item_id: Option<&str>,
    limit: usize,
    offset: usize,
) -> Result<Vec<GuestbookRow>> {
    let (sql, target) = match (goal_id, sub_goal_id, action_item_id) {
        (Some(id), _, _) => (
            "SELECT * FROM guestbook WHERE user_id = ?1 AND goal_id = ?2
             ORDER BY created_at DESC, rowid DESC LIMIT ?3 OFFSET ?4",
            Some(id),
        ),
        (None, Some(id), _) => (
            "SELECT * FROM guestbook WHERE user_id = ?1 AND sub_goal_id = ?2
             ORDER BY created_at DESC, rowid DESC LIMIT ?3 OFFSET ?4",
            Some(id),
        ),
        (None, None, Some(id)) => (
            "SELECT * FROM guestbook WHERE user_id = ?1 AND action_item_id = ?2
             ORDER BY created_at DESC, rowid DESC LIMIT ?3 OFFSET ?4",
            Some(id),
        ),
        (None, None, None) => (
            "SELECT * FROM guestbook WHERE user_id = ?1
             ORDER BY created_at DESC, rowid DESC LIMIT ?2 OFFSET ?3",
            None,
        ),
    };

    let mut stmt = conn
        .prepare(sql)
        .map_err(|e| MandalartError::Database(format!("Prepare failed: {}", e)))?;

    let mapped = match target {
        Some(id) => stmt
            .query_map(
                params![user_id, id, limit as i64, offset as i64],
                |row| GuestbookRow::from_row(row),
            )
            .map_err(|e| MandalartError::Database(format!("Query failed: {}", e)))?
            .collect::<std::result::Result<Vec<_>, _>>(),
        None => stmt
            .query_map(params![user_id, limit as i64, offset as i64], |row| {
                GuestbookRow::from_row(row)
            })
            .map_err(|e| MandalartError::Database(format!("Query failed: {}", e)))?
            .collect::<std::result::Result<Vec<_>, _>>(),
    };

    mapped.map_err(|e| MandalartError::Database(format!("Row parse failed: {}", e)))
}

pub fn delete_guestbook_entry(conn: &Connection, user_id: &str, id: &str) -> Result<bool> {
    let changes = conn
        .execute(
            "DELETE FROM guestbook WHERE id = ?1 AND user_id = ?2",
            params![id, user_id],
        )
        .map_err(|e| MandalartError::Database(format!("Delete failed: {}", e)))?;
    Ok(changes > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::goals::{create_goal, create_sub_goal, CreateGoalInput, CreateSubGoalInput};
    use crate::db::users::create_user;
    use crate::db::GoalDb;

    fn db_with_board() -> (GoalDb, String, String, String) {
        let db = GoalDb::open_in_memory().unwrap();
        let user = db
            .with_conn_mut(|conn| create_user(conn, "miyo", "hash", None))
            .unwrap();
        let goal = db
            .with_conn_mut(|conn| {
                create_goal(
                    conn,
                    &user.id,
                    &CreateGoalInput {
                        title: "Run a marathon".to_string(),
                        description: None,
                    },
                )
            })
            .unwrap();
        let sub_goal = db
            .with_conn_mut(|conn| {
                create_sub_goal(
                    conn,
                    &user.id,
                    &goal.id,
                    &CreateSubGoalInput {
                        position: 1,
                        title: "Endurance".to_string(),
                        description: None,
                    },
                )
            })
            .unwrap();
        (db, user.id, goal.id, sub_goal.id)
    }

    fn entry(author: &str, body: &str) -> CreateGuestbookInput {
        CreateGuestbookInput {
            author_name: author.to_string(),
            body: body.to_string(),
            goal_id: None,
            sub_goal_id: None,
            action_item_id: None,
        }
    }

    #[test]
    fn untargeted_entries_roundtrip_newest_first() {
        let (db, user_id, _, _) = db_with_board();
        for name in ["aiko", "botan", "chie"] {
            db.with_conn(|conn| create_guestbook_entry(conn, &user_id, &entry(name, "ganbare!")))
                .unwrap();
        }

        let entries = db
            .with_conn(|conn| list_guestbook_entries(conn, &user_id, None, None, None, 50, 0))
            .unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].author_name, "chie");
        assert_eq!(entries[2].author_name, "aiko");
    }

    #[test]
    fn at_most_one_target_is_allowed() {
        let (db, user_id, goal_id, sub_goal_id) = db_with_board();
        let input = CreateGuestbookInput {
            author_name: "aiko".to_string(),
            body: "nice board".to_string(),
            goal_id: Some(goal_id),
            sub_goal_id: Some(sub_goal_id),
            action_item_id: None,
        };
        let err = db
            .with_conn(|conn| create_guestbook_entry(conn, &user_id, &input))
            .unwrap_err();
        assert!(matches!(err, MandalartError::InvalidInput(_)));
    }

    #[test]
    fn blank_author_or_body_is_rejected() {
        let (db, user_id, _, _) = db_with_board();
        for input in [entry("  ", "hello"), entry("aiko", "")] {
            let err = db
                .with_conn(|conn| create_guestbook_entry(conn, &user_id, &input))
                .unwrap_err();
            assert!(matches!(err, MandalartError::InvalidInput(_)));
        }
    }

    #[test]
    fn targets_must_belong_to_the_caller() {
        let (db, _, goal_id, _) = db_with_board();
        let rival = db
            .with_conn_mut(|conn| create_user(conn, "rival", "hash", None))
            .unwrap();

        let input = CreateGuestbookInput {
            author_name: "rival fan".to_string(),
            body: "signing someone else's board".to_string(),
            goal_id: Some(goal_id),
            sub_goal_id: None,
            action_item_id: None,
        };
        let err = db
            .with_conn(|conn| create_guestbook_entry(conn, &rival.id, &input))
            .unwrap_err();
        assert!(matches!(err, MandalartError::NotFound(_)));
    }

    #[test]
    fn listing_narrows_to_the_requested_target() {
        let (db, user_id, goal_id, sub_goal_id) = db_with_board();
        db.with_conn(|conn| {
            create_guestbook_entry(
                conn,
                &user_id,
                &CreateGuestbookInput {
                    author_name: "aiko".to_string(),
                    body: "for the goal".to_string(),
                    goal_id: Some(goal_id.clone()),
                    sub_goal_id: None,
                    action_item_id: None,
                },
            )
        })
        .unwrap();
        db.with_conn(|conn| {
            create_guestbook_entry(
                conn,
                &user_id,
                &CreateGuestbookInput {
                    author_name: "botan".to_string(),
                    body: "for the pillar".to_string(),
                    goal_id: None,
                    sub_goal_id: Some(sub_goal_id.clone()),
                    action_item_id: None,
                },
            )
        })
        .unwrap();

        let for_goal = db
            .with_conn(|conn| {
                list_guestbook_entries(conn, &user_id, Some(&goal_id), None, None, 50, 0)
            })
            .unwrap();
        assert_eq!(for_goal.len(), 1);
        assert_eq!(for_goal[0].author_name, "aiko");

        let for_sub_goal = db
            .with_conn(|conn| {
                list_guestbook_entries(conn, &user_id, None, Some(&sub_goal_id), None, 50, 0)
            })
            .unwrap();
        assert_eq!(for_sub_goal.len(), 1);
        assert_eq!(for_sub_goal[0].author_name, "botan");
    }

    #[test]
    fn delete_is_scoped_to_the_owner() {
        let (db, user_id, _, _) = db_with_board();
        let row = db
            .with_conn(|conn| create_guestbook_entry(conn, &user_id, &entry("aiko", "hi")))
            .unwrap();

        let rival = db
            .with_conn_mut(|conn| create_user(conn, "rival", "hash", None))
            .unwrap();
        assert!(!db
            .with_conn(|conn| delete_guestbook_entry(conn, &rival.id, &row.id))
            .unwrap());
        assert!(db
            .with_conn(|conn| delete_guestbook_entry(conn, &user_id, &row.id))
            .unwrap());
    }

    #[test]
    fn deleting_the_target_cascades_to_entries() {
        let (db, user_id, goal_id, _) = db_with_board();
        db.with_conn(|conn| {
            create_guestbook_entry(
                conn,
                &user_id,
                &CreateGuestbookInput {
                    author_name: "aiko".to_string(),
                    body: "pinned to the goal".to_string(),
                    goal_id: Some(goal_id.clone()),
                    sub_goal_id: None,
                    action_item_id: None,
                },
            )
        })
        .unwrap();

        db.with_conn_mut(|conn| crate::db::goals::delete_goal(conn, &user_id, &goal_id))
            .unwrap();

        let entries = db
            .with_conn(|conn| list_guestbook_entries(conn, &user_id, None, None, None, 50, 0))
            .unwrap();
        assert!(entries.is_empty());
    }
}
