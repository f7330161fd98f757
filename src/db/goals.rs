//! The board hierarchy: primary goals, sub-goals, and action items
//!
//! Every query is scoped by `user_id` through the parent chain, so rows
//! belonging to other users are simply not found. Position slots run 1-8;
//! position 0 is the reorder sentinel and never survives a transaction.

use std::collections::HashSet;

use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::db::logs;
use crate::error::{MandalartError, Result};

pub const GOAL_STATUSES: [&str; 3] = ["active", "achieved", "archived"];

/// Sentinel slot used while two rows trade positions
const REORDER_SENTINEL: i64 = 0;

// ============================================================================
// Rows
// ============================================================================

#[derive(Debug, Clone)]
pub struct GoalRow {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub description: Option<String>,
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
}

impl GoalRow {
    fn from_row(row: &Row) -> std::result::Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            user_id: row.get("user_id")?,
            title: row.get("title")?,
            description: row.get("description")?,
            status: row.get("status")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct SubGoalRow {
    pub id: String,
    pub goal_id: String,
    pub position: i64,
    pub title: String,
    pub description: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl SubGoalRow {
    fn from_row(row: &Row) -> std::result::Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            goal_id: row.get("goal_id")?,
            position: row.get("position")?,
            title: row.get("title")?,
            description: row.get("description")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct ActionItemRow {
    pub id: String,
    pub sub_goal_id: String,
    pub position: i64,
    pub title: String,
    pub description: Option<String>,
    pub completed: i64,
    pub completed_at: Option<String>,
    pub due_date: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl ActionItemRow {
    fn from_row(row: &Row) -> std::result::Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            sub_goal_id: row.get("sub_goal_id")?,
            position: row.get("position")?,
            title: row.get("title")?,
            description: row.get("description")?,
            completed: row.get("completed")?,
            completed_at: row.get("completed_at")?,
            due_date: row.get("due_date")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

/// A goal with all descendants, in position order
#[derive(Debug, Clone)]
pub struct GoalTree {
    pub goal: GoalRow,
    pub sub_goals: Vec<SubGoalTree>,
}

#[derive(Debug, Clone)]
pub struct SubGoalTree {
    pub sub_goal: SubGoalRow,
    pub actions: Vec<ActionItemRow>,
}

// ============================================================================
// Inputs
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGoalInput {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateGoalInput {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSubGoalInput {
    pub position: i64,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSubGoalInput {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateActionInput {
    pub position: i64,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub due_date: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateActionInput {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub due_date: Option<String>,
}

// ============================================================================
// Portable board document (export and import share the shape; ids stay out)
// ============================================================================

fn default_format_version() -> i64 {
    1
}

fn default_goal_status() -> String {
    "active".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardDocument {
    #[serde(default = "default_format_version")]
    pub format_version: i64,
    #[serde(default)]
    pub exported_at: Option<String>,
    pub goal: GoalDocument,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalDocument {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_goal_status")]
    pub status: String,
    #[serde(default)]
    pub sub_goals: Vec<SubGoalDocument>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubGoalDocument {
    pub position: i64,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub actions: Vec<ActionDocument>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionDocument {
    pub position: i64,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub completed_at: Option<String>,
    #[serde(default)]
    pub due_date: Option<String>,
    #[serde(default)]
    pub logs: Vec<LogDocument>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogDocument {
    #[serde(default = "logs::default_log_type")]
    pub log_type: String,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub logged_at: Option<String>,
}

// ============================================================================
// Validation helpers
// ============================================================================

fn validate_title(title: &str) -> Result<()> {
    if title.trim().is_empty() {
        return Err(MandalartError::InvalidInput(
            "Title must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn validate_position(position: i64) -> Result<()> {
    if !(1..=8).contains(&position) {
        return Err(MandalartError::InvalidInput(
            "Position must be between 1 and 8".to_string(),
        ));
    }
    Ok(())
}

fn validate_status(status: &str) -> Result<()> {
    if !GOAL_STATUSES.contains(&status) {
        return Err(MandalartError::InvalidInput(format!(
            "Invalid status '{}', expected one of: {}",
            status,
            GOAL_STATUSES.join(", ")
        )));
    }
    Ok(())
}

fn validate_due_date(due_date: &str) -> Result<()> {
    chrono::NaiveDate::parse_from_str(due_date, "%Y-%m-%d").map_err(|_| {
        MandalartError::InvalidInput(format!(
            "Invalid due date '{}', expected YYYY-MM-DD",
            due_date
        ))
    })?;
    Ok(())
}

// ============================================================================
// Goals
// ============================================================================

pub fn create_goal(conn: &mut Connection, user_id: &str, input: &CreateGoalInput) -> Result<GoalRow> {
    validate_title(&input.title)?;

    let tx = conn
        .transaction()
        .map_err(|e| MandalartError::Database(format!("Transaction failed: {}", e)))?;

    let id = Uuid::new_v4().to_string();
    tx.execute(
        "INSERT INTO primary_goals (id, user_id, title, description) VALUES (?1, ?2, ?3, ?4)",
        params![id, user_id, input.title.trim(), input.description],
    )
    .map_err(|e| MandalartError::Database(format!("Insert failed: {}", e)))?;

    tx.commit()
        .map_err(|e| MandalartError::Database(format!("Commit failed: {}", e)))?;

    debug!("Created goal {}", id);
    get_goal(conn, user_id, &id)?
        .ok_or_else(|| MandalartError::Internal("Goal not found after insert".to_string()))
}

pub fn get_goal(conn: &Connection, user_id: &str, goal_id: &str) -> Result<Option<GoalRow>> {
    let mut stmt = conn
        .prepare("SELECT * FROM primary_goals WHERE id = ?1 AND user_id = ?2")
        .map_err(|e| MandalartError::Database(format!("Prepare failed: {}", e)))?;
    let mut rows = stmt
        .query(params![goal_id, user_id])
        .map_err(|e| MandalartError::Database(format!("Query failed: {}", e)))?;

    match rows
        .next()
        .map_err(|e| MandalartError::Database(format!("Row fetch failed: {}", e)))?
    {
        Some(row) => Ok(Some(GoalRow::from_row(row).map_err(|e| {
            MandalartError::Database(format!("Row parse failed: {}", e))
        })?)),
        None => Ok(None),
    }
}

pub fn list_goals(conn: &Connection, user_id: &str) -> Result<Vec<GoalRow>> {
    let mut stmt = conn
        .prepare("SELECT * FROM primary_goals WHERE user_id = ?1 ORDER BY created_at DESC")
        .map_err(|e| MandalartError::Database(format!("Prepare failed: {}", e)))?;

    let goals = stmt
        .query_map(params![user_id], |row| GoalRow::from_row(row))
        .map_err(|e| MandalartError::Database(format!("Query failed: {}", e)))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| MandalartError::Database(format!("Row parse failed: {}", e)))?;

    Ok(goals)
}

pub fn update_goal(
    conn: &mut Connection,
    user_id: &str,
    goal_id: &str,
    input: &UpdateGoalInput,
) -> Result<GoalRow> {
    let tx = conn
        .transaction()
        .map_err(|e| MandalartError::Database(format!("Transaction failed: {}", e)))?;

    let current = match get_goal(&tx, user_id, goal_id)? {
        Some(goal) => goal,
        None => return Err(MandalartError::NotFound("Goal not found".to_string())),
    };

    let title = input.title.clone().unwrap_or(current.title);
    validate_title(&title)?;
    let description = input.description.clone().or(current.description);
    let status = input.status.clone().unwrap_or(current.status);
    validate_status(&status)?;

    tx.execute(
        "UPDATE primary_goals
         SET title = ?1, description = ?2, status = ?3, updated_at = datetime('now')
         WHERE id = ?4",
        params![title.trim(), description, status, goal_id],
    )
    .map_err(|e| MandalartError::Database(format!("Update failed: {}", e)))?;

    tx.commit()
        .map_err(|e| MandalartError::Database(format!("Commit failed: {}", e)))?;

    get_goal(conn, user_id, goal_id)?
        .ok_or_else(|| MandalartError::Internal("Goal not found after update".to_string()))
}

/// Delete a goal; sub-goals, actions, logs, and guestbook targets cascade
pub fn delete_goal(conn: &Connection, user_id: &str, goal_id: &str) -> Result<bool> {
    let changes = conn
        .execute(
            "DELETE FROM primary_goals WHERE id = ?1 AND user_id = ?2",
            params![goal_id, user_id],
        )
        .map_err(|e| MandalartError::Database(format!("Delete failed: {}", e)))?;
    if changes > 0 {
        debug!("Deleted goal {}", goal_id);
    }
    Ok(changes > 0)
}

// ============================================================================
// Sub-goals
// ============================================================================

pub fn create_sub_goal(
    conn: &mut Connection,
    user_id: &str,
    goal_id: &str,
    input: &CreateSubGoalInput,
) -> Result<SubGoalRow> {
    validate_position(input.position)?;
    validate_title(&input.title)?;

    let tx = conn
        .transaction()
        .map_err(|e| MandalartError::Database(format!("Transaction failed: {}", e)))?;

    if get_goal(&tx, user_id, goal_id)?.is_none() {
        return Err(MandalartError::NotFound("Goal not found".to_string()));
    }

    let occupied: Option<String> = tx
        .query_row(
            "SELECT id FROM sub_goals WHERE goal_id = ?1 AND position = ?2",
            params![goal_id, input.position],
            |row| row.get(0),
        )
        .optional()
        .map_err(|e| MandalartError::Database(format!("Query failed: {}", e)))?;
    if occupied.is_some() {
        return Err(MandalartError::Conflict(format!(
            "Position {} is already occupied",
            input.position
        )));
    }

    let id = Uuid::new_v4().to_string();
    tx.execute(
        "INSERT INTO sub_goals (id, goal_id, position, title, description)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![id, goal_id, input.position, input.title.trim(), input.description],
    )
    .map_err(|e| MandalartError::Database(format!("Insert failed: {}", e)))?;

    tx.commit()
        .map_err(|e| MandalartError::Database(format!("Commit failed: {}", e)))?;

    get_sub_goal(conn, user_id, &id)?
        .ok_or_else(|| MandalartError::Internal("Sub-goal not found after insert".to_string()))
}

pub fn get_sub_goal(conn: &Connection, user_id: &str, id: &str) -> Result<Option<SubGoalRow>> {
    let mut stmt = conn
        .prepare(
            "SELECT sg.* FROM sub_goals sg
             JOIN primary_goals g ON g.id = sg.goal_id
             WHERE sg.id = ?1 AND g.user_id = ?2",
        )
        .map_err(|e| MandalartError::Database(format!("Prepare failed: {}", e)))?;
    let mut rows = stmt
        .query(params![id, user_id])
        .map_err(|e| MandalartError::Database(format!("Query failed: {}", e)))?;

    match rows
        .next()
        .map_err(|e| MandalartError::Database(format!("Row fetch failed: {}", e)))?
    {
        Some(row) => Ok(Some(SubGoalRow::from_row(row).map_err(|e| {
            MandalartError::Database(format!("Row parse failed: {}", e))
        })?)),
        None => Ok(None),
    }
}

/// Sibling sub-goals of a goal in position order. The caller is expected
/// to have verified goal ownership.
pub fn list_sub_goals(conn: &Connection, goal_id: &str) -> Result<Vec<SubGoalRow>> {
    let mut stmt = conn
        .prepare("SELECT * FROM sub_goals WHERE goal_id = ?1 ORDER BY position ASC")
        .map_err(|e| MandalartError::Database(format!("Prepare failed: {}", e)))?;

    let sub_goals = stmt
        .query_map(params![goal_id], |row| SubGoalRow::from_row(row))
        .map_err(|e| MandalartError::Database(format!("Query failed: {}", e)))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| MandalartError::Database(format!("Row parse failed: {}", e)))?;

    Ok(sub_goals)
}

pub fn update_sub_goal(
    conn: &mut Connection,
    user_id: &str,
    id: &str,
    input: &UpdateSubGoalInput,
) -> Result<SubGoalRow> {
    let tx = conn
        .transaction()
        .map_err(|e| MandalartError::Database(format!("Transaction failed: {}", e)))?;

    let current = match get_sub_goal(&tx, user_id, id)? {
        Some(sub_goal) => sub_goal,
        None => return Err(MandalartError::NotFound("Sub-goal not found".to_string())),
    };

    let title = input.title.clone().unwrap_or(current.title);
    validate_title(&title)?;
    let description = input.description.clone().or(current.description);

    tx.execute(
        "UPDATE sub_goals SET title = ?1, description = ?2, updated_at = datetime('now')
         WHERE id = ?3",
        params![title.trim(), description, id],
    )
    .map_err(|e| MandalartError::Database(format!("Update failed: {}", e)))?;

    tx.commit()
        .map_err(|e| MandalartError::Database(format!("Commit failed: {}", e)))?;

    get_sub_goal(conn, user_id, id)?
        .ok_or_else(|| MandalartError::Internal("Sub-goal not found after update".to_string()))
}

pub fn delete_sub_goal(conn: &Connection, user_id: &str, id: &str) -> Result<bool> {
    let changes = conn
        .execute(
            "DELETE FROM sub_goals
             WHERE id = ?1
               AND goal_id IN (SELECT id FROM primary_goals WHERE user_id = ?2)",
            params![id, user_id],
        )
        .map_err(|e| MandalartError::Database(format!("Delete failed: {}", e)))?;
    Ok(changes > 0)
}

/// Move a sub-goal to a new slot, swapping with whatever occupies it.
///
/// The swap runs in three steps so UNIQUE(goal_id, position) holds after
/// every statement: source parks on the sentinel, the occupant (if any)
/// takes the source's old slot, then the source lands on the target.
/// Returns the parent's updated sub-goal list.
pub fn move_sub_goal(
    conn: &mut Connection,
    user_id: &str,
    id: &str,
    new_position: i64,
) -> Result<Vec<SubGoalRow>> {
    validate_position(new_position)?;

    let tx = conn
        .transaction()
        .map_err(|e| MandalartError::Database(format!("Transaction failed: {}", e)))?;

    let source = match get_sub_goal(&tx, user_id, id)? {
        Some(sub_goal) => sub_goal,
        None => return Err(MandalartError::NotFound("Sub-goal not found".to_string())),
    };
    let goal_id = source.goal_id.clone();

    if source.position != new_position {
        let occupant: Option<String> = tx
            .query_row(
                "SELECT id FROM sub_goals WHERE goal_id = ?1 AND position = ?2",
                params![goal_id, new_position],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| MandalartError::Database(format!("Query failed: {}", e)))?;

        tx.execute(
            "UPDATE sub_goals SET position = ?1 WHERE id = ?2",
            params![REORDER_SENTINEL, source.id],
        )
        .map_err(|e| MandalartError::Database(format!("Update failed: {}", e)))?;

        if let Some(occupant_id) = occupant {
            tx.execute(
                "UPDATE sub_goals SET position = ?1, updated_at = datetime('now') WHERE id = ?2",
                params![source.position, occupant_id],
            )
            .map_err(|e| MandalartError::Database(format!("Update failed: {}", e)))?;
        }

        tx.execute(
            "UPDATE sub_goals SET position = ?1, updated_at = datetime('now') WHERE id = ?2",
            params![new_position, source.id],
        )
        .map_err(|e| MandalartError::Database(format!("Update failed: {}", e)))?;

        debug!("Moved sub-goal {} to position {}", source.id, new_position);
    }

    tx.commit()
        .map_err(|e| MandalartError::Database(format!("Commit failed: {}", e)))?;

    list_sub_goals(conn, &goal_id)
}

// ============================================================================
// Action items
// ============================================================================

pub fn create_action_item(
    conn: &mut Connection,
    user_id: &str,
    sub_goal_id: &str,
    input: &CreateActionInput,
) -> Result<ActionItemRow> {
    validate_position(input.position)?;
    validate_title(&input.title)?;
    if let Some(due_date) = &input.due_date {
        validate_due_date(due_date)?;
    }

    let tx = conn
        .transaction()
        .map_err(|e| MandalartError::Database(format!("Transaction failed: {}", e)))?;

    if get_sub_goal(&tx, user_id, sub_goal_id)?.is_none() {
        return Err(MandalartError::NotFound("Sub-goal not found".to_string()));
    }

    let occupied: Option<String> = tx
        .query_row(
            "SELECT id FROM action_items WHERE sub_goal_id = ?1 AND position = ?2",
            params![sub_goal_id, input.position],
            |row| row.get(0),
        )
        .optional()
        .map_err(|e| MandalartError::Database(format!("Query failed: {}", e)))?;
    if occupied.is_some() {
        return Err(MandalartError::Conflict(format!(
            "Position {} is already occupied",
            input.position
        )));
    }

    let id = Uuid::new_v4().to_string();
    tx.execute(
        "INSERT INTO action_items (id, sub_goal_id, position, title, description, due_date)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            id,
            sub_goal_id,
            input.position,
            input.title.trim(),
            input.description,
            input.due_date
        ],
    )
    .map_err(|e| MandalartError::Database(format!("Insert failed: {}", e)))?;

    tx.commit()
        .map_err(|e| MandalartError::Database(format!("Commit failed: {}", e)))?;

    get_action_item(conn, user_id, &id)?
        .ok_or_else(|| MandalartError::Internal("Action item not found after insert".to_string()))
}

pub fn get_action_item(conn: &Connection, user_id: &str, id: &str) -> Result<Option<ActionItemRow>> {
    let mut stmt = conn
        .prepare(
            "SELECT a.* FROM action_items a
             JOIN sub_goals sg ON sg.id = a.sub_goal_id
             JOIN primary_goals g ON g.id = sg.goal_id
             WHERE a.id = ?1 AND g.user_id = ?2",
        )
        .map_err(|e| MandalartError::Database(format!("Prepare failed: {}", e)))?;
    let mut rows = stmt
        .query(params![id, user_id])
        .map_err(|e| MandalartError::Database(format!("Query failed: {}", e)))?;

    match rows
        .next()
        .map_err(|e| MandalartError::Database(format!("Row fetch failed: {}", e)))?
    {
        Some(row) => Ok(Some(ActionItemRow::from_row(row).map_err(|e| {
            MandalartError::Database(format!("Row parse failed: {}", e))
        })?)),
        None => Ok(None),
    }
}

/// Sibling actions of a sub-goal in position order. The caller is expected
/// to have verified ownership of the parent chain.
pub fn list_action_items(conn: &Connection, sub_goal_id: &str) -> Result<Vec<ActionItemRow>> {
    let mut stmt = conn
        .prepare("SELECT * FROM action_items WHERE sub_goal_id = ?1 ORDER BY position ASC")
        .map_err(|e| MandalartError::Database(format!("Prepare failed: {}", e)))?;

    let actions = stmt
        .query_map(params![sub_goal_id], |row| ActionItemRow::from_row(row))
        .map_err(|e| MandalartError::Database(format!("Query failed: {}", e)))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| MandalartError::Database(format!("Row parse failed: {}", e)))?;

    Ok(actions)
}

pub fn update_action_item(
    conn: &mut Connection,
    user_id: &str,
    id: &str,
    input: &UpdateActionInput,
) -> Result<ActionItemRow> {
    let tx = conn
        .transaction()
        .map_err(|e| MandalartError::Database(format!("Transaction failed: {}", e)))?;

    let current = match get_action_item(&tx, user_id, id)? {
        Some(action) => action,
        None => return Err(MandalartError::NotFound("Action item not found".to_string())),
    };

    let title = input.title.clone().unwrap_or(current.title);
    validate_title(&title)?;
    let description = input.description.clone().or(current.description);
    let due_date = input.due_date.clone().or(current.due_date);
    if let Some(d) = &due_date {
        validate_due_date(d)?;
    }

    tx.execute(
        "UPDATE action_items
         SET title = ?1, description = ?2, due_date = ?3, updated_at = datetime('now')
         WHERE id = ?4",
        params![title.trim(), description, due_date, id],
    )
    .map_err(|e| MandalartError::Database(format!("Update failed: {}", e)))?;

    tx.commit()
        .map_err(|e| MandalartError::Database(format!("Commit failed: {}", e)))?;

    get_action_item(conn, user_id, id)?
        .ok_or_else(|| MandalartError::Internal("Action item not found after update".to_string()))
}

/// Set or clear the completion flag, stamping `completed_at` to match
pub fn set_action_completed(
    conn: &mut Connection,
    user_id: &str,
    id: &str,
    completed: bool,
) -> Result<ActionItemRow> {
    let tx = conn
        .transaction()
        .map_err(|e| MandalartError::Database(format!("Transaction failed: {}", e)))?;

    if get_action_item(&tx, user_id, id)?.is_none() {
        return Err(MandalartError::NotFound("Action item not found".to_string()));
    }

    tx.execute(
        "UPDATE action_items
         SET completed = ?1,
             completed_at = CASE WHEN ?1 THEN datetime('now') ELSE NULL END,
             updated_at = datetime('now')
         WHERE id = ?2",
        params![completed, id],
    )
    .map_err(|e| MandalartError::Database(format!("Update failed: {}", e)))?;

    tx.commit()
        .map_err(|e| MandalartError::Database(format!("Commit failed: {}", e)))?;

    get_action_item(conn, user_id, id)?
        .ok_or_else(|| MandalartError::Internal("Action item not found after update".to_string()))
}

pub fn delete_action_item(conn: &Connection, user_id: &str, id: &str) -> Result<bool> {
    let changes = conn
        .execute(
            "DELETE FROM action_items
             WHERE id = ?1
               AND sub_goal_id IN (
                   SELECT sg.id FROM sub_goals sg
                   JOIN primary_goals g ON g.id = sg.goal_id
                   WHERE g.user_id = ?2
               )",
            params![id, user_id],
        )
        .map_err(|e| MandalartError::Database(format!("Delete failed: {}", e)))?;
    Ok(changes > 0)
}

/// Action-item twin of `move_sub_goal`; same three-step sentinel swap.
/// Returns the parent's updated action list.
pub fn move_action_item(
    conn: &mut Connection,
    user_id: &str,
    id: &str,
    new_position: i64,
) -> Result<Vec<ActionItemRow>> {
    validate_position(new_position)?;

    let tx = conn
        .transaction()
        .map_err(|e| MandalartError::Database(format!("Transaction failed: {}", e)))?;

    let source = match get_action_item(&tx, user_id, id)? {
        Some(action) => action,
        None => return Err(MandalartError::NotFound("Action item not found".to_string())),
    };
    let sub_goal_id = source.sub_goal_id.clone();

    if source.position != new_position {
        let occupant: Option<String> = tx
            .query_row(
                "SELECT id FROM action_items WHERE sub_goal_id = ?1 AND position = ?2",
                params![sub_goal_id, new_position],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| MandalartError::Database(format!("Query failed: {}", e)))?;

        tx.execute(
            "UPDATE action_items SET position = ?1 WHERE id = ?2",
            params![REORDER_SENTINEL, source.id],
        )
        .map_err(|e| MandalartError::Database(format!("Update failed: {}", e)))?;

        if let Some(occupant_id) = occupant {
            tx.execute(
                "UPDATE action_items SET position = ?1, updated_at = datetime('now') WHERE id = ?2",
                params![source.position, occupant_id],
            )
            .map_err(|e| MandalartError::Database(format!("Update failed: {}", e)))?;
        }

        tx.execute(
            "UPDATE action_items SET position = ?1, updated_at = datetime('now') WHERE id = ?2",
            params![new_position, source.id],
        )
        .map_err(|e| MandalartError::Database(format!("Update failed: {}", e)))?;

        debug!("Moved action item {} to position {}", source.id, new_position);
    }

    tx.commit()
        .map_err(|e| MandalartError::Database(format!("Commit failed: {}", e)))?;

    list_action_items(conn, &sub_goal_id)
}

// ============================================================================
// Tree, export, import
// ============================================================================

pub fn get_goal_tree(conn: &Connection, user_id: &str, goal_id: &str) -> Result<Option<GoalTree>> {
    let goal = match get_goal(conn, user_id, goal_id)? {
        Some(goal) => goal,
        None => return Ok(None),
    };

    let mut sub_goals = Vec::new();
    for sub_goal in list_sub_goals(conn, goal_id)? {
        let actions = list_action_items(conn, &sub_goal.id)?;
        sub_goals.push(SubGoalTree { sub_goal, actions });
    }

    Ok(Some(GoalTree { goal, sub_goals }))
}

/// Snapshot a board as a portable document: the whole tree plus each
/// action's activity logs, with no row ids.
pub fn export_board(conn: &Connection, user_id: &str, goal_id: &str) -> Result<Option<BoardDocument>> {
    let tree = match get_goal_tree(conn, user_id, goal_id)? {
        Some(tree) => tree,
        None => return Ok(None),
    };

    let mut sub_goals = Vec::new();
    for branch in &tree.sub_goals {
        let mut actions = Vec::new();
        for action in &branch.actions {
            let logs = logs::logs_for_action(conn, &action.id)?
                .into_iter()
                .map(|log| LogDocument {
                    log_type: log.log_type,
                    body: log.body,
                    value: log.value,
                    url: log.url,
                    logged_at: Some(log.logged_at),
                })
                .collect();
            actions.push(ActionDocument {
                position: action.position,
                title: action.title.clone(),
                description: action.description.clone(),
                completed: action.completed == 1,
                completed_at: action.completed_at.clone(),
                due_date: action.due_date.clone(),
                logs,
            });
        }
        sub_goals.push(SubGoalDocument {
            position: branch.sub_goal.position,
            title: branch.sub_goal.title.clone(),
            description: branch.sub_goal.description.clone(),
            actions,
        });
    }

    Ok(Some(BoardDocument {
        format_version: default_format_version(),
        exported_at: Some(
            chrono::Utc::now()
                .format("%Y-%m-%d %H:%M:%S")
                .to_string(),
        ),
        goal: GoalDocument {
            title: tree.goal.title,
            description: tree.goal.description,
            status: tree.goal.status,
            sub_goals,
        },
    }))
}

/// Recreate a board from a portable document under the given user.
/// Every row gets a fresh id; positions come from the document.
pub fn import_board(conn: &mut Connection, user_id: &str, doc: &BoardDocument) -> Result<GoalRow> {
    validate_title(&doc.goal.title)?;
    validate_status(&doc.goal.status)?;
    if doc.goal.sub_goals.len() > 8 {
        return Err(MandalartError::InvalidInput(
            "A board holds at most 8 sub-goals".to_string(),
        ));
    }

    let mut seen_sub_positions = HashSet::new();
    for sub_goal in &doc.goal.sub_goals {
        validate_position(sub_goal.position)?;
        validate_title(&sub_goal.title)?;
        if !seen_sub_positions.insert(sub_goal.position) {
            return Err(MandalartError::InvalidInput(format!(
                "Duplicate sub-goal position {}",
                sub_goal.position
            )));
        }
        if sub_goal.actions.len() > 8 {
            return Err(MandalartError::InvalidInput(
                "A sub-goal holds at most 8 action items".to_string(),
            ));
        }
        let mut seen_action_positions = HashSet::new();
        for action in &sub_goal.actions {
            validate_position(action.position)?;
            validate_title(&action.title)?;
            if !seen_action_positions.insert(action.position) {
                return Err(MandalartError::InvalidInput(format!(
                    "Duplicate action position {} under sub-goal {}",
                    action.position, sub_goal.position
                )));
            }
            if let Some(due_date) = &action.due_date {
                validate_due_date(due_date)?;
            }
            for log in &action.logs {
                logs::validate_log_fields(&log.log_type, &log.body, &log.value, &log.url)?;
            }
        }
    }

    let tx = conn
        .transaction()
        .map_err(|e| MandalartError::Database(format!("Transaction failed: {}", e)))?;

    let goal_id = Uuid::new_v4().to_string();
    tx.execute(
        "INSERT INTO primary_goals (id, user_id, title, description, status)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            goal_id,
            user_id,
            doc.goal.title.trim(),
            doc.goal.description,
            doc.goal.status
        ],
    )
    .map_err(|e| MandalartError::Database(format!("Insert failed: {}", e)))?;

    for sub_goal in &doc.goal.sub_goals {
        let sub_goal_id = Uuid::new_v4().to_string();
        tx.execute(
            "INSERT INTO sub_goals (id, goal_id, position, title, description)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                sub_goal_id,
                goal_id,
                sub_goal.position,
                sub_goal.title.trim(),
                sub_goal.description
            ],
        )
        .map_err(|e| MandalartError::Database(format!("Insert failed: {}", e)))?;

        for action in &sub_goal.actions {
            let action_id = Uuid::new_v4().to_string();
            tx.execute(
                "INSERT INTO action_items
                     (id, sub_goal_id, position, title, description, completed, completed_at, due_date)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    action_id,
                    sub_goal_id,
                    action.position,
                    action.title.trim(),
                    action.description,
                    action.completed,
                    action.completed_at,
                    action.due_date
                ],
            )
            .map_err(|e| MandalartError::Database(format!("Insert failed: {}", e)))?;

            for log in &action.logs {
                let logged_at = match &log.logged_at {
                    Some(ts) => logs::normalize_timestamp(ts)?,
                    None => chrono::Utc::now().format("%Y-%m-%d %H:%M:%S").to_string(),
                };
                tx.execute(
                    "INSERT INTO activity_logs (id, action_item_id, log_type, body, value, url, logged_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    params![
                        Uuid::new_v4().to_string(),
                        action_id,
                        log.log_type,
                        log.body,
                        log.value,
                        log.url,
                        logged_at
                    ],
                )
                .map_err(|e| MandalartError::Database(format!("Insert failed: {}", e)))?;
            }
        }
    }

    tx.commit()
        .map_err(|e| MandalartError::Database(format!("Commit failed: {}", e)))?;

    debug!("Imported board as goal {}", goal_id);
    get_goal(conn, user_id, &goal_id)?
        .ok_or_else(|| MandalartError::Internal("Goal not found after import".to_string()))
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

    fn make_goal(db: &GoalDb, user_id: &str) -> GoalRow {
        db.with_conn_mut(|conn| {
            create_goal(
                conn,
                user_id,
                &CreateGoalInput {
                    title: "Become a better runner".to_string(),
                    description: None,
                },
            )
        })
        .unwrap()
    }

    fn make_sub_goal(db: &GoalDb, user_id: &str, goal_id: &str, position: i64) -> SubGoalRow {
        db.with_conn_mut(|conn| {
            create_sub_goal(
                conn,
                user_id,
                goal_id,
                &CreateSubGoalInput {
                    position,
                    title: format!("Pillar {}", position),
                    description: None,
                },
            )
        })
        .unwrap()
    }

    fn make_action(db: &GoalDb, user_id: &str, sub_goal_id: &str, position: i64) -> ActionItemRow {
        db.with_conn_mut(|conn| {
            create_action_item(
                conn,
                user_id,
                sub_goal_id,
                &CreateActionInput {
                    position,
                    title: format!("Action {}", position),
                    description: None,
                    due_date: None,
                },
            )
        })
        .unwrap()
    }

    #[test]
    fn goal_crud_roundtrip() {
        let (db, user_id) = db_with_user();
        let goal = make_goal(&db, &user_id);
        assert_eq!(goal.status, "active");

        let updated = db
            .with_conn_mut(|conn| {
                update_goal(
                    conn,
                    &user_id,
                    &goal.id,
                    &UpdateGoalInput {
                        title: None,
                        description: Some("sub-3h marathon".to_string()),
                        status: Some("achieved".to_string()),
                    },
                )
            })
            .unwrap();
        assert_eq!(updated.status, "achieved");
        assert_eq!(updated.description.as_deref(), Some("sub-3h marathon"));
        assert_eq!(updated.title, goal.title);

        assert!(db
            .with_conn(|conn| delete_goal(conn, &user_id, &goal.id))
            .unwrap());
        assert!(db
            .with_conn(|conn| get_goal(conn, &user_id, &goal.id))
            .unwrap()
            .is_none());
    }

    #[test]
    fn goals_are_invisible_to_other_users() {
        let (db, user_id) = db_with_user();
        let goal = make_goal(&db, &user_id);
        let rival = db
            .with_conn_mut(|conn| create_user(conn, "rival", "hash", None))
            .unwrap();

        assert!(db
            .with_conn(|conn| get_goal(conn, &rival.id, &goal.id))
            .unwrap()
            .is_none());
        assert!(!db
            .with_conn(|conn| delete_goal(conn, &rival.id, &goal.id))
            .unwrap());
    }

    #[test]
    fn invalid_status_is_rejected() {
        let (db, user_id) = db_with_user();
        let goal = make_goal(&db, &user_id);
        let err = db
            .with_conn_mut(|conn| {
                update_goal(
                    conn,
                    &user_id,
                    &goal.id,
                    &UpdateGoalInput {
                        title: None,
                        description: None,
                        status: Some("done".to_string()),
                    },
                )
            })
            .unwrap_err();
        assert!(matches!(err, MandalartError::InvalidInput(_)));
    }

    #[test]
    fn occupied_position_is_a_conflict() {
        let (db, user_id) = db_with_user();
        let goal = make_goal(&db, &user_id);
        make_sub_goal(&db, &user_id, &goal.id, 3);

        let err = db
            .with_conn_mut(|conn| {
                create_sub_goal(
                    conn,
                    &user_id,
                    &goal.id,
                    &CreateSubGoalInput {
                        position: 3,
                        title: "Usurper".to_string(),
                        description: None,
                    },
                )
            })
            .unwrap_err();
        assert!(matches!(err, MandalartError::Conflict(_)));
    }

    #[test]
    fn position_out_of_range_is_invalid() {
        let (db, user_id) = db_with_user();
        let goal = make_goal(&db, &user_id);
        for position in [0, 9, -1] {
            let err = db
                .with_conn_mut(|conn| {
                    create_sub_goal(
                        conn,
                        &user_id,
                        &goal.id,
                        &CreateSubGoalInput {
                            position,
                            title: "Out of bounds".to_string(),
                            description: None,
                        },
                    )
                })
                .unwrap_err();
            assert!(matches!(err, MandalartError::InvalidInput(_)));
        }
    }

    #[test]
    fn move_swaps_with_the_occupant() {
        let (db, user_id) = db_with_user();
        let goal = make_goal(&db, &user_id);
        let first = make_sub_goal(&db, &user_id, &goal.id, 1);
        let second = make_sub_goal(&db, &user_id, &goal.id, 2);

        let siblings = db
            .with_conn_mut(|conn| move_sub_goal(conn, &user_id, &first.id, 2))
            .unwrap();

        let by_id = |id: &str| siblings.iter().find(|s| s.id == id).unwrap().position;
        assert_eq!(by_id(&first.id), 2);
        assert_eq!(by_id(&second.id), 1);
    }

    #[test]
    fn move_to_empty_slot_leaves_siblings_alone() {
        let (db, user_id) = db_with_user();
        let goal = make_goal(&db, &user_id);
        let first = make_sub_goal(&db, &user_id, &goal.id, 1);
        let second = make_sub_goal(&db, &user_id, &goal.id, 2);

        let siblings = db
            .with_conn_mut(|conn| move_sub_goal(conn, &user_id, &first.id, 7))
            .unwrap();

        let by_id = |id: &str| siblings.iter().find(|s| s.id == id).unwrap().position;
        assert_eq!(by_id(&first.id), 7);
        assert_eq!(by_id(&second.id), 2);
    }

    #[test]
    fn move_to_own_position_is_a_noop() {
        let (db, user_id) = db_with_user();
        let goal = make_goal(&db, &user_id);
        let sub_goal = make_sub_goal(&db, &user_id, &goal.id, 4);

        let siblings = db
            .with_conn_mut(|conn| move_sub_goal(conn, &user_id, &sub_goal.id, 4))
            .unwrap();
        assert_eq!(siblings.len(), 1);
        assert_eq!(siblings[0].position, 4);
        // no-op must not touch updated_at
        assert_eq!(siblings[0].updated_at, sub_goal.updated_at);
    }

    #[test]
    fn no_sentinel_survives_a_swap() {
        let (db, user_id) = db_with_user();
        let goal = make_goal(&db, &user_id);
        let first = make_sub_goal(&db, &user_id, &goal.id, 1);
        make_sub_goal(&db, &user_id, &goal.id, 2);

        db.with_conn_mut(|conn| move_sub_goal(conn, &user_id, &first.id, 2))
            .unwrap();

        let sentinel_count: i64 = db
            .with_conn(|conn| {
                conn.query_row(
                    "SELECT COUNT(*) FROM sub_goals WHERE position = 0",
                    [],
                    |row| row.get(0),
                )
                .map_err(|e| MandalartError::Database(e.to_string()))
            })
            .unwrap();
        assert_eq!(sentinel_count, 0);
    }

    #[test]
    fn action_move_swaps_within_one_sub_goal() {
        let (db, user_id) = db_with_user();
        let goal = make_goal(&db, &user_id);
        let sub_goal = make_sub_goal(&db, &user_id, &goal.id, 1);
        let a = make_action(&db, &user_id, &sub_goal.id, 5);
        let b = make_action(&db, &user_id, &sub_goal.id, 6);

        let actions = db
            .with_conn_mut(|conn| move_action_item(conn, &user_id, &a.id, 6))
            .unwrap();

        let by_id = |id: &str| actions.iter().find(|x| x.id == id).unwrap().position;
        assert_eq!(by_id(&a.id), 6);
        assert_eq!(by_id(&b.id), 5);
    }

    #[test]
    fn completion_stamps_and_clears() {
        let (db, user_id) = db_with_user();
        let goal = make_goal(&db, &user_id);
        let sub_goal = make_sub_goal(&db, &user_id, &goal.id, 1);
        let action = make_action(&db, &user_id, &sub_goal.id, 1);
        assert_eq!(action.completed, 0);

        let done = db
            .with_conn_mut(|conn| set_action_completed(conn, &user_id, &action.id, true))
            .unwrap();
        assert_eq!(done.completed, 1);
        assert!(done.completed_at.is_some());

        let undone = db
            .with_conn_mut(|conn| set_action_completed(conn, &user_id, &action.id, false))
            .unwrap();
        assert_eq!(undone.completed, 0);
        assert!(undone.completed_at.is_none());
    }

    #[test]
    fn deleting_a_goal_cascades_to_descendants() {
        let (db, user_id) = db_with_user();
        let goal = make_goal(&db, &user_id);
        let sub_goal = make_sub_goal(&db, &user_id, &goal.id, 1);
        let action = make_action(&db, &user_id, &sub_goal.id, 1);

        db.with_conn(|conn| delete_goal(conn, &user_id, &goal.id))
            .unwrap();

        assert!(db
            .with_conn(|conn| get_sub_goal(conn, &user_id, &sub_goal.id))
            .unwrap()
            .is_none());
        assert!(db
            .with_conn(|conn| get_action_item(conn, &user_id, &action.id))
            .unwrap()
            .is_none());
    }

    #[test]
    fn tree_returns_children_in_position_order() {
        let (db, user_id) = db_with_user();
        let goal = make_goal(&db, &user_id);
        make_sub_goal(&db, &user_id, &goal.id, 5);
        let sub_goal = make_sub_goal(&db, &user_id, &goal.id, 2);
        make_action(&db, &user_id, &sub_goal.id, 8);
        make_action(&db, &user_id, &sub_goal.id, 3);

        let tree = db
            .with_conn(|conn| get_goal_tree(conn, &user_id, &goal.id))
            .unwrap()
            .unwrap();

        assert_eq!(tree.sub_goals.len(), 2);
        assert_eq!(tree.sub_goals[0].sub_goal.position, 2);
        assert_eq!(tree.sub_goals[1].sub_goal.position, 5);
        let actions = &tree.sub_goals[0].actions;
        assert_eq!(actions[0].position, 3);
        assert_eq!(actions[1].position, 8);
    }

    #[test]
    fn export_then_import_recreates_the_board() {
        let (db, user_id) = db_with_user();
        let goal = make_goal(&db, &user_id);
        let sub_goal = make_sub_goal(&db, &user_id, &goal.id, 1);
        let action = make_action(&db, &user_id, &sub_goal.id, 1);
        db.with_conn_mut(|conn| set_action_completed(conn, &user_id, &action.id, true))
            .unwrap();
        db.with_conn_mut(|conn| {
            logs::create_log(
                conn,
                &user_id,
                &action.id,
                &logs::CreateLogInput {
                    log_type: "note".to_string(),
                    body: Some("ran 5k".to_string()),
                    value: None,
                    url: None,
                    logged_at: None,
                },
            )
        })
        .unwrap();

        let doc = db
            .with_conn(|conn| export_board(conn, &user_id, &goal.id))
            .unwrap()
            .unwrap();
        assert_eq!(doc.format_version, 1);
        assert_eq!(doc.goal.sub_goals.len(), 1);
        assert_eq!(doc.goal.sub_goals[0].actions[0].logs.len(), 1);
        assert!(doc.goal.sub_goals[0].actions[0].completed);

        let imported = db
            .with_conn_mut(|conn| import_board(conn, &user_id, &doc))
            .unwrap();
        assert_ne!(imported.id, goal.id);

        let tree = db
            .with_conn(|conn| get_goal_tree(conn, &user_id, &imported.id))
            .unwrap()
            .unwrap();
        assert_eq!(tree.sub_goals.len(), 1);
        assert_eq!(tree.sub_goals[0].actions.len(), 1);
        assert_eq!(tree.sub_goals[0].actions[0].completed, 1);
    }

    #[test]
    fn import_rejects_duplicate_positions() {
        let (db, user_id) = db_with_user();
        let doc = BoardDocument {
            format_version: 1,
            exported_at: None,
            goal: GoalDocument {
                title: "Broken board".to_string(),
                description: None,
                status: "active".to_string(),
                sub_goals: vec![
                    SubGoalDocument {
                        position: 1,
                        title: "One".to_string(),
                        description: None,
                        actions: vec![],
                    },
                    SubGoalDocument {
                        position: 1,
                        title: "Also one".to_string(),
                        description: None,
                        actions: vec![],
                    },
                ],
            },
        };

        let err = db
            .with_conn_mut(|conn| import_board(conn, &user_id, &doc))
            .unwrap_err();
        assert!(matches!(err, MandalartError::InvalidInput(_)));

        // nothing from the rejected document may be left behind
        assert!(db.with_conn(|conn| list_goals(conn, &user_id)).unwrap().is_empty());
    }
}
