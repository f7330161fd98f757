//! View types for the HTTP API boundary
//!
//! These types use camelCase serialization for TypeScript clients; the row
//! types in `db` stay snake_case for the database.
//!
//! Pattern:
//! - db layer returns row types (GoalRow, ActionItemRow, ...)
//! - HTTP layer converts to view types (GoalView, ActionItemView, ...)
//! - ts-rs generates camelCase TypeScript from the view types
//!
//! SQLite stores booleans as integers; views expose proper bools. Secrets
//! (password and key hashes) never appear on a view.

use serde::Serialize;
use ts_rs::TS;

use crate::db::{
    ActionItemRow, ActivityLogRow, ApiKeyRow, GoalRow, GoalTree, GuestbookRow, SubGoalRow,
    SubGoalTree, UserRow,
};

// ============================================================================
// Account Views
// ============================================================================

#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct UserView {
    pub id: String,
    pub username: String,
    pub display_name: Option<String>,
    pub created_at: String,
}

impl From<UserRow> for UserView {
    fn from(u: UserRow) -> Self {
        Self {
            id: u.id,
            username: u.username,
            display_name: u.display_name,
            created_at: u.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ApiKeyView {
    pub id: String,
    pub name: String,
    pub is_active: bool,
    pub created_at: String,
    pub last_used_at: Option<String>,
}

impl From<ApiKeyRow> for ApiKeyView {
    fn from(k: ApiKeyRow) -> Self {
        Self {
            id: k.id,
            name: k.name,
            is_active: k.is_active == 1,
            created_at: k.created_at,
            last_used_at: k.last_used_at,
        }
    }
}

/// Returned once, on key creation; `key` is the plaintext the server will
/// never show again.
#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ApiKeyCreatedView {
    #[serde(flatten)]
    pub api_key: ApiKeyView,
    pub key: String,
}

// ============================================================================
// Board Views
// ============================================================================

#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct GoalView {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
}

impl From<GoalRow> for GoalView {
    fn from(g: GoalRow) -> Self {
        Self {
            id: g.id,
            title: g.title,
            description: g.description,
            status: g.status,
            created_at: g.created_at,
            updated_at: g.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SubGoalView {
    pub id: String,
    pub goal_id: String,
    pub position: u8,
    pub title: String,
    pub description: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<SubGoalRow> for SubGoalView {
    fn from(s: SubGoalRow) -> Self {
        Self {
            id: s.id,
            goal_id: s.goal_id,
            position: s.position as u8,
            title: s.title,
            description: s.description,
            created_at: s.created_at,
            updated_at: s.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ActionItemView {
    pub id: String,
    pub sub_goal_id: String,
    pub position: u8,
    pub title: String,
    pub description: Option<String>,
    pub completed: bool,
    pub completed_at: Option<String>,
    pub due_date: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<ActionItemRow> for ActionItemView {
    fn from(a: ActionItemRow) -> Self {
        Self {
            id: a.id,
            sub_goal_id: a.sub_goal_id,
            position: a.position as u8,
            title: a.title,
            description: a.description,
            completed: a.completed == 1,
            completed_at: a.completed_at,
            due_date: a.due_date,
            created_at: a.created_at,
            updated_at: a.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ActivityLogView {
    pub id: String,
    pub action_item_id: String,
    pub log_type: String,
    pub body: Option<String>,
    pub value: Option<f64>,
    pub url: Option<String>,
    pub logged_at: String,
    pub created_at: String,
}

impl From<ActivityLogRow> for ActivityLogView {
    fn from(l: ActivityLogRow) -> Self {
        Self {
            id: l.id,
            action_item_id: l.action_item_id,
            log_type: l.log_type,
            body: l.body,
            value: l.value,
            url: l.url,
            logged_at: l.logged_at,
            created_at: l.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct GuestbookEntryView {
    pub id: String,
    pub author_name: String,
    pub body: String,
    pub goal_id: Option<String>,
    pub sub_goal_id: Option<String>,
    pub action_item_id: Option<String>,
    pub created_at: String,
}

impl From<GuestbookRow> for GuestbookEntryView {
    fn from(e: GuestbookRow) -> Self {
        Self {
            id: e.id,
            author_name: e.author_name,
            body: e.body,
            goal_id: e.goal_id,
            sub_goal_id: e.sub_goal_id,
            action_item_id: e.action_item_id,
            created_at: e.created_at,
        }
    }
}

// ============================================================================
// Tree Views
// ============================================================================

#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SubGoalTreeView {
    #[serde(flatten)]
    pub sub_goal: SubGoalView,
    pub actions: Vec<ActionItemView>,
}

impl From<SubGoalTree> for SubGoalTreeView {
    fn from(t: SubGoalTree) -> Self {
        Self {
            sub_goal: t.sub_goal.into(),
            actions: t.actions.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct GoalTreeView {
    #[serde(flatten)]
    pub goal: GoalView,
    pub sub_goals: Vec<SubGoalTreeView>,
}

impl From<GoalTree> for GoalTreeView {
    fn from(t: GoalTree) -> Self {
        Self {
            goal: t.goal.into(),
            sub_goals: t.sub_goals.into_iter().map(Into::into).collect(),
        }
    }
}

// ============================================================================
// Grid Views
// ============================================================================

/// One cell of the 9x9 board. `kind` is "primary", "subGoal",
/// "subGoalMirror" or "action"; vacant slots keep their kind with no id.
#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct GridCellView {
    pub row: u8,
    pub col: u8,
    pub kind: String,
    pub id: Option<String>,
    pub position: Option<u8>,
    pub title: Option<String>,
    pub completed: bool,
    pub color: String,
    pub text_color: String,
}

#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct GridView {
    pub goal_id: String,
    pub goal_title: String,
    pub cells: Vec<GridCellView>,
}
