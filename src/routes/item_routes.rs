//! Sub-goal and action item endpoints
//!
//! Collections hang off the parent (`/api/goals/{id}/sub-goals`,
//! `/api/sub-goals/{id}/actions`); item operations address the row
//! directly. Position moves answer with the full sibling list so clients
//! can redraw the block in one go.

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::{Request, Response};
use serde::Deserialize;
use tracing::info;

use crate::auth;
use crate::db::{
    self, CreateActionInput, CreateSubGoalInput, UpdateActionInput, UpdateSubGoalInput,
};
use crate::error::MandalartError;
use crate::routes::{parse_json_body, response};
use crate::server::AppState;
use crate::views::{ActionItemView, SubGoalView};

#[derive(Debug, Deserialize)]
pub struct MoveRequest {
    pub position: i64,
}

#[derive(Debug, Deserialize)]
pub struct CompleteRequest {
    pub completed: bool,
}

// =============================================================================
// Sub-goals
// =============================================================================

/// GET /api/goals/{goal_id}/sub-goals
pub async fn handle_list_sub_goals(
    req: Request<Incoming>,
    state: &AppState,
    goal_id: &str,
) -> Response<Full<Bytes>> {
    let identity = match auth::authenticate(&state.db, req.headers()) {
        Ok(identity) => identity,
        Err(e) => return response::error_response(&e),
    };

    let result = state.db.with_conn(|conn| {
        if db::get_goal(conn, &identity.user.id, goal_id)?.is_none() {
            return Err(MandalartError::NotFound("Goal not found".to_string()));
        }
        db::list_sub_goals(conn, goal_id)
    });

    match result {
        Ok(sub_goals) => {
            let views: Vec<SubGoalView> = sub_goals.into_iter().map(Into::into).collect();
            response::ok(&views)
        }
        Err(e) => response::error_response(&e),
    }
}

/// POST /api/goals/{goal_id}/sub-goals
pub async fn handle_create_sub_goal(
    req: Request<Incoming>,
    state: &AppState,
    goal_id: &str,
) -> Response<Full<Bytes>> {
    let identity = match auth::authenticate(&state.db, req.headers()) {
        Ok(identity) => identity,
        Err(e) => return response::error_response(&e),
    };

    let input: CreateSubGoalInput = match parse_json_body(req).await {
        Ok(b) => b,
        Err(e) => return response::error_response(&e),
    };

    match state
        .db
        .with_conn_mut(|conn| db::create_sub_goal(conn, &identity.user.id, goal_id, &input))
    {
        Ok(sub_goal) => {
            info!(
                "Created sub-goal '{}' at position {} for {}",
                sub_goal.title, sub_goal.position, identity.user.username
            );
            response::created(&SubGoalView::from(sub_goal))
        }
        Err(e) => response::error_response(&e),
    }
}

/// GET /api/sub-goals/{id}
pub async fn handle_get_sub_goal(
    req: Request<Incoming>,
    state: &AppState,
    id: &str,
) -> Response<Full<Bytes>> {
    let identity = match auth::authenticate(&state.db, req.headers()) {
        Ok(identity) => identity,
        Err(e) => return response::error_response(&e),
    };

    match state
        .db
        .with_conn(|conn| db::get_sub_goal(conn, &identity.user.id, id))
    {
        Ok(Some(sub_goal)) => response::ok(&SubGoalView::from(sub_goal)),
        Ok(None) => {
            response::error_response(&MandalartError::NotFound("Sub-goal not found".to_string()))
        }
        Err(e) => response::error_response(&e),
    }
}

/// PUT /api/sub-goals/{id}
pub async fn handle_update_sub_goal(
    req: Request<Incoming>,
    state: &AppState,
    id: &str,
) -> Response<Full<Bytes>> {
    let identity = match auth::authenticate(&state.db, req.headers()) {
        Ok(identity) => identity,
        Err(e) => return response::error_response(&e),
    };

    let input: UpdateSubGoalInput = match parse_json_body(req).await {
        Ok(b) => b,
        Err(e) => return response::error_response(&e),
    };

    match state
        .db
        .with_conn_mut(|conn| db::update_sub_goal(conn, &identity.user.id, id, &input))
    {
        Ok(sub_goal) => response::ok(&SubGoalView::from(sub_goal)),
        Err(e) => response::error_response(&e),
    }
}

/// DELETE /api/sub-goals/{id}
pub async fn handle_delete_sub_goal(
    req: Request<Incoming>,
    state: &AppState,
    id: &str,
) -> Response<Full<Bytes>> {
    let identity = match auth::authenticate(&state.db, req.headers()) {
        Ok(identity) => identity,
        Err(e) => return response::error_response(&e),
    };

    match state
        .db
        .with_conn(|conn| db::delete_sub_goal(conn, &identity.user.id, id))
    {
        Ok(true) => response::ok(&serde_json::json!({"deleted": true})),
        Ok(false) => {
            response::error_response(&MandalartError::NotFound("Sub-goal not found".to_string()))
        }
        Err(e) => response::error_response(&e),
    }
}

/// POST /api/sub-goals/{id}/position
pub async fn handle_move_sub_goal(
    req: Request<Incoming>,
    state: &AppState,
    id: &str,
) -> Response<Full<Bytes>> {
    let identity = match auth::authenticate(&state.db, req.headers()) {
        Ok(identity) => identity,
        Err(e) => return response::error_response(&e),
    };

    let body: MoveRequest = match parse_json_body(req).await {
        Ok(b) => b,
        Err(e) => return response::error_response(&e),
    };

    match state
        .db
        .with_conn_mut(|conn| db::move_sub_goal(conn, &identity.user.id, id, body.position))
    {
        Ok(siblings) => {
            let views: Vec<SubGoalView> = siblings.into_iter().map(Into::into).collect();
            response::ok(&views)
        }
        Err(e) => response::error_response(&e),
    }
}

// =============================================================================
// Action items
// =============================================================================

/// GET /api/sub-goals/{sub_goal_id}/actions
pub async fn handle_list_actions(
    req: Request<Incoming>,
    state: &AppState,
    sub_goal_id: &str,
) -> Response<Full<Bytes>> {
    let identity = match auth::authenticate(&state.db, req.headers()) {
        Ok(identity) => identity,
        Err(e) => return response::error_response(&e),
    };

    let result = state.db.with_conn(|conn| {
        if db::get_sub_goal(conn, &identity.user.id, sub_goal_id)?.is_none() {
            return Err(MandalartError::NotFound("Sub-goal not found".to_string()));
        }
        db::list_action_items(conn, sub_goal_id)
    });

    match result {
        Ok(actions) => {
            let views: Vec<ActionItemView> = actions.into_iter().map(Into::into).collect();
            response::ok(&views)
        }
        Err(e) => response::error_response(&e),
    }
}

/// POST /api/sub-goals/{sub_goal_id}/actions
pub async fn handle_create_action(
    req: Request<Incoming>,
    state: &AppState,
    sub_goal_id: &str,
) -> Response<Full<Bytes>> {
    let identity = match auth::authenticate(&state.db, req.headers()) {
        Ok(identity) => identity,
        Err(e) => return response::error_response(&e),
    };

    let input: CreateActionInput = match parse_json_body(req).await {
        Ok(b) => b,
        Err(e) => return response::error_response(&e),
    };

    match state
        .db
        .with_conn_mut(|conn| db::create_action_item(conn, &identity.user.id, sub_goal_id, &input))
    {
        Ok(action) => {
            info!(
                "Created action '{}' at position {} for {}",
                action.title, action.position, identity.user.username
            );
            response::created(&ActionItemView::from(action))
        }
        Err(e) => response::error_response(&e),
    }
}

/// GET /api/actions/{id}
pub async fn handle_get_action(
    req: Request<Incoming>,
    state: &AppState,
    id: &str,
) -> Response<Full<Bytes>> {
    let identity = match auth::authenticate(&state.db, req.headers()) {
        Ok(identity) => identity,
        Err(e) => return response::error_response(&e),
    };

    match state
        .db
        .with_conn(|conn| db::get_action_item(conn, &identity.user.id, id))
    {
        Ok(Some(action)) => response::ok(&ActionItemView::from(action)),
        Ok(None) => response::error_response(&MandalartError::NotFound(
            "Action item not found".to_string(),
        )),
        Err(e) => response::error_response(&e),
    }
}

/// PUT /api/actions/{id}
pub async fn handle_update_action(
    req: Request<Incoming>,
    state: &AppState,
    id: &str,
) -> Response<Full<Bytes>> {
    let identity = match auth::authenticate(&state.db, req.headers()) {
        Ok(identity) => identity,
        Err(e) => return response::error_response(&e),
    };

    let input: UpdateActionInput = match parse_json_body(req).await {
        Ok(b) => b,
        Err(e) => return response::error_response(&e),
    };

    match state
        .db
        .with_conn_mut(|conn| db::update_action_item(conn, &identity.user.id, id, &input))
    {
        Ok(action) => response::ok(&ActionItemView::from(action)),
        Err(e) => response::error_response(&e),
    }
}

/// DELETE /api/actions/{id}
pub async fn handle_delete_action(
    req: Request<Incoming>,
    state: &AppState,
    id: &str,
) -> Response<Full<Bytes>> {
    let identity = match auth::authenticate(&state.db, req.headers()) {
        Ok(identity) => identity,
        Err(e) => return response::error_response(&e),
    };

    match state
        .db
        .with_conn(|conn| db::delete_action_item(conn, &identity.user.id, id))
    {
        Ok(true) => response::ok(&serde_json::json!({"deleted": true})),
        Ok(false) => response::error_response(&MandalartError::NotFound(
            "Action item not found".to_string(),
        )),
        Err(e) => response::error_response(&e),
    }
}

/// POST /api/actions/{id}/complete
pub async fn handle_complete_action(
    req: Request<Incoming>,
    state: &AppState,
    id: &str,
) -> Response<Full<Bytes>> {
    let identity = match auth::authenticate(&state.db, req.headers()) {
        Ok(identity) => identity,
        Err(e) => return response::error_response(&e),
    };

    let body: CompleteRequest = match parse_json_body(req).await {
        Ok(b) => b,
        Err(e) => return response::error_response(&e),
    };

    match state
        .db
        .with_conn_mut(|conn| db::set_action_completed(conn, &identity.user.id, id, body.completed))
    {
        Ok(action) => {
            info!(
                "Action {} marked {} by {}",
                id,
                if body.completed { "complete" } else { "incomplete" },
                identity.user.username
            );
            response::ok(&ActionItemView::from(action))
        }
        Err(e) => response::error_response(&e),
    }
}

/// POST /api/actions/{id}/position
pub async fn handle_move_action(
    req: Request<Incoming>,
    state: &AppState,
    id: &str,
) -> Response<Full<Bytes>> {
    let identity = match auth::authenticate(&state.db, req.headers()) {
        Ok(identity) => identity,
        Err(e) => return response::error_response(&e),
    };

    let body: MoveRequest = match parse_json_body(req).await {
        Ok(b) => b,
        Err(e) => return response::error_response(&e),
    };

    match state
        .db
        .with_conn_mut(|conn| db::move_action_item(conn, &identity.user.id, id, body.position))
    {
        Ok(siblings) => {
            let views: Vec<ActionItemView> = siblings.into_iter().map(Into::into).collect();
            response::ok(&views)
        }
        Err(e) => response::error_response(&e),
    }
}
