//! Primary goal endpoints: CRUD plus the tree, grid, export and import
//! views of a whole board.

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::{Request, Response};
use tracing::info;

use crate::auth;
use crate::db::{self, BoardDocument, CreateGoalInput, UpdateGoalInput};
use crate::error::MandalartError;
use crate::grid;
use crate::routes::{parse_json_body, response};
use crate::server::AppState;
use crate::views::{GoalTreeView, GoalView};

/// GET /api/goals
pub async fn handle_list_goals(req: Request<Incoming>, state: &AppState) -> Response<Full<Bytes>> {
    let identity = match auth::authenticate(&state.db, req.headers()) {
        Ok(identity) => identity,
        Err(e) => return response::error_response(&e),
    };

    match state
        .db
        .with_conn(|conn| db::list_goals(conn, &identity.user.id))
    {
        Ok(goals) => {
            let views: Vec<GoalView> = goals.into_iter().map(Into::into).collect();
            response::ok(&views)
        }
        Err(e) => response::error_response(&e),
    }
}

/// POST /api/goals
pub async fn handle_create_goal(req: Request<Incoming>, state: &AppState) -> Response<Full<Bytes>> {
    let identity = match auth::authenticate(&state.db, req.headers()) {
        Ok(identity) => identity,
        Err(e) => return response::error_response(&e),
    };

    let input: CreateGoalInput = match parse_json_body(req).await {
        Ok(b) => b,
        Err(e) => return response::error_response(&e),
    };

    match state
        .db
        .with_conn_mut(|conn| db::create_goal(conn, &identity.user.id, &input))
    {
        Ok(goal) => {
            info!("Created goal '{}' for {}", goal.title, identity.user.username);
            response::created(&GoalView::from(goal))
        }
        Err(e) => response::error_response(&e),
    }
}

/// GET /api/goals/{id}
pub async fn handle_get_goal(
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
        .with_conn(|conn| db::get_goal(conn, &identity.user.id, id))
    {
        Ok(Some(goal)) => response::ok(&GoalView::from(goal)),
        Ok(None) => {
            response::error_response(&MandalartError::NotFound("Goal not found".to_string()))
        }
        Err(e) => response::error_response(&e),
    }
}

/// PUT /api/goals/{id}
pub async fn handle_update_goal(
    req: Request<Incoming>,
    state: &AppState,
    id: &str,
) -> Response<Full<Bytes>> {
    let identity = match auth::authenticate(&state.db, req.headers()) {
        Ok(identity) => identity,
        Err(e) => return response::error_response(&e),
    };

    let input: UpdateGoalInput = match parse_json_body(req).await {
        Ok(b) => b,
        Err(e) => return response::error_response(&e),
    };

    match state
        .db
        .with_conn_mut(|conn| db::update_goal(conn, &identity.user.id, id, &input))
    {
        Ok(goal) => response::ok(&GoalView::from(goal)),
        Err(e) => response::error_response(&e),
    }
}

/// DELETE /api/goals/{id}
pub async fn handle_delete_goal(
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
        .with_conn(|conn| db::delete_goal(conn, &identity.user.id, id))
    {
        Ok(true) => {
            info!("Deleted goal {} for {}", id, identity.user.username);
            response::ok(&serde_json::json!({"deleted": true}))
        }
        Ok(false) => {
            response::error_response(&MandalartError::NotFound("Goal not found".to_string()))
        }
        Err(e) => response::error_response(&e),
    }
}

/// GET /api/goals/{id}/tree
pub async fn handle_goal_tree(
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
        .with_conn(|conn| db::get_goal_tree(conn, &identity.user.id, id))
    {
        Ok(Some(tree)) => response::ok(&GoalTreeView::from(tree)),
        Ok(None) => {
            response::error_response(&MandalartError::NotFound("Goal not found".to_string()))
        }
        Err(e) => response::error_response(&e),
    }
}

/// GET /api/goals/{id}/grid
pub async fn handle_goal_grid(
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
        .with_conn(|conn| db::get_goal_tree(conn, &identity.user.id, id))
    {
        Ok(Some(tree)) => response::ok(&grid::compose(&tree)),
        Ok(None) => {
            response::error_response(&MandalartError::NotFound("Goal not found".to_string()))
        }
        Err(e) => response::error_response(&e),
    }
}

/// GET /api/goals/{id}/export
pub async fn handle_export_goal(
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
        .with_conn(|conn| db::export_board(conn, &identity.user.id, id))
    {
        Ok(Some(document)) => response::ok(&document),
        Ok(None) => {
            response::error_response(&MandalartError::NotFound("Goal not found".to_string()))
        }
        Err(e) => response::error_response(&e),
    }
}

/// POST /api/goals/import
pub async fn handle_import_board(
    req: Request<Incoming>,
    state: &AppState,
) -> Response<Full<Bytes>> {
    let identity = match auth::authenticate(&state.db, req.headers()) {
        Ok(identity) => identity,
        Err(e) => return response::error_response(&e),
    };

    let document: BoardDocument = match parse_json_body(req).await {
        Ok(b) => b,
        Err(e) => return response::error_response(&e),
    };

    match state
        .db
        .with_conn_mut(|conn| db::import_board(conn, &identity.user.id, &document))
    {
        Ok(goal) => {
            info!(
                "Imported board '{}' for {}",
                goal.title, identity.user.username
            );
            response::created(&GoalView::from(goal))
        }
        Err(e) => response::error_response(&e),
    }
}
