//! Activity log endpoints
//!
//! Logs are recorded against an action item and listed newest-first with
//! `limit`/`offset` paging.

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::{Request, Response};
use tracing::info;

use crate::auth;
use crate::db::{self, CreateLogInput};
use crate::error::MandalartError;
use crate::routes::{pagination, parse_json_body, query_params, response};
use crate::server::AppState;
use crate::views::ActivityLogView;

/// GET /api/actions/{action_id}/logs
pub async fn handle_list_logs(
    req: Request<Incoming>,
    state: &AppState,
    action_id: &str,
) -> Response<Full<Bytes>> {
    let (limit, offset) = pagination(&query_params(&req));

    let identity = match auth::authenticate(&state.db, req.headers()) {
        Ok(identity) => identity,
        Err(e) => return response::error_response(&e),
    };

    match state
        .db
        .with_conn(|conn| db::list_logs(conn, &identity.user.id, action_id, limit, offset))
    {
        Ok(logs) => {
            let views: Vec<ActivityLogView> = logs.into_iter().map(Into::into).collect();
            response::ok(&views)
        }
        Err(e) => response::error_response(&e),
    }
}

/// POST /api/actions/{action_id}/logs
pub async fn handle_create_log(
    req: Request<Incoming>,
    state: &AppState,
    action_id: &str,
) -> Response<Full<Bytes>> {
    let identity = match auth::authenticate(&state.db, req.headers()) {
        Ok(identity) => identity,
        Err(e) => return response::error_response(&e),
    };

    let input: CreateLogInput = match parse_json_body(req).await {
        Ok(b) => b,
        Err(e) => return response::error_response(&e),
    };

    match state
        .db
        .with_conn(|conn| db::create_log(conn, &identity.user.id, action_id, &input))
    {
        Ok(log) => {
            info!(
                "Recorded {} log on action {} for {}",
                log.log_type, action_id, identity.user.username
            );
            response::created(&ActivityLogView::from(log))
        }
        Err(e) => response::error_response(&e),
    }
}

/// DELETE /api/logs/{id}
pub async fn handle_delete_log(
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
        .with_conn(|conn| db::delete_log(conn, &identity.user.id, id))
    {
        Ok(true) => response::ok(&serde_json::json!({"deleted": true})),
        Ok(false) => {
            response::error_response(&MandalartError::NotFound("Log not found".to_string()))
        }
        Err(e) => response::error_response(&e),
    }
}
