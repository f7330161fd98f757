//! Guestbook endpoints
//!
//! Visitors leave encouragement on a board, optionally pinned to a goal,
//! sub-goal, or action. Entries always belong to the authenticated board
//! owner; filtering is by the optional target ids.

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::{Request, Response};
use tracing::info;

use crate::auth;
use crate::db::{self, CreateGuestbookInput};
use crate::error::MandalartError;
use crate::routes::{pagination, parse_json_body, query_params, response};
use crate::server::AppState;
use crate::views::GuestbookEntryView;

/// GET /api/guestbook?goalId=&subGoalId=&actionId=&limit=&offset=
pub async fn handle_list_guestbook(
    req: Request<Incoming>,
    state: &AppState,
) -> Response<Full<Bytes>> {
    let params = query_params(&req);
    let (limit, offset) = pagination(&params);

    let identity = match auth::authenticate(&state.db, req.headers()) {
        Ok(identity) => identity,
        Err(e) => return response::error_response(&e),
    };

    let goal_id = params.get("goalId").map(|s| s.as_str());
    let sub_goal_id = params.get("subGoalId").map(|s| s.as_str());
    let action_id = params.get("actionId").map(|s| s.as_str());

    match state.db.with_conn(|conn| {
        db::list_guestbook_entries(
            conn,
            &identity.user.id,
            goal_id,
            sub_goal_id,
            action_id,
            limit,
            offset,
        )
    }) {
        Ok(entries) => {
            let views: Vec<GuestbookEntryView> = entries.into_iter().map(Into::into).collect();
            response::ok(&views)
        }
        Err(e) => response::error_response(&e),
    }
}

/// POST /api/guestbook
pub async fn handle_create_guestbook_entry(
    req: Request<Incoming>,
    state: &AppState,
) -> Response<Full<Bytes>> {
    let identity = match auth::authenticate(&state.db, req.headers()) {
        Ok(identity) => identity,
        Err(e) => return response::error_response(&e),
    };

    let input: CreateGuestbookInput = match parse_json_body(req).await {
        Ok(b) => b,
        Err(e) => return response::error_response(&e),
    };

    match state
        .db
        .with_conn(|conn| db::create_guestbook_entry(conn, &identity.user.id, &input))
    {
        Ok(entry) => {
            info!(
                "Guestbook entry from '{}' on board of {}",
                entry.author_name, identity.user.username
            );
            response::created(&GuestbookEntryView::from(entry))
        }
        Err(e) => response::error_response(&e),
    }
}

/// DELETE /api/guestbook/{id}
pub async fn handle_delete_guestbook_entry(
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
        .with_conn(|conn| db::delete_guestbook_entry(conn, &identity.user.id, id))
    {
        Ok(true) => response::ok(&serde_json::json!({"deleted": true})),
        Ok(false) => response::error_response(&MandalartError::NotFound(
            "Guestbook entry not found".to_string(),
        )),
        Err(e) => response::error_response(&e),
    }
}
