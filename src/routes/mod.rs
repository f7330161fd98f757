//! HTTP route handlers for the REST API
//!
//! One module per resource. Handlers take the request plus shared state
//! and always produce a response; errors are mapped to the JSON envelope
//! by `response::error_response`.

pub mod auth_routes;
pub mod goal_routes;
pub mod guestbook_routes;
pub mod item_routes;
pub mod key_routes;
pub mod log_routes;
pub mod response;
pub mod system_routes;

pub use auth_routes::{handle_login, handle_logout, handle_me, handle_register};
pub use goal_routes::{
    handle_create_goal, handle_delete_goal, handle_export_goal, handle_get_goal,
    handle_goal_grid, handle_goal_tree, handle_import_board, handle_list_goals,
    handle_update_goal,
};
pub use guestbook_routes::{
    handle_create_guestbook_entry, handle_delete_guestbook_entry, handle_list_guestbook,
};
pub use item_routes::{
    handle_complete_action, handle_create_action, handle_create_sub_goal, handle_delete_action,
    handle_delete_sub_goal, handle_get_action, handle_get_sub_goal, handle_list_actions,
    handle_list_sub_goals, handle_move_action, handle_move_sub_goal, handle_update_action,
    handle_update_sub_goal,
};
pub use key_routes::{handle_create_key, handle_delete_key, handle_list_keys};
pub use log_routes::{handle_create_log, handle_delete_log, handle_list_logs};
pub use system_routes::{handle_health, handle_version};

use std::collections::HashMap;

use http_body_util::BodyExt;
use hyper::body::Incoming;
use hyper::Request;
use serde::Deserialize;

use crate::error::{MandalartError, Result};

/// Request bodies larger than this are rejected outright.
pub const MAX_BODY_SIZE: usize = 1024 * 1024;

pub const DEFAULT_PAGE_SIZE: usize = 50;
pub const MAX_PAGE_SIZE: usize = 200;

/// Collect and deserialize a JSON request body.
pub async fn parse_json_body<T: for<'de> Deserialize<'de>>(req: Request<Incoming>) -> Result<T> {
    let body = req
        .collect()
        .await
        .map_err(|e| MandalartError::InvalidInput(format!("Failed to read body: {}", e)))?;

    let bytes = body.to_bytes();
    if bytes.len() > MAX_BODY_SIZE {
        return Err(MandalartError::InvalidInput(
            "Request body too large".to_string(),
        ));
    }

    serde_json::from_slice(&bytes)
        .map_err(|e| MandalartError::InvalidInput(format!("Invalid JSON: {}", e)))
}

/// Decode the query string into a map. Later duplicates win.
pub fn query_params(req: &Request<Incoming>) -> HashMap<String, String> {
    req.uri()
        .query()
        .map(|q| {
            url::form_urlencoded::parse(q.as_bytes())
                .into_owned()
                .collect()
        })
        .unwrap_or_default()
}

/// `limit` and `offset` from the query, silently clamped to sane ranges.
pub fn pagination(params: &HashMap<String, String>) -> (usize, usize) {
    let limit = params
        .get("limit")
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .min(MAX_PAGE_SIZE);
    let offset = params
        .get("offset")
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(0);
    (limit, offset)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn pagination_defaults_and_clamps() {
        assert_eq!(pagination(&params(&[])), (50, 0));
        assert_eq!(pagination(&params(&[("limit", "10"), ("offset", "5")])), (10, 5));
        assert_eq!(pagination(&params(&[("limit", "9999")])), (200, 0));
        assert_eq!(pagination(&params(&[("limit", "-3"), ("offset", "x")])), (50, 0));
    }
}
