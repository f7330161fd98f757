//! API key endpoints
//!
//! The plaintext key appears exactly once, in the creation response; only
//! its SHA-256 hash is stored.

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::{Request, Response};
use serde::Deserialize;
use tracing::info;

use crate::auth;
use crate::db;
use crate::error::MandalartError;
use crate::routes::{parse_json_body, response};
use crate::server::AppState;
use crate::views::{ApiKeyCreatedView, ApiKeyView};

#[derive(Debug, Deserialize)]
pub struct CreateKeyRequest {
    pub name: String,
}

/// GET /api/keys
pub async fn handle_list_keys(req: Request<Incoming>, state: &AppState) -> Response<Full<Bytes>> {
    let identity = match auth::authenticate(&state.db, req.headers()) {
        Ok(identity) => identity,
        Err(e) => return response::error_response(&e),
    };

    match state
        .db
        .with_conn(|conn| db::list_api_keys(conn, &identity.user.id))
    {
        Ok(keys) => {
            let views: Vec<ApiKeyView> = keys.into_iter().map(Into::into).collect();
            response::ok(&views)
        }
        Err(e) => response::error_response(&e),
    }
}

/// POST /api/keys
pub async fn handle_create_key(req: Request<Incoming>, state: &AppState) -> Response<Full<Bytes>> {
    let identity = match auth::authenticate(&state.db, req.headers()) {
        Ok(identity) => identity,
        Err(e) => return response::error_response(&e),
    };

    let body: CreateKeyRequest = match parse_json_body(req).await {
        Ok(b) => b,
        Err(e) => return response::error_response(&e),
    };

    let name = body.name.trim();
    if name.is_empty() {
        return response::error_response(&MandalartError::InvalidInput(
            "Key name must not be empty".to_string(),
        ));
    }

    let (key, hash) = auth::generate_api_key();
    let row = match state
        .db
        .with_conn_mut(|conn| db::create_api_key(conn, &identity.user.id, name, &hash))
    {
        Ok(row) => row,
        Err(e) => return response::error_response(&e),
    };

    info!("Created API key '{}' for {}", name, identity.user.username);

    response::created(&ApiKeyCreatedView {
        api_key: row.into(),
        key,
    })
}

/// DELETE /api/keys/{id}
pub async fn handle_delete_key(
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
        .with_conn(|conn| db::delete_api_key(conn, &identity.user.id, id))
    {
        Ok(true) => {
            info!("Revoked API key {} for {}", id, identity.user.username);
            response::ok(&serde_json::json!({"deleted": true}))
        }
        Ok(false) => response::error_response(&MandalartError::NotFound(
            "API key not found".to_string(),
        )),
        Err(e) => response::error_response(&e),
    }
}
