//! Health and version endpoints
//!
//! Both answer without authentication so probes and reverse proxies can
//! reach them. Health reports row counts as a cheap liveness signal.

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};

use crate::routes::response::{self, json_response};
use crate::server::AppState;

/// GET /health
pub async fn handle_health(state: &AppState) -> Response<Full<Bytes>> {
    match state.db.stats() {
        Ok(stats) => json_response(
            StatusCode::OK,
            &serde_json::json!({
                "status": "ok",
                "version": env!("CARGO_PKG_VERSION"),
                "counts": stats,
            }),
        ),
        Err(e) => response::error_response(&e),
    }
}

/// GET /version
pub async fn handle_version() -> Response<Full<Bytes>> {
    json_response(
        StatusCode::OK,
        &serde_json::json!({
            "service": "mandalart",
            "version": env!("CARGO_PKG_VERSION"),
        }),
    )
}
