//! HTTP server and request router
//!
//! One hyper connection task per client; every request is matched on
//! `(method, path)` and dispatched to a handler in `routes::*`. Responses
//! get the CORS origin header stamped on before they leave, so individual
//! handlers never think about CORS.

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{header, Method, Request, Response};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use crate::config::Args;
use crate::db::{self, GoalDb};
use crate::error::{MandalartError, Result};
use crate::routes::{self, response};

/// Shared state handed to every handler
pub struct AppState {
    pub args: Args,
    pub db: GoalDb,
}

impl AppState {
    pub fn new(args: Args, db: GoalDb) -> Self {
        Self { args, db }
    }
}

/// Bind and serve until the process is stopped
pub async fn run(state: Arc<AppState>) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", state.args.host, state.args.port)
        .parse()
        .map_err(|e| MandalartError::Internal(format!("Invalid bind address: {}", e)))?;

    // Leftover sessions from a previous run are dropped once here; login
    // sweeps again as users come back.
    let purged = state.db.with_conn(db::purge_expired_sessions)?;
    if purged > 0 {
        info!("Purged {} expired sessions", purged);
    }

    let listener = TcpListener::bind(addr).await?;
    info!(addr = %addr, "HTTP server listening");
    if state.args.dev_mode {
        warn!("Dev mode: session cookies are issued without the Secure flag");
    }

    loop {
        let (stream, remote_addr) = listener.accept().await?;
        let io = TokioIo::new(stream);
        let state = state.clone();

        tokio::spawn(async move {
            let service = service_fn(move |req| {
                let state = state.clone();
                async move { handle_request(req, state).await }
            });

            if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                warn!(addr = %remote_addr, error = %err, "Connection error");
            }
        });
    }
}

/// Route requests to handlers
async fn handle_request(
    req: Request<Incoming>,
    state: Arc<AppState>,
) -> std::result::Result<Response<Full<Bytes>>, hyper::Error> {
    let path = req.uri().path().to_string();
    let method = req.method().clone();

    debug!(method = %method, path = %path, "Incoming request");

    let mut resp = match (method, path.as_str()) {
        (Method::OPTIONS, _) => response::cors_preflight(),

        // System
        (Method::GET, "/health") => routes::handle_health(&state).await,
        (Method::GET, "/version") => routes::handle_version().await,

        // Auth
        (Method::POST, "/api/auth/register") => routes::handle_register(req, &state).await,
        (Method::POST, "/api/auth/login") => routes::handle_login(req, &state).await,
        (Method::POST, "/api/auth/logout") => routes::handle_logout(req, &state).await,
        (Method::GET, "/api/auth/me") => routes::handle_me(req, &state).await,

        // API keys
        (Method::GET, "/api/keys") => routes::handle_list_keys(req, &state).await,
        (Method::POST, "/api/keys") => routes::handle_create_key(req, &state).await,
        (Method::DELETE, p) if p.starts_with("/api/keys/") => {
            let id = p.strip_prefix("/api/keys/").unwrap_or("").to_string();
            routes::handle_delete_key(req, &state, &id).await
        }

        // Goals. The import arm sits above the `{id}` arms so the literal
        // path segment is never read as a goal id.
        (Method::GET, "/api/goals") => routes::handle_list_goals(req, &state).await,
        (Method::POST, "/api/goals") => routes::handle_create_goal(req, &state).await,
        (Method::POST, "/api/goals/import") => routes::handle_import_board(req, &state).await,
        (Method::GET, p) if p.starts_with("/api/goals/") && p.ends_with("/tree") => {
            let id = strip_id(p, "/api/goals/", "/tree");
            routes::handle_goal_tree(req, &state, &id).await
        }
        (Method::GET, p) if p.starts_with("/api/goals/") && p.ends_with("/grid") => {
            let id = strip_id(p, "/api/goals/", "/grid");
            routes::handle_goal_grid(req, &state, &id).await
        }
        (Method::GET, p) if p.starts_with("/api/goals/") && p.ends_with("/export") => {
            let id = strip_id(p, "/api/goals/", "/export");
            routes::handle_export_goal(req, &state, &id).await
        }
        (Method::GET, p) if p.starts_with("/api/goals/") && p.ends_with("/sub-goals") => {
            let id = strip_id(p, "/api/goals/", "/sub-goals");
            routes::handle_list_sub_goals(req, &state, &id).await
        }
        (Method::POST, p) if p.starts_with("/api/goals/") && p.ends_with("/sub-goals") => {
            let id = strip_id(p, "/api/goals/", "/sub-goals");
            routes::handle_create_sub_goal(req, &state, &id).await
        }
        (Method::GET, p) if p.starts_with("/api/goals/") => {
            let id = p.strip_prefix("/api/goals/").unwrap_or("").to_string();
            routes::handle_get_goal(req, &state, &id).await
        }
        (Method::PUT, p) if p.starts_with("/api/goals/") => {
            let id = p.strip_prefix("/api/goals/").unwrap_or("").to_string();
            routes::handle_update_goal(req, &state, &id).await
        }
        (Method::DELETE, p) if p.starts_with("/api/goals/") => {
            let id = p.strip_prefix("/api/goals/").unwrap_or("").to_string();
            routes::handle_delete_goal(req, &state, &id).await
        }

        // Sub-goals
        (Method::POST, p) if p.starts_with("/api/sub-goals/") && p.ends_with("/position") => {
            let id = strip_id(p, "/api/sub-goals/", "/position");
            routes::handle_move_sub_goal(req, &state, &id).await
        }
        (Method::GET, p) if p.starts_with("/api/sub-goals/") && p.ends_with("/actions") => {
            let id = strip_id(p, "/api/sub-goals/", "/actions");
            routes::handle_list_actions(req, &state, &id).await
        }
        (Method::POST, p) if p.starts_with("/api/sub-goals/") && p.ends_with("/actions") => {
            let id = strip_id(p, "/api/sub-goals/", "/actions");
            routes::handle_create_action(req, &state, &id).await
        }
        (Method::GET, p) if p.starts_with("/api/sub-goals/") => {
            let id = p.strip_prefix("/api/sub-goals/").unwrap_or("").to_string();
            routes::handle_get_sub_goal(req, &state, &id).await
        }
        (Method::PUT, p) if p.starts_with("/api/sub-goals/") => {
            let id = p.strip_prefix("/api/sub-goals/").unwrap_or("").to_string();
            routes::handle_update_sub_goal(req, &state, &id).await
        }
        (Method::DELETE, p) if p.starts_with("/api/sub-goals/") => {
            let id = p.strip_prefix("/api/sub-goals/").unwrap_or("").to_string();
            routes::handle_delete_sub_goal(req, &state, &id).await
        }

        // Action items
        (Method::POST, p) if p.starts_with("/api/actions/") && p.ends_with("/complete") => {
            let id = strip_id(p, "/api/actions/", "/complete");
            routes::handle_complete_action(req, &state, &id).await
        }
        (Method::POST, p) if p.starts_with("/api/actions/") && p.ends_with("/position") => {
            let id = strip_id(p, "/api/actions/", "/position");
            routes::handle_move_action(req, &state, &id).await
        }
        (Method::GET, p) if p.starts_with("/api/actions/") && p.ends_with("/logs") => {
            let id = strip_id(p, "/api/actions/", "/logs");
            routes::handle_list_logs(req, &state, &id).await
        }
        (Method::POST, p) if p.starts_with("/api/actions/") && p.ends_with("/logs") => {
            let id = strip_id(p, "/api/actions/", "/logs");
            routes::handle_create_log(req, &state, &id).await
        }
        (Method::GET, p) if p.starts_with("/api/actions/") => {
            let id = p.strip_prefix("/api/actions/").unwrap_or("").to_string();
            routes::handle_get_action(req, &state, &id).await
        }
        (Method::PUT, p) if p.starts_with("/api/actions/") => {
            let id = p.strip_prefix("/api/actions/").unwrap_or("").to_string();
            routes::handle_update_action(req, &state, &id).await
        }
        (Method::DELETE, p) if p.starts_with("/api/actions/") => {
            let id = p.strip_prefix("/api/actions/").unwrap_or("").to_string();
            routes::handle_delete_action(req, &state, &id).await
        }

        // Activity logs
        (Method::DELETE, p) if p.starts_with("/api/logs/") => {
            let id = p.strip_prefix("/api/logs/").unwrap_or("").to_string();
            routes::handle_delete_log(req, &state, &id).await
        }

        // Guestbook
        (Method::GET, "/api/guestbook") => routes::handle_list_guestbook(req, &state).await,
        (Method::POST, "/api/guestbook") => {
            routes::handle_create_guestbook_entry(req, &state).await
        }
        (Method::DELETE, p) if p.starts_with("/api/guestbook/") => {
            let id = p.strip_prefix("/api/guestbook/").unwrap_or("").to_string();
            routes::handle_delete_guestbook_entry(req, &state, &id).await
        }

        // Known path, wrong method
        (_, p)
            if p == "/health"
                || p == "/version"
                || p.starts_with("/api/auth")
                || p.starts_with("/api/keys")
                || p.starts_with("/api/goals")
                || p.starts_with("/api/sub-goals")
                || p.starts_with("/api/actions")
                || p.starts_with("/api/logs")
                || p.starts_with("/api/guestbook") =>
        {
            response::method_not_allowed()
        }

        _ => response::not_found(&path),
    };

    if let Ok(origin) = header::HeaderValue::from_str(&state.args.cors_origin) {
        resp.headers_mut()
            .insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin);
    }

    Ok(resp)
}

/// Pull the id out of `{prefix}{id}{suffix}` route shapes.
fn strip_id(path: &str, prefix: &str, suffix: &str) -> String {
    path.strip_prefix(prefix)
        .and_then(|s| s.strip_suffix(suffix))
        .unwrap_or("")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_id_takes_the_middle_segment() {
        assert_eq!(strip_id("/api/goals/g1/tree", "/api/goals/", "/tree"), "g1");
        assert_eq!(
            strip_id("/api/actions/a-42/logs", "/api/actions/", "/logs"),
            "a-42"
        );
    }
}
