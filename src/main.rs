//! Mandalart - self-hosted Harada method goal tracker

use std::path::Path;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mandalart::{config::Args, db::GoalDb, server};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    let log_level = args.log_level.clone();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("mandalart={},info", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    info!("======================================");
    info!("  Mandalart - Harada method goal boards");
    info!("======================================");
    info!("Listen: {}:{}", args.host, args.port);
    info!("Database: {}", args.db_path);
    info!(
        "Mode: {}",
        if args.dev_mode { "DEVELOPMENT" } else { "PRODUCTION" }
    );
    info!("Session TTL: {}h", args.session_ttl_hours);
    info!("CORS origin: {}", args.cors_origin);
    info!("======================================");
    info!("Endpoints:");
    info!("  GET  /health                        - Health check");
    info!("  GET  /version                       - Service version");
    info!("  POST /api/auth/register|login|logout - Accounts and sessions");
    info!("  GET  /api/auth/me                   - Current identity");
    info!("  *    /api/keys                      - API key management");
    info!("  *    /api/goals                     - Goals, tree, grid, export/import");
    info!("  *    /api/goals/{{id}}/sub-goals     - Sub-goal slots 1-8");
    info!("  *    /api/sub-goals/{{id}}/actions   - Action slots 1-8");
    info!("  *    /api/actions/{{id}}/logs        - Activity logs");
    info!("  *    /api/guestbook                 - Visitor guestbook");

    let db = match GoalDb::open(Path::new(&args.db_path)) {
        Ok(db) => db,
        Err(e) => {
            error!("Database error: {}", e);
            std::process::exit(1);
        }
    };

    let state = Arc::new(server::AppState::new(args, db));

    if let Err(e) = server::run(state).await {
        error!("Server error: {:?}", e);
        std::process::exit(1);
    }

    Ok(())
}
