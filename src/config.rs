//! Configuration for the mandalart server
//!
//! CLI arguments and environment variable handling using clap.

use clap::Parser;

/// Mandalart - self-hosted Harada method goal tracker
#[derive(Parser, Debug, Clone)]
#[command(name = "mandalart")]
#[command(about = "REST service for Harada method (mandalart) goal boards", version)]
pub struct Args {
    /// Address to listen on
    #[arg(long, env = "MANDALART_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Port to listen on
    #[arg(long, env = "MANDALART_PORT", default_value = "8420")]
    pub port: u16,

    /// Path to the SQLite database file (parent directories are created)
    #[arg(long, env = "MANDALART_DB_PATH", default_value = "./data/mandalart.db")]
    pub db_path: String,

    /// Session lifetime in hours (default 30 days)
    #[arg(long, env = "MANDALART_SESSION_TTL_HOURS", default_value = "720")]
    pub session_ttl_hours: u64,

    /// Value for the Access-Control-Allow-Origin header
    #[arg(long, env = "MANDALART_CORS_ORIGIN", default_value = "*")]
    pub cors_origin: String,

    /// Development mode (session cookies lose the Secure flag so plain
    /// http://localhost works)
    #[arg(long, env = "MANDALART_DEV_MODE", default_value = "false")]
    pub dev_mode: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "MANDALART_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Args {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.session_ttl_hours == 0 {
            return Err("MANDALART_SESSION_TTL_HOURS must be at least 1".to_string());
        }

        if self.cors_origin.trim().is_empty() {
            return Err("MANDALART_CORS_ORIGIN must not be empty".to_string());
        }

        match self.log_level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
            other => Err(format!(
                "Unknown log level '{}', expected trace, debug, info, warn or error",
                other
            )),
        }
    }
}
