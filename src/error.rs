//! Error types for mandalart

use thiserror::Error;

/// Service-wide error type. Variants map onto HTTP statuses in
/// `routes::response::error_response`.
#[derive(Error, Debug)]
pub enum MandalartError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    InvalidInput(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Auth(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, MandalartError>;
