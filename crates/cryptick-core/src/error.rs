//! Error types for cryptick-core.

use thiserror::Error;

/// Core error types.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Malformed trade payload: {0}")]
    MalformedTrade(String),

    #[error("Invalid aggregation period: {0}")]
    InvalidPeriod(i64),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
