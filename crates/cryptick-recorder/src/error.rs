//! Application error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Feed error: {0}")]
    Feed(#[from] cryptick_feed::FeedError),

    #[error("Sink error: {0}")]
    Sink(#[from] cryptick_sink::SinkError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] cryptick_telemetry::TelemetryError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type AppResult<T> = Result<T, AppError>;
