//! Feed error types.

use thiserror::Error;

use crate::message::ErrorEvent;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("Connection failed: {0}")]
    ConnectFailed(String),

    #[error("Transport closed")]
    TransportClosed,

    #[error("Receive timed out")]
    ReceiveTimeout,

    #[error("Not connected")]
    NotConnected,

    #[error("Unsupported event: {0}")]
    UnsupportedEvent(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Upstream error: code={code}, msg={msg}")]
    Upstream { code: i64, msg: String },

    #[error("Tungstenite error: {0}")]
    Tungstenite(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<ErrorEvent> for FeedError {
    fn from(event: ErrorEvent) -> Self {
        Self::Upstream {
            code: event.code,
            msg: event.msg,
        }
    }
}

pub type FeedResult<T> = Result<T, FeedError>;
