//! Market data recorder.
//!
//! Ties the streaming feed client to time-partitioned sinks:
//! - One trade subscription and one sink per configured symbol
//! - CSV rows `id,price,amount,time`, partitioned by date
//! - Reconnects with backoff when the feed drops

pub mod app;
pub mod config;
pub mod error;

pub use app::Application;
pub use config::{AppConfig, BackendKind, FeedSettings, ReconnectSettings, SinkSettings};
pub use error::{AppError, AppResult};
