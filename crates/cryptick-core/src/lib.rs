//! Core domain types for cryptick market data tooling.
//!
//! This crate provides the fundamental types shared across the workspace:
//! - `TradeTick`: a single executed trade as delivered by the exchange
//! - `Candle`: OHLCV summary of one time bucket
//! - `tick_to_candles`: offline tick-to-candle aggregation

pub mod candle;
pub mod error;
pub mod trade;

pub use candle::{tick_to_candles, Candle};
pub use error::{CoreError, Result};
pub use trade::TradeTick;
