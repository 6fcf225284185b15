//! Streaming WebSocket feed client for exchange market data.
//!
//! Provides pub/sub access to a market data endpoint with:
//! - Event-string subscriptions (`trades:tBTCUSD`, `candles:tBTCUSD:1m`)
//! - Callback dispatch in per-channel arrival order
//! - Heartbeat handling and receive liveness timeouts
//! - Subscription restoration across caller-driven reconnects

pub mod client;
pub mod error;
pub mod event;
pub mod message;
pub mod registry;
pub mod transport;

pub use client::{ConnectionState, FeedClient, FeedConfig, DEFAULT_URL};
pub use error::{FeedError, FeedResult};
pub use event::{decode_ack, encode_event, SubscribeRequest};
pub use message::{
    is_heartbeat, ControlEvent, ErrorEvent, InfoEvent, PongEvent, SubscribedAck, UnsubscribedAck,
    UpstreamCode, WireMessage,
};
pub use registry::{Callback, SubscriptionRegistry};
pub use transport::Transport;
