//! Feed client.
//!
//! Owns the connection lifecycle and the receive loop. Subscribers attach
//! callbacks to event strings; the client translates those into upstream
//! subscribe requests, routes channel updates back to the callbacks, and
//! restores every subscription after a caller-driven reconnect.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use serde_json::Value;
use tokio::sync::Mutex as TokioMutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{FeedError, FeedResult};
use crate::event::{decode_ack, encode_event};
use crate::message::{is_heartbeat, ControlEvent, UpstreamCode, WireMessage};
use crate::registry::SubscriptionRegistry;
use crate::transport::Transport;

/// Default public feed endpoint.
pub const DEFAULT_URL: &str = "wss://api.bitfinex.com/ws/2";

/// Feed client configuration.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// WebSocket URL.
    pub url: String,
    /// How long to wait for the connection handshake.
    pub connect_timeout_ms: u64,
    /// Silence window after which a receive attempt gives up. The upstream
    /// heartbeats every few seconds, so a full window without traffic means
    /// the connection is suspect.
    pub recv_timeout_ms: u64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            connect_timeout_ms: 10_000,
            recv_timeout_ms: 30_000,
        }
    }
}

/// Connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// One spawned receive loop and the token that stops it.
struct Session {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

/// Streaming feed client.
///
/// All methods take `&self`; the client is designed to live in an `Arc` and
/// be shared across tasks. Callbacks run synchronously on the receive loop
/// task, so updates for one channel are delivered in arrival order.
pub struct FeedClient {
    config: FeedConfig,
    transport: Arc<Transport>,
    registry: Arc<SubscriptionRegistry>,
    state: Arc<RwLock<ConnectionState>>,
    /// Guards connect/close transitions so they cannot interleave.
    session: TokioMutex<Option<Session>>,
}

impl FeedClient {
    pub fn new(config: FeedConfig) -> Self {
        Self {
            config,
            transport: Arc::new(Transport::new()),
            registry: Arc::new(SubscriptionRegistry::new()),
            state: Arc::new(RwLock::new(ConnectionState::Disconnected)),
            session: TokioMutex::new(None),
        }
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Events with at least one registered callback, in first-registration
    /// order.
    pub fn subscribed_events(&self) -> Vec<String> {
        self.registry.subscribed_events()
    }

    /// Establish the connection and start the receive loop.
    ///
    /// A no-op when already connected. On reconnect, stale channel bindings
    /// are discarded and a subscribe request is re-issued for every event in
    /// first-registration order; previously registered callbacks keep
    /// working once the new acknowledgements arrive.
    pub async fn connect(&self) -> FeedResult<()> {
        let mut session = self.session.lock().await;
        if self.state() == ConnectionState::Connected {
            return Ok(());
        }

        // Reap the previous receive loop before touching the transport, so
        // its teardown cannot race the new connection.
        if let Some(old) = session.take() {
            old.token.cancel();
            let _ = old.handle.await;
        }

        *self.state.write() = ConnectionState::Connecting;
        info!(url = %self.config.url, "connecting to feed");

        let connect_timeout = Duration::from_millis(self.config.connect_timeout_ms);
        if let Err(e) = self.transport.connect(&self.config.url, connect_timeout).await {
            *self.state.write() = ConnectionState::Disconnected;
            return Err(e);
        }

        // Channel ids from a previous connection mean nothing on this one.
        self.registry.clear_channel_bindings();
        *self.state.write() = ConnectionState::Connected;

        let token = CancellationToken::new();
        let handle = tokio::spawn(receive_loop(
            Arc::clone(&self.transport),
            Arc::clone(&self.registry),
            Arc::clone(&self.state),
            Duration::from_millis(self.config.recv_timeout_ms),
            token.clone(),
        ));
        *session = Some(Session { token, handle });

        for evt in self.registry.subscribed_events() {
            let request = encode_event(&evt)?;
            self.transport.send(serde_json::to_string(&request)?).await?;
            debug!(event = %evt, "subscription re-issued");
        }

        Ok(())
    }

    /// Register `callback` for `evt`, subscribing upstream on the first
    /// registration of that event.
    ///
    /// Fails with `NotConnected` before `connect`, and with
    /// `UnsupportedEvent` when the event string names no known channel
    /// family or is missing parameters.
    pub async fn on(
        &self,
        evt: &str,
        callback: impl Fn(&[Value]) + Send + Sync + 'static,
    ) -> FeedResult<()> {
        if self.state() != ConnectionState::Connected {
            return Err(FeedError::NotConnected);
        }

        // Validate the event before touching the registry.
        let request = encode_event(evt)?;

        let is_new = self.registry.register(evt, Arc::new(callback));
        if is_new {
            self.transport.send(serde_json::to_string(&request)?).await?;
            info!(event = %evt, "subscribe requested");
        }

        Ok(())
    }

    /// Stop the receive loop and tear the connection down.
    ///
    /// Returns once the loop has exited. Safe to call repeatedly; callback
    /// registrations survive for a later `connect`.
    pub async fn close(&self) {
        let mut session = self.session.lock().await;
        if let Some(active) = session.take() {
            active.token.cancel();
            let _ = active.handle.await;
        }
        self.transport.close().await;
        *self.state.write() = ConnectionState::Disconnected;
        info!("feed closed");
    }
}

/// Receive loop: reads frames until cancelled or the transport dies.
///
/// A receive timeout only means the connection was quiet, so the loop keeps
/// going. Any other failure flips the client to `Disconnected` and exits;
/// reconnecting is the caller's decision.
async fn receive_loop(
    transport: Arc<Transport>,
    registry: Arc<SubscriptionRegistry>,
    state: Arc<RwLock<ConnectionState>>,
    recv_timeout: Duration,
    token: CancellationToken,
) {
    debug!("receive loop started");

    loop {
        let payload = tokio::select! {
            () = token.cancelled() => {
                debug!("receive loop cancelled");
                break;
            }
            result = transport.recv(recv_timeout) => result,
        };

        match payload {
            Ok(text) => handle_payload(&registry, &text),
            Err(FeedError::ReceiveTimeout) => {
                debug!("no traffic within receive window");
            }
            Err(e) => {
                warn!(error = %e, "transport lost, receive loop exiting");
                *state.write() = ConnectionState::Disconnected;
                transport.close().await;
                break;
            }
        }
    }
}

fn handle_payload(registry: &SubscriptionRegistry, text: &str) {
    match serde_json::from_str::<WireMessage>(text) {
        Ok(WireMessage::Control(event)) => handle_control(registry, event),
        Ok(WireMessage::Update(fields)) => dispatch_update(registry, &fields),
        Err(e) => warn!(error = %e, payload = %text, "unrecognized message shape, dropping"),
    }
}

fn handle_control(registry: &SubscriptionRegistry, event: ControlEvent) {
    match event {
        ControlEvent::Info(notice) => match notice.code {
            Some(code) => match UpstreamCode::from_code(code) {
                Some(known) => {
                    warn!(code, meaning = %known, msg = ?notice.msg, "upstream notice")
                }
                None => warn!(code, msg = ?notice.msg, "upstream notice with unknown code"),
            },
            None => info!(version = ?notice.version, "feed greeting received"),
        },
        ControlEvent::Subscribed(ack) => match decode_ack(&ack) {
            Ok((chan_id, evt)) => {
                registry.bind_channel(chan_id, &evt);
                info!(chan_id, event = %evt, "subscription confirmed");
            }
            Err(e) => {
                warn!(error = %e, channel = %ack.channel, "dropping unusable subscription ack")
            }
        },
        ControlEvent::Unsubscribed(ack) => {
            debug!(chan_id = ack.chan_id, "channel unsubscribed");
        }
        ControlEvent::Error(event) => {
            let known = UpstreamCode::from_code(event.code);
            let err = FeedError::from(event);
            match known {
                Some(known) => warn!(error = %err, meaning = %known, "upstream error"),
                None => warn!(error = %err, "upstream error with unknown code"),
            }
        }
        ControlEvent::Pong(_) => {}
    }
}

/// Route one update array to the callbacks of its channel.
///
/// Callbacks are invoked against a snapshot taken outside the registry lock,
/// so a callback may register further subscriptions without deadlocking. A
/// panicking callback is contained and does not disturb its peers.
fn dispatch_update(registry: &SubscriptionRegistry, fields: &[Value]) {
    let chan_id = match fields.first().and_then(Value::as_i64) {
        Some(chan_id) => chan_id,
        None => {
            warn!("update without numeric channel id, dropping");
            return;
        }
    };

    if is_heartbeat(fields) {
        return;
    }

    let evt = match registry.resolve_channel(chan_id) {
        Some(evt) => evt,
        None => {
            debug!(chan_id, "update for unbound channel, dropping");
            return;
        }
    };

    let payload = &fields[1..];
    for callback in registry.callbacks_for(&evt) {
        if catch_unwind(AssertUnwindSafe(|| callback(payload))).is_err() {
            warn!(chan_id, event = %evt, "subscriber callback panicked");
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
