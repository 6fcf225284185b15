//! Wire message types for the exchange WebSocket protocol.

use serde::Deserialize;
use serde_json::Value;

// ============================================================================
// Incoming frames
// ============================================================================

/// Any frame the upstream can deliver.
///
/// Control events arrive as JSON objects tagged by `event`; channel data
/// arrives as a bare JSON array whose first element is the channel id.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum WireMessage {
    Control(ControlEvent),
    Update(Vec<Value>),
}

/// Control events sent by the upstream as JSON objects.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum ControlEvent {
    /// Platform status, sent on connect and around maintenance windows.
    Info(InfoEvent),
    /// Acknowledgement of a subscribe request.
    Subscribed(SubscribedAck),
    /// Acknowledgement of an unsubscribe request.
    Unsubscribed(UnsubscribedAck),
    /// Upstream rejected a request or reports a fault.
    Error(ErrorEvent),
    /// Reply to an application-level ping.
    Pong(PongEvent),
}

/// Platform info event.
#[derive(Debug, Clone, Deserialize)]
pub struct InfoEvent {
    /// Protocol version, present in the greeting sent on connect.
    pub version: Option<u32>,
    /// Status code for maintenance notices.
    pub code: Option<i64>,
    pub msg: Option<String>,
}

/// Subscription acknowledgement.
///
/// Which descriptor fields are present depends on the channel family:
/// trades and ticker carry `symbol`, books carry `symbol` and `prec`,
/// candles carry `key`.
#[derive(Debug, Clone, Deserialize)]
pub struct SubscribedAck {
    /// Channel family name as the upstream reports it.
    pub channel: String,
    /// Numeric id that prefixes every update on this channel.
    #[serde(rename = "chanId")]
    pub chan_id: i64,
    pub symbol: Option<String>,
    pub key: Option<String>,
    pub prec: Option<String>,
    pub pair: Option<String>,
}

/// Unsubscription acknowledgement.
#[derive(Debug, Clone, Deserialize)]
pub struct UnsubscribedAck {
    pub status: Option<String>,
    #[serde(rename = "chanId")]
    pub chan_id: i64,
}

/// Upstream error event.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorEvent {
    pub code: i64,
    #[serde(default)]
    pub msg: String,
}

/// Pong event.
#[derive(Debug, Clone, Deserialize)]
pub struct PongEvent {
    pub cid: Option<i64>,
    pub ts: Option<i64>,
}

/// Check whether an update array is a channel heartbeat (`[chanId, "hb"]`).
pub fn is_heartbeat(fields: &[Value]) -> bool {
    fields.get(1).and_then(Value::as_str) == Some("hb")
}

// ============================================================================
// Upstream status codes
// ============================================================================

/// Status codes attached to upstream `info` and `error` events.
///
/// The 1xxxx range arrives in `error` events; the 2xxxx range arrives in
/// `info` events around server restarts and resyncs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamCode {
    UnknownError,
    GenericError,
    ConcurrencyError,
    RequestParamsError,
    ConfigFailed,
    AuthFailed,
    AuthPayloadError,
    AuthSignatureError,
    AuthHmacError,
    AuthNonceError,
    UnauthFailed,
    SubscribeFailed,
    AlreadySubscribed,
    UnsubscribeFailed,
    NotReady,
    ServerStopping,
    ResyncStarted,
    ResyncComplete,
    InfoMessage,
}

impl UpstreamCode {
    /// Map a numeric code to its known meaning, if any.
    pub fn from_code(code: i64) -> Option<Self> {
        let known = match code {
            10000 => Self::UnknownError,
            10001 => Self::GenericError,
            10008 => Self::ConcurrencyError,
            10020 => Self::RequestParamsError,
            10050 => Self::ConfigFailed,
            10100 => Self::AuthFailed,
            10111 => Self::AuthPayloadError,
            10112 => Self::AuthSignatureError,
            10113 => Self::AuthHmacError,
            10114 => Self::AuthNonceError,
            10200 => Self::UnauthFailed,
            10300 => Self::SubscribeFailed,
            10301 => Self::AlreadySubscribed,
            10400 => Self::UnsubscribeFailed,
            11000 => Self::NotReady,
            20051 => Self::ServerStopping,
            20060 => Self::ResyncStarted,
            20061 => Self::ResyncComplete,
            5000 => Self::InfoMessage,
            _ => return None,
        };
        Some(known)
    }

    pub fn code(&self) -> i64 {
        match self {
            Self::UnknownError => 10000,
            Self::GenericError => 10001,
            Self::ConcurrencyError => 10008,
            Self::RequestParamsError => 10020,
            Self::ConfigFailed => 10050,
            Self::AuthFailed => 10100,
            Self::AuthPayloadError => 10111,
            Self::AuthSignatureError => 10112,
            Self::AuthHmacError => 10113,
            Self::AuthNonceError => 10114,
            Self::UnauthFailed => 10200,
            Self::SubscribeFailed => 10300,
            Self::AlreadySubscribed => 10301,
            Self::UnsubscribeFailed => 10400,
            Self::NotReady => 11000,
            Self::ServerStopping => 20051,
            Self::ResyncStarted => 20060,
            Self::ResyncComplete => 20061,
            Self::InfoMessage => 5000,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::UnknownError => "unknown error",
            Self::GenericError => "generic error",
            Self::ConcurrencyError => "concurrency error",
            Self::RequestParamsError => "request parameters error",
            Self::ConfigFailed => "configuration setup failed",
            Self::AuthFailed => "authentication failed",
            Self::AuthPayloadError => "error in authentication request payload",
            Self::AuthSignatureError => "error in authentication request signature",
            Self::AuthHmacError => "error in authentication request encryption",
            Self::AuthNonceError => "error in authentication request nonce",
            Self::UnauthFailed => "error in un-authentication request",
            Self::SubscribeFailed => "failed channel subscription",
            Self::AlreadySubscribed => "already subscribed",
            Self::UnsubscribeFailed => "failed channel unsubscription",
            Self::NotReady => "not ready, try again later",
            Self::ServerStopping => "server stopping, please reconnect",
            Self::ResyncStarted => "server resyncing, please wait",
            Self::ResyncComplete => "server resync complete, please resubscribe",
            Self::InfoMessage => "info message",
        }
    }
}

impl std::fmt::Display for UpstreamCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.description())
    }
}

// ============================================================================
// Tests
// ============================================================================
