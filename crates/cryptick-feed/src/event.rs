//! Event descriptor codec.
//!
//! Subscriptions are addressed by compact event strings such as
//! `trades:tBTCUSD` or `candles:tBTCUSD:1m`. This module translates between
//! those strings and the upstream's subscribe request / acknowledgement
//! vocabulary.

use serde::Serialize;

use crate::error::{FeedError, FeedResult};
use crate::message::SubscribedAck;

/// Outgoing subscribe request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubscribeRequest {
    /// Always "subscribe".
    pub event: String,
    /// Channel family name understood by the upstream.
    pub channel: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prec: Option<String>,
}

impl SubscribeRequest {
    fn new(channel: &str) -> Self {
        Self {
            event: "subscribe".to_string(),
            channel: channel.to_string(),
            symbol: None,
            key: None,
            prec: None,
        }
    }
}

/// Translate an event string into the subscribe request that names it.
///
/// Raw books have no family of their own upstream: `rawbook:SYM` maps to the
/// `book` channel at precision `R0`. Candle events fold their symbol and
/// timeframe into the upstream `key` descriptor.
pub fn encode_event(evt: &str) -> FeedResult<SubscribeRequest> {
    let mut parts = evt.split(':');
    let family = parts.next().unwrap_or_default();
    let params: Vec<&str> = parts.collect();

    let unsupported = || FeedError::UnsupportedEvent(evt.to_string());

    let request = match family {
        "trades" | "ticker" | "book" => {
            let symbol = params.first().ok_or_else(unsupported)?;
            let mut request = SubscribeRequest::new(family);
            request.symbol = Some(symbol.to_string());
            request
        }
        "rawbook" => {
            let symbol = params.first().ok_or_else(unsupported)?;
            let mut request = SubscribeRequest::new("book");
            request.symbol = Some(symbol.to_string());
            request.prec = Some("R0".to_string());
            request
        }
        "candles" => {
            let (symbol, timeframe) = match params.as_slice() {
                [symbol, timeframe] => (symbol, timeframe),
                _ => return Err(unsupported()),
            };
            let mut request = SubscribeRequest::new("candles");
            request.key = Some(format!("trade:{symbol}:{timeframe}"));
            request
        }
        _ => return Err(unsupported()),
    };

    Ok(request)
}

/// Translate a subscription acknowledgement back into the event string it
/// answers, paired with the channel id the upstream assigned.
pub fn decode_ack(ack: &SubscribedAck) -> FeedResult<(i64, String)> {
    let malformed = |what: &str| {
        FeedError::Protocol(format!(
            "subscribed ack for channel {} missing {what}",
            ack.channel
        ))
    };

    let event = match ack.channel.as_str() {
        "trades" | "ticker" => {
            let symbol = ack.symbol.as_deref().ok_or_else(|| malformed("symbol"))?;
            format!("{}:{}", ack.channel, symbol)
        }
        "book" => {
            let symbol = ack.symbol.as_deref().ok_or_else(|| malformed("symbol"))?;
            if ack.prec.as_deref() == Some("R0") {
                format!("rawbook:{symbol}")
            } else {
                format!("book:{symbol}")
            }
        }
        "candles" => {
            let key = ack.key.as_deref().ok_or_else(|| malformed("key"))?;
            let descriptor = key
                .strip_prefix("trade:")
                .ok_or_else(|| FeedError::Protocol(format!("unrecognized candle key: {key}")))?;
            format!("candles:{descriptor}")
        }
        other => {
            return Err(FeedError::Protocol(format!(
                "unrecognized channel family in ack: {other}"
            )))
        }
    };

    Ok((ack.chan_id, event))
}

// ============================================================================
// Tests
// ============================================================================
