//! WebSocket transport.
//!
//! Wraps a split tokio-tungstenite stream behind async locks so that one
//! task can own the read side while any task sends. Ping frames are answered
//! inline; callers only ever see text payloads.

use std::time::{Duration, Instant};

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::time;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async_tls_with_config, MaybeTlsStream, WebSocketStream};
use tracing::debug;

use crate::error::{FeedError, FeedResult};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type WsSource = SplitStream<WsStream>;

/// Transport over one WebSocket connection.
///
/// Both halves are absent until `connect` succeeds and again after `close`;
/// operations in that window fail with `TransportClosed`.
#[derive(Default)]
pub struct Transport {
    write: Mutex<Option<WsSink>>,
    read: Mutex<Option<WsSource>>,
}

impl Transport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Establish the WebSocket connection.
    ///
    /// A no-op when a connection is already up; `close` first to force a
    /// fresh dial. Every failure mode of the dial, refusal and handshake
    /// error included, comes back as `ConnectFailed`.
    pub async fn connect(&self, url: &str, connect_timeout: Duration) -> FeedResult<()> {
        if self.write.lock().await.is_some() {
            debug!("transport already connected, keeping existing stream");
            return Ok(());
        }

        let connect = connect_async_tls_with_config(url, None, true, None);
        let (ws_stream, _response) = time::timeout(connect_timeout, connect)
            .await
            .map_err(|_| FeedError::ConnectFailed(format!("timed out connecting to {url}")))?
            .map_err(|e| FeedError::ConnectFailed(e.to_string()))?;

        let (write, read) = ws_stream.split();
        *self.write.lock().await = Some(write);
        *self.read.lock().await = Some(read);

        debug!(url = %url, "websocket transport connected");
        Ok(())
    }

    /// Send a text frame.
    pub async fn send(&self, text: String) -> FeedResult<()> {
        let mut write = self.write.lock().await;
        let sink = write.as_mut().ok_or(FeedError::TransportClosed)?;
        sink.send(Message::Text(text)).await?;
        Ok(())
    }

    /// Receive the next text payload.
    ///
    /// Pings are answered and control frames skipped without resetting the
    /// deadline. `ReceiveTimeout` means the connection was merely quiet;
    /// `TransportClosed` means it is gone for good.
    pub async fn recv(&self, recv_timeout: Duration) -> FeedResult<String> {
        let deadline = Instant::now() + recv_timeout;
        let mut read = self.read.lock().await;
        let source = read.as_mut().ok_or(FeedError::TransportClosed)?;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let frame = match time::timeout(remaining, source.next()).await {
                Ok(frame) => frame,
                Err(_) => return Err(FeedError::ReceiveTimeout),
            };

            match frame {
                Some(Ok(Message::Text(text))) => return Ok(text),
                Some(Ok(Message::Ping(data))) => {
                    if let Some(sink) = self.write.lock().await.as_mut() {
                        sink.send(Message::Pong(data)).await?;
                    }
                }
                Some(Ok(Message::Pong(_))) | Some(Ok(Message::Binary(_))) => continue,
                Some(Ok(Message::Close(frame))) => {
                    debug!(?frame, "received close frame");
                    return Err(FeedError::TransportClosed);
                }
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(e.into()),
                None => return Err(FeedError::TransportClosed),
            }
        }
    }

    /// Tear down the connection, sending a best-effort close frame.
    ///
    /// Safe to call repeatedly; the halves are taken sequentially so this
    /// never holds both locks at once.
    pub async fn close(&self) {
        if let Some(mut sink) = self.write.lock().await.take() {
            let _ = sink.send(Message::Close(None)).await;
            let _ = sink.close().await;
        }
        self.read.lock().await.take();
    }
}

// ============================================================================
// Tests
// ============================================================================
