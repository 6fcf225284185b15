//! Mock feed server for integration tests.
//!
//! Speaks just enough of the upstream protocol:
//! - Sends the info greeting on connect
//! - Acknowledges subscribe requests with incrementing channel ids
//! - Records received messages
//! - Pushes canned updates to the most recent connection

use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Mutex};
use tokio_tungstenite::{accept_async, tungstenite::Message};

/// A mock feed server for testing.
pub struct MockFeedServer {
    addr: SocketAddr,
    shutdown_tx: mpsc::Sender<()>,
    messages: Arc<Mutex<VecDeque<String>>>,
    connections: Arc<Mutex<u32>>,
    /// Sender into the most recently accepted connection.
    outbound: Arc<Mutex<Option<mpsc::Sender<String>>>>,
}

impl MockFeedServer {
    /// Start a new mock feed server on an available port.
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let messages: Arc<Mutex<VecDeque<String>>> = Arc::new(Mutex::new(VecDeque::new()));
        let connections: Arc<Mutex<u32>> = Arc::new(Mutex::new(0));
        let outbound: Arc<Mutex<Option<mpsc::Sender<String>>>> = Arc::new(Mutex::new(None));
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);

        let messages_clone = messages.clone();
        let connections_clone = connections.clone();
        let outbound_clone = outbound.clone();
        // Channel ids keep counting up across reconnects, like the real
        // endpoint within a server session.
        let next_chan_id = Arc::new(Mutex::new(0i64));

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    Ok((stream, _)) = listener.accept() => {
                        let messages = messages_clone.clone();
                        let connections = connections_clone.clone();
                        let outbound = outbound_clone.clone();
                        let next_chan_id = next_chan_id.clone();
                        tokio::spawn(handle_connection(
                            stream, messages, connections, outbound, next_chan_id,
                        ));
                    }
                    _ = shutdown_rx.recv() => {
                        break;
                    }
                }
            }
        });

        Self {
            addr,
            shutdown_tx,
            messages,
            connections,
            outbound,
        }
    }

    /// Get the server's WebSocket URL.
    pub fn url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// Get the number of connections received.
    pub async fn connection_count(&self) -> u32 {
        *self.connections.lock().await
    }

    /// Get all received messages.
    pub async fn received_messages(&self) -> Vec<String> {
        self.messages.lock().await.iter().cloned().collect()
    }

    /// Push a raw frame to the most recent connection.
    pub async fn push_update(&self, text: String) {
        let sender = self.outbound.lock().await.clone();
        if let Some(sender) = sender {
            let _ = sender.send(text).await;
        }
    }

    /// Shutdown the server.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
    }
}

async fn handle_connection(
    stream: TcpStream,
    messages: Arc<Mutex<VecDeque<String>>>,
    connections: Arc<Mutex<u32>>,
    outbound: Arc<Mutex<Option<mpsc::Sender<String>>>>,
    next_chan_id: Arc<Mutex<i64>>,
) {
    {
        let mut count = connections.lock().await;
        *count += 1;
    }

    let ws_stream = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            eprintln!("WebSocket handshake failed: {}", e);
            return;
        }
    };

    let (mut write, mut read) = ws_stream.split();

    // Register this connection as the push target.
    let (push_tx, mut push_rx) = mpsc::channel::<String>(32);
    *outbound.lock().await = Some(push_tx);

    // Greeting, as the real endpoint sends on connect.
    let greeting = json!({
        "event": "info",
        "version": 2,
        "serverId": "mock",
        "platform": {"status": 1}
    });
    let _ = write.send(Message::Text(greeting.to_string())).await;

    loop {
        tokio::select! {
            msg = read.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        {
                            let mut msgs = messages.lock().await;
                            msgs.push_back(text.clone());
                        }

                        if let Ok(parsed) = serde_json::from_str::<serde_json::Value>(&text) {
                            if let Some(ack) = ack_for(&parsed, &next_chan_id).await {
                                let _ = write.send(Message::Text(ack)).await;
                            }
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        let _ = write.send(Message::Pong(data)).await;
                    }
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    _ => {}
                }
            }
            pushed = push_rx.recv() => {
                match pushed {
                    Some(text) => {
                        let _ = write.send(Message::Text(text)).await;
                    }
                    None => break,
                }
            }
        }
    }
}

/// Build the acknowledgement for a subscribe request, echoing its
/// descriptor fields and assigning the next channel id.
async fn ack_for(request: &serde_json::Value, next_chan_id: &Arc<Mutex<i64>>) -> Option<String> {
    if request.get("event") != Some(&json!("subscribe")) {
        return None;
    }

    let chan_id = {
        let mut id = next_chan_id.lock().await;
        *id += 1;
        *id
    };

    let mut ack = serde_json::Map::new();
    ack.insert("event".to_string(), json!("subscribed"));
    if let Some(channel) = request.get("channel") {
        ack.insert("channel".to_string(), channel.clone());
    }
    ack.insert("chanId".to_string(), json!(chan_id));
    for field in ["symbol", "key", "prec"] {
        if let Some(value) = request.get(field) {
            ack.insert(field.to_string(), value.clone());
        }
    }

    Some(serde_json::Value::Object(ack).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_server_starts() {
        let server = MockFeedServer::start().await;
        assert!(server.url().starts_with("ws://127.0.0.1:"));
        server.shutdown().await;
    }
}
