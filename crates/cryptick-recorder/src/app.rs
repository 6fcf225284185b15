//! Recorder application.
//!
//! Wires the feed client to one time-partitioned sink per symbol and keeps
//! the connection alive until a shutdown signal arrives. Reconnection is
//! driven here: the feed client only reports loss of connection, the
//! application decides when to dial again.

use std::collections::HashMap;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use cryptick_core::TradeTick;
use cryptick_feed::FeedClient;
use cryptick_sink::{Backend, FsBackend, MemoryBackend, MemoryStore, SinkOptions, TimeSink};

use crate::config::{AppConfig, BackendKind, ReconnectSettings};
use crate::error::AppResult;

type SharedSink = Arc<Mutex<TimeSink>>;

/// Market data recorder.
pub struct Application {
    config: AppConfig,
    client: Arc<FeedClient>,
    sinks: HashMap<String, SharedSink>,
    /// Present when the memory backend is selected, so collected objects
    /// can be inspected after shutdown.
    memory_store: Option<MemoryStore>,
}

impl Application {
    pub fn new(config: AppConfig) -> AppResult<Self> {
        let client = Arc::new(FeedClient::new(config.feed.clone().into()));

        let memory_store = match config.sink.backend {
            BackendKind::Memory => Some(MemoryStore::new()),
            BackendKind::Fs => None,
        };

        let mut sinks = HashMap::new();
        for symbol in &config.symbols {
            let sink = build_sink(&config, symbol, memory_store.as_ref())?;
            sinks.insert(symbol.clone(), Arc::new(Mutex::new(sink)));
        }

        Ok(Self {
            config,
            client,
            sinks,
            memory_store,
        })
    }

    pub fn is_connected(&self) -> bool {
        self.client.is_connected()
    }

    /// The object store backing the sinks, when the memory backend is in
    /// use.
    pub fn memory_store(&self) -> Option<&MemoryStore> {
        self.memory_store.as_ref()
    }

    /// Connect and register the per-symbol trade subscriptions.
    pub async fn start(&self) -> AppResult<()> {
        self.client.connect().await?;

        for symbol in &self.config.symbols {
            let sink = match self.sinks.get(symbol) {
                Some(sink) => Arc::clone(sink),
                None => continue,
            };
            let evt = format!("trades:{symbol}");
            let tag = symbol.clone();
            self.client
                .on(&evt, move |payload| handle_trade_update(&tag, &sink, payload))
                .await?;
        }

        info!(symbols = ?self.config.symbols, "recording started");
        Ok(())
    }

    /// Run until ctrl-c, reconnecting with backoff whenever the feed drops.
    pub async fn run(&mut self) -> AppResult<()> {
        self.start().await?;
        self.run_until(tokio::signal::ctrl_c()).await
    }

    /// Reconnect loop, driven until `shutdown` completes.
    ///
    /// The shutdown future is armed once, ahead of the loop, and raced
    /// against the backoff sleep as well as the idle wait. A signal landing
    /// mid-backoff stops the recorder without waiting the delay out.
    async fn run_until(&mut self, shutdown: impl Future) -> AppResult<()> {
        let mut shutdown = std::pin::pin!(shutdown);
        let mut liveness =
            tokio::time::interval(Duration::from_millis(self.config.reconnect.check_interval_ms));
        let mut failed_attempts = 0u32;

        loop {
            tokio::select! {
                _ = liveness.tick() => {
                    if self.client.is_connected() {
                        failed_attempts = 0;
                        continue;
                    }

                    failed_attempts += 1;
                    let delay = backoff_delay(&self.config.reconnect, failed_attempts);
                    warn!(
                        attempt = failed_attempts,
                        delay_ms = delay.as_millis() as u64,
                        "feed disconnected, reconnecting after backoff"
                    );
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = &mut shutdown => {
                            info!("Shutdown signal received");
                            break;
                        }
                    }

                    match self.client.connect().await {
                        Ok(()) => {
                            info!("feed reconnected");
                            failed_attempts = 0;
                        }
                        Err(e) => error!(error = %e, "reconnect attempt failed"),
                    }
                }
                _ = &mut shutdown => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        self.shutdown().await;
        Ok(())
    }

    /// Close the feed and finish every sink.
    pub async fn shutdown(&mut self) {
        self.client.close().await;

        for (symbol, sink) in &self.sinks {
            if let Err(e) = sink.lock().close() {
                warn!(symbol = %symbol, error = %e, "failed to close sink");
            }
        }

        info!("recorder stopped");
    }
}

fn build_sink(
    config: &AppConfig,
    symbol: &str,
    store: Option<&MemoryStore>,
) -> AppResult<TimeSink> {
    let root = Path::new(&config.sink.root).join(symbol);
    let backend: Box<dyn Backend> = match config.sink.backend {
        BackendKind::Fs => Box::new(FsBackend::new(root)),
        BackendKind::Memory => {
            let store = store.cloned().unwrap_or_default();
            Box::new(MemoryBackend::with_prefix(store, root))
        }
    };

    let options = SinkOptions {
        suffix: "csv".to_string(),
        header: Some(config.sink.header.clone()).filter(|h| !h.is_empty()),
        footer: None,
    };

    Ok(TimeSink::new(backend, config.sink.resolution, options)?)
}

/// Route one trade update payload into the symbol's sink.
///
/// Trades arrive three ways: a snapshot (array of trade rows) right after
/// subscribing, `"te"` on execution, and `"tu"` a moment later once the
/// trade id is final. Recording both `te` and `tu` would double-count, so
/// `tu` is skipped.
fn handle_trade_update(symbol: &str, sink: &SharedSink, payload: &[Value]) {
    match payload.first() {
        Some(Value::String(kind)) if kind == "te" => match payload.get(1).and_then(Value::as_array)
        {
            Some(row) => record_trade(symbol, sink, row),
            None => warn!(symbol = %symbol, "trade execution without a row"),
        },
        Some(Value::String(kind)) if kind == "tu" => {}
        Some(Value::Array(rows)) => {
            for row in rows {
                match row.as_array() {
                    Some(row) => record_trade(symbol, sink, row),
                    None => warn!(symbol = %symbol, "malformed snapshot row dropped"),
                }
            }
        }
        Some(Value::String(kind)) => debug!(symbol = %symbol, kind = %kind, "ignoring update kind"),
        _ => warn!(symbol = %symbol, "unrecognized trade payload shape"),
    }
}

fn record_trade(symbol: &str, sink: &SharedSink, row: &[Value]) {
    match TradeTick::from_fields(row) {
        Ok(tick) => {
            if let Err(e) = sink.lock().write(&tick.to_record()) {
                error!(symbol = %symbol, error = %e, "failed to write tick");
            }
        }
        Err(e) => warn!(symbol = %symbol, error = %e, "malformed trade row dropped"),
    }
}

fn backoff_delay(settings: &ReconnectSettings, attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(10);
    let delay = settings.base_delay_ms.saturating_mul(1u64 << exponent);
    let delay = delay.min(settings.max_delay_ms);

    Duration::from_millis(delay + clock_jitter())
}

/// Pseudo-jitter (0-1000ms) derived from the clock.
fn clock_jitter() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    (nanos % 1000) as u64
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SinkSettings;

    fn memory_config() -> AppConfig {
        AppConfig {
            symbols: vec!["tBTCUSD".to_string()],
            sink: SinkSettings {
                backend: BackendKind::Memory,
                ..SinkSettings::default()
            },
            ..AppConfig::default()
        }
    }

    fn payload(raw: &str) -> Vec<Value> {
        serde_json::from_str(raw).unwrap()
    }

    fn test_sink(store: &MemoryStore) -> SharedSink {
        let backend = Box::new(MemoryBackend::new(store.clone()));
        let sink = TimeSink::new(backend, cryptick_sink::Resolution::Month, SinkOptions::default())
            .unwrap();
        Arc::new(Mutex::new(sink))
    }

    fn store_body(store: &MemoryStore, sink: SharedSink) -> String {
        // Finish the open partition so the object becomes visible.
        sink.lock().close().unwrap();
        assert_eq!(store.len(), 1);
        let path = store.paths().remove(0);
        store.get(&path).unwrap_or_default()
    }

    #[test]
    fn test_executed_trade_is_recorded() {
        let store = MemoryStore::new();
        let sink = test_sink(&store);

        handle_trade_update(
            "tBTCUSD",
            &sink,
            &payload(r#"["te",[401597393,1574694475039,0.005,7244.9]]"#),
        );

        let body = store_body(&store, sink);
        assert_eq!(body, "401597393,7244.9,0.005,1574694475039\n");
    }

    #[test]
    fn test_trade_update_duplicate_is_skipped() {
        let store = MemoryStore::new();
        let sink = test_sink(&store);

        handle_trade_update(
            "tBTCUSD",
            &sink,
            &payload(r#"["te",[1,1574694475039,0.005,7244.9]]"#),
        );
        handle_trade_update(
            "tBTCUSD",
            &sink,
            &payload(r#"["tu",[1,1574694475039,0.005,7244.9]]"#),
        );

        let body = store_body(&store, sink);
        assert_eq!(body.lines().count(), 1);
    }

    #[test]
    fn test_snapshot_rows_are_recorded() {
        let store = MemoryStore::new();
        let sink = test_sink(&store);

        handle_trade_update(
            "tBTCUSD",
            &sink,
            &payload(r#"[[[1,1000,0.1,10.5],[2,2000,-0.2,11.5]]]"#),
        );

        let body = store_body(&store, sink);
        assert_eq!(body, "1,10.5,0.1,1000\n2,11.5,-0.2,2000\n");
    }

    #[test]
    fn test_malformed_rows_are_dropped() {
        let store = MemoryStore::new();
        let sink = test_sink(&store);

        handle_trade_update("tBTCUSD", &sink, &payload(r#"["te",[1,2]]"#));
        handle_trade_update("tBTCUSD", &sink, &payload(r#"[42]"#));

        let body = store_body(&store, sink);
        assert_eq!(body, "");
    }

    #[test]
    fn test_backoff_grows_and_caps() {
        let settings = ReconnectSettings {
            check_interval_ms: 200,
            base_delay_ms: 1_000,
            max_delay_ms: 8_000,
        };

        let first = backoff_delay(&settings, 1).as_millis() as u64;
        let third = backoff_delay(&settings, 3).as_millis() as u64;
        let tenth = backoff_delay(&settings, 10).as_millis() as u64;

        // Jitter adds at most a second on top of the deterministic part.
        assert!((1_000..2_000).contains(&first));
        assert!((4_000..5_000).contains(&third));
        assert!((8_000..9_000).contains(&tenth));
    }

    #[test]
    fn test_application_builds_sink_per_symbol() {
        let mut config = memory_config();
        config.symbols = vec!["tBTCUSD".to_string(), "tETHUSD".to_string()];

        let app = Application::new(config).unwrap();
        assert_eq!(app.sinks.len(), 2);
        assert!(app.memory_store().is_some());
        assert!(!app.is_connected());
    }

    #[tokio::test]
    async fn test_shutdown_during_backoff_is_immediate() {
        let mut config = memory_config();
        // Nothing listens on port 1, so the loop stays in its reconnect
        // path with a backoff far longer than the whole test.
        config.feed.url = "ws://127.0.0.1:1".to_string();
        config.reconnect = ReconnectSettings {
            check_interval_ms: 10,
            base_delay_ms: 30_000,
            max_delay_ms: 30_000,
        };

        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let driver = tokio::spawn(async move {
            let mut app = Application::new(config).unwrap();
            app.run_until(rx).await
        });

        // Let the loop park in the backoff sleep, then signal.
        tokio::time::sleep(Duration::from_millis(200)).await;
        tx.send(()).unwrap();

        let result = tokio::time::timeout(Duration::from_secs(2), driver)
            .await
            .expect("recorder ignored the shutdown signal during backoff")
            .unwrap();
        assert!(result.is_ok());
    }
}
