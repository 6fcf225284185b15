//! Recorder configuration.

use std::path::Path;

use cryptick_feed::{FeedConfig, DEFAULT_URL};
use cryptick_sink::Resolution;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

/// Storage backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Partitioned files on the local filesystem.
    #[default]
    Fs,
    /// In-memory object store, for tests and dry runs.
    Memory,
}

/// Feed connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedSettings {
    #[serde(default = "default_url")]
    pub url: String,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default = "default_recv_timeout_ms")]
    pub recv_timeout_ms: u64,
}

fn default_url() -> String {
    DEFAULT_URL.to_string()
}

fn default_connect_timeout_ms() -> u64 {
    10_000
}

fn default_recv_timeout_ms() -> u64 {
    30_000
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            url: default_url(),
            connect_timeout_ms: default_connect_timeout_ms(),
            recv_timeout_ms: default_recv_timeout_ms(),
        }
    }
}

impl From<FeedSettings> for FeedConfig {
    fn from(settings: FeedSettings) -> Self {
        Self {
            url: settings.url,
            connect_timeout_ms: settings.connect_timeout_ms,
            recv_timeout_ms: settings.recv_timeout_ms,
        }
    }
}

/// Sink settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkSettings {
    /// Root directory (or object key prefix) for collected data. Each
    /// symbol gets its own subtree.
    #[serde(default = "default_root")]
    pub root: String,
    #[serde(default)]
    pub resolution: Resolution,
    #[serde(default)]
    pub backend: BackendKind,
    #[serde(default = "default_header")]
    pub header: String,
}

fn default_root() -> String {
    "cryptick-data/tick".to_string()
}

fn default_header() -> String {
    "id,price,amount,time".to_string()
}

impl Default for SinkSettings {
    fn default() -> Self {
        Self {
            root: default_root(),
            resolution: Resolution::default(),
            backend: BackendKind::default(),
            header: default_header(),
        }
    }
}

/// Reconnect policy settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconnectSettings {
    /// How often to check connection liveness.
    #[serde(default = "default_check_interval_ms")]
    pub check_interval_ms: u64,
    /// Base delay for exponential backoff.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Maximum delay for exponential backoff.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_check_interval_ms() -> u64 {
    200
}

fn default_base_delay_ms() -> u64 {
    1_000
}

fn default_max_delay_ms() -> u64 {
    60_000
}

impl Default for ReconnectSettings {
    fn default() -> Self {
        Self {
            check_interval_ms: default_check_interval_ms(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Trading pairs to record, in upstream notation (`tBTCUSD`).
    #[serde(default = "default_symbols")]
    pub symbols: Vec<String>,
    #[serde(default)]
    pub feed: FeedSettings,
    #[serde(default)]
    pub sink: SinkSettings,
    #[serde(default)]
    pub reconnect: ReconnectSettings,
}

fn default_symbols() -> Vec<String> {
    vec!["tBTCUSD".to_string()]
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            symbols: default_symbols(),
            feed: FeedSettings::default(),
            sink: SinkSettings::default(),
            reconnect: ReconnectSettings::default(),
        }
    }
}

impl AppConfig {
    /// Resolve the configuration path and load it.
    ///
    /// Precedence: explicit path, then the `CRYPTICK_CONFIG` env var, then
    /// `config/default.toml`. Falls back to defaults when no file is
    /// present at the resolved path.
    pub fn load(path: Option<String>) -> AppResult<Self> {
        let config_path = path
            .or_else(|| std::env::var("CRYPTICK_CONFIG").ok())
            .unwrap_or_else(|| "config/default.toml".to_string());

        if Path::new(&config_path).exists() {
            tracing::info!(path = %config_path, "Loading configuration");
            Self::from_file(&config_path)
        } else {
            tracing::warn!(path = %config_path, "Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Load from a specific file.
    pub fn from_file(path: &str) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("Failed to read config: {e}")))?;

        toml::from_str(&content).map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))
    }
}

// ============================================================================
// Tests
// ============================================================================
