//! Configuration parsing for the trading terminal.
//!
//! The runner reads its settings from a single JSON config file. Every section
//! is optional; a missing field falls back to the default the terminal has
//! always shipped with.
//!
//! # Example config
//!
//! ```json
//! {
//!   "Terminal": { "module_name": "sto-runner", "log_path": "/tmp/sto" },
//!   "session":  { "url": "ws://localhost:3001", "reconnect_interval_ms": 2000,
//!                 "request_timeout_ms": 15000, "overlap_policy": "reject" },
//!   "trading":  { "symbol": "BTCUSDT", "leverage": 10, "risk_fraction": 0.01,
//!                 "reward_ratio": 3.0 },
//!   "market":   { "stream_url": "wss://fstream.binance.com/ws", "interval": "4h" },
//!   "prefs":    { "path": "sto-prefs.json", "root_key": "TradeTerminal" }
//! }
//! ```

use std::collections::HashMap;
use std::time::Duration;

use serde::Deserialize;

use crate::error::StoError;

/// Top-level application config, deserialized from a JSON file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TerminalConfig {
    /// Module metadata (name, log path).
    #[serde(rename = "Terminal", default)]
    pub terminal: ModuleMeta,

    /// Backend socket session.
    #[serde(default)]
    pub session: SessionConfig,

    /// Symbol, leverage and risk parameters.
    #[serde(default)]
    pub trading: TradingConfig,

    /// Public kline stream that drives the chart.
    #[serde(default)]
    pub market: MarketConfig,

    /// Persisted UI preferences.
    #[serde(default)]
    pub prefs: PrefsConfig,
}

/// Module metadata block.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModuleMeta {
    pub module_name: Option<String>,
    pub log_path: Option<String>,
}

/// How a second request is treated while one with the same reply tag waits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverlapPolicy {
    /// Fail the second request with `RequestInFlight`.
    #[default]
    Reject,
    /// The second request takes over the slot; the first is abandoned and
    /// ends only by timeout.
    Replace,
}

/// Backend session settings.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_url")]
    pub url: String,

    /// Constant delay between reconnect attempts.
    #[serde(default = "default_reconnect_ms")]
    pub reconnect_interval_ms: u64,

    /// Per-request reply timeout; `null` waits forever.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: Option<u64>,

    #[serde(default)]
    pub overlap_policy: OverlapPolicy,

    /// WebSocket ping interval; absent means no client pings.
    pub ping_interval_sec: Option<u64>,

    /// Extra HTTP headers for the handshake.
    #[serde(default)]
    pub extra_headers: HashMap<String, String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            reconnect_interval_ms: default_reconnect_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            overlap_policy: OverlapPolicy::default(),
            ping_interval_sec: None,
            extra_headers: HashMap::new(),
        }
    }
}

impl SessionConfig {
    pub fn reconnect_interval(&self) -> Duration {
        Duration::from_millis(self.reconnect_interval_ms)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }

    pub fn ping_interval(&self) -> Option<Duration> {
        self.ping_interval_sec.filter(|s| *s > 0).map(Duration::from_secs)
    }
}

/// Trading parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct TradingConfig {
    #[serde(default = "default_symbol")]
    pub symbol: String,

    #[serde(default = "default_leverage")]
    pub leverage: u32,

    /// Fraction of the deposit risked per trade.
    #[serde(default = "default_risk_fraction")]
    pub risk_fraction: f64,

    /// Take-profit distance as a multiple of the stop distance.
    #[serde(default = "default_reward_ratio")]
    pub reward_ratio: f64,
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            symbol: default_symbol(),
            leverage: default_leverage(),
            risk_fraction: default_risk_fraction(),
            reward_ratio: default_reward_ratio(),
        }
    }
}

/// Public market data stream.
#[derive(Debug, Clone, Deserialize)]
pub struct MarketConfig {
    #[serde(default = "default_stream_url")]
    pub stream_url: String,

    /// Kline interval (`1m`, `15m`, `4h`, ...).
    #[serde(default = "default_interval")]
    pub interval: String,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self { stream_url: default_stream_url(), interval: default_interval() }
    }
}

/// Preferences file location.
#[derive(Debug, Clone, Deserialize)]
pub struct PrefsConfig {
    #[serde(default = "default_prefs_path")]
    pub path: String,

    #[serde(default = "default_root_key")]
    pub root_key: String,
}

impl Default for PrefsConfig {
    fn default() -> Self {
        Self { path: default_prefs_path(), root_key: default_root_key() }
    }
}

fn default_url() -> String {
    "ws://localhost:3001".to_string()
}
fn default_reconnect_ms() -> u64 {
    2000
}
fn default_request_timeout_ms() -> Option<u64> {
    Some(15_000)
}
fn default_symbol() -> String {
    "BTCUSDT".to_string()
}
fn default_leverage() -> u32 {
    10
}
fn default_risk_fraction() -> f64 {
    0.01
}
fn default_reward_ratio() -> f64 {
    3.0
}
fn default_stream_url() -> String {
    "wss://fstream.binance.com/ws".to_string()
}
fn default_interval() -> String {
    "4h".to_string()
}
fn default_prefs_path() -> String {
    "sto-prefs.json".to_string()
}
fn default_root_key() -> String {
    "TradeTerminal".to_string()
}

impl TerminalConfig {
    /// Module name for logging, defaulting to `sto-runner`.
    pub fn module_name(&self) -> String {
        self.terminal.module_name.clone().unwrap_or_else(|| "sto-runner".to_string())
    }

    /// Reject values the terminal cannot run with.
    pub fn validate(&self) -> Result<(), StoError> {
        for (name, raw) in [("session.url", &self.session.url), ("market.stream_url", &self.market.stream_url)] {
            let parsed = url::Url::parse(raw).map_err(|e| StoError::Config(format!("{name}: {e}")))?;
            if !matches!(parsed.scheme(), "ws" | "wss") {
                return Err(StoError::Config(format!("{name}: expected ws:// or wss://, got {raw}")));
            }
        }
        if self.session.reconnect_interval_ms == 0 {
            return Err(StoError::Config("session.reconnect_interval_ms must be > 0".into()));
        }
        if self.trading.symbol.trim().is_empty() {
            return Err(StoError::Config("trading.symbol is empty".into()));
        }
        if self.trading.leverage == 0 {
            return Err(StoError::Config("trading.leverage must be >= 1".into()));
        }
        let risk = self.trading.risk_fraction;
        if !(risk > 0.0 && risk <= 1.0) {
            return Err(StoError::Config(format!("trading.risk_fraction must be in (0, 1], got {risk}")));
        }
        let ratio = self.trading.reward_ratio;
        if !(ratio.is_finite() && ratio > 0.0) {
            return Err(StoError::Config(format!("trading.reward_ratio must be > 0, got {ratio}")));
        }
        if self.prefs.root_key.is_empty() {
            return Err(StoError::Config("prefs.root_key is empty".into()));
        }
        Ok(())
    }
}

/// Load and validate the config from a JSON file.
pub fn load_config(path: &str) -> anyhow::Result<TerminalConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: TerminalConfig = serde_json::from_str(&content)?;
    config.validate()?;
    Ok(config)
}
