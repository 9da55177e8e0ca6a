//! Typed error definitions for the trading terminal.
//!
//! Provides [`StoError`] for domain-specific errors that are more informative
//! than plain `anyhow::Error` strings. All variants implement `std::error::Error`
//! via `thiserror`, so they integrate seamlessly with `anyhow::Result`.

use std::time::Duration;

use thiserror::Error;

/// Domain-specific errors for the trading terminal.
#[derive(Debug, Error)]
pub enum StoError {
    /// Configuration parsing or validation error.
    #[error("config error: {0}")]
    Config(String),

    /// WebSocket connection, handshake, or communication error.
    #[error("websocket error: {0}")]
    WebSocket(String),

    /// Envelope or payload parsing error.
    #[error("parse error: {0}")]
    Parse(String),

    /// The server answered with an `error` envelope.
    #[error("server error: {0}")]
    Protocol(String),

    /// A request with the same reply tag is already waiting for its answer.
    #[error("request '{op}' is already in flight")]
    RequestInFlight { op: String },

    /// No reply arrived for a request within the configured timeout.
    #[error("request '{op}' timed out after {after:?}")]
    RequestTimeout { op: String, after: Duration },

    /// Price levels that cannot describe a position (entry <= 0, stop == entry, ...).
    #[error("invalid levels: {0}")]
    InvalidLevels(String),

    /// An operation that needs a confirmed position found none.
    #[error("no open position for {symbol}")]
    NoPosition { symbol: String },

    /// Preferences file read/write error.
    #[error("prefs error: {0}")]
    Prefs(String),
}
