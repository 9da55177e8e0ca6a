//! # sto-core
//!
//! Core crate for the stop-one trading terminal, providing:
//!
//! - **Types** (`types`) — enums, envelope, symbol metadata + tick rounding, positions/orders, staged strategy
//! - **Configuration** (`config`) — JSON config deserialization
//! - **Error types** (`error`) — domain-specific `StoError` via thiserror
//! - **WebSocket** (`ws`) — reconnecting, buffering transport session
//! - **JSON helpers** (`json_util`) — string-or-number numeric parsing
//! - **Preferences** (`prefs`) — namespaced key-value blob for UI state
//! - **Logging** (`logging`) — tracing-based structured logging

pub mod config;
pub mod error;
pub mod json_util;
pub mod logging;
pub mod prefs;
pub mod types;
pub mod ws;

// Re-export types at crate root for convenience.
pub use types::*;
