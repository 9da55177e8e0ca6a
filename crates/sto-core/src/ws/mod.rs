//! WebSocket session with constant-interval reconnect and outbound buffering.

pub mod client;

pub use client::{OnMessageCallback, PingPayload, SessionHandle, WsConnConfig, WsSession};
