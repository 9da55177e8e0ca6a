//! The socket message unit.
//!
//! Every frame on the terminal socket is one JSON [`Envelope`] tagged with an
//! operation `type`. Requests and replies share the same tag space, which is
//! why replies are correlated by tag alone.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::StoError;

/// One JSON message exchanged with the terminal backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Operation tag (`"positions"`, `"strategy"`, `"error"`, ...).
    #[serde(rename = "type")]
    pub kind: String,
    /// Reply / push body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Human-readable text, set on `error` envelopes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Request body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

impl Envelope {
    /// Build an outbound request with an optional payload.
    pub fn request(kind: impl Into<String>, payload: Option<Value>) -> Self {
        Self { kind: kind.into(), data: None, message: None, payload }
    }

    /// Parse one inbound text frame.
    pub fn parse(text: &str) -> Result<Self, StoError> {
        serde_json::from_str(text).map_err(|e| StoError::Parse(format!("bad envelope: {e}")))
    }

    /// Serialize to a text frame.
    pub fn to_json(&self) -> String {
        // An Envelope holds only strings and JSON values; serialization cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }
}
