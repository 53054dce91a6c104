//! Outbound delivery body for the sidecar's internal send endpoint.

use serde::{Deserialize, Serialize};

/// Statuses with which the sidecar reports that a token names no live
/// connection. Any of these is authoritative: the connection is gone.
pub const TOKEN_UNKNOWN_STATUSES: [u16; 2] = [404, 410];

/// A named event pushed down a stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamEvent {
    pub name: String,
    pub data: serde_json::Value,
}

impl StreamEvent {
    pub fn new(name: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }
}

/// One delivery to a single physical connection.
///
/// A request with `event: None` and `close: true` is the close-only
/// signal: it carries no payload and only tears the stream down.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SendRequest {
    pub token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event: Option<StreamEvent>,
    #[serde(default)]
    pub close: bool,
}

impl SendRequest {
    /// Close-only signal for `token`.
    pub fn close(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            event: None,
            close: true,
        }
    }

    /// Returns `true` if the sidecar answered with a token-unknown status.
    pub fn is_token_unknown(status: u16) -> bool {
        TOKEN_UNKNOWN_STATUSES.contains(&status)
    }
}
