//! Callback bodies posted by the sidecar to the broker.
//!
//! # Protocol
//!
//! The sidecar posts one JSON object per lifecycle change of a physical
//! connection, tagged by its `"action"` field:
//!
//! ```json
//! {"action":"connect","token":"t1","request":{"url":"/stream/tasks?task_id=42","headers":{}}}
//! {"action":"disconnect","token":"t1","reason":"client closed"}
//! ```
//!
//! A 2xx answer to a connect accepts the connection and may carry an
//! [`AcceptResponse`]. Any other status rejects it and the sidecar tears
//! the attempted connection down.

use serde::{Deserialize, Serialize};

use super::sidecar::StreamEvent;

/// A lifecycle notification from the sidecar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum CallbackRequest {
    /// A client opened a stream; `token` names the new physical connection.
    Connect {
        token: String,
        request: ConnectRequest,
    },
    /// A physical connection went away.
    Disconnect {
        token: String,
        #[serde(default)]
        reason: String,
    },
}

impl CallbackRequest {
    /// The connection token this callback refers to.
    pub fn token(&self) -> &str {
        match self {
            CallbackRequest::Connect { token, .. } => token,
            CallbackRequest::Disconnect { token, .. } => token,
        }
    }
}

/// The client request that opened the stream, as seen by the sidecar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectRequest {
    /// Request URL, either a bare path with query or an absolute URL.
    pub url: String,
    #[serde(default)]
    pub headers: serde_json::Map<String, serde_json::Value>,
}

/// Body of a 2xx answer to a connect callback.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AcceptResponse {
    /// Event the sidecar delivers immediately, saving a round trip.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event: Option<StreamEvent>,
    /// Close the connection right after `event` is delivered.
    #[serde(default)]
    pub close: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_connect_callback() {
        let body = r#"{
            "action": "connect",
            "token": "tok-1",
            "request": {"url": "/stream/tasks?task_id=7", "headers": {"accept": "text/event-stream"}}
        }"#;
        let parsed: CallbackRequest = serde_json::from_str(body).unwrap();
        match parsed {
            CallbackRequest::Connect { token, request } => {
                assert_eq!(token, "tok-1");
                assert_eq!(request.url, "/stream/tasks?task_id=7");
                assert_eq!(request.headers["accept"], "text/event-stream");
            }
            other => panic!("unexpected callback: {other:?}"),
        }
    }

    #[test]
    fn test_disconnect_reason_is_optional() {
        let parsed: CallbackRequest =
            serde_json::from_str(r#"{"action":"disconnect","token":"tok-2"}"#).unwrap();
        assert_eq!(
            parsed,
            CallbackRequest::Disconnect {
                token: "tok-2".into(),
                reason: String::new(),
            }
        );
        assert_eq!(parsed.token(), "tok-2");
    }

    #[test]
    fn test_unknown_action_is_rejected() {
        let err = serde_json::from_str::<CallbackRequest>(r#"{"action":"ping","token":"x"}"#);
        assert!(err.is_err());
        let err = serde_json::from_str::<CallbackRequest>(r#"{"token":"x"}"#);
        assert!(err.is_err());
    }

    #[test]
    fn test_accept_without_event_omits_field() {
        let json = serde_json::to_value(AcceptResponse::default()).unwrap();
        assert_eq!(json, serde_json::json!({"close": false}));
    }
}
