//! Callback router.
//!
//! The single ingress for sidecar callbacks:
//! 1. Check the shared secret (hardened mode only)
//! 2. Parse the body into a connect or disconnect
//! 3. Connects go to the first consumer whose prefix matches the URL path
//! 4. Disconnects go straight to the [`ConnectionManager`]; the owning
//!    consumer's `on_disconnect` hook runs only if a mapping was removed
//!
//! Nothing is mutated unless both the secret and the body check out.

use crate::broker::ConnectionManager;
use crate::config::SecurityConfig;
use crate::consumers::channel::parse_request_url;
use crate::consumers::{ConnectRejection, Consumer};
use osbr_sdk::objects::{AcceptResponse, CallbackRequest, ConnectRequest};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Successful outcome of a callback.
#[derive(Debug, Clone, PartialEq)]
pub enum CallbackReply {
    /// Connect accepted; the body goes back to the sidecar.
    Accepted(AcceptResponse),
    /// Disconnect handled (including ignored stale ones).
    Disconnected,
}

/// Errors returned to the sidecar. Every variant rejects the callback.
#[derive(Debug, Error)]
pub enum CallbackError {
    #[error("callback secret missing or wrong")]
    Unauthorized,

    #[error("malformed callback body: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("no stream is served at {0}")]
    UnknownStream(String),

    #[error("connect rejected: {0}")]
    Rejected(#[from] ConnectRejection),
}

pub struct CallbackRouter {
    /// Checked in insertion order; the first matching prefix wins.
    routes: Vec<(String, Arc<dyn Consumer>)>,
    connections: Arc<ConnectionManager>,
    security: Arc<RwLock<SecurityConfig>>,
}

impl CallbackRouter {
    pub fn new(connections: Arc<ConnectionManager>, security: Arc<RwLock<SecurityConfig>>) -> Self {
        Self {
            routes: Vec::new(),
            connections,
            security,
        }
    }

    /// Append a `(prefix, consumer)` entry to the dispatch table.
    pub fn route(mut self, prefix: impl Into<String>, consumer: Arc<dyn Consumer>) -> Self {
        self.routes.push((prefix.into(), consumer));
        self
    }

    pub fn connections(&self) -> &Arc<ConnectionManager> {
        &self.connections
    }

    /// Authenticate, parse and dispatch one sidecar callback.
    pub async fn handle_callback(
        &self,
        secret: Option<&str>,
        body: &[u8],
    ) -> Result<CallbackReply, CallbackError> {
        if !self.security.read().await.authorize(secret) {
            warn!("Callback rejected: bad or missing secret");
            return Err(CallbackError::Unauthorized);
        }

        let callback: CallbackRequest = serde_json::from_slice(body).map_err(|e| {
            warn!(error = %e, "Callback rejected: malformed body");
            e
        })?;

        match callback {
            CallbackRequest::Connect { token, request } => {
                self.dispatch_connect(&token, &request).await
            }
            CallbackRequest::Disconnect { token, reason } => {
                self.dispatch_disconnect(&token, &reason).await
            }
        }
    }

    async fn dispatch_connect(
        &self,
        token: &str,
        request: &ConnectRequest,
    ) -> Result<CallbackReply, CallbackError> {
        let url = parse_request_url(&request.url).map_err(ConnectRejection::from)?;

        let Some(consumer) = self.match_route(url.path()) else {
            info!(url = %request.url, token, "Connect for unknown stream rejected");
            return Err(CallbackError::UnknownStream(url.path().to_owned()));
        };

        let event = consumer.on_connect(token, request).await.map_err(|e| {
            info!(url = %request.url, token, error = %e, "Connect rejected by consumer");
            e
        })?;

        Ok(CallbackReply::Accepted(AcceptResponse {
            event,
            close: false,
        }))
    }

    async fn dispatch_disconnect(
        &self,
        token: &str,
        reason: &str,
    ) -> Result<CallbackReply, CallbackError> {
        debug!(token, reason, "Disconnect callback");

        if let Some(identifier) = self.connections.on_disconnect(token).await {
            let owner = self
                .routes
                .iter()
                .map(|(_, consumer)| consumer)
                .find(|consumer| consumer.namespace().as_str() == identifier.namespace());
            if let Some(consumer) = owner {
                consumer.on_disconnect(&identifier).await;
            }
        }

        Ok(CallbackReply::Disconnected)
    }

    fn match_route(&self, path: &str) -> Option<&Arc<dyn Consumer>> {
        self.routes
            .iter()
            .find(|(prefix, _)| path_has_prefix(path, prefix))
            .map(|(_, consumer)| consumer)
    }
}

/// Segment-aware prefix match: `/stream/tasks` matches `/stream/tasks`
/// and `/stream/tasks/x`, but not `/stream/tasksx`.
pub fn path_has_prefix(path: &str, prefix: &str) -> bool {
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/') || prefix.ends_with('/'),
        None => false,
    }
}
