//! ConnectionManager.
//!
//! The ConnectionManager is responsible for:
//! - Keeping the identifier -> token mapping and its exact reverse
//! - Replacing a live connection when the same identifier reconnects,
//!   telling the sidecar to close the old one
//! - Issuing every outbound delivery to the sidecar's send endpoint
//! - Dropping mappings the sidecar reports as unknown
//!
//! Deliveries are fire-and-forget: one bounded POST, no retries, and the
//! result is a plain `bool` for callers.

use crate::config::SidecarConfig;
use crate::identifier::Identifier;
use crate::telemetry::{
    BROKER_CONNECTIONS_ACTIVE, BROKER_CONNECTS_TOTAL, BROKER_DELIVERIES_TOTAL,
    BROKER_DELIVERY_DURATION_SECONDS, BROKER_DISCONNECTS_TOTAL, BROKER_RECONNECTS_TOTAL,
};
use osbr_sdk::objects::{SendRequest, StreamEvent};
use std::collections::HashMap;
use std::time::Instant;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use url::Url;

/// Errors that can occur while building the broker.
#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Result of a single delivery attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered,
    /// No mapping for the identifier; nothing was sent.
    NoConnection,
    /// The sidecar no longer knows the token; the mapping was dropped.
    TokenUnknown,
    /// Timeout, refused connection or an unexpected status.
    Failed,
}

impl DeliveryOutcome {
    pub fn is_delivered(self) -> bool {
        self == DeliveryOutcome::Delivered
    }

    fn as_label(self) -> &'static str {
        match self {
            DeliveryOutcome::Delivered => "delivered",
            DeliveryOutcome::NoConnection => "no_connection",
            DeliveryOutcome::TokenUnknown => "token_unknown",
            DeliveryOutcome::Failed => "failed",
        }
    }
}

/// The live physical connection behind an identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    pub token: String,
    /// URL the client connected with.
    pub url: String,
}

/// Forward and reverse maps. Every mutation goes through the methods
/// below, which keep `reverse` an exact mirror of `forward`.
#[derive(Default)]
struct ConnectionTables {
    forward: HashMap<Identifier, Connection>,
    reverse: HashMap<String, Identifier>,
}

impl ConnectionTables {
    /// Install `connection` for `identifier`, returning the one it replaced.
    fn install(&mut self, identifier: Identifier, connection: Connection) -> Option<Connection> {
        // A token is issued once per physical connection, but if the sidecar
        // ever reuses one the old owner must lose it.
        if let Some(owner) = self.reverse.get(&connection.token).cloned() {
            if owner != identifier {
                self.remove(&owner);
            }
        }

        let replaced = self.remove(&identifier);
        self.reverse
            .insert(connection.token.clone(), identifier.clone());
        self.forward.insert(identifier, connection);
        replaced
    }

    fn remove(&mut self, identifier: &Identifier) -> Option<Connection> {
        let connection = self.forward.remove(identifier)?;
        self.reverse.remove(&connection.token);
        Some(connection)
    }

    /// Remove the mapping only while it still holds `token`.
    fn remove_if_token(&mut self, identifier: &Identifier, token: &str) -> bool {
        match self.forward.get(identifier) {
            Some(connection) if connection.token == token => {
                self.remove(identifier);
                true
            }
            _ => false,
        }
    }

    fn report_size(&self) {
        metrics::gauge!(BROKER_CONNECTIONS_ACTIVE).set(self.forward.len() as f64);
    }
}

/// Owns the identifier <-> token tables and the outbound delivery path.
///
/// Built once at startup and shared behind an `Arc` by every consumer
/// service and the callback router. The table lock is never held across a
/// network call.
pub struct ConnectionManager {
    tables: Mutex<ConnectionTables>,
    http_client: reqwest::Client,
    send_url: Url,
}

impl ConnectionManager {
    /// Create a new ConnectionManager.
    ///
    /// The HTTP client carries `send_timeout` as its total request timeout,
    /// so no delivery can outlast it.
    pub fn new(config: &SidecarConfig) -> Result<Self, BrokerError> {
        let http_client = reqwest::Client::builder()
            .timeout(config.send_timeout)
            .connect_timeout(config.send_timeout)
            .build()?;

        Ok(Self {
            tables: Mutex::new(ConnectionTables::default()),
            http_client,
            send_url: config.send_url.clone(),
        })
    }

    /// Record a new physical connection for `identifier`.
    ///
    /// A previous connection for the same identifier is replaced atomically
    /// and the sidecar is told to close it, without waiting for the answer.
    pub async fn on_connect(&self, identifier: Identifier, token: String, url: String) {
        let replaced = {
            let mut tables = self.tables.lock().await;
            let replaced = tables.install(
                identifier.clone(),
                Connection {
                    token: token.clone(),
                    url,
                },
            );
            tables.report_size();
            replaced
        };

        metrics::counter!(BROKER_CONNECTS_TOTAL).increment(1);

        match replaced {
            Some(old) if old.token != token => {
                metrics::counter!(BROKER_RECONNECTS_TOTAL).increment(1);
                info!(
                    identifier = %identifier,
                    old_token = %old.token,
                    token = %token,
                    "Connection replaced by reconnect"
                );
                let _ = self.spawn_close(old.token);
            }
            Some(_) => {
                debug!(identifier = %identifier, token = %token, "Repeated connect for live token");
            }
            None => {
                info!(identifier = %identifier, token = %token, "Connection established");
            }
        }
    }

    /// Forget the connection named by `token`.
    ///
    /// Unknown tokens and tokens already superseded by a reconnect are
    /// ignored. Returns the identifier whose mapping was removed.
    pub async fn on_disconnect(&self, token: &str) -> Option<Identifier> {
        let mut tables = self.tables.lock().await;

        let Some(identifier) = tables.reverse.get(token).cloned() else {
            debug!(token = %token, "Disconnect for unknown token ignored");
            metrics::counter!(BROKER_DISCONNECTS_TOTAL, "result" => "unknown").increment(1);
            return None;
        };

        if !tables.remove_if_token(&identifier, token) {
            debug!(
                identifier = %identifier,
                token = %token,
                "Disconnect for superseded token ignored"
            );
            metrics::counter!(BROKER_DISCONNECTS_TOTAL, "result" => "stale").increment(1);
            return None;
        }

        tables.report_size();
        drop(tables);

        metrics::counter!(BROKER_DISCONNECTS_TOTAL, "result" => "removed").increment(1);
        info!(identifier = %identifier, token = %token, "Connection closed");
        Some(identifier)
    }

    pub async fn has_connection(&self, identifier: &Identifier) -> bool {
        self.tables.lock().await.forward.contains_key(identifier)
    }

    /// The live connection for `identifier`, if any.
    pub async fn connection(&self, identifier: &Identifier) -> Option<Connection> {
        self.tables.lock().await.forward.get(identifier).cloned()
    }

    /// The identifier currently bound to `token`, if any.
    pub async fn identifier_for(&self, token: &str) -> Option<Identifier> {
        self.tables.lock().await.reverse.get(token).cloned()
    }

    pub async fn connection_count(&self) -> usize {
        self.tables.lock().await.forward.len()
    }

    /// Deliver `event` to the connection behind `identifier`.
    ///
    /// Returns `true` only if the sidecar accepted it. Failures are logged
    /// and never retried.
    pub async fn send_event(&self, identifier: &Identifier, event: StreamEvent, close: bool) -> bool {
        self.deliver(identifier, Some(event), close)
            .await
            .is_delivered()
    }

    /// Send the close-only signal to the connection behind `identifier`.
    pub async fn send_close(&self, identifier: &Identifier) -> bool {
        self.deliver(identifier, None, true).await.is_delivered()
    }

    /// Single outbound delivery path.
    pub async fn deliver(
        &self,
        identifier: &Identifier,
        event: Option<StreamEvent>,
        close: bool,
    ) -> DeliveryOutcome {
        let token = {
            let tables = self.tables.lock().await;
            tables
                .forward
                .get(identifier)
                .map(|connection| connection.token.clone())
        };

        let Some(token) = token else {
            warn!(identifier = %identifier, "No connection for identifier, event dropped");
            return Self::record(DeliveryOutcome::NoConnection);
        };

        let request = SendRequest {
            token: token.clone(),
            event,
            close,
        };

        let started = Instant::now();
        let result = self
            .http_client
            .post(self.send_url.clone())
            .json(&request)
            .send()
            .await;
        metrics::histogram!(BROKER_DELIVERY_DURATION_SECONDS)
            .record(started.elapsed().as_secs_f64());

        let outcome = match result {
            Ok(response) if response.status().is_success() => {
                debug!(identifier = %identifier, token = %token, close, "Event delivered");
                DeliveryOutcome::Delivered
            }
            Ok(response) if SendRequest::is_token_unknown(response.status().as_u16()) => {
                let removed = {
                    let mut tables = self.tables.lock().await;
                    let removed = tables.remove_if_token(identifier, &token);
                    tables.report_size();
                    removed
                };
                info!(
                    identifier = %identifier,
                    token = %token,
                    removed,
                    "Sidecar reports token unknown, mapping dropped"
                );
                DeliveryOutcome::TokenUnknown
            }
            Ok(response) => {
                error!(
                    identifier = %identifier,
                    token = %token,
                    status = %response.status(),
                    "Event delivery rejected by sidecar"
                );
                DeliveryOutcome::Failed
            }
            Err(e) => {
                error!(
                    identifier = %identifier,
                    token = %token,
                    error = %e,
                    timeout = e.is_timeout(),
                    "Event delivery failed"
                );
                DeliveryOutcome::Failed
            }
        };

        Self::record(outcome)
    }

    fn record(outcome: DeliveryOutcome) -> DeliveryOutcome {
        metrics::counter!(BROKER_DELIVERIES_TOTAL, "outcome" => outcome.as_label()).increment(1);
        outcome
    }

    /// Best-effort close of a replaced connection. `on_connect` does not
    /// wait for it; the outcome is counted like any other delivery.
    fn spawn_close(&self, token: String) -> JoinHandle<DeliveryOutcome> {
        let http_client = self.http_client.clone();
        let send_url = self.send_url.clone();

        tokio::spawn(async move {
            let started = Instant::now();
            let result = http_client
                .post(send_url)
                .json(&SendRequest::close(token.clone()))
                .send()
                .await;
            metrics::histogram!(BROKER_DELIVERY_DURATION_SECONDS)
                .record(started.elapsed().as_secs_f64());

            let outcome = match result {
                Ok(response) if response.status().is_success() => {
                    debug!(token = %token, "Replaced connection closed");
                    DeliveryOutcome::Delivered
                }
                Ok(response) if SendRequest::is_token_unknown(response.status().as_u16()) => {
                    debug!(token = %token, "Replaced connection already gone");
                    DeliveryOutcome::TokenUnknown
                }
                Ok(response) => {
                    warn!(
                        token = %token,
                        status = %response.status(),
                        "Failed to close replaced connection"
                    );
                    DeliveryOutcome::Failed
                }
                Err(e) => {
                    warn!(token = %token, error = %e, "Failed to close replaced connection");
                    DeliveryOutcome::Failed
                }
            };
            Self::record(outcome)
        })
    }
}
