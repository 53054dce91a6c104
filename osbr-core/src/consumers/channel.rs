//! The integration pattern shared by every consumer service.
//!
//! A [`StreamChannel`] owns one namespace and its pending buffers, and
//! provides the three steps each service needs:
//! - extracting its identifier from a connect URL
//! - installing the connection and flushing what was buffered
//! - producing events, either delivered straight away or buffered
//!
//! Terminal events always go out in two steps: the payload with
//! `close=false`, then a separate close-only signal.

use super::pending::{PendingBuffers, PendingEvent};
use crate::broker::{ConnectionManager, DeliveryOutcome};
use crate::config::StreamConfig;
use crate::identifier::{Identifier, IdentifierError, Namespace};
use crate::telemetry::BROKER_PENDING_EVENTS_TOTAL;
use osbr_sdk::objects::{ConnectRequest, ProduceStatus, StreamEvent};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

/// Base used to resolve connect URLs given as a bare path.
const RELATIVE_URL_BASE: &str = "http://stream.invalid/";

/// Reasons a consumer refuses a connect.
#[derive(Debug, Error)]
pub enum ConnectRejection {
    #[error("malformed connect URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("missing query parameter {0:?}")]
    MissingId(String),

    #[error("invalid stream id: {0}")]
    InvalidId(#[from] IdentifierError),
}

/// Parse a connect URL that may be absolute or just a path with query.
pub(crate) fn parse_request_url(raw: &str) -> Result<Url, url::ParseError> {
    match Url::parse(raw) {
        Ok(url) => Ok(url),
        Err(url::ParseError::RelativeUrlWithoutBase) => Url::parse(RELATIVE_URL_BASE)?.join(raw),
        Err(e) => Err(e),
    }
}

pub struct StreamChannel {
    namespace: Namespace,
    config: StreamConfig,
    connections: Arc<ConnectionManager>,
    pending: PendingBuffers,
}

impl StreamChannel {
    pub fn new(
        namespace: Namespace,
        config: StreamConfig,
        connections: Arc<ConnectionManager>,
    ) -> Self {
        Self {
            namespace,
            config,
            connections,
            pending: PendingBuffers::new(),
        }
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    pub fn pending(&self) -> &PendingBuffers {
        &self.pending
    }

    /// Build the namespaced identifier from the connect URL's id parameter.
    pub fn identifier_from_url(&self, raw_url: &str) -> Result<Identifier, ConnectRejection> {
        let url = parse_request_url(raw_url)?;
        let local_id = url
            .query_pairs()
            .find(|(key, _)| key == self.config.id_param.as_str())
            .map(|(_, value)| value.into_owned())
            .ok_or_else(|| ConnectRejection::MissingId(self.config.id_param.clone()))?;

        Ok(self.namespace.identifier(&local_id)?)
    }

    /// Accept a connect callback.
    ///
    /// The buffer lock is taken before the connection is installed, so a
    /// concurrent producer either appends before the drain or sees the
    /// connection after it. Buffered events go out on a spawned flush task,
    /// so the callback never waits on a delivery. Returns the inline event
    /// for the accept response, which is only offered when nothing is
    /// pending.
    pub async fn connect(
        &self,
        token: &str,
        request: &ConnectRequest,
    ) -> Result<Option<StreamEvent>, ConnectRejection> {
        let identifier = self.identifier_from_url(&request.url)?;

        let mut pending = self.pending.lock(&identifier).await;
        self.connections
            .on_connect(identifier.clone(), token.to_owned(), request.url.clone())
            .await;

        if pending.is_flushing() {
            // The running flush looks the token up per send, so it already
            // targets the new connection.
            return Ok(None);
        }
        if pending.is_empty() {
            return Ok(self.ready_event(&identifier));
        }

        let batch = pending.take();
        pending.set_flushing(true);
        drop(pending);

        info!(
            identifier = %identifier,
            count = batch.len(),
            "Flushing pending events"
        );
        tokio::spawn(flush(
            self.connections.clone(),
            self.pending.clone(),
            identifier,
            batch,
        ));

        Ok(None)
    }

    /// Deliver or buffer an event for `local_id`.
    ///
    /// Never fails: an invalid id or a failed delivery is reported in the
    /// returned status and logged.
    pub async fn produce(&self, local_id: &str, event: StreamEvent, terminal: bool) -> ProduceStatus {
        let identifier = match self.namespace.identifier(local_id) {
            Ok(identifier) => identifier,
            Err(e) => {
                warn!(namespace = %self.namespace, local_id, error = %e, "Event for invalid id dropped");
                return ProduceStatus::InvalidIdentifier;
            }
        };

        let mut pending = self.pending.lock(&identifier).await;

        // While a flush runs, new events queue behind it to keep order.
        if !pending.is_flushing() && self.connections.has_connection(&identifier).await {
            drop(pending);
            return if deliver(&self.connections, &identifier, event, terminal)
                .await
                .is_delivered()
            {
                ProduceStatus::Delivered
            } else {
                ProduceStatus::Failed
            };
        }

        if pending.len() >= self.config.max_pending {
            pending.remove(0);
            warn!(
                identifier = %identifier,
                max_pending = self.config.max_pending,
                "Pending buffer full, oldest event dropped"
            );
        }
        pending.push(PendingEvent { event, terminal });
        metrics::counter!(
            BROKER_PENDING_EVENTS_TOTAL,
            "namespace" => self.namespace.as_str().to_owned()
        )
        .increment(1);
        debug!(
            identifier = %identifier,
            pending = pending.len(),
            terminal,
            flushing = pending.is_flushing(),
            "Event buffered"
        );
        ProduceStatus::Buffered
    }

    fn ready_event(&self, identifier: &Identifier) -> Option<StreamEvent> {
        self.config.ready_event.as_ref().map(|name| {
            StreamEvent::new(
                name.clone(),
                serde_json::json!({ "id": identifier.local_id() }),
            )
        })
    }
}

/// Deliver `batch` in order, then keep draining whatever was appended
/// meanwhile. Clears the flushing flag once the buffer is empty or the
/// connection is gone; in the latter case the rest waits for the next
/// connect.
async fn flush(
    connections: Arc<ConnectionManager>,
    pending: PendingBuffers,
    identifier: Identifier,
    mut batch: Vec<PendingEvent>,
) {
    loop {
        for entry in batch {
            // Failed flush deliveries are not re-queued.
            deliver(&connections, &identifier, entry.event, entry.terminal).await;
        }

        let mut guard = pending.lock(&identifier).await;
        if guard.is_empty() || !connections.has_connection(&identifier).await {
            guard.set_flushing(false);
            debug!(identifier = %identifier, left = guard.len(), "Flush finished");
            return;
        }
        batch = guard.take();
    }
}

/// Send one event, following it with a close-only signal if terminal.
///
/// The close is skipped once the payload showed the connection is gone.
/// Returns the outcome of the payload.
async fn deliver(
    connections: &ConnectionManager,
    identifier: &Identifier,
    event: StreamEvent,
    terminal: bool,
) -> DeliveryOutcome {
    let outcome = connections.deliver(identifier, Some(event), false).await;
    if terminal
        && !matches!(
            outcome,
            DeliveryOutcome::TokenUnknown | DeliveryOutcome::NoConnection
        )
    {
        connections.send_close(identifier).await;
    }
    outcome
}
