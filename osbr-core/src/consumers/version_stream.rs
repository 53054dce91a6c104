//! VersionStream consumer.
//!
//! Streams the results of a version lookup across package sources. Partial
//! results arrive as sources answer; `Resolved` or `Failed` ends the stream.

use super::{ConnectRejection, Consumer, StreamChannel};
use crate::broker::ConnectionManager;
use crate::config::StreamConfig;
use crate::identifier::{IdentifierError, Namespace};
use async_trait::async_trait;
use kanau::processor::Processor;
use osbr_sdk::objects::{ConnectRequest, ProduceStatus, StreamEvent, VersionUpdate};
use std::convert::Infallible;
use std::sync::Arc;

pub const VERSION_NAMESPACE: &str = "version";

/// Publish one lookup result to whoever watches `lookup_id`.
#[derive(Debug, Clone)]
pub struct PublishVersionUpdate {
    pub lookup_id: String,
    pub update: VersionUpdate,
}

pub struct VersionStream {
    channel: StreamChannel,
}

impl VersionStream {
    pub fn new(
        config: StreamConfig,
        connections: Arc<ConnectionManager>,
    ) -> Result<Self, IdentifierError> {
        Ok(Self {
            channel: StreamChannel::new(Namespace::new(VERSION_NAMESPACE)?, config, connections),
        })
    }

    pub fn channel(&self) -> &StreamChannel {
        &self.channel
    }
}

fn version_event(lookup_id: &str, update: &VersionUpdate) -> StreamEvent {
    match update {
        VersionUpdate::Partial { source, versions } => StreamEvent::new(
            "version.partial",
            serde_json::json!({ "lookup_id": lookup_id, "source": source, "versions": versions }),
        ),
        VersionUpdate::Resolved { latest, versions } => StreamEvent::new(
            "version.resolved",
            serde_json::json!({ "lookup_id": lookup_id, "latest": latest, "versions": versions }),
        ),
        VersionUpdate::Failed { reason } => StreamEvent::new(
            "version.failed",
            serde_json::json!({ "lookup_id": lookup_id, "reason": reason }),
        ),
    }
}

impl Processor<PublishVersionUpdate> for VersionStream {
    type Output = ProduceStatus;
    type Error = Infallible;

    async fn process(&self, command: PublishVersionUpdate) -> Result<ProduceStatus, Infallible> {
        let PublishVersionUpdate { lookup_id, update } = command;
        let event = version_event(&lookup_id, &update);
        Ok(self
            .channel
            .produce(&lookup_id, event, update.is_terminal())
            .await)
    }
}

#[async_trait]
impl Consumer for VersionStream {
    fn namespace(&self) -> &Namespace {
        self.channel.namespace()
    }

    async fn on_connect(
        &self,
        token: &str,
        request: &ConnectRequest,
    ) -> Result<Option<StreamEvent>, ConnectRejection> {
        self.channel.connect(token, request).await
    }
}
