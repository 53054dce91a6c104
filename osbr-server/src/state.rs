//! Application state shared across all request handlers.

use crate::config::LoadedConfig;
use crate::config::runtime::SharedConfig;
use metrics_exporter_prometheus::PrometheusHandle;
use osbr_core::broker::{BrokerError, ConnectionManager};
use osbr_core::consumers::{TaskStream, VersionStream};
use osbr_core::identifier::IdentifierError;
use osbr_core::router::CallbackRouter;
use std::sync::Arc;
use thiserror::Error;

/// Errors raised while wiring the broker together at startup.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("failed to build the sidecar client: {0}")]
    Broker(#[from] BrokerError),

    #[error("invalid stream namespace: {0}")]
    Namespace(#[from] IdentifierError),
}

/// Application state that is shared across all request handlers.
///
/// This is cloneable and cheap to pass around (everything is behind Arc).
#[derive(Clone)]
pub struct AppState {
    /// Ingress for sidecar callbacks.
    pub callbacks: Arc<CallbackRouter>,
    /// Producer for task progress events.
    pub tasks: Arc<TaskStream>,
    /// Producer for version lookup events.
    pub versions: Arc<VersionStream>,
    /// Reloadable configuration (SIGHUP).
    pub config: SharedConfig,
    /// Prometheus recorder handle, absent when no recorder is installed.
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    /// Build the connection manager, both consumers and the callback routing
    /// table from a loaded configuration.
    pub fn new(
        loaded: &LoadedConfig,
        metrics: Option<PrometheusHandle>,
    ) -> Result<Self, StateError> {
        let config = SharedConfig::new(loaded.security.clone());
        let connections = Arc::new(ConnectionManager::new(&loaded.sidecar)?);

        let tasks = Arc::new(TaskStream::new(loaded.tasks.clone(), connections.clone())?);
        let versions = Arc::new(VersionStream::new(
            loaded.versions.clone(),
            connections.clone(),
        )?);

        let callbacks = CallbackRouter::new(connections, config.security.clone())
            .route(loaded.tasks.prefix.clone(), tasks.clone())
            .route(loaded.versions.prefix.clone(), versions.clone());

        Ok(Self {
            callbacks: Arc::new(callbacks),
            tasks,
            versions,
            config,
            metrics,
        })
    }
}
