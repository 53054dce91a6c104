//! Configuration types for Open Stream Broker.
//!
//! These types represent the validated runtime configuration. Loading and
//! parsing the file is handled by the server crate.

mod security;
mod sidecar;
mod stream;

pub use security::SecurityConfig;
pub use sidecar::SidecarConfig;
pub use stream::{DEFAULT_MAX_PENDING, StreamConfig};

use std::sync::Arc;
use tokio::sync::RwLock;

/// Configuration sections that can change while the process runs.
///
/// Only the security section is reloadable; the sidecar endpoint and the
/// stream table are fixed once the broker is built.
#[derive(Clone)]
pub struct SharedConfig {
    /// Hardened-mode flag and callback secret.
    pub security: Arc<RwLock<SecurityConfig>>,
}

impl SharedConfig {
    pub fn new(security: SecurityConfig) -> Self {
        Self {
            security: Arc::new(RwLock::new(security)),
        }
    }
}
