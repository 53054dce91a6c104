//! Sidecar endpoint configuration.

use std::time::Duration;
use url::Url;

/// Where and how the broker delivers events to the sidecar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SidecarConfig {
    /// The sidecar's internal send endpoint.
    pub send_url: Url,
    /// Upper bound for one delivery. Kept strictly below the sidecar's own
    /// callback timeout. Callbacks never wait on a delivery: connect flushes
    /// run on their own task.
    pub send_timeout: Duration,
}
