//! Response objects for the backend-facing producer endpoints.

use serde::{Deserialize, Serialize};

/// What happened to a produced event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProduceStatus {
    /// Handed to the sidecar successfully.
    Delivered,
    /// No connection yet; queued until one arrives.
    Buffered,
    /// A connection existed but the delivery failed. The event is gone.
    Failed,
    /// The stream id was empty or contained the namespace separator.
    InvalidIdentifier,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProduceReport {
    pub status: ProduceStatus,
}
