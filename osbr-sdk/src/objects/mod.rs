pub mod callback;
pub mod service;
pub mod sidecar;
pub mod streams;

pub use callback::{AcceptResponse, CallbackRequest, ConnectRequest};
pub use service::{ProduceReport, ProduceStatus};
pub use sidecar::{SendRequest, StreamEvent, TOKEN_UNKNOWN_STATUSES};
pub use streams::{TaskOutcome, TaskUpdate, VersionUpdate};
