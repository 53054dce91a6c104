//! Consumer services.
//!
//! Each consumer owns one namespace of identifiers and one URL prefix:
//!
//! - `TaskStream`: task execution progress and outcomes (`task:<id>`)
//! - `VersionStream`: version lookup results (`version:<id>`)
//!
//! Both are thin wrappers around [`StreamChannel`], which carries the
//! shared connect/flush/produce logic.

pub mod channel;
pub mod pending;
pub mod task_stream;
pub mod version_stream;

pub use channel::{ConnectRejection, StreamChannel};
pub use pending::{PendingBuffers, PendingEvent};
pub use task_stream::{PublishTaskUpdate, TaskStream};
pub use version_stream::{PublishVersionUpdate, VersionStream};

use crate::identifier::{Identifier, Namespace};
use async_trait::async_trait;
use osbr_sdk::objects::{ConnectRequest, StreamEvent};

/// A service the callback router can dispatch connects to.
#[async_trait]
pub trait Consumer: Send + Sync {
    fn namespace(&self) -> &Namespace;

    /// Accept or refuse a new connection. `Ok` may carry an event for the
    /// accept response.
    async fn on_connect(
        &self,
        token: &str,
        request: &ConnectRequest,
    ) -> Result<Option<StreamEvent>, ConnectRejection>;

    /// Called after the broker removed the mapping for `identifier`.
    ///
    /// Streams keep producing regardless of observers, so the default does
    /// nothing.
    async fn on_disconnect(&self, _identifier: &Identifier) {}
}
