//! Wire objects for Open Stream Broker.
//!
//! Everything that crosses a process boundary lives here: the callback
//! bodies the sidecar posts to the broker, the body the broker posts back
//! to the sidecar's send endpoint, and the payloads of the streams the
//! broker serves.

pub mod objects;

pub use objects::{
    AcceptResponse, CallbackRequest, ConnectRequest, SendRequest, StreamEvent, TOKEN_UNKNOWN_STATUSES,
};
