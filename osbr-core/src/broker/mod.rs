//! The connection broker.
//!
//! One [`ConnectionManager`] per process owns every identifier <-> token
//! mapping and is the only component that talks to the sidecar's send
//! endpoint.

pub mod connection_manager;

pub use connection_manager::{BrokerError, Connection, ConnectionManager, DeliveryOutcome};
