//! HTTP API surface.
//!
//! - `callback`: ingress for the streaming sidecar
//! - `service`: producer endpoints for out-of-process backends

pub mod callback;
pub mod extractors;
pub mod service;
