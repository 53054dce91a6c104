//! Runtime configuration re-exports.
//!
//! The validated types live in `osbr-core::config`; the server only owns
//! the file format and the loader.

pub use osbr_core::config::{SecurityConfig, SharedConfig, SidecarConfig, StreamConfig};
