//! TOML file configuration structures.
//!
//! These structs directly map to the `osbr-config.toml` file format.

use osbr_core::config::DEFAULT_MAX_PENDING;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use url::Url;

/// Root configuration structure as read from the TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub server: ServerConfig,
    pub sidecar: SidecarConfig,
    #[serde(default)]
    pub security: SecurityConfig,
    #[serde(default)]
    pub streams: StreamsConfig,
}

/// Server configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// The address and port to listen on (e.g., "0.0.0.0:8080").
    #[serde(default = "default_listen_addr")]
    pub listen: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen_addr(),
        }
    }
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

/// Sidecar section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SidecarConfig {
    /// The sidecar's internal send endpoint.
    pub send_url: Url,
    /// Timeout for one outbound delivery, in milliseconds.
    #[serde(default = "default_send_timeout_ms")]
    pub send_timeout_ms: u64,
    /// The sidecar's own timeout for callbacks it posts to us, in
    /// milliseconds. Only used to validate `send_timeout_ms`.
    #[serde(default = "default_callback_timeout_ms")]
    pub callback_timeout_ms: u64,
}

fn default_send_timeout_ms() -> u64 {
    2_000
}

fn default_callback_timeout_ms() -> u64 {
    5_000
}

/// Callback authentication section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SecurityConfig {
    #[serde(default)]
    pub hardened: bool,
    /// Shared secret the sidecar passes as the `secret` query parameter.
    #[serde(default)]
    pub callback_secret: Option<String>,
}

/// Stream routing table. Connects are matched in field order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamsConfig {
    #[serde(default = "default_tasks_stream")]
    pub tasks: StreamConfig,
    #[serde(default = "default_versions_stream")]
    pub versions: StreamConfig,
}

impl Default for StreamsConfig {
    fn default() -> Self {
        Self {
            tasks: default_tasks_stream(),
            versions: default_versions_stream(),
        }
    }
}

/// One stream's routing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Connect URL path prefix.
    pub prefix: String,
    /// Query parameter holding the stream id.
    pub id_param: String,
    /// Inline event name sent on accept when nothing is pending.
    #[serde(default)]
    pub ready_event: Option<String>,
    /// Cap on events buffered per stream id before anyone connects.
    #[serde(default = "default_max_pending")]
    pub max_pending: usize,
}

fn default_max_pending() -> usize {
    DEFAULT_MAX_PENDING
}

fn default_tasks_stream() -> StreamConfig {
    StreamConfig {
        prefix: "/stream/tasks".to_string(),
        id_param: "task_id".to_string(),
        ready_event: None,
        max_pending: default_max_pending(),
    }
}

fn default_versions_stream() -> StreamConfig {
    StreamConfig {
        prefix: "/stream/versions".to_string(),
        id_param: "lookup_id".to_string(),
        ready_event: None,
        max_pending: default_max_pending(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_config_parsing() {
        let toml_str = r#"
[server]
listen = "127.0.0.1:3000"

[sidecar]
send_url = "http://127.0.0.1:5561/send"
send_timeout_ms = 1500
callback_timeout_ms = 4000

[security]
hardened = true
callback_secret = "s3cret"

[streams.tasks]
prefix = "/live/tasks"
id_param = "id"
ready_event = "ready"
"#;
        let config: FileConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.listen.port(), 3000);
        assert_eq!(config.sidecar.send_timeout_ms, 1500);
        assert!(config.security.hardened);
        assert_eq!(config.streams.tasks.prefix, "/live/tasks");
        assert_eq!(config.streams.tasks.ready_event.as_deref(), Some("ready"));
        assert_eq!(config.streams.tasks.max_pending, 256);
        assert_eq!(config.streams.versions.prefix, "/stream/versions");
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config: FileConfig = toml::from_str(
            r#"
[sidecar]
send_url = "http://sidecar:5561/send"
"#,
        )
        .unwrap();
        assert_eq!(config.server.listen, default_listen_addr());
        assert_eq!(config.sidecar.send_timeout_ms, 2_000);
        assert_eq!(config.sidecar.callback_timeout_ms, 5_000);
        assert!(!config.security.hardened);
        assert_eq!(config.streams.tasks.id_param, "task_id");
    }
}
