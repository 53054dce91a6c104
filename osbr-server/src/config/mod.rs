//! Configuration module for osbr-server.
//!
//! Handles loading configuration from TOML files, CLI arguments,
//! and environment variables.

pub mod file;
pub mod runtime;

use crate::config::file::{FileConfig, StreamConfig as FileStreamConfig};
use crate::config::runtime::{SecurityConfig, SidecarConfig, StreamConfig};
use osbr_core::router::path_has_prefix;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Environment variable that overrides `security.callback_secret`.
pub const CALLBACK_SECRET_ENV: &str = "OSBR_CALLBACK_SECRET";

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("validation error: {0}")]
    ValidationError(String),
}

/// Loaded configuration result containing all parts.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub listen: SocketAddr,
    pub sidecar: SidecarConfig,
    pub security: SecurityConfig,
    pub tasks: StreamConfig,
    pub versions: StreamConfig,
}

impl LoadedConfig {
    /// Whether `other` differs in a section that cannot change at runtime.
    pub fn needs_restart(&self, other: &LoadedConfig) -> bool {
        self.listen != other.listen
            || self.sidecar != other.sidecar
            || self.tasks != other.tasks
            || self.versions != other.versions
    }
}

/// Configuration loader that handles the complete loading process.
pub struct ConfigLoader {
    config_path: std::path::PathBuf,
    listen_override: Option<SocketAddr>,
}

impl ConfigLoader {
    /// Create a new config loader.
    pub fn new(config_path: impl AsRef<Path>, listen_override: Option<SocketAddr>) -> Self {
        Self {
            config_path: config_path.as_ref().to_path_buf(),
            listen_override,
        }
    }

    /// Load and process the configuration.
    ///
    /// This will:
    /// 1. Read the TOML file
    /// 2. Apply CLI and environment overrides
    /// 3. Validate the configuration
    /// 4. Build the loaded configuration
    pub fn load(&self) -> Result<LoadedConfig, ConfigError> {
        let config_content = std::fs::read_to_string(&self.config_path)?;
        let mut file_config: FileConfig = toml::from_str(&config_content)?;

        if let Ok(secret) = std::env::var(CALLBACK_SECRET_ENV) {
            file_config.security.callback_secret = Some(secret);
        }

        self.process(file_config)
    }

    /// Reload the configuration (used during SIGHUP).
    pub fn reload(&self) -> Result<LoadedConfig, ConfigError> {
        self.load()
    }

    /// Apply the CLI override, validate and convert a parsed file.
    fn process(&self, mut file_config: FileConfig) -> Result<LoadedConfig, ConfigError> {
        if let Some(listen) = self.listen_override {
            file_config.server.listen = listen;
        }

        validate(&file_config)?;

        Ok(build_loaded_config(file_config))
    }
}

fn validate(config: &FileConfig) -> Result<(), ConfigError> {
    let sidecar = &config.sidecar;
    if sidecar.send_timeout_ms == 0 {
        return Err(ConfigError::ValidationError(
            "sidecar.send_timeout_ms must be positive".to_string(),
        ));
    }
    // No delivery may outlast the sidecar's own callback timeout.
    if sidecar.send_timeout_ms >= sidecar.callback_timeout_ms {
        return Err(ConfigError::ValidationError(format!(
            "sidecar.send_timeout_ms ({}) must be shorter than sidecar.callback_timeout_ms ({})",
            sidecar.send_timeout_ms, sidecar.callback_timeout_ms
        )));
    }

    if config.security.hardened
        && config
            .security
            .callback_secret
            .as_deref()
            .is_none_or(str::is_empty)
    {
        return Err(ConfigError::ValidationError(
            "security.hardened requires a non-empty callback_secret".to_string(),
        ));
    }

    let streams = [
        ("tasks", &config.streams.tasks),
        ("versions", &config.streams.versions),
    ];
    for (name, stream) in &streams {
        if !stream.prefix.starts_with('/') {
            return Err(ConfigError::ValidationError(format!(
                "streams.{name}.prefix must start with '/'"
            )));
        }
        if stream.id_param.is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "streams.{name}.id_param must not be empty"
            )));
        }
        if stream.max_pending == 0 {
            return Err(ConfigError::ValidationError(format!(
                "streams.{name}.max_pending must be positive"
            )));
        }
    }
    // Connects match the first prefix in table order, so an earlier stream
    // must not swallow a later one's paths.
    for (i, (earlier_name, earlier)) in streams.iter().enumerate() {
        for (later_name, later) in &streams[i + 1..] {
            if path_has_prefix(&later.prefix, &earlier.prefix) {
                return Err(ConfigError::ValidationError(format!(
                    "streams.{earlier_name}.prefix {} shadows streams.{later_name}.prefix {}",
                    earlier.prefix, later.prefix
                )));
            }
        }
    }

    Ok(())
}

fn build_loaded_config(file_config: FileConfig) -> LoadedConfig {
    LoadedConfig {
        listen: file_config.server.listen,
        sidecar: SidecarConfig {
            send_url: file_config.sidecar.send_url,
            send_timeout: Duration::from_millis(file_config.sidecar.send_timeout_ms),
        },
        security: SecurityConfig::new(
            file_config.security.hardened,
            file_config.security.callback_secret,
        ),
        tasks: convert_stream(file_config.streams.tasks),
        versions: convert_stream(file_config.streams.versions),
    }
}

fn convert_stream(s: FileStreamConfig) -> StreamConfig {
    StreamConfig {
        prefix: s.prefix,
        id_param: s.id_param,
        ready_event: s.ready_event,
        max_pending: s.max_pending,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn process(toml_str: &str) -> Result<LoadedConfig, ConfigError> {
        let file_config: FileConfig = toml::from_str(toml_str).unwrap();
        ConfigLoader::new("unused.toml", None).process(file_config)
    }

    #[test]
    fn test_valid_config_converts() {
        let loaded = process(
            r#"
[sidecar]
send_url = "http://127.0.0.1:5561/send"
send_timeout_ms = 1000

[security]
hardened = true
callback_secret = "s3cret"
"#,
        )
        .unwrap();
        assert_eq!(loaded.sidecar.send_timeout, Duration::from_secs(1));
        assert!(loaded.security.authorize(Some("s3cret")));
        assert_eq!(loaded.tasks.prefix, "/stream/tasks");
    }

    #[test]
    fn test_send_timeout_must_undercut_callback_timeout() {
        let err = process(
            r#"
[sidecar]
send_url = "http://127.0.0.1:5561/send"
send_timeout_ms = 5000
callback_timeout_ms = 5000
"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_hardened_requires_secret() {
        let err = process(
            r#"
[sidecar]
send_url = "http://127.0.0.1:5561/send"

[security]
hardened = true
"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_duplicate_prefix_is_rejected() {
        let err = process(
            r#"
[sidecar]
send_url = "http://127.0.0.1:5561/send"

[streams.tasks]
prefix = "/stream"
id_param = "task_id"

[streams.versions]
prefix = "/stream"
id_param = "lookup_id"
"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_zero_max_pending_is_rejected() {
        let err = process(
            r#"
[sidecar]
send_url = "http://127.0.0.1:5561/send"

[streams.versions]
prefix = "/stream/versions"
id_param = "lookup_id"
max_pending = 0
"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(msg) if msg.contains("max_pending")));
    }

    #[test]
    fn test_shadowing_prefix_is_rejected() {
        let err = process(
            r#"
[sidecar]
send_url = "http://127.0.0.1:5561/send"

[streams.tasks]
prefix = "/stream"
id_param = "task_id"

[streams.versions]
prefix = "/stream/versions"
id_param = "lookup_id"
"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(msg) if msg.contains("shadows")));

        // The reverse order is reachable: the longer prefix is tried first.
        let loaded = process(
            r#"
[sidecar]
send_url = "http://127.0.0.1:5561/send"

[streams.tasks]
prefix = "/stream/tasks"
id_param = "task_id"

[streams.versions]
prefix = "/stream"
id_param = "lookup_id"
"#,
        );
        assert!(loaded.is_ok());
    }

    #[test]
    fn test_listen_override_and_restart_detection() {
        let file_config: FileConfig = toml::from_str(
            r#"
[sidecar]
send_url = "http://127.0.0.1:5561/send"
"#,
        )
        .unwrap();
        let base = ConfigLoader::new("unused.toml", None)
            .process(file_config.clone())
            .unwrap();
        let overridden = ConfigLoader::new("unused.toml", Some("127.0.0.1:9999".parse().unwrap()))
            .process(file_config)
            .unwrap();
        assert_eq!(overridden.listen.port(), 9999);
        assert!(base.needs_restart(&overridden));
        assert!(!base.needs_restart(&base.clone()));
    }
}
