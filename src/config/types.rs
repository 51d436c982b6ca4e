//! Core configuration types and loading.

use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

use super::history::HistoryConfig;
use super::listen::{ListenConfig, TlsConfig};
use super::session::{BrokerConfig, SessionConfig};
use super::validation::{self, ValidationError};

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {}", join_errors(.0))]
    Invalid(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Daemon configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Server identity.
    pub server: ServerConfig,
    /// WebSocket listener.
    pub listen: ListenConfig,
    /// Optional TLS (wss) settings for the listener.
    pub tls: Option<TlsConfig>,
    /// SQLite directory store. Absent keeps users, rooms and presence in memory.
    pub database: Option<DatabaseConfig>,
    /// Event log configuration.
    #[serde(default)]
    pub history: HistoryConfig,
    /// Session engine tuning.
    #[serde(default)]
    pub session: SessionConfig,
    /// In-process broker tuning.
    #[serde(default)]
    pub broker: BrokerConfig,
}

impl Config {
    /// Load and validate configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        validation::validate(&config).map_err(ConfigError::Invalid)?;
        Ok(config)
    }
}

/// Server identity configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Instance name, used in logs.
    pub name: String,
    /// Topic namespace: per-user topics are `<service>.<uid>`.
    #[serde(default = "default_service")]
    pub service: String,
    /// Prometheus/admin HTTP port (default: 9090, 0 disables).
    pub metrics_port: Option<u16>,
}

fn default_service() -> String {
    "chat".to_string()
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to SQLite database file.
    pub path: String,
}

pub(super) fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
[server]
name = "chat-1"

[listen]
address = "127.0.0.1:8080"
"#,
        )
        .unwrap();
        assert_eq!(config.server.service, "chat");
        assert_eq!(config.listen.path, "/chat/stream");
        assert!(config.database.is_none());
        assert!(!config.history.enabled);
        assert_eq!(config.session.primary_platform, "mobile");
        assert_eq!(config.session.heartbeat_secs, 3);
        assert_eq!(config.broker.retention, 10_000);
    }

    #[test]
    fn load_rejects_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(
            &path,
            r#"
[server]
name = ""

[listen]
address = "127.0.0.1:8080"
"#,
        )
        .unwrap();
        assert!(matches!(Config::load(&path), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn load_missing_file_is_io_error() {
        assert!(matches!(
            Config::load("/nonexistent/chatd.toml"),
            Err(ConfigError::Io(_))
        ));
    }
}
