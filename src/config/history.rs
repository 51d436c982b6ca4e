//! Event log storage configuration.

use serde::Deserialize;

/// Event log configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct HistoryConfig {
    /// Whether events are persisted for offline catch-up.
    #[serde(default)]
    pub enabled: bool,
    /// Backend type: "redb", "memory", "none".
    #[serde(default = "default_history_backend")]
    pub backend: String,
    /// Path to the redb file.
    #[serde(default = "default_history_path")]
    pub path: String,
    /// Days of history kept by the daily prune.
    #[serde(default = "default_retention_days")]
    pub retention_days: u64,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            backend: default_history_backend(),
            path: default_history_path(),
            retention_days: default_retention_days(),
        }
    }
}

fn default_history_backend() -> String {
    "redb".to_string()
}

fn default_history_path() -> String {
    "history.redb".to_string()
}

fn default_retention_days() -> u64 {
    30
}
