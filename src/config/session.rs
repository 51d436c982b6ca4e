//! Session engine and broker tuning.

use serde::Deserialize;
use std::time::Duration;

use super::types::default_true;

/// Session engine configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Platform that gets durable, acknowledged delivery.
    #[serde(default = "default_primary_platform")]
    pub primary_platform: String,
    /// Health check period in seconds.
    #[serde(default = "default_heartbeat_secs")]
    pub heartbeat_secs: u64,
    /// Retries after a transient attach failure; 0 attaches once.
    #[serde(default = "default_attach_retries")]
    pub attach_retries: u32,
    /// Fixed delay between attach attempts.
    #[serde(default = "default_attach_retry_delay_ms")]
    pub attach_retry_delay_ms: u64,
    /// Capacity of each session's outbound queue.
    #[serde(default = "default_outbound_queue")]
    pub outbound_queue: usize,
    /// Replay the event log for non-primary platforms at login.
    #[serde(default = "default_true")]
    pub offline_catch_up: bool,
}

impl SessionConfig {
    pub fn heartbeat(&self) -> Duration {
        Duration::from_secs(self.heartbeat_secs)
    }

    pub fn attach_retry_delay(&self) -> Duration {
        Duration::from_millis(self.attach_retry_delay_ms)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            primary_platform: default_primary_platform(),
            heartbeat_secs: default_heartbeat_secs(),
            attach_retries: default_attach_retries(),
            attach_retry_delay_ms: default_attach_retry_delay_ms(),
            outbound_queue: default_outbound_queue(),
            offline_catch_up: true,
        }
    }
}

fn default_primary_platform() -> String {
    "mobile".to_string()
}

fn default_heartbeat_secs() -> u64 {
    3
}

fn default_attach_retries() -> u32 {
    3
}

fn default_attach_retry_delay_ms() -> u64 {
    200
}

fn default_outbound_queue() -> usize {
    256
}

/// In-process broker configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct BrokerConfig {
    /// Messages retained per topic for replay.
    #[serde(default = "default_retention")]
    pub retention: usize,
    /// Per-subscriber delivery buffer.
    #[serde(default = "default_subscriber_buffer")]
    pub subscriber_buffer: usize,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            retention: default_retention(),
            subscriber_buffer: default_subscriber_buffer(),
        }
    }
}

fn default_retention() -> usize {
    10_000
}

fn default_subscriber_buffer() -> usize {
    1024
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.heartbeat(), Duration::from_secs(3));
        assert_eq!(config.attach_retries, 3);
        assert_eq!(config.attach_retry_delay(), Duration::from_millis(200));
        assert!(config.offline_catch_up);
    }

    #[test]
    fn partial_table_keeps_other_defaults() {
        let config: SessionConfig = toml::from_str(r#"primary_platform = "desktop""#).unwrap();
        assert_eq!(config.primary_platform, "desktop");
        assert_eq!(config.outbound_queue, 256);
    }
}
