//! Configuration validation.
//!
//! Validates configuration at startup to catch common errors early.

use super::Config;
use std::path::Path;
use thiserror::Error;

/// Validation errors for configuration.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("server.name is required")]
    MissingServerName,
    #[error("server.service must be non-empty and contain no '.' or '/', got '{0}'")]
    InvalidService(String),
    #[error("listen.path must start with '/', got '{0}'")]
    InvalidPath(String),
    #[error("session.primary_platform must be non-empty and not 'all'")]
    InvalidPrimaryPlatform,
    #[error("session.{0} must be greater than zero")]
    ZeroSessionValue(&'static str),
    #[error("broker.{0} must be greater than zero")]
    ZeroBrokerValue(&'static str),
    #[error("tls.cert_path does not exist: {0}")]
    TlsCertNotFound(String),
    #[error("tls.key_path does not exist: {0}")]
    TlsKeyNotFound(String),
    #[error("database.path parent directory does not exist: {0}")]
    DatabasePathInvalid(String),
    #[error("history.backend must be one of redb, memory, none; got '{0}'")]
    UnknownHistoryBackend(String),
    #[error("history.path parent directory does not exist: {0}")]
    HistoryPathInvalid(String),
}

/// Validate a configuration, returning all errors found.
pub fn validate(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.server.name.is_empty() {
        errors.push(ValidationError::MissingServerName);
    }
    let service = &config.server.service;
    if service.is_empty() || service.contains(['.', '/']) {
        errors.push(ValidationError::InvalidService(service.clone()));
    }
    if !config.listen.path.starts_with('/') {
        errors.push(ValidationError::InvalidPath(config.listen.path.clone()));
    }

    let session = &config.session;
    if session.primary_platform.is_empty() || session.primary_platform == "all" {
        errors.push(ValidationError::InvalidPrimaryPlatform);
    }
    if session.heartbeat_secs == 0 {
        errors.push(ValidationError::ZeroSessionValue("heartbeat_secs"));
    }
    if session.outbound_queue == 0 {
        errors.push(ValidationError::ZeroSessionValue("outbound_queue"));
    }
    if config.broker.retention == 0 {
        errors.push(ValidationError::ZeroBrokerValue("retention"));
    }
    if config.broker.subscriber_buffer == 0 {
        errors.push(ValidationError::ZeroBrokerValue("subscriber_buffer"));
    }

    if let Some(ref tls) = config.tls {
        if !Path::new(&tls.cert_path).exists() {
            errors.push(ValidationError::TlsCertNotFound(tls.cert_path.clone()));
        }
        if !Path::new(&tls.key_path).exists() {
            errors.push(ValidationError::TlsKeyNotFound(tls.key_path.clone()));
        }
    }

    if let Some(ref db) = config.database
        && !parent_exists(&db.path)
    {
        errors.push(ValidationError::DatabasePathInvalid(db.path.clone()));
    }
    if !matches!(config.history.backend.as_str(), "redb" | "memory" | "none") {
        errors.push(ValidationError::UnknownHistoryBackend(
            config.history.backend.clone(),
        ));
    }
    if config.history.enabled
        && config.history.backend == "redb"
        && !parent_exists(&config.history.path)
    {
        errors.push(ValidationError::HistoryPathInvalid(
            config.history.path.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn parent_exists(path: &str) -> bool {
    match Path::new(path).parent() {
        Some(parent) => parent.as_os_str().is_empty() || parent.exists(),
        None => true,
    }
}
