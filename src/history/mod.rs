//! Event log abstraction.
//!
//! Each stored event is referenced from the ordered log of every recipient.
//! A reference whose event record has been removed is skipped on read.

use async_trait::async_trait;
use chat_proto::Event;
use std::time::Duration;
use thiserror::Error;

pub mod memory;
pub mod noop;
pub mod redb;

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Database error: {0}")]
    Database(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
}

#[async_trait]
pub trait HistoryProvider: Send + Sync {
    /// Store an event and reference it from each recipient's log.
    async fn store(&self, event: &Event, recipients: &[String]) -> Result<(), HistoryError>;

    /// Whether an event record with this id is stored.
    async fn contains(&self, id: &str) -> Result<bool, HistoryError>;

    /// Delete an event record. Returns whether it existed.
    async fn remove(&self, id: &str) -> Result<bool, HistoryError>;

    /// Events referenced by `uid` created at or after `since`, oldest first.
    /// References strictly older than `since` are dropped.
    async fn read_since(&self, uid: &str, since: i64) -> Result<Vec<Event>, HistoryError>;

    /// Prune events older than `retention` (maintenance).
    async fn prune(&self, retention: Duration) -> Result<usize, HistoryError>;
}

/// Log key for a reference: fixed-width timestamp keeps keys in time order.
pub(crate) fn ref_key(uid: &str, created: i64, id: &str) -> String {
    format!("{}\0{:020}\0{}", uid, created.max(0), id)
}
