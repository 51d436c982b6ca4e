//! No-op history provider that discards all events.
//!
//! Used when history storage is disabled. Offline catch-up then returns
//! nothing and the send path skips persistence.

use super::{HistoryError, HistoryProvider};
use async_trait::async_trait;
use chat_proto::Event;
use std::time::Duration;

pub struct NoOpProvider;

#[async_trait]
impl HistoryProvider for NoOpProvider {
    async fn store(&self, _event: &Event, _recipients: &[String]) -> Result<(), HistoryError> {
        Ok(())
    }

    async fn contains(&self, _id: &str) -> Result<bool, HistoryError> {
        Ok(false)
    }

    async fn remove(&self, _id: &str) -> Result<bool, HistoryError> {
        Ok(false)
    }

    async fn read_since(&self, _uid: &str, _since: i64) -> Result<Vec<Event>, HistoryError> {
        Ok(vec![])
    }

    async fn prune(&self, _retention: Duration) -> Result<usize, HistoryError> {
        Ok(0)
    }
}
