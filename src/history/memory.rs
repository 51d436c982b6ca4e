//! In-memory event log for single-process deployments and tests.

use super::{HistoryError, HistoryProvider, ref_key};
use async_trait::async_trait;
use chat_proto::Event;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::time::Duration;

#[derive(Default)]
pub struct MemoryHistory {
    events: DashMap<String, Event>,
    refs: Mutex<BTreeSet<String>>,
}

impl MemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HistoryProvider for MemoryHistory {
    async fn store(&self, event: &Event, recipients: &[String]) -> Result<(), HistoryError> {
        self.events.insert(event.id.clone(), event.clone());
        let mut refs = self.refs.lock();
        for uid in recipients {
            refs.insert(ref_key(uid, event.created, &event.id));
        }
        Ok(())
    }

    async fn contains(&self, id: &str) -> Result<bool, HistoryError> {
        Ok(self.events.contains_key(id))
    }

    async fn remove(&self, id: &str) -> Result<bool, HistoryError> {
        Ok(self.events.remove(id).is_some())
    }

    async fn read_since(&self, uid: &str, since: i64) -> Result<Vec<Event>, HistoryError> {
        let user_start = format!("{}\0", uid);
        let user_end = format!("{}\u{1}", uid);
        let since_key = format!("{}\0{:020}\0", uid, since.max(0));

        let mut refs = self.refs.lock();
        let ids: Vec<String> = refs
            .range(since_key.clone()..user_end)
            .filter_map(|key| key.rsplit('\0').next().map(str::to_string))
            .collect();

        let stale: Vec<String> = refs.range(user_start..since_key).cloned().collect();
        for key in stale {
            refs.remove(&key);
        }
        drop(refs);

        Ok(ids
            .iter()
            .filter_map(|id| self.events.get(id).map(|e| e.value().clone()))
            .collect())
    }

    async fn prune(&self, retention: Duration) -> Result<usize, HistoryError> {
        let cutoff = chrono::Utc::now().timestamp() - retention.as_secs() as i64;
        let before = self.events.len();
        self.events.retain(|_, event| event.created >= cutoff);
        self.refs.lock().retain(|key| {
            key.split('\0')
                .nth(1)
                .and_then(|ts| ts.parse::<i64>().ok())
                .is_none_or(|ts| ts >= cutoff)
        });
        Ok(before - self.events.len())
    }
}
