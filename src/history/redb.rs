//! Redb-backed event log.
//!
//! Implements [`HistoryProvider`] with two tables: event records keyed by
//! id, and per-user references keyed by `uid \0 created \0 id` so a user's
//! log is a single ordered range.

use super::{HistoryError, HistoryProvider, ref_key};
use async_trait::async_trait;
use chat_proto::Event;
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use std::sync::Arc;
use std::time::Duration;

const EVENTS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("events");
const REFS_TABLE: TableDefinition<&str, &str> = TableDefinition::new("user_refs");

fn db_err(e: impl std::fmt::Display) -> HistoryError {
    HistoryError::Database(e.to_string())
}

pub struct RedbProvider {
    db: Arc<Database>,
}

impl RedbProvider {
    pub fn new(path: &str) -> Result<Self, HistoryError> {
        let db = Database::create(path).map_err(db_err)?;

        // Create both tables up front so read transactions never miss them.
        let write_txn = db.begin_write().map_err(db_err)?;
        {
            write_txn.open_table(EVENTS_TABLE).map_err(db_err)?;
            write_txn.open_table(REFS_TABLE).map_err(db_err)?;
        }
        write_txn.commit().map_err(db_err)?;

        Ok(Self { db: Arc::new(db) })
    }

    /// Range bounds covering every reference of `uid`.
    fn user_range(uid: &str) -> (String, String) {
        (format!("{}\0", uid), format!("{}\u{1}", uid))
    }
}

#[async_trait]
impl HistoryProvider for RedbProvider {
    async fn store(&self, event: &Event, recipients: &[String]) -> Result<(), HistoryError> {
        let value =
            serde_json::to_vec(event).map_err(|e| HistoryError::Serialization(e.to_string()))?;

        let write_txn = self.db.begin_write().map_err(db_err)?;
        {
            let mut events = write_txn.open_table(EVENTS_TABLE).map_err(db_err)?;
            events
                .insert(event.id.as_str(), value.as_slice())
                .map_err(db_err)?;

            let mut refs = write_txn.open_table(REFS_TABLE).map_err(db_err)?;
            for uid in recipients {
                let key = ref_key(uid, event.created, &event.id);
                refs.insert(key.as_str(), event.id.as_str())
                    .map_err(db_err)?;
            }
        }
        write_txn.commit().map_err(db_err)?;
        Ok(())
    }

    async fn contains(&self, id: &str) -> Result<bool, HistoryError> {
        let read_txn = self.db.begin_read().map_err(db_err)?;
        let events = read_txn.open_table(EVENTS_TABLE).map_err(db_err)?;
        Ok(events.get(id).map_err(db_err)?.is_some())
    }

    async fn remove(&self, id: &str) -> Result<bool, HistoryError> {
        let write_txn = self.db.begin_write().map_err(db_err)?;
        let existed = {
            let mut events = write_txn.open_table(EVENTS_TABLE).map_err(db_err)?;
            events.remove(id).map_err(db_err)?.is_some()
        };
        write_txn.commit().map_err(db_err)?;
        Ok(existed)
    }

    async fn read_since(&self, uid: &str, since: i64) -> Result<Vec<Event>, HistoryError> {
        let (user_start, user_end) = Self::user_range(uid);
        let since_key = format!("{}\0{:020}\0", uid, since.max(0));

        let mut result = Vec::new();
        {
            let read_txn = self.db.begin_read().map_err(db_err)?;
            let refs = read_txn.open_table(REFS_TABLE).map_err(db_err)?;
            let events = read_txn.open_table(EVENTS_TABLE).map_err(db_err)?;

            for item in refs
                .range(since_key.as_str()..user_end.as_str())
                .map_err(db_err)?
            {
                let (_k, v) = item.map_err(db_err)?;
                let Some(record) = events.get(v.value()).map_err(db_err)? else {
                    continue;
                };
                let event: Event = serde_json::from_slice(record.value())
                    .map_err(|e| HistoryError::Serialization(e.to_string()))?;
                result.push(event);
            }
        }

        if since > 0 {
            let write_txn = self.db.begin_write().map_err(db_err)?;
            {
                let mut refs = write_txn.open_table(REFS_TABLE).map_err(db_err)?;
                let mut stale = Vec::new();
                for item in refs
                    .range(user_start.as_str()..since_key.as_str())
                    .map_err(db_err)?
                {
                    let (k, _v) = item.map_err(db_err)?;
                    stale.push(k.value().to_string());
                }
                for key in stale {
                    refs.remove(key.as_str()).map_err(db_err)?;
                }
            }
            write_txn.commit().map_err(db_err)?;
        }

        Ok(result)
    }

    async fn prune(&self, retention: Duration) -> Result<usize, HistoryError> {
        let cutoff = chrono::Utc::now().timestamp() - retention.as_secs() as i64;

        let write_txn = self.db.begin_write().map_err(db_err)?;
        let mut count = 0;
        {
            let mut events = write_txn.open_table(EVENTS_TABLE).map_err(db_err)?;
            let mut expired = Vec::new();
            for item in events.iter().map_err(db_err)? {
                let (k, v) = item.map_err(db_err)?;
                // Unreadable records are dropped along with expired ones.
                let created = serde_json::from_slice::<Event>(v.value())
                    .map(|e| e.created)
                    .unwrap_or(0);
                if created < cutoff {
                    expired.push(k.value().to_string());
                }
            }
            for id in expired {
                events.remove(id.as_str()).map_err(db_err)?;
                count += 1;
            }

            let mut refs = write_txn.open_table(REFS_TABLE).map_err(db_err)?;
            let mut stale = Vec::new();
            for item in refs.iter().map_err(db_err)? {
                let (k, _v) = item.map_err(db_err)?;
                let key_str = k.value();
                let parts: Vec<&str> = key_str.split('\0').collect();
                if parts.len() >= 2
                    && let Ok(ts) = parts[1].parse::<i64>()
                    && ts < cutoff
                {
                    stale.push(key_str.to_string());
                }
            }
            for key in stale {
                refs.remove(key.as_str()).map_err(db_err)?;
            }
        }
        write_txn.commit().map_err(db_err)?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chat_proto::EventType;

    fn provider() -> (tempfile::TempDir, RedbProvider) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.redb");
        let provider = RedbProvider::new(path.to_str().unwrap()).unwrap();
        (dir, provider)
    }

    fn event(id: &str, created: i64) -> Event {
        Event {
            id: id.to_string(),
            from: "alice".into(),
            to: "carol".into(),
            kind: EventType::Message,
            body: id.to_string(),
            created,
        }
    }

    #[tokio::test]
    async fn read_since_is_inclusive_and_prunes_older() {
        let (_dir, history) = provider();
        let t = 1_700_000_000;
        for (id, created) in [("old", t - 10), ("at", t), ("new", t + 5)] {
            history
                .store(&event(id, created), &["carol".to_string()])
                .await
                .unwrap();
        }

        let got: Vec<String> = history
            .read_since("carol", t)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(got, vec!["at", "new"]);

        // The older reference is gone even when asking from the beginning.
        let all = history.read_since("carol", 0).await.unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn logs_are_per_recipient() {
        let (_dir, history) = provider();
        history
            .store(&event("e1", 100), &["bob".to_string(), "carol".to_string()])
            .await
            .unwrap();
        history
            .store(&event("e2", 101), &["carol".to_string()])
            .await
            .unwrap();

        assert_eq!(history.read_since("bob", 0).await.unwrap().len(), 1);
        assert_eq!(history.read_since("carol", 0).await.unwrap().len(), 2);
        assert!(history.read_since("dave", 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn removed_events_are_skipped() {
        let (_dir, history) = provider();
        history
            .store(&event("e1", 100), &["carol".to_string()])
            .await
            .unwrap();
        assert!(history.contains("e1").await.unwrap());
        assert!(history.remove("e1").await.unwrap());
        assert!(!history.contains("e1").await.unwrap());
        assert!(!history.remove("e1").await.unwrap());
        assert!(history.read_since("carol", 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn prune_drops_expired_events() {
        let (_dir, history) = provider();
        let now = chrono::Utc::now().timestamp();
        history
            .store(&event("ancient", now - 90 * 86400), &["carol".to_string()])
            .await
            .unwrap();
        history
            .store(&event("fresh", now), &["carol".to_string()])
            .await
            .unwrap();

        let removed = history
            .prune(Duration::from_secs(30 * 86400))
            .await
            .unwrap();
        assert_eq!(removed, 1);
        let left = history.read_since("carol", 0).await.unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].id, "fresh");
    }
}
