//! Offline catch-up for sessions without durable delivery.

use crate::repo::Repository;
use crate::state::session::Outbound;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Read `uid`'s event log from `since` and push it into the session's
/// outbound queue. Runs beside live delivery; no ordering is imposed
/// between the two.
pub fn spawn_catch_up(
    repo: Arc<dyn Repository>,
    uid: String,
    since: i64,
    queue: mpsc::Sender<Outbound>,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let events = tokio::select! {
            _ = shutdown.cancelled() => return,
            events = repo.read(&uid, since) => events,
        };
        let events = match events {
            Ok(events) => events,
            Err(e) => {
                warn!(user = %uid, since, error = %e, "Catch-up read failed");
                return;
            }
        };
        let total = events.len();
        for event in events {
            tokio::select! {
                _ = shutdown.cancelled() => return,
                sent = queue.send(Outbound::new(event)) => {
                    if sent.is_err() {
                        return;
                    }
                }
            }
        }
        debug!(user = %uid, since, events = total, "Catch-up complete");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::memory::MemoryHistory;
    use crate::repo::MemoryRepository;
    use chat_proto::{Event, EventType, User};

    #[tokio::test]
    async fn replays_from_watermark() {
        let repo = Arc::new(MemoryRepository::new(Arc::new(MemoryHistory::new())));
        for id in ["alice", "carol"] {
            repo.create_user(&User {
                id: id.into(),
                name: id.into(),
            })
            .await
            .unwrap();
        }
        let t = 1_000;
        for (id, created) in [("old", t - 10), ("at", t), ("new", t + 5)] {
            let mut event = Event::new(EventType::Message, "alice", "carol", id);
            event.id = id.into();
            event.created = created;
            repo.write(&event, &["carol".to_string()]).await.unwrap();
        }

        let (tx, mut rx) = mpsc::channel(8);
        spawn_catch_up(repo, "carol".into(), t, tx, CancellationToken::new())
            .await
            .unwrap();

        let mut ids = Vec::new();
        while let Some(outbound) = rx.recv().await {
            assert!(outbound.ack.is_none());
            ids.push(outbound.event.id);
        }
        assert_eq!(ids, vec!["at", "new"]);
    }

    #[tokio::test]
    async fn cancelled_before_read_pushes_nothing() {
        let repo = Arc::new(MemoryRepository::new(Arc::new(MemoryHistory::new())));
        let (tx, mut rx) = mpsc::channel(8);
        let shutdown = CancellationToken::new();
        shutdown.cancel();
        spawn_catch_up(repo, "carol".into(), 0, tx, shutdown)
            .await
            .unwrap();
        assert!(rx.recv().await.is_none());
    }
}
