//! Session registry (hub).
//!
//! The set of live sessions is owned by a single actor task and mutated
//! only through [`HubCommand`] messages. Broker and repository calls never
//! run inside the actor.
//!
//! # Architecture
//!
//! - **Register / Unregister**: sent by connection tasks around their
//!   Running phase. Register is acknowledged so presence is only written
//!   once the session is visible. Unregister replies with how many sessions
//!   remain for the same (user, platform), so the caller only records the
//!   pair offline when none do.
//! - **Shutdown**: signals matching sessions to close without waiting for
//!   them; driven by the control topic watcher. The session that issued a
//!   kick is spared, even if it registered before the kick arrived.
//! - **Count**: live sessions for a (user, platform).

use crate::broker::{Broker, BrokerError, StartPosition, SubscribeOptions};
use crate::error::SessionError;
use crate::metrics;
use crate::state::session::{SessionHandle, SessionId};
use chat_proto::{ControlMessage, PlatformTarget, Topics};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub enum HubCommand {
    Register {
        handle: SessionHandle,
        reply: oneshot::Sender<()>,
    },
    Unregister {
        id: SessionId,
        reply: oneshot::Sender<usize>,
    },
    Shutdown {
        user: String,
        target: PlatformTarget,
        spare: Option<SessionId>,
        reply: Option<oneshot::Sender<usize>>,
    },
    Count {
        user: String,
        platform: String,
        reply: oneshot::Sender<usize>,
    },
    Sessions {
        reply: oneshot::Sender<Vec<SessionHandle>>,
    },
}

/// The registry actor.
pub struct Hub {
    sessions: HashMap<SessionId, SessionHandle>,
}

impl Hub {
    /// Spawn the actor and return its handle.
    pub fn spawn(buffer: usize) -> HubHandle {
        let (tx, rx) = mpsc::channel(buffer);
        let hub = Self {
            sessions: HashMap::new(),
        };
        tokio::spawn(async move {
            hub.run(rx).await;
        });
        HubHandle { tx }
    }

    async fn run(mut self, mut rx: mpsc::Receiver<HubCommand>) {
        while let Some(command) = rx.recv().await {
            self.handle(command);
        }
        debug!(remaining = self.sessions.len(), "Hub stopped");
    }

    fn handle(&mut self, command: HubCommand) {
        match command {
            HubCommand::Register { handle, reply } => {
                info!(user = %handle.user, platform = %handle.platform, session = %handle.id, "Session registered");
                metrics::session_opened();
                self.sessions.insert(handle.id, handle);
                let _ = reply.send(());
            }
            HubCommand::Unregister { id, reply } => {
                let remaining = match self.sessions.remove(&id) {
                    Some(handle) => {
                        metrics::session_closed();
                        info!(user = %handle.user, platform = %handle.platform, session = %id, "Session unregistered");
                        self.count(&handle.user, &handle.platform)
                    }
                    None => 0,
                };
                let _ = reply.send(remaining);
            }
            HubCommand::Shutdown {
                user,
                target,
                spare,
                reply,
            } => {
                let mut signaled = 0;
                for handle in self.sessions.values() {
                    if spare == Some(handle.id) {
                        debug!(user = %user, session = %handle.id, "Sparing session that issued the kick");
                        continue;
                    }
                    if handle.matches(&user, &target) && !handle.is_closed() {
                        info!(user = %user, platform = %handle.platform, session = %handle.id, "Forcing session closed");
                        handle.close();
                        metrics::inc_counter(&metrics::EVICTIONS);
                        signaled += 1;
                    }
                }
                if let Some(reply) = reply {
                    let _ = reply.send(signaled);
                }
            }
            HubCommand::Count {
                user,
                platform,
                reply,
            } => {
                let _ = reply.send(self.count(&user, &platform));
            }
            HubCommand::Sessions { reply } => {
                let _ = reply.send(self.sessions.values().cloned().collect());
            }
        }
    }

    fn count(&self, user: &str, platform: &str) -> usize {
        self.sessions
            .values()
            .filter(|h| h.user == user && h.platform == platform)
            .count()
    }
}

/// Cloneable sender side of the hub.
#[derive(Clone)]
pub struct HubHandle {
    tx: mpsc::Sender<HubCommand>,
}

impl HubHandle {
    /// Admit a session; resolves once the hub has recorded it.
    pub async fn register(&self, handle: SessionHandle) -> Result<(), SessionError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(HubCommand::Register { handle, reply })
            .await
            .map_err(|_| SessionError::HubClosed)?;
        rx.await.map_err(|_| SessionError::HubClosed)
    }

    /// Remove a session; returns how many remain for its (user, platform).
    pub async fn unregister(&self, id: SessionId) -> Result<usize, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(HubCommand::Unregister { id, reply })
            .await
            .map_err(|_| SessionError::HubClosed)?;
        rx.await.map_err(|_| SessionError::HubClosed)
    }

    /// Signal every local session of `user` covered by `target`, except
    /// `spare`. Returns how many were signaled.
    pub async fn shutdown(
        &self,
        user: &str,
        target: PlatformTarget,
        spare: Option<SessionId>,
    ) -> usize {
        let (reply, rx) = oneshot::channel();
        let command = HubCommand::Shutdown {
            user: user.to_string(),
            target,
            spare,
            reply: Some(reply),
        };
        if self.tx.send(command).await.is_err() {
            return 0;
        }
        rx.await.unwrap_or(0)
    }

    /// Live sessions for (user, platform); 0 if the hub is gone.
    pub async fn count(&self, user: &str, platform: &str) -> usize {
        let (reply, rx) = oneshot::channel();
        let command = HubCommand::Count {
            user: user.to_string(),
            platform: platform.to_string(),
            reply,
        };
        if self.tx.send(command).await.is_err() {
            return 0;
        }
        rx.await.unwrap_or(0)
    }

    pub async fn sessions(&self) -> Vec<SessionHandle> {
        let (reply, rx) = oneshot::channel();
        if self.tx.send(HubCommand::Sessions { reply }).await.is_err() {
            return Vec::new();
        }
        rx.await.unwrap_or_default()
    }

    /// Subscribe to the service-wide control topic and apply every control
    /// message to the local sessions. Malformed payloads are logged and
    /// skipped. Runs until `cancel` fires or the subscription ends.
    pub async fn watch_control(
        &self,
        broker: Arc<dyn Broker>,
        topics: &Topics,
        cancel: CancellationToken,
    ) -> Result<JoinHandle<()>, BrokerError> {
        let subscription = broker
            .subscribe(
                topics.control(),
                SubscribeOptions::transient(StartPosition::New),
            )
            .await?;
        let hub = self.clone();

        Ok(tokio::spawn(async move {
            let mut deliveries = subscription.deliveries;
            loop {
                let delivery = tokio::select! {
                    _ = cancel.cancelled() => break,
                    delivery = deliveries.recv() => delivery,
                };
                let Some(delivery) = delivery else {
                    warn!("Control subscription ended");
                    break;
                };
                match ControlMessage::from_bytes(&delivery.data) {
                    Ok(control) => {
                        let spare = control.issuer.as_deref().and_then(|s| s.parse().ok());
                        let signaled = hub
                            .shutdown(&control.id, control.platform.clone(), spare)
                            .await;
                        debug!(user = %control.id, platform = %control.platform, signaled, "Control message applied");
                    }
                    Err(e) => {
                        warn!(error = %e, "Malformed control message skipped");
                    }
                }
            }
            if let Err(e) = subscription.control.close().await {
                warn!(error = %e, "Failed to close control subscription");
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::MemoryBroker;
    use bytes::Bytes;
    use std::time::Duration;

    #[tokio::test]
    async fn unregister_reports_remaining_for_pair() {
        let hub = Hub::spawn(16);
        let first = SessionHandle::new("bob", "mobile");
        let second = SessionHandle::new("bob", "mobile");
        let web = SessionHandle::new("bob", "web");
        hub.register(first.clone()).await.unwrap();
        hub.register(second.clone()).await.unwrap();
        hub.register(web.clone()).await.unwrap();

        assert_eq!(hub.unregister(first.id).await.unwrap(), 1);
        assert_eq!(hub.unregister(second.id).await.unwrap(), 0);
        assert_eq!(hub.sessions().await.len(), 1);
    }

    #[tokio::test]
    async fn shutdown_targets_platform_or_all() {
        let hub = Hub::spawn(16);
        let mobile = SessionHandle::new("bob", "mobile");
        let web = SessionHandle::new("bob", "web");
        let alice = SessionHandle::new("alice", "mobile");
        for h in [&mobile, &web, &alice] {
            hub.register(h.clone()).await.unwrap();
        }

        assert_eq!(hub.shutdown("bob", PlatformTarget::from("mobile"), None).await, 1);
        assert!(mobile.is_closed());
        assert!(!web.is_closed());

        assert_eq!(hub.shutdown("bob", PlatformTarget::All, None).await, 1);
        assert!(web.is_closed());
        assert!(!alice.is_closed());
    }

    #[tokio::test]
    async fn control_topic_signals_sessions() {
        let broker: Arc<dyn Broker> = Arc::new(MemoryBroker::new(100, 16));
        let topics = Topics::new("chat");
        let hub = Hub::spawn(16);
        let cancel = CancellationToken::new();
        let task = hub
            .watch_control(broker.clone(), &topics, cancel.clone())
            .await
            .unwrap();

        let session = SessionHandle::new("bob", "mobile");
        hub.register(session.clone()).await.unwrap();

        broker
            .publish(topics.control(), Bytes::from_static(b"{\"id\": 42}"))
            .await
            .unwrap();
        let kick = ControlMessage::kick("bob", "mobile").to_bytes().unwrap();
        broker.publish(topics.control(), Bytes::from(kick)).await.unwrap();

        tokio::time::timeout(Duration::from_secs(1), session.shutdown_token().cancelled())
            .await
            .expect("session was not signaled");

        cancel.cancel();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn same_platform_takeover_spares_the_new_session() {
        let hub = Hub::spawn(16);
        let old = SessionHandle::new("bob", "web");
        let new = SessionHandle::new("bob", "web");
        // the new login is admitted before its kick is applied
        hub.register(old.clone()).await.unwrap();
        hub.register(new.clone()).await.unwrap();

        let signaled = hub
            .shutdown("bob", PlatformTarget::from("web"), Some(new.id))
            .await;
        assert_eq!(signaled, 1);
        assert!(old.is_closed());
        assert!(!new.is_closed());

        assert_eq!(hub.unregister(old.id).await.unwrap(), 1);
        assert_eq!(hub.count("bob", "web").await, 1);
    }

    #[tokio::test]
    async fn control_kick_skips_its_issuer() {
        let broker: Arc<dyn Broker> = Arc::new(MemoryBroker::new(100, 16));
        let topics = Topics::new("chat");
        let hub = Hub::spawn(16);
        let cancel = CancellationToken::new();
        let task = hub
            .watch_control(broker.clone(), &topics, cancel.clone())
            .await
            .unwrap();

        let old = SessionHandle::new("bob", "mobile");
        let new = SessionHandle::new("bob", "mobile");
        hub.register(old.clone()).await.unwrap();
        hub.register(new.clone()).await.unwrap();

        let kick = ControlMessage::kick("bob", "mobile")
            .issued_by(new.id.to_string())
            .to_bytes()
            .unwrap();
        broker.publish(topics.control(), Bytes::from(kick)).await.unwrap();

        tokio::time::timeout(Duration::from_secs(1), old.shutdown_token().cancelled())
            .await
            .expect("old session was not signaled");
        assert!(!new.is_closed());
        assert_eq!(hub.count("bob", "mobile").await, 2);

        cancel.cancel();
        task.await.unwrap();
    }
}
