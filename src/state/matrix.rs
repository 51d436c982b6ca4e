//! The Matrix - shared services every session task works against.
//!
//! Built once at startup and handed to the gateway behind an `Arc`. Nothing
//! in here is mutable; the live session set belongs to the [`Hub`] actor.

use crate::broker::Broker;
use crate::config::SessionConfig;
use crate::repo::Repository;
use crate::routing::Dispatcher;
use crate::state::{ConflictResolver, Hub, HubHandle, SubscriptionBridge};
use chat_proto::Topics;
use std::sync::Arc;

const HUB_BUFFER: usize = 1024;

pub struct Matrix {
    pub repo: Arc<dyn Repository>,
    pub broker: Arc<dyn Broker>,
    pub topics: Topics,
    pub dispatcher: Dispatcher,
    pub hub: HubHandle,
    pub bridge: SubscriptionBridge,
    pub resolver: ConflictResolver,
    pub session: SessionConfig,
}

impl Matrix {
    /// Wire the engine together and spawn the hub actor.
    ///
    /// `persist` turns on event log writes in the send path.
    pub fn new(
        repo: Arc<dyn Repository>,
        broker: Arc<dyn Broker>,
        topics: Topics,
        session: SessionConfig,
        persist: bool,
    ) -> Self {
        let dispatcher = Dispatcher::new(repo.clone(), broker.clone(), topics.clone(), persist);
        let bridge = SubscriptionBridge::new(broker.clone(), topics.clone(), &session);
        let resolver = ConflictResolver::new(repo.clone(), broker.clone(), topics.clone());
        Self {
            repo,
            broker,
            topics,
            dispatcher,
            hub: Hub::spawn(HUB_BUFFER),
            bridge,
            resolver,
            session,
        }
    }

    /// Whether a session on `platform` should replay the event log at login.
    pub fn wants_catch_up(&self, platform: &str) -> bool {
        self.session.offline_catch_up && !self.bridge.is_primary(platform)
    }
}
