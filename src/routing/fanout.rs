//! Topic publishing for a single serialized event.

use crate::broker::{Broker, BrokerError};
use crate::metrics;
use bytes::Bytes;
use chat_proto::{Topics, User};
use tracing::warn;

/// Publishes one payload to per-user topics and the admin mirror.
pub struct Fanout<'a> {
    broker: &'a dyn Broker,
    topics: &'a Topics,
}

impl<'a> Fanout<'a> {
    pub fn new(broker: &'a dyn Broker, topics: &'a Topics) -> Self {
        Self { broker, topics }
    }

    /// Publish to every member's topic. A failing member is logged and
    /// skipped; returns how many publishes succeeded.
    pub async fn to_members(&self, members: &[User], payload: &Bytes) -> usize {
        let mut delivered = 0;
        for member in members {
            let topic = self.topics.user(&member.id);
            match self.broker.publish(&topic, payload.clone()).await {
                Ok(()) => {
                    metrics::record_publish("room");
                    delivered += 1;
                }
                Err(e) => {
                    metrics::record_publish_failure("room");
                    warn!(topic = %topic, error = %e, "Fan-out publish to member failed");
                }
            }
        }
        metrics::record_fanout(members.len());
        delivered
    }

    /// Publish to a single user's topic.
    pub async fn to_user(&self, uid: &str, payload: &Bytes) -> Result<(), BrokerError> {
        self.publish("user", &self.topics.user(uid), payload).await
    }

    /// Publish the monitoring copy.
    pub async fn to_admin(&self, payload: &Bytes) -> Result<(), BrokerError> {
        self.publish("admin", &self.topics.admin(), payload).await
    }

    /// Publish on the service-wide control topic.
    pub async fn to_control(&self, payload: &Bytes) -> Result<(), BrokerError> {
        self.publish("control", self.topics.control(), payload).await
    }

    async fn publish(&self, route: &str, topic: &str, payload: &Bytes) -> Result<(), BrokerError> {
        match self.broker.publish(topic, payload.clone()).await {
            Ok(()) => {
                metrics::record_publish(route);
                Ok(())
            }
            Err(e) => {
                metrics::record_publish_failure(route);
                Err(e)
            }
        }
    }
}
