//! Subscription bridge: binds a session to its per-user topic.
//!
//! The primary platform gets the durable `messages` subscription with
//! manual acknowledgment; every other platform gets a transient one that
//! replays either everything the broker retains or everything from the
//! login watermark.

use crate::broker::{Broker, BrokerError, Delivery, StartPosition, SubscribeOptions, Subscription};
use crate::config::SessionConfig;
use crate::metrics;
use crate::state::session::{Outbound, SessionHandle};
use chat_proto::Topics;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Durable subscription name used for the primary platform.
pub const DURABLE_NAME: &str = "messages";

pub struct SubscriptionBridge {
    broker: Arc<dyn Broker>,
    topics: Topics,
    primary_platform: String,
    attempts: u32,
    retry_delay: Duration,
}

impl SubscriptionBridge {
    pub fn new(broker: Arc<dyn Broker>, topics: Topics, config: &SessionConfig) -> Self {
        Self {
            broker,
            topics,
            primary_platform: config.primary_platform.clone(),
            attempts: config.attach_retries.saturating_add(1),
            retry_delay: config.attach_retry_delay(),
        }
    }

    pub fn is_primary(&self, platform: &str) -> bool {
        self.primary_platform == platform
    }

    pub fn options_for(&self, platform: &str, watermark: Option<i64>) -> SubscribeOptions {
        if self.is_primary(platform) {
            return SubscribeOptions::durable(DURABLE_NAME);
        }
        match watermark {
            Some(since) => SubscribeOptions::transient(StartPosition::AtTime(since)),
            None => SubscribeOptions::transient(StartPosition::AllAvailable),
        }
    }

    /// Subscribe `uid`'s topic for `platform`, retrying transient failures
    /// up to `attach_retries` times with a fixed delay. The last error is
    /// returned once retries run out.
    pub async fn attach(
        &self,
        uid: &str,
        platform: &str,
        watermark: Option<i64>,
    ) -> Result<Subscription, BrokerError> {
        let topic = self.topics.user(uid);
        let options = self.options_for(platform, watermark);
        let mut attempt = 1;
        loop {
            match self.broker.subscribe(&topic, options.clone()).await {
                Ok(subscription) => {
                    debug!(topic = %topic, durable = ?options.durable, attempt, "Subscription attached");
                    return Ok(subscription);
                }
                Err(e) if e.is_transient() && attempt < self.attempts => {
                    metrics::inc_counter(&metrics::ATTACH_RETRIES);
                    info!(user = %uid, platform = %platform, attempt, error = %e, "Attach failed, retrying");
                    tokio::time::sleep(self.retry_delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    warn!(user = %uid, platform = %platform, attempt, error = %e, "Attach failed");
                    return Err(e);
                }
            }
        }
    }

    /// Attach the primary durable for a user that has never logged in, then
    /// detach, so messages published before the first login are retained.
    pub async fn reserve_durable(&self, uid: &str) -> Result<(), BrokerError> {
        let subscription = self.attach(uid, &self.primary_platform, None).await?;
        subscription.close().await
    }

    /// Attach the primary durable and destroy it, releasing retained messages.
    pub async fn release_durable(&self, uid: &str) -> Result<(), BrokerError> {
        let subscription = self.attach(uid, &self.primary_platform, None).await?;
        subscription.unsubscribe().await
    }

    /// Decode deliveries into the session's outbound queue until the session
    /// closes, the subscription ends or a payload fails to decode. The last
    /// two close the session.
    ///
    /// With a watermark, events created before it are dropped: broker replay
    /// is positioned by publish time, the watermark is about creation time.
    pub fn spawn_forwarder(
        mut deliveries: mpsc::Receiver<Delivery>,
        queue: mpsc::Sender<Outbound>,
        handle: SessionHandle,
        watermark: Option<i64>,
    ) -> JoinHandle<()> {
        let shutdown = handle.shutdown_token();
        tokio::spawn(async move {
            loop {
                let delivery = tokio::select! {
                    _ = shutdown.cancelled() => break,
                    delivery = deliveries.recv() => delivery,
                };
                let Some(delivery) = delivery else {
                    debug!(session = %handle.id, "Subscription ended");
                    handle.close();
                    break;
                };
                let event = match chat_proto::decode(&delivery.data) {
                    Ok(event) => event,
                    Err(e) => {
                        // left unacked; a durable redelivers it on next attach
                        warn!(user = %handle.user, platform = %handle.platform, error = %e, "Undecodable broker message, closing session");
                        handle.close();
                        break;
                    }
                };
                if let Some(since) = watermark
                    && event.created < since
                {
                    debug!(id = %event.id, created = event.created, since, "Skipping event older than watermark");
                    continue;
                }
                let outbound = Outbound {
                    event,
                    ack: delivery.ack,
                };
                if queue.send(outbound).await.is_err() {
                    break;
                }
            }
        })
    }
}
