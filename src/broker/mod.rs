//! Pub/sub broker abstraction.
//!
//! The session engine only needs publish, subscribe and the two ways of
//! ending a subscription. Durable named subscriptions retain unacknowledged
//! messages across detach and redeliver them on the next attach.

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;
use tokio::sync::mpsc;

pub mod memory;

pub use memory::MemoryBroker;

#[derive(Debug, Error)]
pub enum BrokerError {
    /// The durable name is still held by another attached client.
    #[error("durable subscription '{0}' is already attached")]
    DuplicateClient(String),
    #[error("subscription closed")]
    Closed,
    #[error("broker unavailable: {0}")]
    Unavailable(String),
}

impl BrokerError {
    /// Errors worth retrying after a short delay.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::DuplicateClient(_))
    }
}

/// Where a new subscription starts reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StartPosition {
    /// Only messages published after attach.
    #[default]
    New,
    /// Everything the broker still retains.
    AllAvailable,
    /// Messages published at or after this unix timestamp.
    AtTime(i64),
}

#[derive(Debug, Clone, Default)]
pub struct SubscribeOptions {
    /// Durable name; `None` for a transient subscription.
    pub durable: Option<String>,
    /// Deliveries carry an ack handle and stay pending until acked.
    pub manual_ack: bool,
    pub start: StartPosition,
}

impl SubscribeOptions {
    pub fn durable(name: impl Into<String>) -> Self {
        Self {
            durable: Some(name.into()),
            manual_ack: true,
            start: StartPosition::New,
        }
    }

    pub fn transient(start: StartPosition) -> Self {
        Self {
            durable: None,
            manual_ack: false,
            start,
        }
    }
}

#[async_trait]
pub trait Acker: Send + Sync {
    async fn ack(&self) -> Result<(), BrokerError>;
}

/// One message handed to a subscriber.
pub struct Delivery {
    pub data: Bytes,
    /// Broker publish time, unix seconds.
    pub timestamp: i64,
    /// Delivered before to an earlier attachment of the same durable.
    pub redelivered: bool,
    /// Present for manual-ack subscriptions.
    pub ack: Option<Box<dyn Acker>>,
}

impl std::fmt::Debug for Delivery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Delivery")
            .field("len", &self.data.len())
            .field("timestamp", &self.timestamp)
            .field("redelivered", &self.redelivered)
            .field("manual_ack", &self.ack.is_some())
            .finish()
    }
}

#[async_trait]
pub trait SubscriptionControl: Send + Sync {
    /// Detach. A durable subscription keeps its pending messages.
    async fn close(&self) -> Result<(), BrokerError>;

    /// Detach and drop durable interest; pending messages are released.
    async fn unsubscribe(&self) -> Result<(), BrokerError>;
}

/// A live subscription: a delivery stream plus its control handle.
pub struct Subscription {
    pub topic: String,
    pub deliveries: mpsc::Receiver<Delivery>,
    pub control: Box<dyn SubscriptionControl>,
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("topic", &self.topic)
            .finish_non_exhaustive()
    }
}

impl Subscription {
    pub async fn close(self) -> Result<(), BrokerError> {
        self.control.close().await
    }

    pub async fn unsubscribe(self) -> Result<(), BrokerError> {
        self.control.unsubscribe().await
    }
}

#[async_trait]
pub trait Broker: Send + Sync {
    async fn publish(&self, topic: &str, data: Bytes) -> Result<(), BrokerError>;

    async fn subscribe(
        &self,
        topic: &str,
        options: SubscribeOptions,
    ) -> Result<Subscription, BrokerError>;
}

#[cfg(test)]
pub mod testing;
