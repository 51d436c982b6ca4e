//! Broker double that records publishes and can be told to fail.

use super::{Broker, BrokerError, MemoryBroker, SubscribeOptions, Subscription};
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::HashSet;

pub struct RecordingBroker {
    inner: MemoryBroker,
    published: Mutex<Vec<(String, Bytes)>>,
    failing: Mutex<HashSet<String>>,
    transient_failures: Mutex<u32>,
}

impl Default for RecordingBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingBroker {
    pub fn new() -> Self {
        Self {
            inner: MemoryBroker::new(1000, 64),
            published: Mutex::new(Vec::new()),
            failing: Mutex::new(HashSet::new()),
            transient_failures: Mutex::new(0),
        }
    }

    pub fn fail_topic(&self, topic: &str) {
        self.failing.lock().insert(topic.to_string());
    }

    /// The next `n` subscribe calls fail with a duplicate-client error.
    pub fn fail_subscribes(&self, n: u32) {
        *self.transient_failures.lock() = n;
    }

    pub fn published(&self) -> Vec<(String, Bytes)> {
        self.published.lock().clone()
    }

    pub fn topics(&self) -> Vec<String> {
        self.published.lock().iter().map(|(t, _)| t.clone()).collect()
    }

    pub fn inner(&self) -> &MemoryBroker {
        &self.inner
    }
}

#[async_trait]
impl Broker for RecordingBroker {
    async fn publish(&self, topic: &str, data: Bytes) -> Result<(), BrokerError> {
        if self.failing.lock().contains(topic) {
            return Err(BrokerError::Unavailable(format!("publish to {topic} refused")));
        }
        self.published.lock().push((topic.to_string(), data.clone()));
        self.inner.publish(topic, data).await
    }

    async fn subscribe(
        &self,
        topic: &str,
        options: SubscribeOptions,
    ) -> Result<Subscription, BrokerError> {
        {
            let mut remaining = self.transient_failures.lock();
            if *remaining > 0 {
                *remaining -= 1;
                return Err(BrokerError::DuplicateClient(
                    options.durable.clone().unwrap_or_default(),
                ));
            }
        }
        self.inner.subscribe(topic, options).await
    }
}
