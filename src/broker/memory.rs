//! In-process broker.
//!
//! Each topic keeps a bounded log of recent messages for replay, its live
//! subscribers, and the state of its durable subscriptions. All topic state
//! sits behind one short-held lock per topic; nothing awaits while holding it.

use super::{
    Acker, Broker, BrokerError, Delivery, StartPosition, SubscribeOptions, Subscription,
    SubscriptionControl,
};
use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};

struct Stored {
    seq: u64,
    timestamp: i64,
    data: Bytes,
}

struct Subscriber {
    tx: mpsc::Sender<Delivery>,
    durable: Option<String>,
    manual_ack: bool,
}

#[derive(Default)]
struct DurableState {
    /// Attached subscriber id, if any.
    attached: Option<u64>,
    /// Every message below this sequence is acknowledged.
    floor: u64,
    /// Acknowledged sequences at or above `floor`.
    acked: BTreeSet<u64>,
    /// Highest sequence handed to any attachment.
    delivered_upto: Option<u64>,
}

impl DurableState {
    fn is_pending(&self, seq: u64) -> bool {
        seq >= self.floor && !self.acked.contains(&seq)
    }

    fn ack(&mut self, seq: u64) {
        if seq < self.floor {
            return;
        }
        self.acked.insert(seq);
        while self.acked.remove(&self.floor) {
            self.floor += 1;
        }
    }

    fn mark_delivered(&mut self, seq: u64) -> bool {
        let redelivered = self.delivered_upto.is_some_and(|upto| seq <= upto);
        self.delivered_upto = Some(self.delivered_upto.map_or(seq, |upto| upto.max(seq)));
        redelivered
    }
}

#[derive(Default)]
struct TopicState {
    next_seq: u64,
    log: VecDeque<Stored>,
    subscribers: HashMap<u64, Subscriber>,
    durables: HashMap<String, DurableState>,
}

impl TopicState {
    fn first_seq_at(&self, timestamp: i64) -> u64 {
        self.log
            .iter()
            .find(|m| m.timestamp >= timestamp)
            .map_or(self.next_seq, |m| m.seq)
    }

    /// Remove a subscriber and release its durable claim.
    fn detach(&mut self, sub_id: u64) {
        if let Some(sub) = self.subscribers.remove(&sub_id)
            && let Some(name) = sub.durable
            && let Some(durable) = self.durables.get_mut(&name)
            && durable.attached == Some(sub_id)
        {
            durable.attached = None;
        }
    }
}

type SharedTopic = Arc<Mutex<TopicState>>;

/// Pub/sub broker living inside the daemon process.
pub struct MemoryBroker {
    topics: DashMap<String, SharedTopic>,
    retention: usize,
    buffer: usize,
    next_sub: AtomicU64,
}

impl MemoryBroker {
    pub fn new(retention: usize, buffer: usize) -> Self {
        Self {
            topics: DashMap::new(),
            retention: retention.max(1),
            buffer: buffer.max(1),
            next_sub: AtomicU64::new(1),
        }
    }

    fn topic(&self, name: &str) -> SharedTopic {
        self.topics
            .entry(name.to_string())
            .or_default()
            .value()
            .clone()
    }

    /// Publish with an explicit broker timestamp.
    pub fn publish_at(&self, topic: &str, data: Bytes, timestamp: i64) {
        let shared = self.topic(topic);
        let mut state = shared.lock();

        let seq = state.next_seq;
        state.next_seq += 1;
        state.log.push_back(Stored {
            seq,
            timestamp,
            data: data.clone(),
        });
        while state.log.len() > self.retention {
            state.log.pop_front();
        }

        let mut gone = Vec::new();
        let TopicState {
            subscribers,
            durables,
            ..
        } = &mut *state;
        for (id, sub) in subscribers.iter() {
            let mut redelivered = false;
            if let Some(name) = &sub.durable
                && let Some(durable) = durables.get_mut(name)
            {
                redelivered = durable.mark_delivered(seq);
                if !sub.manual_ack {
                    durable.ack(seq);
                }
            }
            let delivery = Delivery {
                data: data.clone(),
                timestamp,
                redelivered,
                ack: ack_handle(&shared, sub.durable.as_ref(), sub.manual_ack, seq),
            };
            match sub.tx.try_send(delivery) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    warn!(topic = %topic, subscriber = id, "Subscriber buffer full, delivery dropped");
                }
                Err(TrySendError::Closed(_)) => gone.push(*id),
            }
        }
        for id in gone {
            debug!(topic = %topic, subscriber = id, "Pruning closed subscriber");
            state.detach(id);
        }
    }
}

fn ack_handle(
    shared: &SharedTopic,
    durable: Option<&String>,
    manual_ack: bool,
    seq: u64,
) -> Option<Box<dyn Acker>> {
    if !manual_ack {
        return None;
    }
    Some(Box::new(MemoryAcker {
        topic: Arc::clone(shared),
        durable: durable?.clone(),
        seq,
    }))
}

#[async_trait]
impl Broker for MemoryBroker {
    async fn publish(&self, topic: &str, data: Bytes) -> Result<(), BrokerError> {
        self.publish_at(topic, data, chrono::Utc::now().timestamp());
        Ok(())
    }

    async fn subscribe(
        &self,
        topic: &str,
        options: SubscribeOptions,
    ) -> Result<Subscription, BrokerError> {
        let shared = self.topic(topic);
        let sub_id = self.next_sub.fetch_add(1, Ordering::Relaxed);
        let mut state = shared.lock();

        // A durable claim held by a receiver that has gone away is stale.
        if let Some(name) = &options.durable
            && let Some(holder) = state.durables.get(name).and_then(|d| d.attached)
        {
            let live = state
                .subscribers
                .get(&holder)
                .is_some_and(|s| !s.tx.is_closed());
            if live {
                return Err(BrokerError::DuplicateClient(name.clone()));
            }
            state.detach(holder);
        }

        let first = match options.start {
            StartPosition::New => state.next_seq,
            StartPosition::AllAvailable => state.log.front().map_or(state.next_seq, |m| m.seq),
            StartPosition::AtTime(ts) => state.first_seq_at(ts),
        };

        // Replay happens under the lock so no publish can slip in between.
        let mut replay = Vec::new();
        match &options.durable {
            Some(name) => {
                let next_seq = state.next_seq;
                let TopicState { log, durables, .. } = &mut *state;
                let durable = durables.entry(name.clone()).or_insert_with(|| DurableState {
                    floor: first.min(next_seq),
                    ..DurableState::default()
                });
                durable.attached = Some(sub_id);
                for m in log.iter() {
                    if !durable.is_pending(m.seq) {
                        continue;
                    }
                    let redelivered = durable.mark_delivered(m.seq);
                    replay.push(Delivery {
                        data: m.data.clone(),
                        timestamp: m.timestamp,
                        redelivered,
                        ack: ack_handle(&shared, Some(name), options.manual_ack, m.seq),
                    });
                }
                if !options.manual_ack {
                    for m in log.iter() {
                        durable.ack(m.seq);
                    }
                }
            }
            None => {
                for m in state.log.iter().filter(|m| m.seq >= first) {
                    replay.push(Delivery {
                        data: m.data.clone(),
                        timestamp: m.timestamp,
                        redelivered: false,
                        ack: None,
                    });
                }
            }
        }

        let (tx, rx) = mpsc::channel(self.buffer + replay.len());
        for delivery in replay {
            // Capacity covers the whole replay.
            let _ = tx.try_send(delivery);
        }
        state.subscribers.insert(
            sub_id,
            Subscriber {
                tx,
                durable: options.durable.clone(),
                manual_ack: options.manual_ack,
            },
        );
        drop(state);

        debug!(topic = %topic, subscriber = sub_id, durable = ?options.durable, "Subscription attached");

        Ok(Subscription {
            topic: topic.to_string(),
            deliveries: rx,
            control: Box::new(MemoryControl {
                topic: shared,
                sub_id,
                durable: options.durable,
                closed: AtomicBool::new(false),
            }),
        })
    }
}

struct MemoryAcker {
    topic: SharedTopic,
    durable: String,
    seq: u64,
}

#[async_trait]
impl Acker for MemoryAcker {
    async fn ack(&self) -> Result<(), BrokerError> {
        let mut state = self.topic.lock();
        // Acks after unsubscribe have nothing left to release.
        if let Some(durable) = state.durables.get_mut(&self.durable) {
            durable.ack(self.seq);
        }
        Ok(())
    }
}

struct MemoryControl {
    topic: SharedTopic,
    sub_id: u64,
    durable: Option<String>,
    closed: AtomicBool,
}

#[async_trait]
impl SubscriptionControl for MemoryControl {
    async fn close(&self) -> Result<(), BrokerError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.topic.lock().detach(self.sub_id);
        Ok(())
    }

    async fn unsubscribe(&self) -> Result<(), BrokerError> {
        let mut state = self.topic.lock();
        state.detach(self.sub_id);
        self.closed.store(true, Ordering::Release);
        if let Some(name) = &self.durable {
            state.durables.remove(name);
        }
        Ok(())
    }
}
