//! The send, join and out paths.
//!
//! Every successful operation publishes a copy on the admin topic. When
//! persistence is on, a sent event is written before any publish and
//! removed again if a required publish fails. The removal is best-effort:
//! a crash between write and removal leaves the record behind.

use super::fanout::Fanout;
use crate::broker::Broker;
use crate::error::{DispatchError, DispatchResult};
use crate::repo::Repository;
use bytes::Bytes;
use chat_proto::{Destination, Event, EventType, Topics, User};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

pub struct Dispatcher {
    repo: Arc<dyn Repository>,
    broker: Arc<dyn Broker>,
    topics: Topics,
    persist: bool,
}

enum Recipients {
    Room(Vec<User>),
    Direct(String),
}

impl Recipients {
    fn ids(&self) -> Vec<String> {
        match self {
            Self::Room(members) => members.iter().map(|u| u.id.clone()).collect(),
            Self::Direct(uid) => vec![uid.clone()],
        }
    }
}

impl Dispatcher {
    pub fn new(
        repo: Arc<dyn Repository>,
        broker: Arc<dyn Broker>,
        topics: Topics,
        persist: bool,
    ) -> Self {
        Self {
            repo,
            broker,
            topics,
            persist,
        }
    }

    fn fanout(&self) -> Fanout<'_> {
        Fanout::new(self.broker.as_ref(), &self.topics)
    }

    /// Validate, persist and publish a client event. Returns the event as
    /// published, with its id and creation time assigned.
    ///
    /// The member list resolved here is both the persisted recipient set
    /// and the publish set. A client-supplied id already in the log is
    /// rejected so it cannot overwrite or compensate away another record.
    #[instrument(skip(self, event), fields(kind = %event.kind, from = %event.from, to = %event.to))]
    pub async fn send(&self, mut event: Event) -> DispatchResult<Event> {
        if !event.kind.is_sendable() {
            return Err(DispatchError::UnsupportedType(event.kind.to_string()));
        }
        if event.from.is_empty() {
            return Err(DispatchError::MissingField("from"));
        }
        let dest = Destination::parse(&event.to);
        if dest.is_empty() {
            return Err(DispatchError::MissingField("to"));
        }

        let recipients = match dest.room() {
            Some(room) => Recipients::Room(self.repo.members(room, false).await?),
            None => {
                self.repo.get_user(&dest.user).await?;
                Recipients::Direct(dest.user.clone())
            }
        };

        if self.persist && !event.id.is_empty() && self.repo.contains(&event.id).await? {
            return Err(DispatchError::DuplicateId(event.id));
        }
        event.ensure_id();
        event.ensure_created();
        let payload = Bytes::from(chat_proto::encode(&event)?);

        if self.persist {
            self.repo.write(&event, &recipients.ids()).await?;
        }

        let fanout = self.fanout();
        match &recipients {
            Recipients::Room(members) => {
                let delivered = fanout.to_members(members, &payload).await;
                debug!(id = %event.id, members = members.len(), delivered, "Room event published");
            }
            Recipients::Direct(uid) => {
                if let Err(e) = fanout.to_user(uid, &payload).await {
                    self.compensate(&event.id).await;
                    return Err(e.into());
                }
            }
        }

        if let Err(e) = fanout.to_admin(&payload).await {
            self.compensate(&event.id).await;
            return Err(e.into());
        }

        Ok(event)
    }

    /// Add `uid` to a room and notify every member, the joiner included.
    #[instrument(skip(self))]
    pub async fn join(&self, uid: &str, room_id: &str) -> DispatchResult<()> {
        self.repo.join(uid, room_id).await?;
        let members = self.repo.members(room_id, false).await?;
        self.notify(EventType::Join, uid, room_id, &members).await
    }

    /// Remove `uid` from a room and notify the room's managers.
    #[instrument(skip(self))]
    pub async fn out(&self, uid: &str, room_id: &str) -> DispatchResult<()> {
        self.repo.out(uid, room_id).await?;
        let managers = self.repo.members(room_id, true).await?;
        self.notify(EventType::Out, uid, room_id, &managers).await
    }

    async fn notify(
        &self,
        kind: EventType,
        uid: &str,
        room_id: &str,
        recipients: &[User],
    ) -> DispatchResult<()> {
        let mut event = Event::new(kind, uid, room_id, "");
        event.ensure_id();
        event.ensure_created();
        let payload = Bytes::from(chat_proto::encode(&event)?);

        let fanout = self.fanout();
        fanout.to_members(recipients, &payload).await;
        fanout.to_admin(&payload).await?;
        Ok(())
    }

    async fn compensate(&self, id: &str) {
        if !self.persist {
            return;
        }
        match self.repo.remove(id).await {
            Ok(()) => debug!(id = %id, "Persisted event removed after publish failure"),
            Err(e) => warn!(id = %id, error = %e, "Failed to remove persisted event after publish failure"),
        }
    }
}
