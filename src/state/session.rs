//! Per-session state.
//!
//! A [`Session`] is owned exclusively by its connection task. Other tasks
//! only ever see the cloneable [`SessionHandle`], whose sole capability is
//! to signal shutdown.

use crate::broker::Acker;
use chat_proto::{Event, EventType, PlatformTarget, Room, User};
use std::collections::{HashSet, VecDeque};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

pub type SessionId = Uuid;

/// Session lifecycle. Transitions only move forward; any state may close.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Lifecycle {
    Connecting,
    Authenticated,
    Subscribed,
    Running,
    Closed,
}

impl Lifecycle {
    fn next(self) -> Option<Self> {
        match self {
            Self::Connecting => Some(Self::Authenticated),
            Self::Authenticated => Some(Self::Subscribed),
            Self::Subscribed => Some(Self::Running),
            Self::Running => Some(Self::Closed),
            Self::Closed => None,
        }
    }
}

/// Shared handle to a session: identity plus a one-way shutdown signal.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    pub id: SessionId,
    pub user: String,
    pub platform: String,
    shutdown: CancellationToken,
}

impl SessionHandle {
    pub fn new(user: impl Into<String>, platform: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user: user.into(),
            platform: platform.into(),
            shutdown: CancellationToken::new(),
        }
    }

    /// Signal the session to close. Safe to call any number of times.
    pub fn close(&self) {
        self.shutdown.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// A token cancelled when this session closes.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Whether a control message for (user, target) covers this session.
    pub fn matches(&self, user: &str, target: &PlatformTarget) -> bool {
        self.user == user && target.matches(&self.platform)
    }
}

/// Rooms and users known to a session.
///
/// Snapshotted at session start; afterwards only join/out events delivered
/// to the session change it. It is never re-read from the repository.
#[derive(Debug, Default)]
pub struct Membership {
    rooms: HashSet<String>,
    known_users: HashSet<String>,
}

impl Membership {
    pub fn snapshot(rooms: Vec<Room>, users: Vec<User>) -> Self {
        Self {
            rooms: rooms.into_iter().map(|r| r.id).collect(),
            known_users: users.into_iter().map(|u| u.id).collect(),
        }
    }

    /// Apply a delivered event addressed to `me`.
    ///
    /// `out` notifications go only to room managers, so a non-manager that
    /// leaves a room never sees its own `out` and keeps the room until the
    /// next login. The set only gates outsider logging, so the stale entry
    /// is harmless.
    pub fn observe(&mut self, me: &str, event: &Event) {
        match event.kind {
            EventType::Join if event.from == me => {
                self.rooms.insert(event.to.clone());
            }
            EventType::Join => {
                self.known_users.insert(event.from.clone());
            }
            EventType::Out if event.from == me => {
                self.rooms.remove(&event.to);
            }
            _ => {}
        }
    }

    pub fn in_room(&self, room: &str) -> bool {
        self.rooms.contains(room)
    }

    pub fn knows(&self, user: &str) -> bool {
        self.known_users.contains(user)
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}

/// Bounded set of recently delivered event ids.
#[derive(Debug)]
pub struct RecentIds {
    order: VecDeque<String>,
    seen: HashSet<String>,
    capacity: usize,
}

impl RecentIds {
    pub fn new(capacity: usize) -> Self {
        Self {
            order: VecDeque::with_capacity(capacity),
            seen: HashSet::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    /// Record `id`; false if it was already seen. Id-less events always pass.
    pub fn insert(&mut self, id: &str) -> bool {
        if id.is_empty() {
            return true;
        }
        if !self.seen.insert(id.to_string()) {
            return false;
        }
        self.order.push_back(id.to_string());
        if self.order.len() > self.capacity
            && let Some(oldest) = self.order.pop_front()
        {
            self.seen.remove(&oldest);
        }
        true
    }
}

/// An event queued for delivery to the session transport.
pub struct Outbound {
    pub event: Event,
    /// Acknowledged once the event is written.
    pub ack: Option<Box<dyn Acker>>,
}

impl Outbound {
    pub fn new(event: Event) -> Self {
        Self { event, ack: None }
    }
}

/// State owned by a session's own task.
pub struct Session {
    pub handle: SessionHandle,
    /// Replay cursor supplied at login, 0 for everything.
    pub watermark: i64,
    pub membership: Membership,
    pub recent: RecentIds,
    state: Lifecycle,
}

impl Session {
    const RECENT_IDS: usize = 1024;

    pub fn new(handle: SessionHandle, watermark: i64) -> Self {
        Self {
            handle,
            watermark,
            membership: Membership::default(),
            recent: RecentIds::new(Self::RECENT_IDS),
            state: Lifecycle::Connecting,
        }
    }

    pub fn state(&self) -> Lifecycle {
        self.state
    }

    /// Move to `next`. Closing is always allowed; anything else must be the
    /// direct successor of the current state.
    pub fn advance(&mut self, next: Lifecycle) -> bool {
        let allowed = (next == Lifecycle::Closed && self.state != Lifecycle::Closed)
            || self.state.next() == Some(next);
        if allowed {
            debug!(session = %self.handle.id, from = ?self.state, to = ?next, "Session state");
            self.state = next;
        } else {
            warn!(session = %self.handle.id, from = ?self.state, to = ?next, "Invalid session transition");
        }
        allowed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_moves_forward_only() {
        let mut session = Session::new(SessionHandle::new("bob", "web"), 0);
        assert!(!session.advance(Lifecycle::Running));
        assert!(session.advance(Lifecycle::Authenticated));
        assert!(session.advance(Lifecycle::Subscribed));
        assert!(session.advance(Lifecycle::Running));
        assert!(session.advance(Lifecycle::Closed));
        assert!(!session.advance(Lifecycle::Closed));
        assert_eq!(session.state(), Lifecycle::Closed);
    }

    #[test]
    fn close_from_any_state() {
        let mut session = Session::new(SessionHandle::new("bob", "web"), 0);
        assert!(session.advance(Lifecycle::Closed));
    }

    #[test]
    fn handle_close_is_idempotent() {
        let handle = SessionHandle::new("bob", "mobile");
        let other = handle.clone();
        handle.close();
        other.close();
        assert!(handle.is_closed());
    }

    #[test]
    fn control_matching() {
        let handle = SessionHandle::new("bob", "mobile");
        assert!(handle.matches("bob", &PlatformTarget::from("mobile")));
        assert!(handle.matches("bob", &PlatformTarget::All));
        assert!(!handle.matches("bob", &PlatformTarget::from("web")));
        assert!(!handle.matches("alice", &PlatformTarget::All));
    }

    #[test]
    fn membership_tracks_join_and_out() {
        let mut membership = Membership::snapshot(
            vec![Room {
                id: "room1".into(),
                name: String::new(),
            }],
            vec![],
        );
        membership.observe("bob", &Event::new(EventType::Join, "bob", "room2", ""));
        membership.observe("bob", &Event::new(EventType::Join, "carol", "room1", ""));
        membership.observe("bob", &Event::new(EventType::Out, "bob", "room1", ""));

        assert!(!membership.in_room("room1"));
        assert!(membership.in_room("room2"));
        assert!(membership.knows("carol"));
        assert_eq!(membership.room_count(), 1);
    }

    #[test]
    fn undelivered_leave_keeps_room() {
        let mut membership = Membership::snapshot(
            vec![Room {
                id: "room1".into(),
                name: String::new(),
            }],
            vec![],
        );
        // bob is not a manager, so only another member's out ever reaches him
        membership.observe("bob", &Event::new(EventType::Out, "carol", "room1", ""));
        assert!(membership.in_room("room1"));
    }

    #[test]
    fn recent_ids_are_bounded() {
        let mut recent = RecentIds::new(2);
        assert!(recent.insert("a"));
        assert!(!recent.insert("a"));
        assert!(recent.insert("b"));
        assert!(recent.insert("c"));
        // "a" aged out.
        assert!(recent.insert("a"));
        assert!(recent.insert(""));
        assert!(recent.insert(""));
    }
}
