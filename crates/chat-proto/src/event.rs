//! Chat events and the event type vocabulary.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The kind of an [`Event`].
///
/// Serialized as a bare lowercase string. Unrecognised names decode into
/// [`EventType::Unknown`] so they can be rejected as a validation error
/// instead of failing the whole frame.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventType {
    /// Login request carrying an [`AuthBody`](crate::AuthBody).
    Auth,
    /// Chat message.
    #[default]
    Message,
    /// Delivery/read receipt.
    Receipt,
    /// WebRTC ICE candidate.
    Candidate,
    /// WebRTC session description.
    Sdp,
    /// Application notification.
    Notify,
    /// Room join notification or request.
    Join,
    /// Room leave notification or request.
    Out,
    /// User listing request/reply.
    Users,
    /// Room listing request/reply.
    Rooms,
    /// Presence: came online.
    Online,
    /// Presence: went offline.
    Offline,
    /// Health check emitted on an idle stream.
    Heartbeat,
    /// Error reply.
    Error,
    /// Send acknowledgment.
    Received,
    /// Any name outside the vocabulary.
    Unknown(String),
}

impl EventType {
    /// Wire name of this type.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Auth => "auth",
            Self::Message => "message",
            Self::Receipt => "receipt",
            Self::Candidate => "candidate",
            Self::Sdp => "sdp",
            Self::Notify => "notify",
            Self::Join => "join",
            Self::Out => "out",
            Self::Users => "users",
            Self::Rooms => "rooms",
            Self::Online => "online",
            Self::Offline => "offline",
            Self::Heartbeat => "heartbeat",
            Self::Error => "error",
            Self::Received => "received",
            Self::Unknown(name) => name,
        }
    }

    /// Types a client may publish through the send path.
    pub fn is_sendable(&self) -> bool {
        matches!(
            self,
            Self::Message | Self::Notify | Self::Receipt | Self::Candidate | Self::Sdp
        )
    }

    /// Whether the name belongs to the known vocabulary.
    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Unknown(_))
    }
}

impl From<String> for EventType {
    fn from(name: String) -> Self {
        match name.as_str() {
            "auth" => Self::Auth,
            "message" => Self::Message,
            "receipt" => Self::Receipt,
            "candidate" => Self::Candidate,
            "sdp" => Self::Sdp,
            "notify" => Self::Notify,
            "join" => Self::Join,
            "out" => Self::Out,
            "users" => Self::Users,
            "rooms" => Self::Rooms,
            "online" => Self::Online,
            "offline" => Self::Offline,
            // older clients call it a health check
            "heartbeat" | "health-check" => Self::Heartbeat,
            "error" => Self::Error,
            "received" => Self::Received,
            _ => Self::Unknown(name),
        }
    }
}

impl From<&str> for EventType {
    fn from(name: &str) -> Self {
        Self::from(name.to_string())
    }
}

impl From<EventType> for String {
    fn from(kind: EventType) -> Self {
        match kind {
            EventType::Unknown(name) => name,
            other => other.as_str().to_string(),
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A routed chat event.
///
/// Immutable once published; `id` is assigned once by the send path when
/// the client left it empty.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Event {
    /// Opaque unique identifier.
    pub id: String,
    /// Sending user id.
    pub from: String,
    /// `userId` or `roomId/userId`, see [`Destination`](crate::Destination).
    pub to: String,
    /// Event kind.
    #[serde(rename = "type")]
    pub kind: EventType,
    /// Payload, opaque to the router.
    pub body: String,
    /// Creation time, unix seconds.
    pub created: i64,
}

impl Event {
    /// Build an event without id or timestamp.
    pub fn new(
        kind: EventType,
        from: impl Into<String>,
        to: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            id: String::new(),
            from: from.into(),
            to: to.into(),
            kind,
            body: body.into(),
            created: 0,
        }
    }

    /// A health check event.
    pub fn heartbeat() -> Self {
        Self {
            kind: EventType::Heartbeat,
            ..Self::default()
        }
    }

    /// An error reply carrying a human-readable message.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: EventType::Error,
            body: message.into(),
            ..Self::default()
        }
    }

    /// Acknowledgment for a successfully sent event.
    pub fn received(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: EventType::Received,
            ..Self::default()
        }
    }

    /// Assign an id if the event has none. Returns the (possibly new) id.
    pub fn ensure_id(&mut self) -> &str {
        if self.id.is_empty() {
            self.id = new_event_id();
        }
        &self.id
    }

    /// Stamp the creation time if unset.
    pub fn ensure_created(&mut self) {
        if self.created == 0 {
            self.created = chrono::Utc::now().timestamp();
        }
    }
}

/// Generate an opaque event id (32 lowercase hex digits).
pub fn new_event_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}
