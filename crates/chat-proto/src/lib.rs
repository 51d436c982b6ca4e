//! # chat-proto
//!
//! Wire vocabulary shared by the chatd-ng daemon and its clients.
//!
//! ## Features
//!
//! - [`Event`] records with a closed [`EventType`] vocabulary
//! - The `to` addressing grammar ([`Destination`])
//! - Typed control-topic messages for forced session takeover ([`ControlMessage`])
//! - Topic naming for per-user, control and admin-mirror routing ([`Topics`])
//!
//! ## Quick Start
//!
//! ```rust
//! use chat_proto::{Destination, Event, EventType};
//!
//! let event = Event::new(EventType::Message, "alice", "room1/bob", "hi");
//! let dest = Destination::parse(&event.to);
//! assert_eq!(dest.room(), Some("room1"));
//! assert_eq!(dest.user, "bob");
//!
//! let bytes = chat_proto::encode(&event).unwrap();
//! let back = chat_proto::decode(&bytes).unwrap();
//! assert_eq!(back.kind, EventType::Message);
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod addressing;
pub mod auth;
pub mod control;
pub mod error;
pub mod event;
pub mod model;
pub mod topic;

pub use addressing::Destination;
pub use auth::AuthBody;
pub use control::{ControlMessage, PlatformTarget};
pub use error::ProtoError;
pub use event::{Event, EventType, new_event_id};
pub use model::{ClientStatus, Room, User};
pub use topic::Topics;

/// Serialize an event to its JSON wire form.
pub fn encode(event: &Event) -> Result<Vec<u8>, ProtoError> {
    serde_json::to_vec(event).map_err(ProtoError::Encode)
}

/// Parse an event from its JSON wire form.
pub fn decode(bytes: &[u8]) -> Result<Event, ProtoError> {
    serde_json::from_slice(bytes).map_err(ProtoError::Decode)
}
