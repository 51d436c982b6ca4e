//! Unified error handling for chatd-ng.
//!
//! Per-layer error enums with metric labels and conversion into the
//! user-visible `error` event.

use crate::broker::BrokerError;
use crate::repo::RepoError;
use chat_proto::{Event, ProtoError};
use thiserror::Error;

// ============================================================================
// Dispatch Errors (client operations: send, join, out, listings)
// ============================================================================

/// Errors from handling a client operation. Never fatal to the session.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("unsupported event type: {0}")]
    UnsupportedType(String),

    #[error("missing field: {0}")]
    MissingField(&'static str),

    #[error("user not found: {0}")]
    UnknownUser(String),

    #[error("room not found: {0}")]
    UnknownRoom(String),

    #[error("event id already used: {0}")]
    DuplicateId(String),

    #[error("repository error: {0}")]
    Repository(RepoError),

    #[error("broker error: {0}")]
    Broker(#[from] BrokerError),

    #[error("codec error: {0}")]
    Proto(#[from] ProtoError),
}

impl DispatchError {
    /// Get a static error code string for metrics labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::UnsupportedType(_) => "unsupported_type",
            Self::MissingField(_) => "missing_field",
            Self::UnknownUser(_) => "unknown_user",
            Self::UnknownRoom(_) => "unknown_room",
            Self::DuplicateId(_) => "duplicate_id",
            Self::Repository(_) => "repository",
            Self::Broker(_) => "broker",
            Self::Proto(_) => "codec",
        }
    }

    /// Whether the operation was rejected before any side effect.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedType(_)
                | Self::MissingField(_)
                | Self::UnknownUser(_)
                | Self::DuplicateId(_)
        )
    }

    /// The `error` event reported back on the session stream.
    pub fn to_event(&self) -> Event {
        Event::error(self.to_string())
    }
}

impl From<RepoError> for DispatchError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::UserNotFound(id) => Self::UnknownUser(id),
            RepoError::RoomNotFound(id) => Self::UnknownRoom(id),
            other => Self::Repository(other),
        }
    }
}

pub type DispatchResult<T> = Result<T, DispatchError>;

// ============================================================================
// Transport Errors (per-session stream)
// ============================================================================

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("stream closed")]
    Closed,

    #[error("websocket error: {0}")]
    WebSocket(#[from] Box<tokio_tungstenite::tungstenite::Error>),

    #[error("malformed frame: {0}")]
    Codec(#[from] ProtoError),
}

impl From<tokio_tungstenite::tungstenite::Error> for TransportError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::WebSocket(Box::new(err))
    }
}

// ============================================================================
// Session Errors (session start)
// ============================================================================

/// Failures before a session reaches Running. The session never existed.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("first frame must be an auth event")]
    ExpectedAuth,

    #[error("invalid auth body: {0}")]
    InvalidAuth(#[from] ProtoError),

    #[error("user not found: {0}")]
    UnknownUser(String),

    #[error("repository error: {0}")]
    Repository(RepoError),

    #[error("subscription attach failed: {0}")]
    Attach(#[from] BrokerError),

    #[error("session hub is shut down")]
    HubClosed,

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}

impl From<RepoError> for SessionError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::UserNotFound(id) => Self::UnknownUser(id),
            other => Self::Repository(other),
        }
    }
}

impl SessionError {
    /// The `error` event sent before closing, if the stream is still usable.
    pub fn to_event(&self) -> Option<Event> {
        match self {
            Self::Transport(_) => None,
            other => Some(Event::error(other.to_string())),
        }
    }
}

// ============================================================================
// Account Errors (admin provisioning)
// ============================================================================

#[derive(Debug, Error)]
pub enum AccountError {
    #[error(transparent)]
    Repository(#[from] RepoError),

    #[error("broker error: {0}")]
    Broker(#[from] BrokerError),

    #[error("{0} is required")]
    MissingField(&'static str),
}

impl From<SessionError> for AccountError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::Attach(e) => Self::Broker(e),
            SessionError::Repository(e) => Self::Repository(e),
            SessionError::UnknownUser(id) => Self::Repository(RepoError::UserNotFound(id)),
            other => Self::Broker(BrokerError::Unavailable(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chat_proto::EventType;

    #[test]
    fn repo_not_found_maps_to_unknown() {
        let err: DispatchError = RepoError::UserNotFound("dave".into()).into();
        assert!(matches!(err, DispatchError::UnknownUser(ref id) if id == "dave"));
        assert_eq!(err.error_code(), "unknown_user");
        assert!(err.is_validation());

        let err: DispatchError = RepoError::UserExists("dave".into()).into();
        assert_eq!(err.error_code(), "repository");
        assert!(!err.is_validation());
    }

    #[test]
    fn error_event_carries_message() {
        let event = DispatchError::UnsupportedType("frobnicate".into()).to_event();
        assert_eq!(event.kind, EventType::Error);
        assert!(event.body.contains("frobnicate"));
    }

    #[test]
    fn transport_failures_have_no_reply() {
        assert!(SessionError::Transport(TransportError::Closed).to_event().is_none());
        assert!(SessionError::ExpectedAuth.to_event().is_some());
    }
}
