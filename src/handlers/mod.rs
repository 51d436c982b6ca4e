//! Client event handlers.
//!
//! Every event a Running session reads from its transport is routed by
//! type to a [`Handler`]. A handler returns at most one reply, written
//! straight back to the same transport by the session loop. Failures turn
//! into an `error` event; they never end the session.

mod account;
mod listing;
mod membership;
mod send;

pub use account::AccountService;
pub use listing::{RoomsHandler, UsersHandler};
pub use membership::{JoinHandler, OutHandler};
pub use send::SendHandler;

use crate::error::{DispatchError, DispatchResult};
use crate::metrics;
use crate::state::Matrix;
use async_trait::async_trait;
use chat_proto::{Event, EventType};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Handler context passed to each event handler.
pub struct Context<'a> {
    /// The session's user id.
    pub uid: &'a str,
    /// Shared services.
    pub matrix: &'a Matrix,
}

/// Optional reply to the calling session.
pub type HandlerResult = DispatchResult<Option<Event>>;

#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(&self, ctx: &Context<'_>, event: Event) -> HandlerResult;
}

/// Registry of event handlers keyed by wire type name.
pub struct Registry {
    handlers: HashMap<&'static str, Box<dyn Handler>>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        let mut handlers: HashMap<&'static str, Box<dyn Handler>> = HashMap::new();

        handlers.insert("users", Box::new(UsersHandler));
        handlers.insert("rooms", Box::new(RoomsHandler));

        handlers.insert("join", Box::new(JoinHandler));
        handlers.insert("out", Box::new(OutHandler));

        for kind in ["message", "receipt", "candidate", "sdp", "notify"] {
            handlers.insert(kind, Box::new(SendHandler));
        }

        Self { handlers }
    }

    /// Route one client event. Returns the reply to write, if any.
    pub async fn dispatch(&self, ctx: &Context<'_>, event: Event) -> Option<Event> {
        if event.kind == EventType::Heartbeat {
            return None;
        }
        let result = match self.handlers.get(event.kind.as_str()) {
            Some(handler) => handler.handle(ctx, event).await,
            None => Err(DispatchError::UnsupportedType(event.kind.to_string())),
        };
        match result {
            Ok(reply) => reply,
            Err(e) => {
                metrics::record_dispatch_error(e.error_code());
                if e.is_validation() {
                    debug!(user = %ctx.uid, error = %e, "Client event rejected");
                } else {
                    warn!(user = %ctx.uid, error = %e, "Client event failed");
                }
                Some(e.to_event())
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::fixture;
    use super::*;
    use crate::repo::Repository;

    #[tokio::test]
    async fn unknown_type_is_rejected_without_side_effects() {
        let fx = fixture().await;
        let ctx = Context {
            uid: "alice",
            matrix: &fx.matrix,
        };
        let mut event = Event::new(EventType::from("frobnicate"), "alice", "bob", "");
        event.id = "x".into();

        let reply = Registry::new().dispatch(&ctx, event).await.unwrap();
        assert_eq!(reply.kind, EventType::Error);
        assert!(reply.body.contains("unsupported event type"));
        assert!(fx.broker.published().is_empty());
        assert!(fx.repo.read("bob", 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn server_only_types_are_unsupported() {
        let fx = fixture().await;
        let ctx = Context {
            uid: "alice",
            matrix: &fx.matrix,
        };
        for kind in [EventType::Online, EventType::Received, EventType::Auth] {
            let reply = Registry::new()
                .dispatch(&ctx, Event::new(kind, "alice", "bob", ""))
                .await
                .unwrap();
            assert_eq!(reply.kind, EventType::Error);
        }
    }

    #[tokio::test]
    async fn client_heartbeat_is_ignored() {
        let fx = fixture().await;
        let ctx = Context {
            uid: "alice",
            matrix: &fx.matrix,
        };
        assert!(Registry::new().dispatch(&ctx, Event::heartbeat()).await.is_none());
    }
}
