//! Chat, receipt, signaling and notification events.

use super::{Context, Handler, HandlerResult};
use async_trait::async_trait;
use chat_proto::Event;

/// Runs the send path with `from` forced to the session user and
/// acknowledges with a `received` event carrying the assigned id.
pub struct SendHandler;

#[async_trait]
impl Handler for SendHandler {
    async fn handle(&self, ctx: &Context<'_>, mut event: Event) -> HandlerResult {
        event.from = ctx.uid.to_string();
        let sent = ctx.matrix.dispatcher.send(event).await?;
        Ok(Some(Event::received(sent.id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::test_support::fixture;
    use crate::repo::Repository;
    use chat_proto::EventType;

    #[tokio::test]
    async fn sender_cannot_be_spoofed() {
        let fx = fixture().await;
        let ctx = Context {
            uid: "alice",
            matrix: &fx.matrix,
        };
        let reply = SendHandler
            .handle(&ctx, Event::new(EventType::Message, "mallory", "bob", "hi"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reply.kind, EventType::Received);
        assert!(!reply.id.is_empty());

        let stored = fx.repo.read("bob", 0).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].from, "alice");
        assert_eq!(stored[0].id, reply.id);
    }
}
