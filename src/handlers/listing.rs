//! `users` and `rooms` listing requests.

use super::{Context, Handler, HandlerResult};
use async_trait::async_trait;
use chat_proto::{Event, EventType, ProtoError};

/// Replies with the user directory.
pub struct UsersHandler;

#[async_trait]
impl Handler for UsersHandler {
    async fn handle(&self, ctx: &Context<'_>, _event: Event) -> HandlerResult {
        let users = ctx.matrix.repo.request_users(ctx.uid).await?;
        let body = serde_json::to_string(&users).map_err(ProtoError::Encode)?;
        Ok(Some(Event::new(EventType::Users, "", ctx.uid, body)))
    }
}

/// Replies with the rooms the caller belongs to.
pub struct RoomsHandler;

#[async_trait]
impl Handler for RoomsHandler {
    async fn handle(&self, ctx: &Context<'_>, _event: Event) -> HandlerResult {
        let rooms = ctx.matrix.repo.request_rooms(ctx.uid).await?;
        let body = serde_json::to_string(&rooms).map_err(ProtoError::Encode)?;
        Ok(Some(Event::new(EventType::Rooms, "", ctx.uid, body)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::test_support::fixture;
    use chat_proto::{Room, User};

    #[tokio::test]
    async fn rooms_reply_is_json_array() {
        let fx = fixture().await;
        let ctx = Context {
            uid: "bob",
            matrix: &fx.matrix,
        };
        let reply = RoomsHandler
            .handle(&ctx, Event::new(EventType::Rooms, "bob", "", ""))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reply.kind, EventType::Rooms);
        let rooms: Vec<Room> = serde_json::from_str(&reply.body).unwrap();
        assert_eq!(rooms.len(), 1);
        assert_eq!(rooms[0].id, "room1");
    }

    #[tokio::test]
    async fn users_reply_lists_directory() {
        let fx = fixture().await;
        let ctx = Context {
            uid: "bob",
            matrix: &fx.matrix,
        };
        let reply = UsersHandler
            .handle(&ctx, Event::new(EventType::Users, "bob", "", ""))
            .await
            .unwrap()
            .unwrap();
        let users: Vec<User> = serde_json::from_str(&reply.body).unwrap();
        let ids: Vec<&str> = users.iter().map(|u| u.id.as_str()).collect();
        assert_eq!(ids, vec!["alice", "bob", "carol", "dave"]);
        assert_eq!(users[0].name, "ALICE");
    }
}
