//! `join` / `out` requests.
//!
//! `to` names the room. The notification reaches the session through its
//! own topic like any other event, so nothing is replied directly.

use super::{Context, Handler, HandlerResult};
use crate::error::DispatchError;
use async_trait::async_trait;
use chat_proto::{Destination, Event};

fn room_of(event: &Event) -> Result<String, DispatchError> {
    let dest = Destination::parse(&event.to);
    let room = dest.room().unwrap_or(dest.user.as_str());
    if room.is_empty() {
        return Err(DispatchError::MissingField("to"));
    }
    Ok(room.to_string())
}

pub struct JoinHandler;

#[async_trait]
impl Handler for JoinHandler {
    async fn handle(&self, ctx: &Context<'_>, event: Event) -> HandlerResult {
        let room = room_of(&event)?;
        ctx.matrix.dispatcher.join(ctx.uid, &room).await?;
        Ok(None)
    }
}

pub struct OutHandler;

#[async_trait]
impl Handler for OutHandler {
    async fn handle(&self, ctx: &Context<'_>, event: Event) -> HandlerResult {
        let room = room_of(&event)?;
        ctx.matrix.dispatcher.out(ctx.uid, &room).await?;
        Ok(None)
    }
}
