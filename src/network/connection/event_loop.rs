//! The Running-state loop of a session.
//!
//! One `tokio::select!` multiplexes client frames, the outbound queue fed
//! by the subscription forwarder and catch-up, the heartbeat timer and the
//! shutdown signal. No branch has priority beyond readiness. Any transport
//! write failure ends the session.

use super::transport::Transport;
use crate::error::TransportError;
use crate::handlers::{Context, Registry};
use crate::metrics;
use crate::state::{Matrix, Outbound, Session};
use chat_proto::{Destination, Event};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

enum SelectResult {
    /// Client sent an event.
    Inbound(Event),
    /// Client sent a frame that is not an event.
    Malformed(TransportError),
    /// Client closed the stream.
    PeerClosed,
    /// Something to deliver from the session's topic or the event log.
    Deliver(Outbound),
    /// Heartbeat tick.
    Heartbeat,
    /// Shutdown signaled (takeover, logout or subscription loss).
    Shutdown,
}

/// Drive a Running session until it closes. `Ok` means an orderly close.
pub(super) async fn run<T: Transport>(
    transport: &mut T,
    session: &mut Session,
    matrix: &Matrix,
    registry: &Registry,
    outbound: &mut mpsc::Receiver<Outbound>,
    heartbeat: Duration,
) -> Result<(), TransportError> {
    let shutdown = session.handle.shutdown_token();
    let mut ticker = tokio::time::interval_at(Instant::now() + heartbeat, heartbeat);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!("Entering session loop");

    loop {
        let select_result = tokio::select! {
            _ = shutdown.cancelled() => SelectResult::Shutdown,

            frame = transport.recv() => match frame {
                Ok(Some(event)) => SelectResult::Inbound(event),
                Ok(None) => SelectResult::PeerClosed,
                Err(e @ TransportError::Codec(_)) => SelectResult::Malformed(e),
                Err(e) => return Err(e),
            },

            Some(item) = outbound.recv() => SelectResult::Deliver(item),

            _ = ticker.tick() => SelectResult::Heartbeat,
        };

        match select_result {
            SelectResult::Shutdown => {
                info!("Shutdown signal received");
                return Ok(());
            }

            SelectResult::PeerClosed => {
                debug!("Client closed the stream");
                return Ok(());
            }

            SelectResult::Malformed(e) => {
                debug!(error = %e, "Malformed client frame");
                transport.send(&Event::error(e.to_string())).await?;
            }

            SelectResult::Inbound(event) => {
                let ctx = Context {
                    uid: &session.handle.user,
                    matrix,
                };
                if let Some(reply) = registry.dispatch(&ctx, event).await {
                    transport.send(&reply).await?;
                }
            }

            SelectResult::Deliver(item) => deliver(transport, session, item).await?,

            SelectResult::Heartbeat => transport.send(&Event::heartbeat()).await?,
        }
    }
}

async fn deliver<T: Transport>(
    transport: &mut T,
    session: &mut Session,
    item: Outbound,
) -> Result<(), TransportError> {
    let Outbound { event, ack } = item;

    if session.recent.insert(&event.id) {
        if event.kind.is_sendable() {
            note_outsider(session, &event);
        }
        session.membership.observe(&session.handle.user, &event);
        transport.send(&event).await?;
        metrics::inc_counter(&metrics::DELIVERED);
    } else {
        debug!(id = %event.id, "Duplicate delivery dropped");
    }

    if let Some(ack) = ack
        && let Err(e) = ack.ack().await
    {
        warn!(id = %event.id, error = %e, "Acknowledgment failed");
    }
    Ok(())
}

/// The snapshot is advisory; an event outside it is still delivered.
fn note_outsider(session: &Session, event: &Event) {
    let dest = Destination::parse(&event.to);
    match dest.room() {
        Some(room) if !session.membership.in_room(room) => {
            debug!(id = %event.id, room, "Room event outside membership snapshot");
        }
        None if !session.membership.knows(&event.from) => {
            debug!(id = %event.id, from = %event.from, "Direct event from unknown user");
        }
        _ => {}
    }
}
