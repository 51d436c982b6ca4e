//! Connection - drives one client session from login to teardown.
//!
//! ```text
//! Connecting ──auth frame──▶ Authenticated ──attach──▶ Subscribed
//!      │                          │                        │
//!      │                          │                   hub admits
//!      ▼                          ▼                        ▼
//!   (error event, close)   (error event, close)         Running ──▶ Closed
//! ```
//!
//! Start failures mean the session never existed: an `error` event is
//! written and the stream closed. Once Running, teardown always detaches
//! the subscription, unregisters from the hub and records the platform
//! offline when no other local session holds it.

mod event_loop;
pub mod transport;

pub use transport::{Transport, WsTransport};

use crate::broker::{Delivery, SubscriptionControl};
use crate::error::{SessionError, TransportError};
use crate::handlers::Registry;
use crate::state::{
    Lifecycle, Matrix, Membership, Session, SessionHandle, SubscriptionBridge, spawn_catch_up,
};
use chat_proto::{AuthBody, EventType};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{Instrument, debug, info, info_span, warn};

/// A session admitted by the hub, ready for its loop.
struct Started {
    session: Session,
    deliveries: mpsc::Receiver<Delivery>,
    control: Box<dyn SubscriptionControl>,
}

/// A client connection handler.
pub struct Connection<T> {
    transport: T,
    addr: SocketAddr,
    matrix: Arc<Matrix>,
    registry: Arc<Registry>,
}

impl<T: Transport> Connection<T> {
    pub fn new(transport: T, addr: SocketAddr, matrix: Arc<Matrix>, registry: Arc<Registry>) -> Self {
        Self {
            transport,
            addr,
            matrix,
            registry,
        }
    }

    /// Run the session to completion.
    pub async fn run(mut self) -> Result<(), SessionError> {
        let started = match self.start().await {
            Ok(started) => started,
            Err(e) => {
                info!(addr = %self.addr, error = %e, "Session start failed");
                if let Some(event) = e.to_event() {
                    let _ = self.transport.send(&event).await;
                }
                let _ = self.transport.close().await;
                return Err(e);
            }
        };

        let span = info_span!(
            "session",
            user = %started.session.handle.user,
            platform = %started.session.handle.platform,
            session = %started.session.handle.id,
        );
        self.serve(started).instrument(span).await
    }

    /// Connecting → Authenticated → Subscribed → Running.
    async fn start(&mut self) -> Result<Started, SessionError> {
        let auth = self.read_auth().await?;
        let matrix = Arc::clone(&self.matrix);

        matrix.repo.get_user(&auth.id).await?;
        let handle = SessionHandle::new(auth.id.clone(), auth.platform.clone());
        let mut session = Session::new(handle.clone(), auth.start.max(0));
        session.advance(Lifecycle::Authenticated);

        matrix
            .resolver
            .resolve(&auth.id, &auth.platform, handle.id)
            .await?;

        let subscription = matrix
            .bridge
            .attach(&auth.id, &auth.platform, auth.watermark())
            .await?;
        session.advance(Lifecycle::Subscribed);

        let snapshot = async {
            let rooms = matrix.repo.request_rooms(&auth.id).await?;
            let users = matrix.repo.request_users(&auth.id).await?;
            Ok::<_, SessionError>(Membership::snapshot(rooms, users))
        };
        let membership = match snapshot.await {
            Ok(membership) => membership,
            Err(e) => {
                let _ = subscription.close().await;
                return Err(e);
            }
        };
        session.membership = membership;

        if let Err(e) = matrix.hub.register(handle.clone()).await {
            let _ = subscription.close().await;
            return Err(e);
        }
        if let Err(e) = matrix.repo.online(&auth.id, &auth.platform).await {
            warn!(user = %auth.id, platform = %auth.platform, error = %e, "Failed to record online status");
        }
        session.advance(Lifecycle::Running);

        Ok(Started {
            session,
            deliveries: subscription.deliveries,
            control: subscription.control,
        })
    }

    async fn read_auth(&mut self) -> Result<AuthBody, SessionError> {
        let event = match self.transport.recv().await {
            Ok(Some(event)) => event,
            Ok(None) => return Err(TransportError::Closed.into()),
            Err(TransportError::Codec(e)) => return Err(SessionError::InvalidAuth(e)),
            Err(e) => return Err(e.into()),
        };
        if event.kind != EventType::Auth {
            return Err(SessionError::ExpectedAuth);
        }
        let auth = AuthBody::from_body(&event.body)?;
        auth.validate()?;
        Ok(auth)
    }

    async fn serve(mut self, started: Started) -> Result<(), SessionError> {
        let Started {
            mut session,
            deliveries,
            control,
        } = started;
        let handle = session.handle.clone();
        let matrix = Arc::clone(&self.matrix);

        let (queue, mut outbound) = mpsc::channel(matrix.session.outbound_queue.max(1));
        let since = (!matrix.bridge.is_primary(&handle.platform) && session.watermark > 0)
            .then_some(session.watermark);
        SubscriptionBridge::spawn_forwarder(deliveries, queue.clone(), handle.clone(), since);
        if matrix.wants_catch_up(&handle.platform) {
            spawn_catch_up(
                Arc::clone(&matrix.repo),
                handle.user.clone(),
                session.watermark,
                queue.clone(),
                handle.shutdown_token(),
            );
        }
        drop(queue);

        info!(rooms = session.membership.room_count(), "Session admitted");

        let result = event_loop::run(
            &mut self.transport,
            &mut session,
            &matrix,
            &self.registry,
            &mut outbound,
            matrix.session.heartbeat(),
        )
        .await;

        // Teardown
        handle.close();
        drop(outbound);
        if let Err(e) = control.close().await {
            warn!(error = %e, "Failed to detach subscription");
        }
        match matrix.hub.unregister(handle.id).await {
            Ok(0) => record_offline(&matrix, &handle).await,
            Ok(remaining) => debug!(remaining, "Platform still held by another session"),
            Err(e) => warn!(error = %e, "Failed to unregister session"),
        }
        session.advance(Lifecycle::Closed);
        let _ = self.transport.close().await;

        match result {
            Ok(()) => {
                info!("Session closed");
                Ok(())
            }
            Err(e) => {
                info!(error = %e, "Session closed on transport error");
                Err(e.into())
            }
        }
    }
}

/// Mark the pair offline after its last local session left. A takeover
/// login may register while the write is in flight; it writes online only
/// after the hub admits it, so a nonzero recount means our offline write may
/// have landed last and is rolled back.
async fn record_offline(matrix: &Matrix, handle: &SessionHandle) {
    if let Err(e) = matrix.repo.offline(&handle.user, &handle.platform).await {
        warn!(error = %e, "Failed to record offline status");
        return;
    }
    if matrix.hub.count(&handle.user, &handle.platform).await > 0 {
        debug!("Platform taken over during teardown, restoring online status");
        if let Err(e) = matrix.repo.online(&handle.user, &handle.platform).await {
            warn!(error = %e, "Failed to restore online status");
        }
    }
}
