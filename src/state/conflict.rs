//! Platform conflict resolution.
//!
//! A new login for a (user, platform) pair that is recorded online kicks the
//! earlier session through the control topic. The kick names the new
//! session so that a hub which has already admitted it leaves it running.
//! The resolver never waits for
//! the old session to go away; a durable claim it still holds surfaces as a
//! transient attach error that the bridge retries.

use crate::broker::{Broker, BrokerError};
use crate::error::SessionError;
use crate::repo::Repository;
use crate::routing::Fanout;
use crate::state::session::SessionId;
use bytes::Bytes;
use chat_proto::{ControlMessage, Topics};
use std::sync::Arc;
use tracing::info;

pub struct ConflictResolver {
    repo: Arc<dyn Repository>,
    broker: Arc<dyn Broker>,
    topics: Topics,
}

impl ConflictResolver {
    pub fn new(repo: Arc<dyn Repository>, broker: Arc<dyn Broker>, topics: Topics) -> Self {
        Self {
            repo,
            broker,
            topics,
        }
    }

    /// Kick any session recorded online for (uid, platform) other than
    /// `session`. Returns whether a control message was published.
    pub async fn resolve(
        &self,
        uid: &str,
        platform: &str,
        session: SessionId,
    ) -> Result<bool, SessionError> {
        let status = self.repo.available_client(uid, platform).await?;
        if !status.is_online {
            return Ok(false);
        }
        info!(user = %uid, platform = %platform, "Platform already online, kicking previous session");
        self.publish(ControlMessage::kick(uid, platform).issued_by(session.to_string()))
            .await?;
        Ok(true)
    }

    /// Kick every session of `uid` on every platform.
    pub async fn logout_all(&self, uid: &str) -> Result<(), SessionError> {
        info!(user = %uid, "Logging out all platforms");
        self.publish(ControlMessage::kick_all(uid)).await
    }

    async fn publish(&self, control: ControlMessage) -> Result<(), SessionError> {
        let payload = control
            .to_bytes()
            .map_err(|e| BrokerError::Unavailable(e.to_string()))?;
        let payload = Bytes::from(payload);
        Fanout::new(self.broker.as_ref(), &self.topics)
            .to_control(&payload)
            .await?;
        Ok(())
    }
}
