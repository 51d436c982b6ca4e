//! Account provisioning: user and room lifecycle driven by the admin API.

use crate::error::AccountError;
use crate::state::Matrix;
use chat_proto::{Room, User};
use std::sync::Arc;
use tracing::{info, instrument};

pub struct AccountService {
    matrix: Arc<Matrix>,
}

impl AccountService {
    pub fn new(matrix: Arc<Matrix>) -> Self {
        Self { matrix }
    }

    /// Create a user and reserve the primary platform's durable
    /// subscription, so messages sent before the first login are kept.
    #[instrument(skip(self, user), fields(user = %user.id))]
    pub async fn register_user(&self, user: &User) -> Result<(), AccountError> {
        if user.id.is_empty() {
            return Err(AccountError::MissingField("id"));
        }
        self.matrix.repo.create_user(user).await?;
        self.matrix.bridge.reserve_durable(&user.id).await?;
        info!("User registered");
        Ok(())
    }

    /// Log the user out everywhere, delete it and drop its durable
    /// subscription together with anything still retained for it.
    #[instrument(skip(self))]
    pub async fn unregister_user(&self, id: &str) -> Result<(), AccountError> {
        self.matrix.resolver.logout_all(id).await?;
        self.matrix.repo.delete_user(id).await?;
        self.matrix.bridge.release_durable(id).await?;
        info!("User unregistered");
        Ok(())
    }

    /// Create a room with `owner` as its first manager.
    #[instrument(skip(self, room), fields(room = %room.id))]
    pub async fn create_room(&self, room: &Room, owner: &str) -> Result<(), AccountError> {
        if room.id.is_empty() {
            return Err(AccountError::MissingField("id"));
        }
        if owner.is_empty() {
            return Err(AccountError::MissingField("owner"));
        }
        self.matrix.repo.create_room(room, owner).await?;
        info!(owner = %owner, "Room created");
        Ok(())
    }
}
