//! Repository backed by SQLite for the directory and a history provider
//! for the event log.

use super::{RepoError, Repository};
use crate::db::Database;
use crate::history::HistoryProvider;
use async_trait::async_trait;
use chat_proto::{ClientStatus, Room, User};
use std::sync::Arc;

pub struct StoreRepository {
    db: Database,
    history: Arc<dyn HistoryProvider>,
}

impl StoreRepository {
    pub fn new(db: Database, history: Arc<dyn HistoryProvider>) -> Self {
        Self { db, history }
    }
}

#[async_trait]
impl Repository for StoreRepository {
    async fn available_client(
        &self,
        uid: &str,
        platform: &str,
    ) -> Result<ClientStatus, RepoError> {
        Ok(self.db.presence().status(uid, platform).await?)
    }

    async fn request_rooms(&self, uid: &str) -> Result<Vec<Room>, RepoError> {
        Ok(self.db.rooms().rooms_for(uid).await?)
    }

    async fn request_users(&self, _uid: &str) -> Result<Vec<User>, RepoError> {
        Ok(self.db.users().list().await?)
    }

    async fn get_user(&self, id: &str) -> Result<User, RepoError> {
        self.db
            .users()
            .get(id)
            .await?
            .ok_or_else(|| RepoError::UserNotFound(id.to_string()))
    }

    async fn create_user(&self, user: &User) -> Result<(), RepoError> {
        Ok(self.db.users().create(user).await?)
    }

    async fn delete_user(&self, id: &str) -> Result<(), RepoError> {
        if self.db.users().delete(id).await? {
            Ok(())
        } else {
            Err(RepoError::UserNotFound(id.to_string()))
        }
    }

    async fn create_room(&self, room: &Room, owner: &str) -> Result<(), RepoError> {
        Ok(self.db.rooms().create(room, owner).await?)
    }

    async fn members(&self, room_id: &str, only_managers: bool) -> Result<Vec<User>, RepoError> {
        Ok(self.db.rooms().members(room_id, only_managers).await?)
    }

    async fn join(&self, uid: &str, room_id: &str) -> Result<(), RepoError> {
        Ok(self.db.rooms().join(uid, room_id).await?)
    }

    async fn out(&self, uid: &str, room_id: &str) -> Result<(), RepoError> {
        self.db.rooms().out(uid, room_id).await?;
        Ok(())
    }

    async fn online(&self, uid: &str, platform: &str) -> Result<(), RepoError> {
        Ok(self.db.presence().set(uid, platform, true).await?)
    }

    async fn offline(&self, uid: &str, platform: &str) -> Result<(), RepoError> {
        Ok(self.db.presence().set(uid, platform, false).await?)
    }

    fn history(&self) -> &dyn HistoryProvider {
        self.history.as_ref()
    }
}
