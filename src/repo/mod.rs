//! Repository contract consumed by the session engine.
//!
//! Directory data (users, rooms, membership, presence) lives in an
//! implementation-specific store; the event log is delegated to a
//! [`HistoryProvider`] so both implementations share write/read semantics.

use crate::db::DbError;
use crate::history::{HistoryError, HistoryProvider};
use async_trait::async_trait;
use chat_proto::{ClientStatus, Event, Room, User};
use thiserror::Error;

mod memory;
mod store;

pub use memory::MemoryRepository;
pub use store::StoreRepository;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("user not found: {0}")]
    UserNotFound(String),
    #[error("room not found: {0}")]
    RoomNotFound(String),
    #[error("user already exists: {0}")]
    UserExists(String),
    #[error("room already exists: {0}")]
    RoomExists(String),
    #[error(transparent)]
    Db(DbError),
    #[error(transparent)]
    History(#[from] HistoryError),
}

impl From<DbError> for RepoError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::UserNotFound(id) => Self::UserNotFound(id),
            DbError::RoomNotFound(id) => Self::RoomNotFound(id),
            DbError::UserExists(id) => Self::UserExists(id),
            DbError::RoomExists(id) => Self::RoomExists(id),
            other => Self::Db(other),
        }
    }
}

#[async_trait]
pub trait Repository: Send + Sync {
    /// Recorded online status of (uid, platform).
    async fn available_client(&self, uid: &str, platform: &str)
    -> Result<ClientStatus, RepoError>;

    /// Rooms `uid` belongs to.
    async fn request_rooms(&self, uid: &str) -> Result<Vec<Room>, RepoError>;

    /// Users visible to `uid` (the whole directory).
    async fn request_users(&self, uid: &str) -> Result<Vec<User>, RepoError>;

    async fn get_user(&self, id: &str) -> Result<User, RepoError>;

    async fn create_user(&self, user: &User) -> Result<(), RepoError>;

    async fn delete_user(&self, id: &str) -> Result<(), RepoError>;

    /// Create a room; `owner` becomes its first manager.
    async fn create_room(&self, room: &Room, owner: &str) -> Result<(), RepoError>;

    async fn members(&self, room_id: &str, only_managers: bool) -> Result<Vec<User>, RepoError>;

    async fn join(&self, uid: &str, room_id: &str) -> Result<(), RepoError>;

    async fn out(&self, uid: &str, room_id: &str) -> Result<(), RepoError>;

    async fn online(&self, uid: &str, platform: &str) -> Result<(), RepoError>;

    async fn offline(&self, uid: &str, platform: &str) -> Result<(), RepoError>;

    /// Event log backing `write`, `remove` and `read`.
    fn history(&self) -> &dyn HistoryProvider;

    /// Persist an event and reference it from the log of each recipient.
    /// The event must already carry its id; that id is returned. An empty
    /// recipient list stores the record alone.
    async fn write(&self, event: &Event, recipients: &[String]) -> Result<String, RepoError> {
        self.history().store(event, recipients).await?;
        Ok(event.id.clone())
    }

    /// Whether an event with this id is already persisted.
    async fn contains(&self, id: &str) -> Result<bool, RepoError> {
        Ok(self.history().contains(id).await?)
    }

    async fn remove(&self, id: &str) -> Result<(), RepoError> {
        self.history().remove(id).await?;
        Ok(())
    }

    /// Events for `uid` at or after `since`; older entries are pruned.
    async fn read(&self, uid: &str, since: i64) -> Result<Vec<Event>, RepoError> {
        Ok(self.history().read_since(uid, since).await?)
    }
}
