//! Repository kept entirely in process memory.

use super::{RepoError, Repository};
use crate::history::HistoryProvider;
use async_trait::async_trait;
use chat_proto::{ClientStatus, Room, User};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::collections::BTreeMap;
use std::sync::Arc;

struct RoomEntry {
    room: Room,
    /// member id -> is manager
    members: BTreeMap<String, bool>,
}

pub struct MemoryRepository {
    users: DashMap<String, User>,
    rooms: DashMap<String, RoomEntry>,
    status: DashMap<(String, String), bool>,
    history: Arc<dyn HistoryProvider>,
}

impl MemoryRepository {
    pub fn new(history: Arc<dyn HistoryProvider>) -> Self {
        Self {
            users: DashMap::new(),
            rooms: DashMap::new(),
            status: DashMap::new(),
            history,
        }
    }

    fn require_user(&self, id: &str) -> Result<(), RepoError> {
        if self.users.contains_key(id) {
            Ok(())
        } else {
            Err(RepoError::UserNotFound(id.to_string()))
        }
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn available_client(
        &self,
        uid: &str,
        platform: &str,
    ) -> Result<ClientStatus, RepoError> {
        let is_online = self
            .status
            .get(&(uid.to_string(), platform.to_string()))
            .is_some_and(|s| *s);
        Ok(ClientStatus {
            id: uid.to_string(),
            platform: platform.to_string(),
            is_online,
        })
    }

    async fn request_rooms(&self, uid: &str) -> Result<Vec<Room>, RepoError> {
        let mut rooms: Vec<Room> = self
            .rooms
            .iter()
            .filter(|entry| entry.members.contains_key(uid))
            .map(|entry| entry.room.clone())
            .collect();
        rooms.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(rooms)
    }

    async fn request_users(&self, _uid: &str) -> Result<Vec<User>, RepoError> {
        let mut users: Vec<User> = self.users.iter().map(|u| u.value().clone()).collect();
        users.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(users)
    }

    async fn get_user(&self, id: &str) -> Result<User, RepoError> {
        self.users
            .get(id)
            .map(|u| u.value().clone())
            .ok_or_else(|| RepoError::UserNotFound(id.to_string()))
    }

    async fn create_user(&self, user: &User) -> Result<(), RepoError> {
        match self.users.entry(user.id.clone()) {
            Entry::Occupied(_) => Err(RepoError::UserExists(user.id.clone())),
            Entry::Vacant(slot) => {
                slot.insert(user.clone());
                Ok(())
            }
        }
    }

    async fn delete_user(&self, id: &str) -> Result<(), RepoError> {
        if self.users.remove(id).is_none() {
            return Err(RepoError::UserNotFound(id.to_string()));
        }
        for mut entry in self.rooms.iter_mut() {
            entry.members.remove(id);
        }
        self.status.retain(|(uid, _), _| uid != id);
        Ok(())
    }

    async fn create_room(&self, room: &Room, owner: &str) -> Result<(), RepoError> {
        self.require_user(owner)?;
        match self.rooms.entry(room.id.clone()) {
            Entry::Occupied(_) => Err(RepoError::RoomExists(room.id.clone())),
            Entry::Vacant(slot) => {
                slot.insert(RoomEntry {
                    room: room.clone(),
                    members: BTreeMap::from([(owner.to_string(), true)]),
                });
                Ok(())
            }
        }
    }

    async fn members(&self, room_id: &str, only_managers: bool) -> Result<Vec<User>, RepoError> {
        let Some(entry) = self.rooms.get(room_id) else {
            return Ok(Vec::new());
        };
        let ids: Vec<String> = entry
            .members
            .iter()
            .filter(|(_, manager)| !only_managers || **manager)
            .map(|(id, _)| id.clone())
            .collect();
        drop(entry);

        Ok(ids
            .into_iter()
            .filter_map(|id| self.users.get(&id).map(|u| u.value().clone()))
            .collect())
    }

    async fn join(&self, uid: &str, room_id: &str) -> Result<(), RepoError> {
        self.require_user(uid)?;
        let mut entry = self
            .rooms
            .get_mut(room_id)
            .ok_or_else(|| RepoError::RoomNotFound(room_id.to_string()))?;
        entry.members.entry(uid.to_string()).or_insert(false);
        Ok(())
    }

    async fn out(&self, uid: &str, room_id: &str) -> Result<(), RepoError> {
        if let Some(mut entry) = self.rooms.get_mut(room_id) {
            entry.members.remove(uid);
        }
        Ok(())
    }

    async fn online(&self, uid: &str, platform: &str) -> Result<(), RepoError> {
        self.status
            .insert((uid.to_string(), platform.to_string()), true);
        Ok(())
    }

    async fn offline(&self, uid: &str, platform: &str) -> Result<(), RepoError> {
        if let Some(mut status) = self
            .status
            .get_mut(&(uid.to_string(), platform.to_string()))
        {
            *status = false;
        }
        Ok(())
    }

    fn history(&self) -> &dyn HistoryProvider {
        self.history.as_ref()
    }
}
