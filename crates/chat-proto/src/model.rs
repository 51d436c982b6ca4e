//! Directory records returned by the repository.

use serde::{Deserialize, Serialize};

/// A registered user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Unique id.
    pub id: String,
    /// Display name.
    pub name: String,
}

/// A chat room.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    /// Unique id.
    pub id: String,
    /// Display name.
    pub name: String,
}

/// Recorded online state of one (user, platform) pair.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientStatus {
    /// User id.
    pub id: String,
    /// Platform.
    pub platform: String,
    /// Whether a session is recorded online.
    pub is_online: bool,
}
