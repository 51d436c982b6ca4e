//! Control-topic messages used to force stale sessions closed.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which of a user's sessions a control message targets.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PlatformTarget {
    /// Every platform (account deregistration).
    All,
    /// One platform.
    Platform(String),
}

impl PlatformTarget {
    /// Wire value for the all-platforms target.
    pub const ALL: &'static str = "all";

    /// Whether a session on `platform` is covered by this target.
    pub fn matches(&self, platform: &str) -> bool {
        match self {
            Self::All => true,
            Self::Platform(p) => p == platform,
        }
    }
}

impl From<String> for PlatformTarget {
    fn from(value: String) -> Self {
        if value == Self::ALL {
            Self::All
        } else {
            Self::Platform(value)
        }
    }
}

impl From<&str> for PlatformTarget {
    fn from(value: &str) -> Self {
        Self::from(value.to_string())
    }
}

impl From<PlatformTarget> for String {
    fn from(target: PlatformTarget) -> Self {
        match target {
            PlatformTarget::All => PlatformTarget::ALL.to_string(),
            PlatformTarget::Platform(p) => p,
        }
    }
}

impl fmt::Display for PlatformTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str(Self::ALL),
            Self::Platform(p) => f.write_str(p),
        }
    }
}

/// Published on the service-wide control topic: close the sessions of
/// user `id` on `platform`, except the session that issued the kick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlMessage {
    /// User id.
    pub id: String,
    /// Targeted platform(s).
    pub platform: PlatformTarget,
    /// Id of the login that caused the kick. That session may already be
    /// registered when the kick lands and must survive it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,
}

impl ControlMessage {
    /// Target one platform of a user.
    pub fn kick(id: impl Into<String>, platform: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            platform: PlatformTarget::from(platform.into()),
            issuer: None,
        }
    }

    /// Target every platform of a user.
    pub fn kick_all(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            platform: PlatformTarget::All,
            issuer: None,
        }
    }

    /// Mark the session that issued this kick so it is spared.
    pub fn issued_by(mut self, session: impl Into<String>) -> Self {
        self.issuer = Some(session.into());
        self
    }

    /// Serialize for publishing.
    pub fn to_bytes(&self) -> Result<Vec<u8>, crate::ProtoError> {
        serde_json::to_vec(self).map_err(crate::ProtoError::Encode)
    }

    /// Parse a received payload.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, crate::ProtoError> {
        serde_json::from_slice(bytes).map_err(crate::ProtoError::Decode)
    }
}
