//! Login payload carried in the body of an `auth` event.

use crate::ProtoError;
use serde::{Deserialize, Serialize};

/// Identity and replay cursor supplied at login.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthBody {
    /// User id.
    pub id: String,
    /// Credential for the external auth provider; the daemon does not check it.
    pub password: String,
    /// Client platform, e.g. `mobile` or `web`.
    pub platform: String,
    /// Watermark (unix seconds) to replay from; 0 replays everything available.
    pub start: i64,
}

impl AuthBody {
    /// Parse from an event body.
    pub fn from_body(body: &str) -> Result<Self, ProtoError> {
        serde_json::from_str(body).map_err(ProtoError::Decode)
    }

    /// Require the identity fields.
    pub fn validate(&self) -> Result<(), ProtoError> {
        if self.id.is_empty() {
            return Err(ProtoError::MissingField("id"));
        }
        if self.platform.is_empty() {
            return Err(ProtoError::MissingField("platform"));
        }
        Ok(())
    }

    /// The replay watermark, `None` when the client asked for everything.
    pub fn watermark(&self) -> Option<i64> {
        (self.start > 0).then_some(self.start)
    }
}
