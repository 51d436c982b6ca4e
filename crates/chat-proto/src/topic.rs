//! Pub/sub topic naming.

/// Topic names derived from a service namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topics {
    service: String,
}

impl Topics {
    /// Suffix of the monitoring mirror topic.
    pub const ADMIN: &'static str = "admin";

    /// Topics under `service`.
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    /// The namespace itself.
    pub fn service(&self) -> &str {
        &self.service
    }

    /// Per-user delivery topic: `<service>.<uid>`.
    pub fn user(&self, uid: &str) -> String {
        format!("{}.{}", self.service, uid)
    }

    /// Service-wide control topic: `<service>`.
    pub fn control(&self) -> &str {
        &self.service
    }

    /// Monitoring mirror topic: `<service>.admin`.
    pub fn admin(&self) -> String {
        self.user(Self::ADMIN)
    }

    /// Broker client id for a (user, platform) pair; only `-` and `_`
    /// survive as separators.
    pub fn client_id(&self, uid: &str, platform: &str) -> String {
        format!("{}.{}.{}", self.service, uid, platform).replace('.', "-")
    }
}
