//! Session state management.
//!
//! - [`session`]: per-session handle, lifecycle and membership snapshot
//! - [`hub`]: the registry of live sessions, owned by a single actor task
//! - [`bridge`]: binds a session to its per-user broker topic
//! - [`conflict`]: forced takeover of stale sessions
//! - [`catch_up`]: one-shot event log replay for non-durable platforms
//! - [`matrix`]: the shared services handed to every session task

pub mod bridge;
pub mod catch_up;
pub mod conflict;
pub mod hub;
pub mod matrix;
pub mod session;

pub use bridge::SubscriptionBridge;
pub use catch_up::spawn_catch_up;
pub use conflict::ConflictResolver;
pub use hub::{Hub, HubHandle};
pub use matrix::Matrix;
pub use session::{Lifecycle, Membership, Outbound, RecentIds, Session, SessionHandle, SessionId};
