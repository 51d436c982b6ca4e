//! Network module.
//!
//! Contains the Gateway (WebSocket listener) and the per-session Connection.

mod connection;
mod gateway;

pub use connection::{Connection, WsTransport};
pub use gateway::Gateway;
