//! Configuration loading and management.
//!
//! This module is split into logical submodules:
//! - [`types`]: Top-level config struct, server identity, database, loading
//! - [`listen`]: WebSocket listener and TLS configuration
//! - [`history`]: Event log storage configuration
//! - [`session`]: Session engine and broker tuning
//! - [`validation`]: Startup validation collecting every problem

mod history;
mod listen;
mod session;
mod types;
pub mod validation;

pub use listen::{ListenConfig, TlsConfig};
pub use session::SessionConfig;
pub use types::Config;
