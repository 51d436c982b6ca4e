//! Integration test common infrastructure.
//!
//! Provides utilities for spawning the daemon, provisioning accounts over
//! the admin API, and driving WebSocket clients.

pub mod client;
pub mod server;

#[allow(unused_imports)]
pub use client::TestClient;
#[allow(unused_imports)]
pub use server::TestServer;
