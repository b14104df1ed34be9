//! Server configuration types and defaults.
//!
//! This module contains the server configuration structure and default values
//! used to initialize and customize the hosting server behavior.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

/// Configuration structure for the hosting server.
///
/// Contains the parameters the network-facing server consumes: where to
/// bind, what identity to advertise, and how admission is gated. The
/// headless lifecycle is configured separately on its controller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// The socket address to bind the server to
    pub bind_address: SocketAddr,

    /// Display name the host advertises to connecting clients
    pub host_name: String,

    /// Shared password required at login (None to accept anyone)
    pub server_password: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:3300".parse().expect("Invalid default bind address"),
            host_name: "Bot_host".to_string(),
            server_password: None,
        }
    }
}
