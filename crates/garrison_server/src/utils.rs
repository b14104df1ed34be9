//! Utility functions and helper methods for the hosting server.
//!
//! This module provides convenient factory functions for wiring the
//! registry, moderation engine, and server together.

use crate::{
    chat::ChatModerationEngine,
    config::ServerConfig,
    login::{LoginValidator, SharedPasswordVerifier},
    moderation::BanStore,
    registry::NodeRegistry,
    server::GameHostServer,
};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Creates a new hosting server with default configuration.
///
/// This is a convenience function for quickly setting up a server
/// with sensible defaults for development and testing.
///
/// # Returns
///
/// A new `GameHostServer` instance configured with default settings.
pub fn create_server() -> GameHostServer {
    create_server_with_config(ServerConfig::default())
}

/// Creates a new hosting server with custom configuration.
///
/// Wires up a fresh ban store, a login validator backed by the configured
/// server password, a node registry, and a chat moderation engine with an
/// initially empty word list.
///
/// # Arguments
///
/// * `config` - A `ServerConfig` instance with desired settings
///
/// # Returns
///
/// A new `GameHostServer` instance configured with the provided settings.
pub fn create_server_with_config(config: ServerConfig) -> GameHostServer {
    let ban_store = Arc::new(BanStore::new());
    let verifier = Arc::new(SharedPasswordVerifier::new(config.server_password.clone()));
    let validator = LoginValidator::new(ban_store.clone(), verifier);
    let registry = Arc::new(NodeRegistry::new(validator, ban_store));
    let chat = Arc::new(ChatModerationEngine::new(Arc::new(RwLock::new(Vec::new()))));
    GameHostServer::new(config, registry, chat)
}
