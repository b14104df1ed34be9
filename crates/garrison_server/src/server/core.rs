//! Core hosting server implementation.
//!
//! This module contains the main `GameHostServer` struct and its
//! implementation, tying together the node registry, chat moderation, and
//! the WebSocket accept loop.

use crate::{
    chat::ChatModerationEngine,
    config::ServerConfig,
    error::ServerError,
    registry::NodeRegistry,
    server::handlers::handle_connection,
    shutdown::ShutdownState,
};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{error, info};

/// The core hosting server structure.
///
/// `GameHostServer` owns the network-facing side of the host: it binds the
/// listener, accepts connections, and hands each one to a per-connection
/// handler. Admission decisions live in the [`NodeRegistry`]; chat policy
/// lives in the [`ChatModerationEngine`]. The server itself carries no
/// game rules.
pub struct GameHostServer {
    /// Server configuration settings
    config: ServerConfig,

    /// Authoritative set of connected nodes
    registry: Arc<NodeRegistry>,

    /// Chat participant tracking, mutes, and word filtering
    chat: Arc<ChatModerationEngine>,

    /// Channel for coordinating server shutdown
    shutdown_sender: broadcast::Sender<()>,
}

impl GameHostServer {
    /// Creates a new hosting server with the specified configuration.
    ///
    /// # Arguments
    ///
    /// * `config` - Configuration parameters for server behavior
    /// * `registry` - Node registry performing admission and fan-out
    /// * `chat` - Moderation engine attached to every admitted session
    pub fn new(
        config: ServerConfig,
        registry: Arc<NodeRegistry>,
        chat: Arc<ChatModerationEngine>,
    ) -> Self {
        let (shutdown_sender, _) = broadcast::channel(1);
        Self {
            config,
            registry,
            chat,
            shutdown_sender,
        }
    }

    /// Starts the server and begins accepting connections with graceful
    /// shutdown support.
    ///
    /// The accept loop checks the shutdown state before each accept, so
    /// the server stops admitting connections promptly once shutdown is
    /// initiated. Existing connections drain through their own handlers.
    ///
    /// # Arguments
    ///
    /// * `shutdown_state` - Shared shutdown state for coordinating graceful shutdown
    ///
    /// # Returns
    ///
    /// `Ok(())` if the server started and stopped cleanly, or a `ServerError`
    /// if binding or accepting failed.
    pub async fn start_with_shutdown_state(
        &self,
        shutdown_state: ShutdownState,
    ) -> Result<(), ServerError> {
        info!("🚀 Starting host server on {}", self.config.bind_address);
        info!("📛 Host name: {}", self.config.host_name);

        let listener = tokio::net::TcpListener::bind(self.config.bind_address)
            .await
            .map_err(|e| ServerError::Network(format!("Listener bind failed: {e}")))?;
        info!("✅ Listener bound on {}", self.config.bind_address);

        let mut shutdown_receiver = self.shutdown_sender.subscribe();

        let registry = self.registry.clone();
        let chat = self.chat.clone();
        let host_name = self.config.host_name.clone();
        let accept_loop = async move {
            loop {
                if shutdown_state.is_shutdown_initiated() {
                    info!("🛑 Accept loop stopping - shutdown initiated");
                    break;
                }

                match listener.accept().await {
                    Ok((stream, addr)) => {
                        let registry = registry.clone();
                        let chat = chat.clone();
                        let host_name = host_name.clone();

                        // Spawn individual connection handler
                        tokio::spawn(async move {
                            if let Err(e) =
                                handle_connection(stream, addr, host_name, registry, chat).await
                            {
                                error!("Connection error: {:?}", e);
                            }
                        });
                    }
                    Err(e) => {
                        error!("Failed to accept connection: {}", e);
                        break;
                    }
                }
            }
        };

        // Run until shutdown is initiated or internal shutdown signal
        tokio::select! {
            _ = accept_loop => {}
            _ = shutdown_receiver.recv() => {
                info!("Internal shutdown signal received");
            }
        }

        info!("Server stopped");
        Ok(())
    }

    /// Initiates server shutdown.
    ///
    /// Signals the accept loop to stop. Connected nodes are removed as
    /// their handlers observe the closed connections.
    pub async fn shutdown(&self) -> Result<(), ServerError> {
        info!("🛑 Shutting down host server...");
        let _ = self.shutdown_sender.send(());
        Ok(())
    }

    /// Gets the node registry shared with this server.
    pub fn registry(&self) -> Arc<NodeRegistry> {
        self.registry.clone()
    }

    /// Gets the chat moderation engine shared with this server.
    pub fn chat(&self) -> Arc<ChatModerationEngine> {
        self.chat.clone()
    }
}
