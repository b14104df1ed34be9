//! Main application logic and lifecycle management.
//!
//! This module contains the core `Application` struct that orchestrates
//! server startup, the headless game lifecycle, and graceful shutdown.

use crate::{cli::CliArgs, config::AppConfig, logging::display_banner, signals::{setup_signal_handlers, setup_signal_handlers_silent}};
use async_trait::async_trait;
use garrison_server::headless::{
    AvailableGames, GameData, GameLauncher, GameSession, HeadlessSessionController,
    LaunchOutcome, MinimumPlayersReadiness,
};
use garrison_server::{create_server_with_config, GameHostServer, NodeRegistry, ShutdownState};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// A hosted round as seen by the relay: it starts when announced to every
/// node and ends when stopped.
struct RelaySession {
    registry: Arc<NodeRegistry>,
    over: AtomicBool,
}

#[async_trait]
impl GameSession for RelaySession {
    async fn stop(&self) {
        self.over.store(true, Ordering::SeqCst);
        let notice = serde_json::json!({ "event": "game_stopped" });
        self.registry.broadcast(notice.to_string().as_bytes()).await;
    }

    fn is_over(&self) -> bool {
        self.over.load(Ordering::SeqCst)
    }
}

/// Launcher that announces the round to every connected node.
///
/// The rules engine itself runs on the clients; the host relays. A launch
/// with nobody connected fails so the controller returns to waiting.
struct RelayLauncher {
    registry: Arc<NodeRegistry>,
}

#[async_trait]
impl GameLauncher for RelayLauncher {
    async fn launch(&self, game: &GameData) -> LaunchOutcome {
        if self.registry.node_count().await == 0 {
            return LaunchOutcome::Failed("no connected nodes".to_string());
        }
        let notice = serde_json::json!({ "event": "game_started", "game": game.game_name });
        self.registry.broadcast(notice.to_string().as_bytes()).await;
        LaunchOutcome::Started(Arc::new(RelaySession {
            registry: self.registry.clone(),
            over: AtomicBool::new(false),
        }))
    }
}

/// Main application struct for the Garrison host.
///
/// The `Application` struct manages the complete lifecycle of the server,
/// including configuration loading, server initialization, the headless
/// session controller, and graceful shutdown handling.
pub struct Application {
    /// Loaded application configuration
    config: AppConfig,
    /// Host server instance
    server: GameHostServer,
}

impl Application {
    /// Creates a new application instance.
    ///
    /// Loads configuration, applies CLI overrides, validates settings, and
    /// initializes the host server.
    ///
    /// # Arguments
    ///
    /// * `args` - Parsed command-line arguments
    ///
    /// # Returns
    ///
    /// A configured `Application` instance ready to run, or an error if
    /// initialization failed.
    pub async fn new(args: CliArgs) -> Result<Self, Box<dyn std::error::Error>> {
        info!("🔧 Loading configuration from: {}", args.config_path.display());
        let mut config = AppConfig::load_from_file(&args.config_path).await?;

        // Apply CLI overrides
        if let Some(bind_address) = args.bind_address {
            config.server.bind_address = bind_address;
        }

        if let Some(host_name) = args.host_name {
            config.server.host_name = host_name;
        }

        if let Some(password) = args.server_password {
            config.server.server_password = Some(password);
        }

        if let Some(map_folder) = args.map_folder {
            config.hosting.map_folder = map_folder.to_string_lossy().to_string();
        }

        if let Some(game) = args.game {
            config.hosting.game = Some(game);
        }

        if let Some(lobby_uri) = args.lobby_uri {
            config.lobby.uri = lobby_uri;
        }

        if let Some(support_password) = args.support_password {
            config.lobby.support_password = Some(support_password);
        }

        if let Some(log_level) = args.log_level {
            config.logging.level = log_level;
        }

        if args.json_logs {
            config.logging.json_format = true;
        }

        // Validate configuration
        if let Err(e) = config.validate() {
            return Err(format!("Configuration validation failed: {e}").into());
        }
        info!("✅ Configuration loaded and validated successfully");

        display_banner();

        let server_config = config.to_server_config()?;
        let server = create_server_with_config(server_config);

        info!("🏰 Garrison Host Server v{}", env!("CARGO_PKG_VERSION"));
        info!(
            "📂 Config: {} | Maps: {} | Lobby: {}",
            args.config_path.display(),
            config.hosting.map_folder,
            config.lobby.uri
        );

        Ok(Self { config, server })
    }

    /// Runs the application until a shutdown signal arrives.
    ///
    /// Installs the session controller, starts the readiness poll loop and
    /// the accept loop, waits for termination signals, and performs the
    /// graceful shutdown sequence.
    ///
    /// # Returns
    ///
    /// `Ok(())` if the application ran and shut down successfully, or an
    /// error if there was a critical failure during execution.
    pub async fn run(self) -> Result<(), Box<dyn std::error::Error>> {
        info!("🌟 Starting Garrison Host Server");

        let registry = self.server.registry();
        let shutdown_state = ShutdownState::new();

        // Wire up the headless session controller
        let catalog = AvailableGames::scan(std::path::Path::new(&self.config.hosting.map_folder));
        let controller = HeadlessSessionController::new(
            catalog,
            Arc::new(MinimumPlayersReadiness::new(
                registry.clone(),
                self.config.server.min_players,
            )),
            Arc::new(RelayLauncher {
                registry: registry.clone(),
            }),
            Duration::from_secs(self.config.server.poll_interval_secs),
            shutdown_state.clone(),
        );
        HeadlessSessionController::install(controller.clone())?;

        // Select the startup game, if configured
        if let Some(game) = &self.config.hosting.game {
            controller.set_game_map(game).await;
        }

        // A configured save file takes precedence over a fresh map
        if let Some(save) = &self.config.hosting.save_file {
            controller.load_game_save(std::path::Path::new(save)).await;
        }

        let poll_handle = controller.start().await;

        // Start server in background
        let shutdown_state_for_server = shutdown_state.clone();
        let server_handle = {
            let server = self.server;
            tokio::spawn(async move {
                match server.start_with_shutdown_state(shutdown_state_for_server).await {
                    Ok(()) => {
                        info!("✅ Server completed successfully");
                    }
                    Err(e) => {
                        error!("❌ Server error: {:?}", e);
                        std::process::exit(1);
                    }
                }
            })
        };

        info!("✅ Garrison Server is now running!");
        info!(
            "🎮 Ready to accept connections on {}",
            self.config.server.bind_address
        );
        info!("🛑 Press Ctrl+C to gracefully shutdown");

        // Wait for shutdown signal
        let signal_shutdown_state = setup_signal_handlers().await?;

        // A second signal skips the graceful path entirely.
        tokio::spawn(async move {
            if let Err(e) = setup_signal_handlers_silent().await {
                error!("Failed to set up second-signal handler: {e}");
                return;
            }
            warn!("Shutdown handler received again! I'll make this quick.");
            std::process::exit(1);
        });

        // Transfer shutdown state to our components
        if signal_shutdown_state.is_shutdown_initiated() {
            shutdown_state.initiate_shutdown();
        }

        info!("🛑 Shutdown signal received, beginning graceful shutdown...");

        // Stop the game lifecycle first so no launch races the teardown
        controller.shutdown().await;
        poll_handle.abort();

        // Then stop accepting connections
        server_handle.abort();
        if let Err(e) = tokio::time::timeout(Duration::from_secs(8), server_handle).await {
            warn!("⏰ Server task did not complete within timeout: {:?}", e);
        } else {
            info!("✅ Server task completed gracefully");
        }

        // Give time for connection cleanup
        info!("⏳ Waiting for connections to close...");
        tokio::time::sleep(Duration::from_secs(1)).await;

        info!("✅ Garrison Host Server shutdown complete");
        info!("👋 Thank you for using Garrison!");

        Ok(())
    }
}

