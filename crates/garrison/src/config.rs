//! Configuration management for the Garrison host server.
//!
//! This module handles loading, validation, and conversion of server
//! configuration from TOML files and command-line arguments.

use garrison_server::headless::{BOT_NAME_PREFIX, MIN_HOST_NAME_LEN};
use garrison_server::ServerConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::info;

/// Default readiness poll interval for serde deserialization
fn default_poll_interval_secs() -> u64 {
    8
}

/// Default for min_players
fn default_min_players() -> usize {
    2
}

/// Application configuration loaded from TOML file.
///
/// This is the main configuration structure that encompasses all server
/// settings including networking, hosting, and logging.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Server configuration settings
    pub server: ServerSettings,
    /// Hosting configuration settings
    pub hosting: HostingSettings,
    /// Remote administration (lobby) settings
    #[serde(default)]
    pub lobby: LobbySettings,
    /// Logging configuration settings
    pub logging: LoggingSettings,
}

/// Server-specific configuration settings.
///
/// Controls network binding, the advertised host identity, and admission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Network address to bind the server to (e.g., "127.0.0.1:3300")
    pub bind_address: String,
    /// Display name the host advertises to connecting clients
    pub host_name: String,
    /// Shared password required at login (empty means accept anyone)
    #[serde(default)]
    pub server_password: Option<String>,
    /// Minimum connected players before a game may launch
    #[serde(default = "default_min_players")]
    pub min_players: usize,
    /// Readiness poll interval in seconds
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
}

/// Hosting configuration: where games come from and what to start with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostingSettings {
    /// Directory scanned for hostable game files
    pub map_folder: String,
    /// Game to select at startup, by catalog name
    #[serde(default)]
    pub game: Option<String>,
    /// Save game to load at startup, by file path
    #[serde(default)]
    pub save_file: Option<String>,
}

/// Remote administration endpoint settings.
///
/// The lobby is the external service administrators reach this host
/// through; the support password authorizes remote moderation commands.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LobbySettings {
    /// URI of the remote-administration endpoint
    pub uri: String,
    /// Shared password authorizing remote moderation commands
    #[serde(default)]
    pub support_password: Option<String>,
}

impl Default for LobbySettings {
    fn default() -> Self {
        Self {
            uri: "wss://lobby.example.net".to_string(),
            support_password: None,
        }
    }
}

/// Logging system configuration.
///
/// Controls log output format, levels, and destination settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level filter (trace, debug, info, warn, error)
    pub level: String,
    /// Whether to output logs in JSON format
    pub json_format: bool,
    /// Optional file path for log output (None means stdout only)
    pub file_path: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerSettings {
                bind_address: "127.0.0.1:3300".to_string(),
                host_name: "Bot_host".to_string(),
                server_password: None,
                min_players: default_min_players(),
                poll_interval_secs: default_poll_interval_secs(),
            },
            hosting: HostingSettings {
                map_folder: "maps".to_string(),
                game: None,
                save_file: None,
            },
            lobby: LobbySettings::default(),
            logging: LoggingSettings {
                level: "info".to_string(),
                json_format: false,
                file_path: None,
            },
        }
    }
}

impl AppConfig {
    /// Loads configuration from a TOML file.
    ///
    /// If the file doesn't exist, creates a default configuration file at
    /// the specified path and returns the default configuration.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    ///
    /// The loaded or default configuration, or an error if loading/creation failed.
    pub async fn load_from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        if path.exists() {
            let content = tokio::fs::read_to_string(path).await?;
            let config: AppConfig = toml::from_str(&content)?;
            Ok(config)
        } else {
            // Create default config file
            let default_config = AppConfig::default();
            let toml_content = toml::to_string_pretty(&default_config)?;
            tokio::fs::write(path, toml_content).await?;
            info!("Created default configuration file: {}", path.display());
            Ok(default_config)
        }
    }

    /// Converts the application configuration to a host server configuration.
    ///
    /// # Returns
    ///
    /// A `ServerConfig` instance ready for use with the host server.
    pub fn to_server_config(&self) -> Result<ServerConfig, Box<dyn std::error::Error>> {
        Ok(ServerConfig {
            bind_address: self.server.bind_address.parse()?,
            host_name: self.server.host_name.clone(),
            server_password: self.server.server_password.clone(),
        })
    }

    /// Validates the configuration for consistency and correctness.
    ///
    /// Checks the bind address, host name rules, hosting parameters, and
    /// logging settings for validity.
    ///
    /// # Returns
    ///
    /// `Ok(())` if the configuration is valid, or an error string describing the issue.
    pub fn validate(&self) -> Result<(), String> {
        // Validate bind address; port 0 would make the host unreachable
        // at a predictable address.
        match self.server.bind_address.parse::<std::net::SocketAddr>() {
            Ok(addr) if addr.port() == 0 => {
                return Err("Listen port must be a positive integer".to_string());
            }
            Ok(_) => {}
            Err(_) => {
                return Err(format!(
                    "Invalid bind address: {}",
                    &self.server.bind_address
                ));
            }
        }

        // Validate host name: automated hosts advertise a "Bot" prefix
        if !self.server.host_name.starts_with(BOT_NAME_PREFIX) {
            return Err(format!(
                "Host name must start with '{BOT_NAME_PREFIX}': {}",
                &self.server.host_name
            ));
        }
        if self.server.host_name.len() < MIN_HOST_NAME_LEN {
            return Err(format!(
                "Host name must be at least {MIN_HOST_NAME_LEN} characters: {}",
                &self.server.host_name
            ));
        }

        if self.server.min_players == 0 {
            return Err("server.min_players must be greater than 0".to_string());
        }

        if self.server.poll_interval_secs == 0 {
            return Err("server.poll_interval_secs must be greater than 0".to_string());
        }

        // Validate map folder
        if self.hosting.map_folder.is_empty() {
            return Err("Map folder cannot be empty".to_string());
        }

        // Validate lobby endpoint
        if self.lobby.uri.is_empty() {
            return Err("Lobby URI cannot be empty".to_string());
        }

        // Validate log level
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(format!(
                "Invalid log level: {}. Must be one of: {valid_levels:?}",
                &self.logging.level
            ));
        }

        Ok(())
    }
}
