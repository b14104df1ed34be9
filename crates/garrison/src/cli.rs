//! Command-line interface handling for the Garrison host server.
//!
//! This module provides command-line argument parsing and CLI interface
//! management using the `clap` crate for robust argument handling.

use clap::{Arg, Command};
use std::path::PathBuf;

/// Command line arguments parsed from user input.
///
/// This structure holds all the command-line options that can be used to
/// override configuration file settings or provide runtime parameters.
#[derive(Debug, Clone)]
pub struct CliArgs {
    /// Path to the configuration file
    pub config_path: PathBuf,
    /// Optional override for bind address
    pub bind_address: Option<String>,
    /// Optional override for the host display name
    pub host_name: Option<String>,
    /// Optional game (by catalog name) to select at startup
    pub game: Option<String>,
    /// Optional override for the map folder
    pub map_folder: Option<PathBuf>,
    /// Optional shared password required at login
    pub server_password: Option<String>,
    /// Optional override for the remote-administration endpoint URI
    pub lobby_uri: Option<String>,
    /// Optional shared password authorizing remote moderation commands
    pub support_password: Option<String>,
    /// Optional override for log level
    pub log_level: Option<String>,
    /// Whether to force JSON log output
    pub json_logs: bool,
}

impl CliArgs {
    /// Parses command line arguments using clap.
    ///
    /// Sets up the command-line interface with all available options and
    /// returns a structured representation of the parsed arguments. On
    /// unknown or malformed arguments clap prints usage and exits.
    ///
    /// # Returns
    ///
    /// A `CliArgs` instance containing all parsed command-line options.
    pub fn parse() -> Self {
        let matches = Command::new("Garrison Host Server")
            .version(env!("CARGO_PKG_VERSION"))
            .about("Unattended host server for turn-based multiplayer games")
            .arg(
                Arg::new("config")
                    .short('c')
                    .long("config")
                    .value_name("FILE")
                    .help("Configuration file path")
                    .default_value("config.toml"),
            )
            .arg(
                Arg::new("bind")
                    .short('b')
                    .long("bind")
                    .value_name("ADDRESS")
                    .help("Bind address (e.g., 127.0.0.1:3300)"),
            )
            .arg(
                Arg::new("name")
                    .short('n')
                    .long("name")
                    .value_name("NAME")
                    .help("Host display name (must start with 'Bot', at least 7 characters)"),
            )
            .arg(
                Arg::new("game")
                    .short('g')
                    .long("game")
                    .value_name("GAME")
                    .help("Game to select at startup, by catalog name"),
            )
            .arg(
                Arg::new("map-folder")
                    .short('m')
                    .long("map-folder")
                    .value_name("DIR")
                    .help("Directory scanned for hostable game files"),
            )
            .arg(
                Arg::new("password")
                    .short('p')
                    .long("password")
                    .value_name("PASSWORD")
                    .help("Shared password required at login"),
            )
            .arg(
                Arg::new("lobby-uri")
                    .long("lobby-uri")
                    .value_name("URI")
                    .help("Remote-administration endpoint URI"),
            )
            .arg(
                Arg::new("support-password")
                    .long("support-password")
                    .value_name("PASSWORD")
                    .help("Shared password authorizing remote moderation commands"),
            )
            .arg(
                Arg::new("log-level")
                    .short('l')
                    .long("log-level")
                    .value_name("LEVEL")
                    .help("Log level (trace, debug, info, warn, error)"),
            )
            .arg(
                Arg::new("json-logs")
                    .long("json-logs")
                    .help("Output logs in JSON format")
                    .action(clap::ArgAction::SetTrue),
            )
            .get_matches();

        Self {
            config_path: PathBuf::from(
                matches
                    .get_one::<String>("config")
                    .expect("Default config path should always be set"),
            ),
            bind_address: matches.get_one::<String>("bind").cloned(),
            host_name: matches.get_one::<String>("name").cloned(),
            game: matches.get_one::<String>("game").cloned(),
            map_folder: matches.get_one::<String>("map-folder").map(PathBuf::from),
            server_password: matches.get_one::<String>("password").cloned(),
            lobby_uri: matches.get_one::<String>("lobby-uri").cloned(),
            support_password: matches.get_one::<String>("support-password").cloned(),
            log_level: matches.get_one::<String>("log-level").cloned(),
            json_logs: matches.get_flag("json-logs"),
        }
    }
}

/// Prints a usage block enumerating each flag and its expected form.
///
/// Shown before a non-zero exit when startup configuration is invalid.
pub fn print_usage() {
    eprintln!("usage: garrison [OPTIONS]");
    eprintln!("  -c, --config <FILE>              configuration file path (default: config.toml)");
    eprintln!("  -b, --bind <ADDRESS>             bind address with a positive port, e.g. 127.0.0.1:3300");
    eprintln!("  -n, --name <NAME>                host display name, 'Bot' prefix, at least 7 characters");
    eprintln!("  -g, --game <GAME>                game to select at startup, by catalog name");
    eprintln!("  -m, --map-folder <DIR>           directory scanned for hostable game files");
    eprintln!("  -p, --password <PASSWORD>        shared password required at login");
    eprintln!("      --lobby-uri <URI>            remote-administration endpoint URI (non-empty)");
    eprintln!("      --support-password <PASSWORD> shared password for remote moderation commands");
    eprintln!("  -l, --log-level <LEVEL>          trace, debug, info, warn, or error");
    eprintln!("      --json-logs                  output logs in JSON format");
}
