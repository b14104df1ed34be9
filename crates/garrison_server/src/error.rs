//! Error types and handling for the game server.
//!
//! This module defines the error types that can occur during server operations,
//! providing clear categorization of different failure modes.

/// Enumeration of possible server errors.
///
/// Categorizes errors into network, configuration, and internal server errors
/// to help with debugging and error handling.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Network-related errors such as binding failures or connection issues
    #[error("Network error: {0}")]
    Network(String),

    /// Configuration errors such as double construction of the session controller
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal server errors including launch failures and state machine issues
    #[error("Internal error: {0}")]
    Internal(String),
}
