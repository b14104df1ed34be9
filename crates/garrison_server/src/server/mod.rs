//! Network-facing server: accept loop and per-connection handlers.

pub mod core;
pub mod handlers;

pub use core::GameHostServer;
pub use handlers::handle_connection;
