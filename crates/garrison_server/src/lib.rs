//! # Garrison Server - Headless Game Hosting Foundation
//!
//! A production-ready hosting server for turn-based multiplayer games. The
//! server owns connection admission, node registration, chat moderation,
//! and the unattended game lifecycle, while delegating the game rules
//! themselves to an external engine behind the [`GameLauncher`] trait.
//!
//! ## Design Philosophy
//!
//! The server core contains **NO game rules** - it only provides hosting
//! infrastructure:
//!
//! * **WebSocket connection management** - Login admission, node registry, fan-out
//! * **Moderation** - IP/MAC bans, temporary mutes, word filtering
//! * **Headless lifecycle** - Wait for players, launch, recover, cycle
//! * **Identity** - Collision-free display names with reversible suffixes
//!
//! ## Architecture Overview
//!
//! ### Core Components
//!
//! * **Node Registry** - Authoritative set of connected nodes
//! * **Login Validator** - Ordered admission checks (bans, credentials, gate)
//! * **Ban Store** - Subject-keyed ban tables with implicit expiry
//! * **Chat Moderation Engine** - Participants, mutes, word list evaluation
//! * **Headless Session Controller** - The state machine driving one hosted game
//!
//! ### Connection Flow
//!
//! 1. Client completes the WebSocket handshake and sends a login frame
//! 2. The registry validates the attempt and assigns a collision-free name
//! 3. The session attaches to the chat moderation engine
//! 4. Chat frames are filtered and fanned out to every registered node
//! 5. On close the session detaches and the node is removed
//!
//! ## Error Handling
//!
//! The server uses structured error types ([`ServerError`]) to categorize
//! failures:
//!
//! * **Network errors** - Connection, binding, and protocol issues
//! * **Config errors** - Invalid or conflicting setup (including double
//!   construction of the session controller)
//! * **Internal errors** - Unexpected failures inside the host
//!
//! ## Thread Safety
//!
//! All server components are designed for safe concurrent access:
//!
//! * The node registry guards its map with an async `RwLock`; admission
//!   (name assignment plus insert) happens under one write guard
//! * Ban tables and mutes expire implicitly; lookups never block writers
//!   longer than a pruning pass
//! * The session controller is a process-wide singleton installed once

// Re-export core types and functions for easy access
pub use chat::{ChatModerationEngine, ChatParticipant, IdentityRecord, UserRole};
pub use config::ServerConfig;
pub use error::ServerError;
pub use headless::{
    ControllerState, GameLauncher, GameSession, HeadlessSessionController, LaunchOutcome,
};
pub use login::{ConnectionAttempt, LoginValidator, LoginVerdict, RejectReason};
pub use moderation::BanStore;
pub use registry::{Node, NodeId, NodeRegistry, NodeTransport};
pub use server::GameHostServer;
pub use shutdown::ShutdownState;
pub use utils::{create_server, create_server_with_config};

// Public module declarations
pub mod chat;
pub mod config;
pub mod error;
pub mod headless;
pub mod identity;
pub mod login;
pub mod moderation;
pub mod registry;
pub mod server;
pub mod shutdown;
pub mod utils;
