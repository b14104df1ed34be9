//! Unattended game hosting: game catalog, selection model, and the
//! lifecycle controller that waits, launches, and recovers.

pub mod controller;
pub mod games;

pub use controller::{
    ControllerState, GameLauncher, GameSession, HeadlessSessionController, HeadlessSetup,
    LaunchOutcome, MinimumPlayersReadiness, ReadinessCheck, BOT_HOST_COMMENT, BOT_NAME_PREFIX,
    MIN_HOST_NAME_LEN,
};
pub use games::{AvailableGames, GameData, GameSelectorModel};
