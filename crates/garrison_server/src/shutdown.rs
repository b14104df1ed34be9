//! Coordinated shutdown state shared across server components.
//!
//! The accept loop, the headless controller's readiness poll, and the
//! application layer all observe the same flag so a single signal stops
//! every periodic task within one iteration.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

/// Shared cancellation flag for graceful shutdown.
///
/// Cloning is cheap; all clones observe the same underlying flag.
/// Periodic tasks check the flag each iteration, which bounds their
/// response time to one poll interval.
#[derive(Debug, Clone)]
pub struct ShutdownState {
    /// Flag indicating shutdown has been initiated - loops should stop
    shutdown_initiated: Arc<AtomicBool>,
}

impl ShutdownState {
    /// Creates a new shutdown state with the flag unset.
    pub fn new() -> Self {
        Self {
            shutdown_initiated: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Returns true if shutdown has been initiated.
    pub fn is_shutdown_initiated(&self) -> bool {
        self.shutdown_initiated.load(Ordering::Acquire)
    }

    /// Initiates shutdown - sets the flag observed by all polling loops.
    pub fn initiate_shutdown(&self) {
        self.shutdown_initiated.store(true, Ordering::Release);
        info!("🛑 Shutdown initiated - polling loops will stop");
    }
}

impl Default for ShutdownState {
    fn default() -> Self {
        Self::new()
    }
}
