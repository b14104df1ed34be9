//! Headless session controller: the state machine driving one hosted game.
//!
//! The controller polls a readiness predicate while waiting for players,
//! launches the selected game asynchronously, recovers from launch
//! failures without relaunch loops, and owns the running session until it
//! reports completion. It is constructed once per process; the installed
//! instance is reachable through [`HeadlessSessionController::instance`].

use crate::error::ServerError;
use crate::headless::games::{AvailableGames, GameData, GameSelectorModel};
use crate::registry::{NodeId, NodeRegistry};
use crate::shutdown::ShutdownState;
use async_trait::async_trait;
use once_cell::sync::OnceCell;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tracing::{error, info, warn};

/// Lobby comment advertised by unattended automated hosts.
pub const BOT_HOST_COMMENT: &str = "automated_host";
/// Required prefix for automated host display names.
pub const BOT_NAME_PREFIX: &str = "Bot";
/// Minimum length for automated host display names.
pub const MIN_HOST_NAME_LEN: usize = 7;

static INSTANCE: OnceCell<Arc<HeadlessSessionController>> = OnceCell::new();

/// States of the hosting lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    /// No game cycle in progress
    NoGame,
    /// Polling the readiness predicate
    WaitingForPlayers,
    /// A launch task is in flight
    Launching,
    /// A game session is live
    Running,
    /// Process-wide terminal state
    ShuttingDown,
}

/// A live game session owned by the controller while `Running`.
///
/// The rules engine behind it is an external collaborator.
#[async_trait]
pub trait GameSession: Send + Sync {
    /// Stops the session.
    async fn stop(&self);

    /// Returns true once the session has finished on its own.
    fn is_over(&self) -> bool;
}

/// Result of one launch attempt.
///
/// Launch failure is a routine, expected outcome; modelling it as data
/// keeps the state transition a pure function of (state, outcome).
pub enum LaunchOutcome {
    Started(Arc<dyn GameSession>),
    Failed(String),
}

/// Strategy that actually starts a game from the selected game data.
#[async_trait]
pub trait GameLauncher: Send + Sync {
    async fn launch(&self, game: &GameData) -> LaunchOutcome;
}

/// Predicate permitting a launch to begin.
#[async_trait]
pub trait ReadinessCheck: Send + Sync {
    async fn can_game_start(&self) -> bool;
}

/// Readiness based on the number of connected nodes.
pub struct MinimumPlayersReadiness {
    registry: Arc<NodeRegistry>,
    min_players: usize,
}

impl MinimumPlayersReadiness {
    pub fn new(registry: Arc<NodeRegistry>, min_players: usize) -> Self {
        Self {
            registry,
            min_players,
        }
    }
}

#[async_trait]
impl ReadinessCheck for MinimumPlayersReadiness {
    async fn can_game_start(&self) -> bool {
        self.registry.node_count().await >= self.min_players
    }
}

/// Player-slot to node bindings for the pending (not yet launched) session.
#[derive(Debug, Default)]
pub struct HeadlessSetup {
    bindings: RwLock<HashMap<String, NodeId>>,
}

impl HeadlessSetup {
    /// Binds a game player slot to a connected node.
    pub async fn bind_player(&self, player_slot: &str, node: NodeId) {
        self.bindings
            .write()
            .await
            .insert(player_slot.to_string(), node);
    }

    /// Forcibly detaches every player-to-node binding.
    ///
    /// Run after a launch failure so a stale binding cannot re-trigger the
    /// same crash on the next readiness check.
    pub async fn clear_bindings(&self) {
        self.bindings.write().await.clear();
    }

    /// Number of currently-bound player slots.
    pub async fn binding_count(&self) -> usize {
        self.bindings.read().await.len()
    }
}

/// Computes the state following a launch attempt.
///
/// Pure function of (current state, outcome); shutdown always wins.
fn next_state_after_launch(current: ControllerState, outcome: &LaunchOutcome) -> ControllerState {
    if current == ControllerState::ShuttingDown {
        return ControllerState::ShuttingDown;
    }
    match outcome {
        LaunchOutcome::Started(_) => ControllerState::Running,
        LaunchOutcome::Failed(_) => ControllerState::WaitingForPlayers,
    }
}

/// Singleton state machine orchestrating one hosted game.
pub struct HeadlessSessionController {
    state: RwLock<ControllerState>,

    /// The live session while `Running`; the controller's only game reference
    game: RwLock<Option<Arc<dyn GameSession>>>,

    selector: Mutex<GameSelectorModel>,
    available: AvailableGames,
    setup: HeadlessSetup,

    readiness: Arc<dyn ReadinessCheck>,
    launcher: Arc<dyn GameLauncher>,
    poll_interval: Duration,

    shutdown: ShutdownState,
    shut_down_once: AtomicBool,
}

impl HeadlessSessionController {
    /// Creates a controller in the `NoGame` state.
    pub fn new(
        available: AvailableGames,
        readiness: Arc<dyn ReadinessCheck>,
        launcher: Arc<dyn GameLauncher>,
        poll_interval: Duration,
        shutdown: ShutdownState,
    ) -> Arc<Self> {
        Arc::new(Self {
            state: RwLock::new(ControllerState::NoGame),
            game: RwLock::new(None),
            selector: Mutex::new(GameSelectorModel::new()),
            available,
            setup: HeadlessSetup::default(),
            readiness,
            launcher,
            poll_interval,
            shutdown,
            shut_down_once: AtomicBool::new(false),
        })
    }

    /// Installs the process-wide controller instance.
    ///
    /// Double construction is a fatal configuration error, not a
    /// recoverable one.
    pub fn install(controller: Arc<Self>) -> Result<(), ServerError> {
        INSTANCE.set(controller).map_err(|_| {
            ServerError::Config("headless session controller instance already exists".to_string())
        })
    }

    /// Returns the installed controller instance, if any.
    pub fn instance() -> Option<Arc<Self>> {
        INSTANCE.get().cloned()
    }

    /// Current lifecycle state.
    pub async fn state(&self) -> ControllerState {
        *self.state.read().await
    }

    /// Pending-session setup (player-to-node bindings).
    pub fn setup(&self) -> &HeadlessSetup {
        &self.setup
    }

    /// Names of all games available for hosting.
    pub fn available_games(&self) -> Vec<String> {
        self.available.game_names()
    }

    /// Moves to `WaitingForPlayers` and spawns the readiness poll loop.
    ///
    /// The loop checks the shutdown flag each iteration, so it stops
    /// within one poll interval of a shutdown signal.
    pub async fn start(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        *self.state.write().await = ControllerState::WaitingForPlayers;
        info!("⏳ Waiting for users to connect");

        let controller = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(controller.poll_interval);
            // The first tick fires immediately; skip it so readiness is
            // first checked one full interval after startup.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if controller.shutdown.is_shutdown_initiated() {
                    info!("⏳ Readiness poll stopping - shutdown initiated");
                    break;
                }
                controller.poll_once().await;
            }
        })
    }

    /// One iteration of the readiness loop.
    ///
    /// Exposed within the crate so tests can drive the state machine
    /// without timing on the interval.
    pub(crate) async fn poll_once(self: &Arc<Self>) {
        let state = self.state().await;
        match state {
            ControllerState::NoGame => {
                *self.state.write().await = ControllerState::WaitingForPlayers;
                info!("⏳ Waiting for users to connect");
            }
            ControllerState::WaitingForPlayers => {
                if self.readiness.can_game_start().await {
                    *self.state.write().await = ControllerState::Launching;
                    // Launch on its own task; the poll loop never blocks on it.
                    let controller = self.clone();
                    tokio::spawn(async move {
                        controller.execute_launch().await;
                    });
                }
            }
            ControllerState::Launching => {}
            ControllerState::Running => {
                let over = self
                    .game
                    .read()
                    .await
                    .as_ref()
                    .is_some_and(|game| game.is_over());
                if over {
                    self.game.write().await.take();
                    *self.state.write().await = ControllerState::NoGame;
                    info!("🏁 Game over, cycle complete");
                }
            }
            ControllerState::ShuttingDown => {}
        }
    }

    /// Runs one launch attempt and applies the resulting transition.
    pub(crate) async fn execute_launch(self: &Arc<Self>) {
        let selected = self.selector.lock().await.selected().cloned();
        let game_data = match selected {
            Some(data) => data,
            None => {
                warn!("Launch requested without a selected game, going back to waiting");
                // Shutdown clears the selection, so this branch can race it.
                let mut state = self.state.write().await;
                if *state != ControllerState::ShuttingDown {
                    *state = ControllerState::WaitingForPlayers;
                }
                return;
            }
        };

        info!(game = %game_data.game_name, "🚀 Starting game");
        let outcome = self.launcher.launch(&game_data).await;

        // Re-check and transition under one guard: a shutdown landing
        // after the launch returns must still win, and a session adopted
        // past SHUTTING_DOWN would never be stopped.
        let mut state = self.state.write().await;
        let next = next_state_after_launch(*state, &outcome);

        match outcome {
            LaunchOutcome::Started(session) => {
                if next == ControllerState::Running {
                    *self.game.write().await = Some(session);
                    *state = next;
                    info!(game = %game_data.game_name, "✅ Game running");
                } else {
                    // Shutdown won the race; do not adopt the session.
                    drop(state);
                    session.stop().await;
                }
            }
            LaunchOutcome::Failed(reason) => {
                error!(game = %game_data.game_name, %reason, "❌ Failed to start game");
                if next != ControllerState::ShuttingDown {
                    *state = next;
                }
                drop(state);
                // Without this, a stale binding can relaunch into the same
                // crash on the next readiness check.
                self.setup.clear_bindings().await;
                warn!("Error in launcher, going back to waiting");
            }
        }
    }

    /// Returns true while administrative commands may change the selection.
    ///
    /// Commands only apply while no game is running or launching.
    async fn accepts_admin_commands(&self) -> bool {
        matches!(
            self.state().await,
            ControllerState::NoGame | ControllerState::WaitingForPlayers
        )
    }

    /// Changes the active map to a catalogued game.
    ///
    /// No-op (logged, not an error) on an unknown name or mid-game.
    pub async fn set_game_map(&self, game_name: &str) {
        if !self.accepts_admin_commands().await {
            return;
        }
        let path = match self.available.game_path(game_name) {
            Some(path) => path.clone(),
            None => {
                info!(game = %game_name, "Requested map not in available games listing");
                return;
            }
        };
        let data = match std::fs::read(&path).ok().and_then(|b| GameData::from_bytes(&b)) {
            Some(data) => data,
            None => {
                warn!(path = %path.display(), "Could not read game file");
                return;
            }
        };
        self.selector.lock().await.load(data, game_name);
        info!(game = %game_name, "Changed to game map");
    }

    /// Loads a save game from a file path.
    ///
    /// No-op on a missing or unparseable file or mid-game.
    pub async fn load_game_save(&self, file: &Path) {
        if !self.accepts_admin_commands().await {
            return;
        }
        if !file.exists() {
            info!(file = %file.display(), "Save file does not exist");
            return;
        }
        let data = match std::fs::read(file).ok().and_then(|b| GameData::from_bytes(&b)) {
            Some(data) => data,
            None => {
                warn!(file = %file.display(), "Error loading game file");
                return;
            }
        };
        let label = file
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        self.selector.lock().await.load(data, &label);
        info!(label = %label, "Changed to save");
    }

    /// Loads a save game from an in-memory byte stream.
    ///
    /// The label is typically the file name on the remote client that
    /// requested the load. The save's map must be known to the catalog.
    pub async fn load_game_save_bytes(&self, bytes: &[u8], label: &str) {
        if !self.accepts_admin_commands().await {
            return;
        }
        if bytes.is_empty() || label.is_empty() {
            return;
        }
        let data = match GameData::from_bytes(bytes) {
            Some(data) => data,
            None => {
                info!(label = %label, "Loading game data failed");
                return;
            }
        };
        if !self.available.contains_map_name(&data.map_name) {
            info!(map = %data.map_name, "Game map name not in available games listing");
            return;
        }
        self.selector.lock().await.load(data, label);
        info!(label = %label, "Changed to user savegame");
    }

    /// Applies a serialized options patch to the selected game.
    ///
    /// No-op on empty or malformed input, or when nothing is selected.
    pub async fn load_game_options(&self, bytes: &[u8]) {
        if !self.accepts_admin_commands().await {
            return;
        }
        if bytes.is_empty() {
            return;
        }
        let mut selector = self.selector.lock().await;
        match selector.selected_mut() {
            Some(data) => {
                if data.apply_options_patch(bytes) {
                    info!("Changed to user game options");
                }
            }
            None => info!("Options patch received with no game selected"),
        }
    }

    /// Stop sequence, guaranteed to run exactly once regardless of path.
    ///
    /// Cancels the poll loop, stops any running session, and releases the
    /// setup model. Irreversible.
    pub async fn shutdown(&self) {
        if self.shut_down_once.swap(true, Ordering::SeqCst) {
            return;
        }
        info!("🛑 Running controller shutdown sequence");
        self.shutdown.initiate_shutdown();
        *self.state.write().await = ControllerState::ShuttingDown;
        if let Some(game) = self.game.write().await.take() {
            game.stop().await;
        }
        self.selector.lock().await.clear();
        self.setup.clear_bindings().await;
    }

    #[cfg(test)]
    pub(crate) async fn select_for_test(&self, data: GameData) {
        self.selector.lock().await.load(data, "test");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    struct AlwaysReady;

    #[async_trait]
    impl ReadinessCheck for AlwaysReady {
        async fn can_game_start(&self) -> bool {
            true
        }
    }

    #[derive(Default)]
    struct StubSession {
        over: AtomicBool,
        stops: AtomicUsize,
    }

    #[async_trait]
    impl GameSession for StubSession {
        async fn stop(&self) {
            self.stops.fetch_add(1, Ordering::SeqCst);
        }

        fn is_over(&self) -> bool {
            self.over.load(Ordering::SeqCst)
        }
    }

    struct StubLauncher {
        session: Arc<StubSession>,
    }

    #[async_trait]
    impl GameLauncher for StubLauncher {
        async fn launch(&self, _game: &GameData) -> LaunchOutcome {
            LaunchOutcome::Started(self.session.clone())
        }
    }

    struct FailingLauncher;

    #[async_trait]
    impl GameLauncher for FailingLauncher {
        async fn launch(&self, _game: &GameData) -> LaunchOutcome {
            LaunchOutcome::Failed("rules engine refused the map".to_string())
        }
    }

    /// Launcher that parks mid-flight until the test releases it.
    struct GatedLauncher {
        entered: Arc<tokio::sync::Notify>,
        release: Arc<tokio::sync::Notify>,
        session: Arc<StubSession>,
    }

    #[async_trait]
    impl GameLauncher for GatedLauncher {
        async fn launch(&self, _game: &GameData) -> LaunchOutcome {
            self.entered.notify_one();
            self.release.notified().await;
            LaunchOutcome::Started(self.session.clone())
        }
    }

    fn game_data() -> GameData {
        GameData {
            game_name: "frontline".to_string(),
            map_name: "frontline".to_string(),
            options: HashMap::new(),
        }
    }

    fn catalog() -> AvailableGames {
        AvailableGames::from_entries([(
            "frontline".to_string(),
            std::path::PathBuf::from("maps/frontline.game"),
        )])
    }

    fn controller(launcher: Arc<dyn GameLauncher>) -> Arc<HeadlessSessionController> {
        HeadlessSessionController::new(
            catalog(),
            Arc::new(AlwaysReady),
            launcher,
            Duration::from_millis(10),
            ShutdownState::new(),
        )
    }

    #[tokio::test]
    async fn launch_failure_returns_to_waiting_and_clears_bindings() {
        let controller = controller(Arc::new(FailingLauncher));
        controller.select_for_test(game_data()).await;
        controller
            .setup()
            .bind_player("Allies", uuid::Uuid::new_v4())
            .await;
        controller
            .setup()
            .bind_player("Axis", uuid::Uuid::new_v4())
            .await;
        *controller.state.write().await = ControllerState::WaitingForPlayers;

        controller.poll_once().await;
        // poll_once spawned the launch task; run the attempt inline too so
        // the failure path is fully observed.
        controller.execute_launch().await;

        assert_eq!(controller.state().await, ControllerState::WaitingForPlayers);
        assert_eq!(controller.setup().binding_count().await, 0);
    }

    #[tokio::test]
    async fn successful_launch_runs_then_cycles_back() {
        let session = Arc::new(StubSession::default());
        let controller = controller(Arc::new(StubLauncher {
            session: session.clone(),
        }));
        controller.select_for_test(game_data()).await;
        *controller.state.write().await = ControllerState::Launching;

        controller.execute_launch().await;
        assert_eq!(controller.state().await, ControllerState::Running);

        // While running, nothing changes until the session finishes.
        controller.poll_once().await;
        assert_eq!(controller.state().await, ControllerState::Running);

        session.over.store(true, Ordering::SeqCst);
        controller.poll_once().await;
        assert_eq!(controller.state().await, ControllerState::NoGame);

        controller.poll_once().await;
        assert_eq!(controller.state().await, ControllerState::WaitingForPlayers);
    }

    #[tokio::test]
    async fn launch_without_selection_goes_back_to_waiting() {
        let controller = controller(Arc::new(FailingLauncher));
        *controller.state.write().await = ControllerState::Launching;

        controller.execute_launch().await;
        assert_eq!(controller.state().await, ControllerState::WaitingForPlayers);
    }

    #[tokio::test]
    async fn admin_commands_are_noops_while_running() {
        let session = Arc::new(StubSession::default());
        let controller = controller(Arc::new(StubLauncher {
            session: session.clone(),
        }));
        controller.select_for_test(game_data()).await;
        *controller.state.write().await = ControllerState::Launching;
        controller.execute_launch().await;
        assert_eq!(controller.state().await, ControllerState::Running);

        let save = serde_json::to_vec(&GameData {
            game_name: "frontline".to_string(),
            map_name: "frontline".to_string(),
            options: HashMap::from([("fog".to_string(), "on".to_string())]),
        })
        .unwrap();
        controller.load_game_save_bytes(&save, "remote.save").await;
        controller.load_game_options(b"{\"fog\":\"on\"}").await;

        // The selection is untouched mid-game.
        let selected = controller.selector.lock().await.selected().cloned();
        assert_eq!(selected, Some(game_data()));
    }

    #[tokio::test]
    async fn stream_load_requires_known_map() {
        let controller = controller(Arc::new(FailingLauncher));
        *controller.state.write().await = ControllerState::WaitingForPlayers;

        let save = serde_json::to_vec(&GameData {
            game_name: "modded".to_string(),
            map_name: "not-in-catalog".to_string(),
            options: HashMap::new(),
        })
        .unwrap();
        controller.load_game_save_bytes(&save, "modded.save").await;
        assert!(controller.selector.lock().await.selected().is_none());

        let known = serde_json::to_vec(&game_data()).unwrap();
        controller.load_game_save_bytes(&known, "ok.save").await;
        assert!(controller.selector.lock().await.selected().is_some());
    }

    #[tokio::test]
    async fn options_patch_applies_to_selection() {
        let controller = controller(Arc::new(FailingLauncher));
        *controller.state.write().await = ControllerState::WaitingForPlayers;
        controller.select_for_test(game_data()).await;

        controller.load_game_options(b"{\"rounds\":\"25\"}").await;
        let selected = controller.selector.lock().await.selected().cloned().unwrap();
        assert_eq!(selected.options.get("rounds"), Some(&"25".to_string()));

        // Malformed patches change nothing.
        controller.load_game_options(b"nonsense").await;
        let unchanged = controller.selector.lock().await.selected().cloned().unwrap();
        assert_eq!(unchanged.options.get("rounds"), Some(&"25".to_string()));
    }

    #[tokio::test]
    async fn shutdown_runs_once_and_stops_the_session() {
        let session = Arc::new(StubSession::default());
        let controller = controller(Arc::new(StubLauncher {
            session: session.clone(),
        }));
        controller.select_for_test(game_data()).await;
        *controller.state.write().await = ControllerState::Launching;
        controller.execute_launch().await;

        controller.shutdown().await;
        controller.shutdown().await;

        assert_eq!(controller.state().await, ControllerState::ShuttingDown);
        assert_eq!(session.stops.load(Ordering::SeqCst), 1);
        // Terminal: further polls do not leave ShuttingDown.
        controller.poll_once().await;
        assert_eq!(controller.state().await, ControllerState::ShuttingDown);
    }

    #[tokio::test]
    async fn shutdown_during_launch_never_adopts_the_session() {
        let entered = Arc::new(tokio::sync::Notify::new());
        let release = Arc::new(tokio::sync::Notify::new());
        let session = Arc::new(StubSession::default());
        let controller = controller(Arc::new(GatedLauncher {
            entered: entered.clone(),
            release: release.clone(),
            session: session.clone(),
        }));
        controller.select_for_test(game_data()).await;
        *controller.state.write().await = ControllerState::Launching;

        let launch = {
            let controller = controller.clone();
            tokio::spawn(async move { controller.execute_launch().await })
        };

        // Shutdown completes while the launch is still in flight; the
        // returned session must be stopped, never adopted.
        entered.notified().await;
        controller.shutdown().await;
        release.notify_one();
        launch.await.unwrap();

        assert_eq!(controller.state().await, ControllerState::ShuttingDown);
        assert!(controller.game.read().await.is_none());
        assert_eq!(session.stops.load(Ordering::SeqCst), 1);

        // Shutdown cleared the selection; a stray launch attempt stays inert.
        controller.execute_launch().await;
        assert_eq!(controller.state().await, ControllerState::ShuttingDown);
    }

    #[tokio::test]
    async fn installing_twice_is_a_config_error() {
        let first = controller(Arc::new(FailingLauncher));
        let second = controller(Arc::new(FailingLauncher));

        // Another test may have installed already; either way the second
        // install here must fail.
        let _ = HeadlessSessionController::install(first);
        let result = HeadlessSessionController::install(second);
        assert!(matches!(result, Err(ServerError::Config(_))));
        assert!(HeadlessSessionController::instance().is_some());
    }

    #[test]
    fn launch_transition_is_pure() {
        let session: Arc<dyn GameSession> = Arc::new(StubSession::default());
        assert_eq!(
            next_state_after_launch(
                ControllerState::Launching,
                &LaunchOutcome::Started(session.clone())
            ),
            ControllerState::Running
        );
        assert_eq!(
            next_state_after_launch(
                ControllerState::Launching,
                &LaunchOutcome::Failed("boom".to_string())
            ),
            ControllerState::WaitingForPlayers
        );
        assert_eq!(
            next_state_after_launch(
                ControllerState::ShuttingDown,
                &LaunchOutcome::Started(session)
            ),
            ControllerState::ShuttingDown
        );
    }
}
