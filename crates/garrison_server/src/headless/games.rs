//! Available-games catalog and the game selector model.
//!
//! The catalog maps game names to their files under the map folder and is
//! consulted when administrative commands try to change the selected game.
//! The selector holds whatever game the next launch will start.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Parsed game description, the unit the selector and launcher work with.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GameData {
    /// Display name of the game
    pub game_name: String,
    /// Map the game plays on; must be known to the catalog for stream loads
    pub map_name: String,
    /// Serialized game options
    #[serde(default)]
    pub options: HashMap<String, String>,
}

impl GameData {
    /// Parses game data from a serialized byte stream.
    ///
    /// Returns `None` on malformed input; callers treat that as a no-op.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        serde_json::from_slice(bytes).ok()
    }

    /// Applies a serialized options patch onto this game's options.
    ///
    /// Unknown keys are inserted, existing keys overwritten. Returns false
    /// on malformed patch bytes, leaving the options untouched.
    pub fn apply_options_patch(&mut self, bytes: &[u8]) -> bool {
        let patch: HashMap<String, String> = match serde_json::from_slice(bytes) {
            Ok(patch) => patch,
            Err(_) => return false,
        };
        self.options.extend(patch);
        true
    }
}

/// Catalog of games available for hosting, keyed by game name.
#[derive(Debug, Default)]
pub struct AvailableGames {
    games: HashMap<String, PathBuf>,
}

impl AvailableGames {
    /// Scans a map folder for game files (one `.game` JSON file per game).
    ///
    /// Unreadable folders yield an empty catalog; the server still starts
    /// and an administrator can point it elsewhere.
    pub fn scan(map_folder: &Path) -> Self {
        let mut games = HashMap::new();
        let entries = match std::fs::read_dir(map_folder) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(folder = %map_folder.display(), error = %e, "Map folder not readable");
                return Self { games };
            }
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("game") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    games.insert(stem.to_string(), path.clone());
                }
            }
        }
        info!(count = games.len(), "🗺️ Game catalog loaded");
        Self { games }
    }

    /// Builds a catalog from explicit entries (used by tests and tooling).
    pub fn from_entries(entries: impl IntoIterator<Item = (String, PathBuf)>) -> Self {
        Self {
            games: entries.into_iter().collect(),
        }
    }

    /// Returns the names of all catalogued games.
    pub fn game_names(&self) -> Vec<String> {
        self.games.keys().cloned().collect()
    }

    /// Returns true if a game with the given name is catalogued.
    pub fn contains(&self, game_name: &str) -> bool {
        self.games.contains_key(game_name)
    }

    /// Returns the file path for a catalogued game.
    pub fn game_path(&self, game_name: &str) -> Option<&PathBuf> {
        self.games.get(game_name)
    }

    /// Returns true if any catalogued game plays on the given map.
    ///
    /// Catalog keys are game names; for stream-loaded saves the map name is
    /// matched against them (a hosted map ships under its game's name).
    pub fn contains_map_name(&self, map_name: &str) -> bool {
        self.games.contains_key(map_name)
    }
}

/// Holds the game selected for the next launch.
#[derive(Debug, Default)]
pub struct GameSelectorModel {
    selected: Option<(GameData, String)>,
}

impl GameSelectorModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Selects a game under a display label (file name or save label).
    pub fn load(&mut self, data: GameData, label: &str) {
        info!(game = %data.game_name, label = %label, "Game selected");
        self.selected = Some((data, label.to_string()));
    }

    /// Returns the currently selected game, if any.
    pub fn selected(&self) -> Option<&GameData> {
        self.selected.as_ref().map(|(data, _)| data)
    }

    /// Mutable access to the selected game, for option patches.
    pub fn selected_mut(&mut self) -> Option<&mut GameData> {
        self.selected.as_mut().map(|(data, _)| data)
    }

    /// Clears the selection.
    pub fn clear(&mut self) {
        self.selected = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> AvailableGames {
        AvailableGames::from_entries([
            ("frontline".to_string(), PathBuf::from("maps/frontline.game")),
            ("archipelago".to_string(), PathBuf::from("maps/archipelago.game")),
        ])
    }

    #[test]
    fn catalog_lookups() {
        let catalog = catalog();
        assert!(catalog.contains("frontline"));
        assert!(!catalog.contains("unknown"));
        assert!(catalog.contains_map_name("archipelago"));
        assert_eq!(
            catalog.game_path("frontline"),
            Some(&PathBuf::from("maps/frontline.game"))
        );
    }

    #[test]
    fn game_data_round_trips_through_bytes() {
        let data = GameData {
            game_name: "frontline".to_string(),
            map_name: "frontline".to_string(),
            options: HashMap::new(),
        };
        let bytes = serde_json::to_vec(&data).unwrap();
        assert_eq!(GameData::from_bytes(&bytes), Some(data));
        assert_eq!(GameData::from_bytes(b"not json"), None);
    }

    #[test]
    fn options_patch_overwrites_and_inserts() {
        let mut data = GameData {
            game_name: "frontline".to_string(),
            map_name: "frontline".to_string(),
            options: HashMap::from([("fog".to_string(), "off".to_string())]),
        };

        let patch = serde_json::json!({"fog": "on", "rounds": "20"});
        assert!(data.apply_options_patch(&serde_json::to_vec(&patch).unwrap()));
        assert_eq!(data.options.get("fog"), Some(&"on".to_string()));
        assert_eq!(data.options.get("rounds"), Some(&"20".to_string()));

        assert!(!data.apply_options_patch(b"garbage"));
    }

    #[test]
    fn selector_holds_latest_selection() {
        let mut selector = GameSelectorModel::new();
        assert!(selector.selected().is_none());

        let data = GameData {
            game_name: "frontline".to_string(),
            map_name: "frontline".to_string(),
            options: HashMap::new(),
        };
        selector.load(data.clone(), "frontline.game");
        assert_eq!(selector.selected(), Some(&data));

        selector.clear();
        assert!(selector.selected().is_none());
    }
}
