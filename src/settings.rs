//! Game and emulator settings persisted in `settings/gui/game.json`.
//!
//! Loading is best-effort: a missing file gives defaults, malformed JSON is
//! logged and gives defaults. Only the GUI process writes the file.

use std::fs;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::emulator::EmulatorKind;
use crate::error::{BotError, BotResult};
use crate::geometry::Rect;

/// Settings shared between the GUI and its workers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GameSettings {
    /// Preferred emulator process, e.g. `Nox.exe`. Empty means "first found".
    #[serde(default)]
    pub emulator_name: String,
    #[serde(default)]
    pub emulator_type: EmulatorKind,
    /// Where the game's launcher icon sits on the emulator home screen.
    #[serde(default = "default_game_app_rect")]
    pub game_app_rect: Rect,
    #[serde(default = "default_team")]
    pub timeline_team: u8,
    #[serde(default = "default_team")]
    pub mission_team: u8,
    #[serde(default = "default_true")]
    pub acquire_heroic_quest_rewards: bool,
    #[serde(default)]
    pub low_memory_mode: bool,
    #[serde(default)]
    pub record_video: bool,
    /// Last GUI window size in logical points.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window_size: Option<[f32; 2]>,
}

fn default_game_app_rect() -> Rect {
    Rect::new(0.0, 0.0, 0.0, 0.0)
}

fn default_team() -> u8 {
    1
}

fn default_true() -> bool {
    true
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            emulator_name: String::new(),
            emulator_type: EmulatorKind::default(),
            game_app_rect: default_game_app_rect(),
            timeline_team: default_team(),
            mission_team: default_team(),
            acquire_heroic_quest_rewards: default_true(),
            low_memory_mode: false,
            record_video: false,
            window_size: None,
        }
    }
}

impl GameSettings {
    pub fn load(path: &Path) -> Self {
        let mut settings: Self = load_json_or_default(path);
        settings.clamp_teams();
        settings
    }

    pub fn save(&self, path: &Path) -> BotResult<()> {
        save_json(path, self)
    }

    /// Team slots are 1..=5 in game.
    fn clamp_teams(&mut self) {
        self.timeline_team = self.timeline_team.clamp(1, 5);
        self.mission_team = self.mission_team.clamp(1, 5);
    }

    /// The preferred emulator process, if one is configured.
    pub fn preferred_emulator(&self) -> Option<&str> {
        let name = self.emulator_name.trim();
        (!name.is_empty()).then_some(name)
    }

    /// Value of `MFF_LOW_MEMORY_MODE` handed to workers.
    pub fn low_memory_env(&self) -> &'static str {
        if self.low_memory_mode { "True" } else { "False" }
    }
}

/// Reads JSON from `path`, falling back to `T::default()`.
pub fn load_json_or_default<T: DeserializeOwned + Default>(path: &Path) -> T {
    match fs::read_to_string(path) {
        Ok(contents) => match serde_json::from_str(&contents) {
            Ok(value) => {
                log::debug!("Loaded {}", path.display());
                value
            }
            Err(source) => {
                let err = BotError::Serialization {
                    path: path.to_path_buf(),
                    source,
                };
                log::error!("{}. Using defaults.", err);
                T::default()
            }
        },
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            log::info!("{} not found, using defaults", path.display());
            T::default()
        }
        Err(e) => {
            log::error!("Failed to read {}: {}. Using defaults.", path.display(), e);
            T::default()
        }
    }
}

/// Writes pretty-printed JSON to `path`, creating parent directories.
pub fn save_json<T: Serialize>(path: &Path, value: &T) -> BotResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(value).map_err(|source| BotError::Serialization {
        path: path.to_path_buf(),
        source,
    })?;
    fs::write(path, json)?;
    Ok(())
}

/// Reads `MFF_LOW_MEMORY_MODE` as set by the launcher.
pub fn low_memory_from_env() -> bool {
    std::env::var("MFF_LOW_MEMORY_MODE")
        .map(|v| v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = GameSettings::load(&dir.path().join("game.json"));
        assert_eq!(settings, GameSettings::default());
    }

    #[test]
    fn test_malformed_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("game.json");
        fs::write(&path, "{ not json").unwrap();
        assert_eq!(GameSettings::load(&path), GameSettings::default());
    }

    #[test]
    fn test_partial_file_keeps_field_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("game.json");
        fs::write(
            &path,
            r#"{"emulator_name": "HD-Player.exe", "emulator_type": "BlueStacks", "mission_team": 9}"#,
        )
        .unwrap();

        let settings = GameSettings::load(&path);
        assert_eq!(settings.preferred_emulator(), Some("HD-Player.exe"));
        assert_eq!(settings.emulator_type, EmulatorKind::BlueStacks);
        assert_eq!(settings.mission_team, 5);
        assert_eq!(settings.timeline_team, 1);
        assert!(settings.acquire_heroic_quest_rewards);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("game.json");
        let settings = GameSettings {
            game_app_rect: Rect::new(0.1, 0.2, 0.15, 0.3),
            low_memory_mode: true,
            window_size: Some([1280.0, 720.0]),
            ..GameSettings::default()
        };
        settings.save(&path).unwrap();

        let json = fs::read_to_string(&path).unwrap();
        assert!(json.contains("\"game_app_rect\": [\n    0.1,"));
        assert_eq!(GameSettings::load(&path), settings);
        assert_eq!(settings.low_memory_env(), "True");
    }
}
