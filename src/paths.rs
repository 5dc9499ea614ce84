use std::path::PathBuf;
use std::sync::OnceLock;

use chrono::{DateTime, Local};

static EXE_DIR: OnceLock<PathBuf> = OnceLock::new();

/// Returns the directory containing the executable.
pub fn get_exe_dir() -> &'static PathBuf {
    EXE_DIR.get_or_init(|| {
        std::env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
            .unwrap_or_else(|| PathBuf::from("."))
    })
}

/// Returns the logs directory: `<exe_dir>/logs/`
pub fn get_logs_dir() -> PathBuf {
    get_exe_dir().join("logs")
}

/// Returns the GUI settings directory: `<exe_dir>/settings/gui/`
pub fn get_settings_dir() -> PathBuf {
    get_exe_dir().join("settings").join("gui")
}

/// Returns the game settings file: `<exe_dir>/settings/gui/game.json`
pub fn get_game_settings_path() -> PathBuf {
    get_settings_dir().join("game.json")
}

/// Returns the queue slots file: `<exe_dir>/settings/gui/queue.json`
pub fn get_queue_path() -> PathBuf {
    get_settings_dir().join("queue.json")
}

/// Returns the reference image directory: `<exe_dir>/resources/templates/`
pub fn get_templates_dir() -> PathBuf {
    get_exe_dir().join("resources").join("templates")
}

/// Session log file name, e.g. `2026-10-18--09-30-00.log`.
pub fn session_log_name(at: DateTime<Local>) -> String {
    format!("{}.log", at.format("%Y-%m-%d--%H-%M-%S"))
}

/// Recording file name, e.g. `2026-10-18_09.30.00.mp4`.
pub fn video_file_name(at: DateTime<Local>) -> String {
    format!("{}.mp4", at.format("%Y-%m-%d_%H.%M.%S"))
}

/// Ensures all output directories exist. Call at startup.
pub fn ensure_directories() -> std::io::Result<()> {
    std::fs::create_dir_all(get_logs_dir())?;
    std::fs::create_dir_all(get_settings_dir())?;
    std::fs::create_dir_all(get_templates_dir())?;
    Ok(())
}
