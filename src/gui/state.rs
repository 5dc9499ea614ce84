//! GUI state that is not widget-owned.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use crate::emulator::Emulator;
use crate::logging::LogTail;
use crate::queue::QueueSlots;
use crate::settings::GameSettings;

/// How often the log panes re-read the session file.
pub const LOG_REFRESH: Duration = Duration::from_millis(150);
/// How often the preview grabs a frame.
pub const PREVIEW_REFRESH: Duration = Duration::from_millis(200);

/// Emulator connection shown in the header.
#[derive(Clone, Debug, Default)]
pub enum EmulatorStatus {
    #[default]
    Disconnected,
    Connected {
        name: String,
        process_id: u32,
    },
    Error(String),
}

impl EmulatorStatus {
    pub fn from_emulator(emulator: &Emulator) -> Self {
        Self::Connected {
            name: format!("{} {}", emulator.kind(), emulator.version()),
            process_id: emulator.process_id(),
        }
    }

    pub fn status_text(&self) -> String {
        match self {
            Self::Disconnected => "No emulator".to_string(),
            Self::Connected { name, process_id } => format!("{} (pid {})", name, process_id),
            Self::Error(msg) => format!("Error: {}", msg),
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected { .. })
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LogPane {
    #[default]
    All,
    Info,
    Errors,
}

impl LogPane {
    pub const ALL: [LogPane; 3] = [LogPane::All, LogPane::Info, LogPane::Errors];

    pub fn title(&self) -> &'static str {
        match self {
            LogPane::All => "All",
            LogPane::Info => "Info",
            LogPane::Errors => "Errors",
        }
    }
}

pub struct GuiState {
    pub settings: GameSettings,
    pub slots: QueueSlots,
    pub emulator_status: EmulatorStatus,
    /// Index into the mode registry for the "Add" picker.
    pub add_mode: usize,
    pub log_pane: LogPane,
    pub tail: LogTail,
    pub last_log_poll: Instant,
    pub last_preview: Instant,
    pub status_message: Option<String>,
}

impl GuiState {
    pub fn new(settings: GameSettings, slots: QueueSlots, log_path: PathBuf) -> Self {
        let now = Instant::now();
        Self {
            settings,
            slots,
            emulator_status: EmulatorStatus::default(),
            add_mode: 0,
            log_pane: LogPane::default(),
            tail: LogTail::new(log_path),
            last_log_poll: now,
            last_preview: now,
            status_message: None,
        }
    }

    pub fn pane_lines(&self) -> &VecDeque<String> {
        match self.log_pane {
            LogPane::All => &self.tail.all,
            LogPane::Info => &self.tail.info,
            LogPane::Errors => &self.tail.errors,
        }
    }
}
