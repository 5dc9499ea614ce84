//! Error kinds surfaced by the task execution core.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// A specialized `Result` type for emulator, perception and scheduler operations.
pub type BotResult<T> = Result<T, BotError>;

#[derive(Debug, Error)]
pub enum BotError {
    /// The emulator window handle no longer resolves. The running task should abort.
    #[error("Emulator window is gone (handle {handle:#x})")]
    WindowGone { handle: isize },

    /// The operation is not implementable on the current emulator variant.
    #[error("{operation} is not supported by {emulator}")]
    UnsupportedOperation {
        operation: &'static str,
        emulator: String,
    },

    /// No emulator window matched any known executable fingerprint.
    #[error("No emulator window found (looked for {searched})")]
    EmulatorNotFound { searched: String },

    /// An expected UI element did not show up within its polling window.
    #[error("UI element '{element}' not found within {timeout:?}")]
    PerceptionMiss { element: String, timeout: Duration },

    /// Settings or queue JSON could not be read or written.
    #[error("Malformed JSON in {path:?}: {source}")]
    Serialization {
        path: PathBuf,
        source: serde_json::Error,
    },

    /// A worker subprocess exited with a non-zero status.
    #[error("Worker for '{mode}' exited with {status}")]
    WorkerException { mode: String, status: String },

    /// The scheduler refused to start a second worker.
    #[error("A worker is already running")]
    WorkerBusy,

    #[error("Unknown UI element '{0}'")]
    UnknownElement(String),

    #[error("OCR failed: {0}")]
    Ocr(String),

    #[error("Screen capture failed: {0}")]
    Capture(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Image(#[from] image::ImageError),
}

impl BotError {
    /// Whether the task should be aborted rather than retried.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            BotError::WindowGone { .. } | BotError::EmulatorNotFound { .. }
        )
    }
}
