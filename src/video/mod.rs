//! Screen recording with live perception annotations.
//!
//! Annotations arrive from workers (see [`crate::scheduler::WorkerSlot`]) and
//! are kept in an [`AnnotationBuffer`] until they are too old to draw. The
//! [`Recorder`] thread pulls emulator frames, draws the live annotations on
//! top and hands the result to a [`FrameSink`].

mod overlay;
mod recorder;

#[cfg(feature = "video")]
mod mp4;

use std::collections::VecDeque;
use std::path::Path;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use anyhow::Result;
use image::RgbImage;

use crate::perception::{ElementOnScreen, PerceptionObserver};

pub use overlay::Overlay;
#[cfg(test)]
pub use overlay::system_font;
pub use recorder::{FrameSource, Recorder, RECORDING_FPS};

/// How long an annotation stays on screen.
pub const ANNOTATION_LIFETIME: Duration = Duration::from_millis(1500);

/// Recent annotations shared between the scheduler and the renderers.
#[derive(Default)]
pub struct AnnotationBuffer {
    entries: Mutex<VecDeque<ElementOnScreen>>,
}

impl AnnotationBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, element: ElementOnScreen) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.push_back(element);
        }
    }

    /// Drops entries older than [`ANNOTATION_LIFETIME`] and returns the rest.
    pub fn live(&self) -> Vec<ElementOnScreen> {
        self.live_at(Instant::now())
    }

    fn live_at(&self, now: Instant) -> Vec<ElementOnScreen> {
        let Ok(mut entries) = self.entries.lock() else {
            return Vec::new();
        };
        entries.retain(|e| now.saturating_duration_since(e.created) < ANNOTATION_LIFETIME);
        entries.iter().cloned().collect()
    }
}

impl PerceptionObserver for AnnotationBuffer {
    fn record(&self, element: ElementOnScreen) {
        self.push(element);
    }
}

/// Consumes recorded frames.
pub trait FrameSink: Send {
    fn write(&mut self, frame: &RgbImage) -> Result<()>;
    /// Flushes and closes the output.
    fn finish(self: Box<Self>) -> Result<()>;
}

/// Opens the MP4 writer for `path`.
#[cfg(feature = "video")]
pub fn open_mp4(path: &Path) -> Result<Box<dyn FrameSink>> {
    Ok(Box::new(mp4::Mp4Sink::new(path)))
}

#[cfg(not(feature = "video"))]
pub fn open_mp4(path: &Path) -> Result<Box<dyn FrameSink>> {
    anyhow::bail!(
        "Cannot record {}: built without the `video` feature",
        path.display()
    )
}
