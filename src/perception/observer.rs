//! Annotation hooks on perception and input calls.
//!
//! Every OCR read, template probe, click and drag reports an
//! [`ElementOnScreen`] to the installed [`PerceptionObserver`]. The default
//! observer drops everything; workers install [`StdoutObserver`] so the GUI
//! process can overlay the annotations on its preview and recording.

use std::io::Write;
use std::time::Instant;

use serde::{Deserialize, Serialize};

/// Prefix marking an annotation line on a worker's stdout.
pub const ANNOTATION_PREFIX: &str = "@annotation ";

/// Outcome colour of an annotation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnnotationColor {
    /// An OCR or text probe in progress.
    Scanning,
    /// A probe that found what it looked for.
    Matched,
    /// A template (reference image) probe.
    ImageProbe,
    /// A click or drag point.
    Input,
}

impl AnnotationColor {
    pub fn rgb(&self) -> [u8; 3] {
        match self {
            AnnotationColor::Scanning => [0, 255, 0],
            AnnotationColor::Matched => [255, 0, 255],
            AnnotationColor::ImageProbe => [0, 255, 255],
            AnnotationColor::Input => [255, 0, 0],
        }
    }
}

/// A transient annotation in emulator-frame pixel coordinates.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ElementOnScreen {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// `(left, top, right, bottom)` relative to the frame.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rect: Option<[i32; 4]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub point: Option<(i32, i32)>,
    pub color: AnnotationColor,
    #[serde(skip, default = "Instant::now")]
    pub created: Instant,
}

impl ElementOnScreen {
    pub fn region(name: Option<&str>, rect: [i32; 4], color: AnnotationColor) -> Self {
        Self {
            name: name.map(str::to_string),
            rect: Some(rect),
            point: None,
            color,
            created: Instant::now(),
        }
    }

    pub fn point(name: Option<&str>, point: (i32, i32)) -> Self {
        Self {
            name: name.map(str::to_string),
            rect: None,
            point: Some(point),
            color: AnnotationColor::Input,
            created: Instant::now(),
        }
    }

    /// Encodes the annotation as one stdout line.
    pub fn to_line(&self) -> String {
        let json = serde_json::to_string(self).unwrap_or_default();
        format!("{}{}", ANNOTATION_PREFIX, json)
    }

    /// Decodes a stdout line; `None` for anything that is not an annotation.
    /// The creation instant is the moment of decoding.
    pub fn from_line(line: &str) -> Option<Self> {
        let json = line.trim_end().strip_prefix(ANNOTATION_PREFIX)?;
        serde_json::from_str(json).ok()
    }
}

/// Receives annotations from perception and input calls.
pub trait PerceptionObserver: Send + Sync {
    fn record(&self, _element: ElementOnScreen) {}
}

/// Drops every annotation.
pub struct NoopObserver;

impl PerceptionObserver for NoopObserver {}

/// Writes annotations as JSON lines to stdout.
pub struct StdoutObserver;

impl PerceptionObserver for StdoutObserver {
    fn record(&self, element: ElementOnScreen) {
        let mut out = std::io::stdout().lock();
        // A closed pipe just means nobody is watching.
        let _ = writeln!(out, "{}", element.to_line());
        let _ = out.flush();
    }
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use std::sync::Mutex;

    /// Keeps every annotation for inspection.
    #[derive(Default)]
    pub struct RecordingObserver {
        pub seen: Mutex<Vec<ElementOnScreen>>,
    }

    impl PerceptionObserver for RecordingObserver {
        fn record(&self, element: ElementOnScreen) {
            self.seen.lock().unwrap().push(element);
        }
    }
}
