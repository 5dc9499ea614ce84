//! Recognising UI elements in emulator frames.
//!
//! This module provides:
//! - Template presence via structural similarity (`template_present`)
//! - Template search within a region (`find_template`)
//! - OCR on an element's region (`ocr_on_region`, `text_matches`)
//! - The annotation hook used by the preview and recorder (`observer`)

pub mod observer;
pub mod ssim;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use image::imageops::{self, FilterType};
use image::{GrayImage, RgbImage};
use imageproc::template_matching::{match_template, MatchTemplateMethod};

use crate::error::{BotError, BotResult};
use crate::geometry::Rect;
use crate::ocr::{binarize_bright, crop_region, TextRecognizer};
use crate::ui::UiElement;

pub use observer::{AnnotationColor, ElementOnScreen, NoopObserver, PerceptionObserver, StdoutObserver};

/// Mean SSIM at or above which a reference image counts as present.
pub const SSIM_THRESHOLD: f64 = 0.8;

/// Expected texts up to this length also match a non-empty OCR prefix.
const SHORT_TEXT_PREFIX_LEN: usize = 3;

/// Uppercases and removes all whitespace.
fn normalize_text(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_uppercase)
        .collect()
}

/// Compares an OCR reading against the expected label.
///
/// Short labels ("OK", "ACQ") are often read partially, so for expected
/// texts of at most three characters a non-empty prefix also matches.
pub fn text_matches_expected(ocr: &str, expected: &str) -> bool {
    let ocr = normalize_text(ocr);
    let expected = normalize_text(expected);
    if ocr == expected {
        return true;
    }
    expected.chars().count() <= SHORT_TEXT_PREFIX_LEN
        && !ocr.is_empty()
        && expected.starts_with(&ocr)
}

/// Keeps only whitelisted characters, then strips and uppercases.
pub fn clean_ocr_text(raw: &str, available: Option<&str>) -> String {
    let filtered: String = match available {
        Some(chars) => raw.chars().filter(|c| chars.contains(*c)).collect(),
        None => raw.to_string(),
    };
    filtered.trim().to_uppercase()
}

fn is_blank(img: &RgbImage) -> bool {
    img.as_raw().iter().all(|&v| v == 0)
}

/// Pixel box of a normalized rect inside a frame, for annotations.
fn annotation_box(rect: &Rect, frame: &RgbImage) -> [i32; 4] {
    let p = rect.to_pixels(frame.width(), frame.height());
    [p.left as i32, p.top as i32, p.right as i32, p.bottom as i32]
}

/// Perception primitives over RGB frames.
pub struct Perception {
    recognizer: Box<dyn TextRecognizer>,
    observer: Arc<dyn PerceptionObserver>,
    templates_dir: PathBuf,
    references: Mutex<HashMap<String, Arc<GrayImage>>>,
    cache_references: bool,
}

impl Perception {
    pub fn new(recognizer: Box<dyn TextRecognizer>, templates_dir: PathBuf) -> Self {
        Self {
            recognizer,
            observer: Arc::new(NoopObserver),
            templates_dir,
            references: Mutex::new(HashMap::new()),
            cache_references: true,
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn PerceptionObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Low-memory mode reloads reference images on every probe.
    pub fn with_low_memory(mut self, low_memory: bool) -> Self {
        self.cache_references = !low_memory;
        self
    }

    pub fn observer(&self) -> &Arc<dyn PerceptionObserver> {
        &self.observer
    }

    /// Registers an in-memory reference image under a file name.
    pub fn insert_reference(&self, file: &str, reference: GrayImage) {
        if let Ok(mut refs) = self.references.lock() {
            refs.insert(file.to_string(), Arc::new(reference));
        }
    }

    fn reference(&self, file: &str) -> BotResult<Arc<GrayImage>> {
        if let Some(hit) = self.references.lock().ok().and_then(|r| r.get(file).cloned()) {
            return Ok(hit);
        }
        let path = self.templates_dir.join(file);
        let img = Arc::new(image::open(&path)?.to_luma8());
        log::debug!("Loaded reference {} ({}x{})", path.display(), img.width(), img.height());
        if self.cache_references {
            if let Ok(mut refs) = self.references.lock() {
                refs.insert(file.to_string(), img.clone());
            }
        }
        Ok(img)
    }

    /// Reads the text in an element's region.
    ///
    /// crop, grayscale, binarize at the element threshold, OCR with the
    /// element's whitelist, filter, strip, uppercase.
    pub fn ocr_on_region(&self, frame: &RgbImage, element: &UiElement) -> BotResult<String> {
        let rect = element
            .ocr_rect()
            .ok_or_else(|| BotError::Ocr(format!("{} has no text region", element.name)))?;

        self.observer.record(ElementOnScreen::region(
            Some(element.name),
            annotation_box(&rect, frame),
            AnnotationColor::Scanning,
        ));

        let crop = crop_region(frame, &rect);
        if crop.width() == 0 || crop.height() == 0 {
            return Ok(String::new());
        }
        let gray = imageops::grayscale(&crop);
        let binary = binarize_bright(&gray, element.text_threshold);

        let raw = self
            .recognizer
            .recognize_line(&binary, element.available_characters)
            .map_err(|e| BotError::Ocr(e.to_string()))?;
        let text = clean_ocr_text(&raw, element.available_characters);
        log::trace!("OCR {} -> {:?}", element.name, text);
        Ok(text)
    }

    /// Whether the element's expected text is on screen.
    pub fn text_matches(&self, frame: &RgbImage, element: &UiElement) -> BotResult<bool> {
        let Some(expected) = element.text else {
            return Err(BotError::Ocr(format!("{} has no expected text", element.name)));
        };
        let text = self.ocr_on_region(frame, element)?;
        let matched = text_matches_expected(&text, expected);
        if matched {
            if let Some(rect) = element.ocr_rect() {
                self.observer.record(ElementOnScreen::region(
                    Some(element.name),
                    annotation_box(&rect, frame),
                    AnnotationColor::Matched,
                ));
            }
        }
        Ok(matched)
    }

    /// Whether the element's reference image is shown at its region.
    pub fn template_present(&self, frame: &RgbImage, element: &UiElement) -> BotResult<bool> {
        let (Some(file), Some(rect)) = (element.image, element.image_rect()) else {
            return Err(BotError::UnknownElement(format!(
                "{} has no reference image",
                element.name
            )));
        };
        let reference = self.reference(file)?;
        let present = self.region_matches(frame, &rect, &reference);

        let color = if present {
            AnnotationColor::Matched
        } else {
            AnnotationColor::ImageProbe
        };
        self.observer.record(ElementOnScreen::region(
            Some(element.name),
            annotation_box(&rect, frame),
            color,
        ));
        Ok(present)
    }

    /// SSIM comparison of a frame region, resized to the reference's size.
    pub fn region_matches(&self, frame: &RgbImage, rect: &Rect, reference: &GrayImage) -> bool {
        let crop = crop_region(frame, rect);
        if crop.width() == 0 || crop.height() == 0 || is_blank(&crop) {
            return false;
        }
        let resized = imageops::resize(&crop, reference.width(), reference.height(), FilterType::Triangle);
        let gray = imageops::grayscale(&resized);
        let score = ssim::structural_similarity(&gray, reference, ssim::DEFAULT_WINDOW);
        log::trace!("SSIM {:.3} at {:?}", score, rect);
        score >= SSIM_THRESHOLD
    }

    /// Locates a reference image inside a region of the frame.
    ///
    /// Returns the top-left corner in frame pixels and the normalized squared
    /// difference (0 is a perfect match), or `None` if the reference does not
    /// fit into the region.
    pub fn find_template(
        &self,
        frame: &RgbImage,
        region: &Rect,
        reference: &GrayImage,
    ) -> Option<((u32, u32), f32)> {
        let (w, h) = frame.dimensions();
        let (x0, y0, _, _) = region.to_pixels(w, h).clamped_crop(w, h);
        let haystack = imageops::grayscale(&crop_region(frame, region));
        let (pos, score) = best_match(&haystack, reference)?;
        Some(((x0 + pos.0, y0 + pos.1), score))
    }
}

/// Best squared-difference position; on ties the first in raster order wins.
pub fn best_match(haystack: &GrayImage, reference: &GrayImage) -> Option<((u32, u32), f32)> {
    if reference.width() == 0
        || reference.height() == 0
        || reference.width() > haystack.width()
        || reference.height() > haystack.height()
    {
        return None;
    }
    let scores = match_template(
        haystack,
        reference,
        MatchTemplateMethod::SumOfSquaredErrorsNormalized,
    );

    let mut best: Option<((u32, u32), f32)> = None;
    for (x, y, p) in scores.enumerate_pixels() {
        let value = p[0];
        if value.is_nan() {
            continue;
        }
        if best.is_none_or(|(_, b)| value < b) {
            best = Some(((x, y), value));
        }
    }
    best
}
