//! Catalogue of named on-screen UI elements.
//!
//! Every element is a constant: normalized rectangles over the emulator's
//! main window plus what perception needs to recognise it (expected text,
//! OCR threshold, character whitelist, reference image).

mod elements;

pub use elements::*;

use crate::error::{BotError, BotResult};
use crate::geometry::Rect;

pub const DEFAULT_TEXT_THRESHOLD: u8 = 150;

const DEPRECATED_TAG: &str = "[DEPRECATED]";

/// An immutable UI element record.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct UiElement {
    pub name: &'static str,
    pub description: &'static str,
    /// Where OCR reads.
    pub text_rect: Option<Rect>,
    /// Where a click is posted, and where a reference image is probed.
    pub button_rect: Option<Rect>,
    /// Reference image file name under `resources/templates/`.
    pub image: Option<&'static str>,
    pub text: Option<&'static str>,
    pub text_threshold: u8,
    pub available_characters: Option<&'static str>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ElementCategory {
    TextButton,
    VisualButton,
    DragAnchor,
    TextLabel,
    /// A text region read for its value (counters and the like).
    Reading,
}

impl UiElement {
    pub const fn new(name: &'static str, description: &'static str) -> Self {
        Self {
            name,
            description,
            text_rect: None,
            button_rect: None,
            image: None,
            text: None,
            text_threshold: DEFAULT_TEXT_THRESHOLD,
            available_characters: None,
        }
    }

    pub const fn text_rect(mut self, rect: Rect) -> Self {
        self.text_rect = Some(rect);
        self
    }

    pub const fn button_rect(mut self, rect: Rect) -> Self {
        self.button_rect = Some(rect);
        self
    }

    pub const fn image(mut self, file: &'static str) -> Self {
        self.image = Some(file);
        self
    }

    pub const fn text(mut self, text: &'static str) -> Self {
        self.text = Some(text);
        self
    }

    pub const fn threshold(mut self, threshold: u8) -> Self {
        self.text_threshold = threshold;
        self
    }

    pub const fn characters(mut self, chars: &'static str) -> Self {
        self.available_characters = Some(chars);
        self
    }

    pub fn is_deprecated(&self) -> bool {
        self.description.contains(DEPRECATED_TAG)
    }

    pub fn category(&self) -> ElementCategory {
        match (self.button_rect, self.image, self.text) {
            (Some(_), Some(_), _) => ElementCategory::VisualButton,
            (Some(_), None, Some(_)) => ElementCategory::TextButton,
            (Some(_), None, None) => ElementCategory::DragAnchor,
            (None, _, Some(_)) => ElementCategory::TextLabel,
            (None, _, None) => ElementCategory::Reading,
        }
    }

    /// Region read by OCR: the text rect, else the button rect.
    pub fn ocr_rect(&self) -> Option<Rect> {
        self.text_rect.or(self.button_rect)
    }

    /// Region compared against the reference image: the button rect, else the text rect.
    pub fn image_rect(&self) -> Option<Rect> {
        self.button_rect.or(self.text_rect)
    }

    /// Where to click: the button rect, else the text rect.
    pub fn click_rect(&self) -> Option<Rect> {
        self.button_rect.or(self.text_rect)
    }
}

/// Looks an element up by name, rejecting deprecated entries.
pub fn get(name: &str) -> BotResult<&'static UiElement> {
    ELEMENTS
        .iter()
        .find(|e| e.name == name && !e.is_deprecated())
        .ok_or_else(|| BotError::UnknownElement(name.to_string()))
}

/// All elements that callers may use.
pub fn active() -> impl Iterator<Item = &'static UiElement> {
    ELEMENTS.iter().filter(|e| !e.is_deprecated())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_names_are_unique() {
        let mut seen = HashSet::new();
        for element in ELEMENTS {
            assert!(seen.insert(element.name), "duplicate element {}", element.name);
        }
    }

    #[test]
    fn test_rects_are_normalized() {
        for element in ELEMENTS {
            for rect in [element.text_rect, element.button_rect].into_iter().flatten() {
                assert!(rect.is_normalized(), "{} has {:?}", element.name, rect);
            }
        }
    }

    #[test]
    fn test_every_element_is_reachable() {
        for element in active() {
            assert!(
                element.text_rect.is_some() || element.button_rect.is_some(),
                "{} has no region",
                element.name
            );
            if element.image.is_some() {
                assert!(element.image_rect().is_some());
            }
            if element.text.is_some() {
                assert!(element.ocr_rect().is_some());
            }
        }
    }

    #[test]
    fn test_lookup() {
        assert_eq!(get("OK_BUTTON").unwrap().text, Some("OK"));
        assert!(matches!(get("NOPE"), Err(BotError::UnknownElement(_))));

        let deprecated = ELEMENTS.iter().find(|e| e.is_deprecated()).unwrap();
        assert!(get(deprecated.name).is_err());
    }

    #[test]
    fn test_categories() {
        assert_eq!(OK_BUTTON.category(), ElementCategory::TextButton);
        assert_eq!(MAIN_MENU_BUTTON.category(), ElementCategory::VisualButton);
        assert_eq!(DRAG_LEFT_ANCHOR.category(), ElementCategory::DragAnchor);
        assert_eq!(MAIN_MENU_LABEL.category(), ElementCategory::TextLabel);
        assert_eq!(ENERGY_LABEL.category(), ElementCategory::Reading);
        assert_eq!(ENERGY_LABEL.text_threshold, 130);
    }
}
