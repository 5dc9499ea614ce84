//! Normalized rectangles and their conversion to absolute pixel boxes.
//!
//! UI positions are stored as fractions (0.0 to 1.0) of the emulator's main
//! window so they survive window resizing. They are resolved against the
//! window's current pixel rectangle at use time.

use serde::{Deserialize, Serialize};

/// A rectangle in normalized coordinates (0.0 to 1.0).
///
/// Serialized as `[x1, y1, x2, y2]`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 4]", into = "[f64; 4]")]
pub struct Rect {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl Rect {
    /// Creates a rectangle, swapping corners so that `x1 <= x2` and `y1 <= y2`.
    pub const fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        let (x1, x2) = if x1 <= x2 { (x1, x2) } else { (x2, x1) };
        let (y1, y2) = if y1 <= y2 { (y1, y2) } else { (y2, y1) };
        Self { x1, y1, x2, y2 }
    }

    /// A degenerate rectangle at a single normalized point.
    pub const fn point(x: f64, y: f64) -> Self {
        Self::new(x, y, x, y)
    }

    /// Whether every corner lies inside [0, 1].
    pub fn is_normalized(&self) -> bool {
        [self.x1, self.y1, self.x2, self.y2]
            .iter()
            .all(|v| (0.0..=1.0).contains(v))
    }

    pub fn is_empty(&self) -> bool {
        self.x1 == self.x2 || self.y1 == self.y2
    }

    /// Resolves this rectangle against a parent pixel rectangle.
    ///
    /// Strictly linear; nothing is rounded here.
    pub fn to_global(&self, parent: &PixelRect) -> PixelRect {
        let width = parent.width();
        let height = parent.height();
        PixelRect {
            left: parent.left + self.x1 * width,
            top: parent.top + self.y1 * height,
            right: parent.left + self.x2 * width,
            bottom: parent.top + self.y2 * height,
        }
    }

    /// Inverse of [`Rect::to_global`]. A zero-sized parent maps everything to 0.
    pub fn from_global(global: &PixelRect, parent: &PixelRect) -> Self {
        let width = parent.width();
        let height = parent.height();
        let fx = |v: f64| if width == 0.0 { 0.0 } else { (v - parent.left) / width };
        let fy = |v: f64| if height == 0.0 { 0.0 } else { (v - parent.top) / height };
        Self::new(fx(global.left), fy(global.top), fx(global.right), fy(global.bottom))
    }

    /// Pixel box of this rectangle inside an image of the given size.
    pub fn to_pixels(&self, width: u32, height: u32) -> PixelRect {
        self.to_global(&PixelRect::new(0.0, 0.0, width as f64, height as f64))
    }
}

impl From<[f64; 4]> for Rect {
    fn from(v: [f64; 4]) -> Self {
        Rect::new(v[0], v[1], v[2], v[3])
    }
}

impl From<Rect> for [f64; 4] {
    fn from(r: Rect) -> Self {
        [r.x1, r.y1, r.x2, r.y2]
    }
}

/// An absolute pixel rectangle in screen (or image) coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PixelRect {
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
}

impl PixelRect {
    pub const fn new(left: f64, top: f64, right: f64, bottom: f64) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn width(&self) -> f64 {
        self.right - self.left
    }

    pub fn height(&self) -> f64 {
        self.bottom - self.top
    }

    pub fn center(&self) -> (f64, f64) {
        (
            (self.left + self.right) / 2.0,
            (self.top + self.bottom) / 2.0,
        )
    }

    pub fn is_positive(&self) -> bool {
        self.width() > 0.0 && self.height() > 0.0
    }

    /// Position of `point` relative to this rectangle's top-left corner.
    pub fn relative(&self, point: (f64, f64)) -> (f64, f64) {
        (point.0 - self.left, point.1 - self.top)
    }

    /// Integer crop box `(x, y, width, height)` clamped to an image of the given size.
    pub fn clamped_crop(&self, width: u32, height: u32) -> (u32, u32, u32, u32) {
        let clamp_x = |v: f64| (v.max(0.0) as u32).min(width);
        let clamp_y = |v: f64| (v.max(0.0) as u32).min(height);
        let x0 = clamp_x(self.left);
        let y0 = clamp_y(self.top);
        let x1 = clamp_x(self.right).max(x0);
        let y1 = clamp_y(self.bottom).max(y0);
        (x0, y0, x1 - x0, y1 - y0)
    }
}
