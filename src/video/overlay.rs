use std::fs;
use std::path::Path;

use ab_glyph::{FontVec, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;

use crate::perception::ElementOnScreen;

const FONT_CANDIDATES: &[&str] = &[
    r"C:\Windows\Fonts\segoeui.ttf",
    r"C:\Windows\Fonts\arial.ttf",
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
];

const LABEL_SCALE: f32 = 16.0;
const POINT_RADIUS: i32 = 4;

/// Draws annotations onto frames.
pub struct Overlay {
    font: Option<FontVec>,
}

impl Overlay {
    /// Uses the first system font found. Without one, names are not drawn.
    pub fn load() -> Self {
        let font = system_font();
        if font.is_none() {
            log::warn!("No overlay font found, annotation names will not be drawn");
        }
        Self { font }
    }

    pub fn without_text() -> Self {
        Self { font: None }
    }

    pub fn draw(&self, frame: &mut RgbImage, elements: &[ElementOnScreen]) {
        for element in elements {
            let color = Rgb(element.color.rgb());
            let center = if let Some([left, top, right, bottom]) = element.rect {
                let (w, h) = ((right - left).max(1) as u32, (bottom - top).max(1) as u32);
                draw_hollow_rect_mut(frame, Rect::at(left, top).of_size(w, h), color);
                if w > 2 && h > 2 {
                    draw_hollow_rect_mut(frame, Rect::at(left + 1, top + 1).of_size(w - 2, h - 2), color);
                }
                ((left + right) / 2, (top + bottom) / 2)
            } else if let Some((x, y)) = element.point {
                draw_filled_circle_mut(frame, (x, y), POINT_RADIUS, color);
                (x, y)
            } else {
                continue;
            };

            if let (Some(font), Some(name)) = (&self.font, &element.name) {
                let scale = PxScale::from(LABEL_SCALE);
                let (tw, th) = text_size(scale, font, name);
                let x = center.0 - tw as i32 / 2;
                let y = center.1 - th as i32 / 2;
                draw_text_mut(frame, color, x, y, scale, font, name);
            }
        }
    }
}

/// First readable font among the usual Windows and Linux locations.
pub fn system_font() -> Option<FontVec> {
    FONT_CANDIDATES.iter().find_map(|p| load_font(Path::new(p)))
}

fn load_font(path: &Path) -> Option<FontVec> {
    let bytes = fs::read(path).ok()?;
    match FontVec::try_from_vec(bytes) {
        Ok(font) => Some(font),
        Err(e) => {
            log::debug!("Skipping font {}: {}", path.display(), e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::perception::AnnotationColor;

    #[test]
    fn test_draws_regions_and_points() {
        let mut frame = RgbImage::new(100, 80);
        let elements = vec![
            ElementOnScreen::region(Some("OK"), [10, 10, 50, 40], AnnotationColor::Matched),
            ElementOnScreen::point(None, (80, 60)),
        ];
        Overlay::without_text().draw(&mut frame, &elements);

        assert_eq!(frame.get_pixel(10, 10).0, [255, 0, 255]);
        assert_eq!(frame.get_pixel(30, 10).0, [255, 0, 255]);
        assert_eq!(frame.get_pixel(11, 20).0, [255, 0, 255]);
        assert_eq!(frame.get_pixel(30, 25).0, [0, 0, 0]);
        assert_eq!(frame.get_pixel(80, 60).0, [255, 0, 0]);
        assert_eq!(frame.get_pixel(0, 0).0, [0, 0, 0]);
    }

    #[test]
    fn test_out_of_frame_annotations_are_clipped() {
        let mut frame = RgbImage::new(20, 20);
        let elements = vec![
            ElementOnScreen::region(None, [-5, -5, 40, 40], AnnotationColor::Scanning),
            ElementOnScreen::point(None, (100, 100)),
        ];
        Overlay::without_text().draw(&mut frame, &elements);
        assert_eq!(frame.get_pixel(10, 10).0, [0, 0, 0]);
    }
}
