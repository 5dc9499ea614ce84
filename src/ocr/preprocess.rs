use image::{GrayImage, Luma, RgbImage};

use crate::geometry::Rect;

/// Converts a grayscale image to black text on a white background.
///
/// Pixels brighter than `threshold` become black (text), everything else
/// white. Game labels are light text on darker panels, and Tesseract reads
/// dark-on-light far better.
pub fn binarize_bright(img: &GrayImage, threshold: u8) -> GrayImage {
    let (width, height) = img.dimensions();
    GrayImage::from_fn(width, height, |x, y| {
        if img.get_pixel(x, y)[0] > threshold {
            Luma([0u8])
        } else {
            Luma([255u8])
        }
    })
}

/// Crops a normalized region out of a frame, clamped to the frame bounds.
pub fn crop_region(img: &RgbImage, region: &Rect) -> RgbImage {
    let (w, h) = img.dimensions();
    let (x, y, cw, ch) = region.to_pixels(w, h).clamped_crop(w, h);
    image::imageops::crop_imm(img, x, y, cw, ch).to_image()
}
