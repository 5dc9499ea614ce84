pub mod engine;
pub mod preprocess;
pub mod setup;

pub use engine::TesseractEngine;
pub use preprocess::{binarize_bright, crop_region};
pub use setup::ensure_tesseract;

use anyhow::Result;
use image::GrayImage;

/// Single-line text recognition on a preprocessed image.
///
/// `whitelist` restricts the characters the engine may emit.
pub trait TextRecognizer: Send + Sync {
    fn recognize_line(&self, image: &GrayImage, whitelist: Option<&str>) -> Result<String>;
}
