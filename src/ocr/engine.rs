use anyhow::{anyhow, Result};
use image::GrayImage;
use std::path::PathBuf;
use std::process::Command;
use tempfile::NamedTempFile;

use super::setup::{find_tessdata_dir, find_tesseract_executable};
use super::TextRecognizer;

/// A recognised word with Tesseract's confidence (0-100).
#[derive(Debug, Clone)]
pub struct OcrWord {
    pub text: String,
    pub confidence: f32,
}

/// Tesseract run as a command-line process per request.
#[derive(Debug, Clone)]
pub struct TesseractEngine {
    executable: PathBuf,
    tessdata: PathBuf,
}

impl TesseractEngine {
    pub fn new(executable: PathBuf, tessdata: PathBuf) -> Self {
        Self { executable, tessdata }
    }

    /// Locates an installed Tesseract.
    pub fn locate() -> Result<Self> {
        Ok(Self::new(find_tesseract_executable()?, find_tessdata_dir()?))
    }

    /// Runs Tesseract in single-line mode and returns the words it found.
    pub fn recognize_words(&self, img: &GrayImage, whitelist: Option<&str>) -> Result<Vec<OcrWord>> {
        let temp_input = NamedTempFile::with_suffix(".png")?;
        img.save(temp_input.path())?;

        // Tesseract appends .tsv to the output base itself
        let temp_output = NamedTempFile::new()?;
        let output_base = temp_output.path().to_string_lossy().to_string();

        let mut command = Command::new(&self.executable);
        command
            .arg(temp_input.path())
            .arg(&output_base)
            .arg("--tessdata-dir")
            .arg(&self.tessdata)
            .arg("-l")
            .arg("eng")
            .arg("--psm")
            .arg("7"); // Single text line
        if let Some(chars) = whitelist.filter(|c| !c.is_empty()) {
            command.arg("-c").arg(format!("tessedit_char_whitelist={}", chars));
        }
        let output = command.arg("tsv").output()?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("Tesseract failed: {}", stderr.trim()));
        }

        let tsv_path = format!("{}.tsv", output_base);
        let tsv = std::fs::read_to_string(&tsv_path)
            .map_err(|e| anyhow!("Failed to read Tesseract output: {}", e))?;
        let _ = std::fs::remove_file(&tsv_path);

        Ok(parse_tsv_words(&tsv))
    }
}

impl TextRecognizer for TesseractEngine {
    fn recognize_line(&self, image: &GrayImage, whitelist: Option<&str>) -> Result<String> {
        let words = self.recognize_words(image, whitelist)?;
        log::trace!(
            "OCR words: {:?}",
            words
                .iter()
                .map(|w| format!("{}({:.0})", w.text, w.confidence))
                .collect::<Vec<_>>()
        );
        Ok(words
            .iter()
            .map(|w| w.text.as_str())
            .collect::<Vec<_>>()
            .join(" "))
    }
}

/// Extracts word rows (level 5) from Tesseract TSV output.
///
/// TSV fields: level, page_num, block_num, par_num, line_num, word_num,
/// left, top, width, height, conf, text
fn parse_tsv_words(tsv: &str) -> Vec<OcrWord> {
    tsv.lines()
        .skip(1)
        .filter_map(|line| {
            let fields: Vec<&str> = line.split('\t').collect();
            if fields.len() < 12 || fields[0] != "5" {
                return None;
            }
            let confidence: f32 = fields[10].parse().unwrap_or(-1.0);
            let text = fields[11].trim();
            (confidence >= 0.0 && !text.is_empty()).then(|| OcrWord {
                text: text.to_string(),
                confidence,
            })
        })
        .collect()
}
