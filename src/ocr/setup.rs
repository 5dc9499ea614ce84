use anyhow::{anyhow, Result};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

const TESSDATA_REPO: &str = "https://github.com/tesseract-ocr/tessdata/raw/main";

/// Install locations used by the UB-Mannheim Windows installer.
const SYSTEM_INSTALL_DIRS: [&str; 2] = [
    r"C:\Program Files\Tesseract-OCR",
    r"C:\Program Files (x86)\Tesseract-OCR",
];

#[cfg(windows)]
const TESSERACT_EXE: &str = "tesseract.exe";
#[cfg(not(windows))]
const TESSERACT_EXE: &str = "tesseract";

pub struct TesseractPaths {
    pub executable: PathBuf,
    pub tessdata: PathBuf,
}

/// Directory holding the bundled Tesseract: `<exe_dir>/tesseract/`.
pub fn get_bundled_tesseract_dir() -> PathBuf {
    crate::paths::get_exe_dir().join("tesseract")
}

/// Per-user directory for downloaded trained data.
pub fn get_user_tesseract_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mff-auto")
        .join("tesseract")
}

/// Ensures Tesseract and `eng.traineddata` are available.
///
/// The executable must already be installed (bundled, on PATH, or in a
/// system location). Missing trained data is copied from a system install
/// or downloaded into the per-user directory.
pub fn ensure_tesseract() -> Result<TesseractPaths> {
    let executable = find_tesseract_executable()?;

    if let Ok(tessdata) = find_tessdata_dir() {
        log::info!("Tesseract found: {} ({})", executable.display(), tessdata.display());
        return Ok(TesseractPaths { executable, tessdata });
    }

    let tessdata = get_user_tesseract_dir().join("tessdata");
    fs::create_dir_all(&tessdata)?;
    download_tessdata(&tessdata)?;

    Ok(TesseractPaths { executable, tessdata })
}

/// Downloads English trained data into `tessdata_dir`.
fn download_tessdata(tessdata_dir: &Path) -> Result<()> {
    let eng_url = format!("{}/eng.traineddata", TESSDATA_REPO);
    let eng_path = tessdata_dir.join("eng.traineddata");

    log::info!("Downloading eng.traineddata...");

    let client = reqwest::blocking::Client::builder()
        .timeout(std::time::Duration::from_secs(300))
        .build()?;

    let response = client
        .get(&eng_url)
        .header("User-Agent", "mff-auto")
        .send()?;

    if !response.status().is_success() {
        return Err(anyhow!(
            "Failed to download eng.traineddata: HTTP {}",
            response.status()
        ));
    }

    let bytes = response.bytes()?;
    let mut file = fs::File::create(&eng_path)?;
    file.write_all(&bytes)?;

    log::info!("Downloaded eng.traineddata ({} bytes)", bytes.len());
    Ok(())
}

fn tesseract_on_path() -> bool {
    std::process::Command::new("tesseract")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Finds the Tesseract executable: bundled copy, then PATH, then system installs.
pub fn find_tesseract_executable() -> Result<PathBuf> {
    let bundled = get_bundled_tesseract_dir().join(TESSERACT_EXE);
    if bundled.exists() {
        return Ok(bundled);
    }

    if tesseract_on_path() {
        return Ok(PathBuf::from("tesseract"));
    }

    SYSTEM_INSTALL_DIRS
        .iter()
        .map(|dir| Path::new(dir).join(TESSERACT_EXE))
        .find(|p| p.exists())
        .ok_or_else(|| anyhow!("Tesseract not found. Please install Tesseract-OCR."))
}

/// Finds a tessdata directory containing `eng.traineddata`.
pub fn find_tessdata_dir() -> Result<PathBuf> {
    let mut candidates = vec![
        get_bundled_tesseract_dir().join("tessdata"),
        get_user_tesseract_dir().join("tessdata"),
    ];
    candidates.extend(
        SYSTEM_INSTALL_DIRS
            .iter()
            .map(|dir| Path::new(dir).join("tessdata")),
    );
    if let Ok(prefix) = std::env::var("TESSDATA_PREFIX") {
        let prefix = PathBuf::from(prefix);
        candidates.push(prefix.join("tessdata"));
        candidates.push(prefix);
    }

    find_with_traineddata(&candidates).ok_or_else(|| {
        anyhow!("tessdata directory not found. Please ensure eng.traineddata is available.")
    })
}

fn find_with_traineddata(candidates: &[PathBuf]) -> Option<PathBuf> {
    candidates
        .iter()
        .find(|dir| dir.join("eng.traineddata").exists())
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_with_traineddata_picks_first_populated() {
        let empty = tempfile::tempdir().unwrap();
        let populated = tempfile::tempdir().unwrap();
        fs::write(populated.path().join("eng.traineddata"), b"x").unwrap();

        let found = find_with_traineddata(&[
            empty.path().to_path_buf(),
            populated.path().to_path_buf(),
        ]);
        assert_eq!(found.as_deref(), Some(populated.path()));
        assert!(find_with_traineddata(&[empty.path().to_path_buf()]).is_none());
    }
}
