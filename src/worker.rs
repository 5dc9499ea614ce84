//! Entry point of a worker subprocess.
//!
//! The GUI starts `mff-auto --worker --log <session log> --job <json>` for
//! each task or queue item. The worker attaches to the emulator, builds the
//! requested mode and runs it; its exit code tells the scheduler how it went.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::emulator::{self, discover};
use crate::game::Game;
use crate::logging;
use crate::modes::{self, Mode};
use crate::ocr::{ensure_tesseract, TesseractEngine};
use crate::paths;
use crate::perception::{Perception, StdoutObserver};
use crate::scheduler::JobDescriptor;
use crate::settings::low_memory_from_env;

pub const EXIT_OK: i32 = 0;
pub const EXIT_MODE_FAILED: i32 = 1;
pub const EXIT_BAD_JOB: i32 = 2;

/// Runs one job and returns the process exit code.
pub fn run(log_path: &Path, job_json: &str) -> i32 {
    if let Err(e) = logging::init(log_path) {
        eprintln!("Worker logging unavailable: {:#}", e);
    }
    logging::install_panic_hook();

    let (job, mode) = match prepare(job_json) {
        Ok(prepared) => prepared,
        Err(e) => {
            log::error!("Invalid job: {:#}", e);
            return EXIT_BAD_JOB;
        }
    };

    log::info!("Worker {} starting '{}'", std::process::id(), job.mode_id);
    match execute(&job, mode) {
        Ok(()) => {
            log::info!("'{}' completed", job.mode_id);
            EXIT_OK
        }
        Err(e) => {
            log::error!("'{}' failed: {:#}", job.mode_id, e);
            EXIT_MODE_FAILED
        }
    }
}

/// Decodes the descriptor and looks the mode up.
pub fn prepare(job_json: &str) -> Result<(JobDescriptor, Box<dyn Mode>)> {
    let job: JobDescriptor = serde_json::from_str(job_json).context("Malformed job descriptor")?;
    let mode = modes::build(&job.mode_id, &job.parameters)?;
    Ok((job, mode))
}

fn execute(job: &JobDescriptor, mut mode: Box<dyn Mode>) -> Result<()> {
    let low_memory = low_memory_from_env() || job.settings.low_memory_mode;

    let backend = emulator::platform_backend()?;
    let emulator = discover(backend, job.settings.preferred_emulator())?;
    log::info!(
        "Attached to {} {} (pid {})",
        emulator.kind(),
        emulator.version(),
        emulator.process_id()
    );

    let tesseract = ensure_tesseract().context("Tesseract is not available")?;
    let engine = TesseractEngine::new(tesseract.executable, tesseract.tessdata);
    let perception = Perception::new(Box::new(engine), paths::get_templates_dir())
        .with_observer(Arc::new(StdoutObserver))
        .with_low_memory(low_memory);

    let mut game = Game::new(emulator, perception, job.settings.clone());
    mode.run(&mut game)
}
