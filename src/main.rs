//! MFF Auto
//!
//! Drives Marvel Future Fight inside the Nox or BlueStacks emulator. The GUI
//! process edits queues of game modes and runs each one in a worker
//! subprocess of this same executable.

// Hide console window on Windows for GUI mode
#![windows_subsystem = "windows"]

mod args;
mod emulator;
mod error;
mod game;
mod geometry;
mod logging;
mod modes;
mod ocr;
mod paths;
mod perception;
mod queue;
mod scheduler;
mod settings;
mod ui;
mod video;
mod worker;

#[cfg(windows)]
mod capture;
#[cfg(windows)]
mod gui;

use anyhow::Result;
use chrono::Local;

use args::Invocation;

fn main() -> Result<()> {
    let invocation = match Invocation::parse() {
        Ok(invocation) => invocation,
        Err(msg) => {
            eprintln!("{}", msg);
            args::print_help();
            std::process::exit(worker::EXIT_BAD_JOB);
        }
    };

    match invocation {
        Invocation::Help => {
            args::print_help();
            Ok(())
        }
        Invocation::Version => {
            println!("mff-auto {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Invocation::Worker { log, job } => {
            init_com()?;
            std::process::exit(worker::run(&log, &job));
        }
        Invocation::Gui => run_gui(),
    }
}

#[cfg(windows)]
fn init_com() -> Result<()> {
    unsafe {
        windows::Win32::System::WinRT::RoInitialize(
            windows::Win32::System::WinRT::RO_INIT_MULTITHREADED,
        )?
    };
    Ok(())
}

#[cfg(not(windows))]
fn init_com() -> Result<()> {
    Ok(())
}

#[cfg(windows)]
fn run_gui() -> Result<()> {
    paths::ensure_directories()?;
    let log_path = paths::get_logs_dir().join(paths::session_log_name(Local::now()));
    logging::init(&log_path)?;
    logging::install_panic_hook();
    init_com()?;

    // Fetch tessdata up front so the first worker does not race for it.
    if let Err(e) = ocr::ensure_tesseract() {
        log::warn!("Failed to set up Tesseract: {:#}", e);
        log::warn!("OCR features may not work correctly.");
    }

    log::info!("Starting GUI, session log {}", log_path.display());
    let result = gui::run_gui(log_path);
    match &result {
        Ok(()) => log::info!("GUI application exited normally"),
        Err(e) => log::error!("{:#}", e),
    }
    result
}

#[cfg(not(windows))]
fn run_gui() -> Result<()> {
    let log_path = paths::get_logs_dir().join(paths::session_log_name(Local::now()));
    logging::init(&log_path)?;
    anyhow::bail!("The GUI is only available on Windows")
}
