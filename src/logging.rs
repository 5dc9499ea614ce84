//! Session logging shared by the GUI and its workers.
//!
//! Every process appends `[HH:MM:SS.mmm] LEVEL target: message` lines to the
//! same session file and mirrors them to stderr. The GUI reads the file back
//! through [`LogTail`] to fill its log panes.

use std::collections::VecDeque;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::{Context, Result};
use chrono::Local;
use env_logger::{Builder, Env, Target};
use log::Level;
use regex::Regex;

/// Lines kept per pane.
pub const MAX_PANE_LINES: usize = 5000;

/// Writes to the session file and stderr.
struct Tee {
    file: File,
}

impl Write for Tee {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let _ = io::stderr().write_all(buf);
        self.file.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        let _ = io::stderr().flush();
        self.file.flush()
    }
}

/// Installs the global logger. `RUST_LOG` overrides the default `info` filter.
pub fn init(log_path: &Path) -> Result<()> {
    if let Some(parent) = log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)
        .with_context(|| format!("Failed to open log file {}", log_path.display()))?;

    Builder::from_env(Env::default().default_filter_or("info"))
        .format(|buf, record| {
            writeln!(
                buf,
                "[{}] {:<5} {}: {}",
                Local::now().format("%H:%M:%S%.3f"),
                record.level(),
                record.target(),
                record.args()
            )
        })
        .target(Target::Pipe(Box::new(Tee { file })))
        .try_init()
        .context("Logger already initialised")?;
    Ok(())
}

/// Routes panics into the log before the default hook runs.
pub fn install_panic_hook() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let msg = if let Some(s) = info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };
        let location = info
            .location()
            .map(|loc| format!(" at {}:{}:{}", loc.file(), loc.line(), loc.column()))
            .unwrap_or_default();
        log::error!("Panic{}: {}", location, msg);
        default_hook(info);
    }));
}

static HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\[\d{2}:\d{2}:\d{2}\.\d{3}\] (ERROR|WARN|INFO|DEBUG|TRACE)\s")
        .expect("static regex")
});

/// Level of a log header line, `None` for continuation lines.
pub fn line_level(line: &str) -> Option<Level> {
    let caps = HEADER.captures(line)?;
    caps[1].parse().ok()
}

/// Incrementally reads a log file and sorts its lines into panes.
pub struct LogTail {
    path: PathBuf,
    offset: u64,
    partial: String,
    current_level: Level,
    pub all: VecDeque<String>,
    pub info: VecDeque<String>,
    pub errors: VecDeque<String>,
}

impl LogTail {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            offset: 0,
            partial: String::new(),
            current_level: Level::Info,
            all: VecDeque::new(),
            info: VecDeque::new(),
            errors: VecDeque::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads whatever was appended since the last call. Returns true if
    /// any complete line arrived.
    pub fn poll(&mut self) -> io::Result<bool> {
        let mut file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e),
        };
        let len = file.metadata()?.len();
        if len < self.offset {
            // Truncated or replaced; start over.
            self.offset = 0;
            self.partial.clear();
        }
        if len == self.offset {
            return Ok(false);
        }

        file.seek(SeekFrom::Start(self.offset))?;
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)?;
        self.offset += bytes.len() as u64;
        self.partial.push_str(&String::from_utf8_lossy(&bytes));

        let Some(last_newline) = self.partial.rfind('\n') else {
            return Ok(false);
        };
        let complete: String = self.partial.drain(..=last_newline).collect();
        for line in complete.lines() {
            self.push_line(line.trim_end_matches('\r'));
        }
        Ok(true)
    }

    fn push_line(&mut self, line: &str) {
        if let Some(level) = line_level(line) {
            self.current_level = level;
        }
        push_capped(&mut self.all, line);
        if self.current_level <= Level::Info {
            push_capped(&mut self.info, line);
        }
        if self.current_level == Level::Error {
            push_capped(&mut self.errors, line);
        }
    }
}

fn push_capped(pane: &mut VecDeque<String>, line: &str) {
    if pane.len() >= MAX_PANE_LINES {
        pane.pop_front();
    }
    pane.push_back(line.to_string());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_level() {
        assert_eq!(line_level("[09:30:00.123] ERROR mff_auto::game: boom"), Some(Level::Error));
        assert_eq!(line_level("[09:30:00.123] INFO  worker: ok"), Some(Level::Info));
        assert_eq!(line_level("   at src/main.rs:10"), None);
        assert_eq!(line_level("[bad] INFO x"), None);
    }

    #[test]
    fn test_tail_classifies_and_follows_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.log");
        let mut tail = LogTail::new(path.clone());
        assert!(!tail.poll().unwrap());

        let mut file = OpenOptions::new().create(true).append(true).open(&path).unwrap();
        write!(
            file,
            "[09:30:00.000] INFO  mff_auto: started\n\
             [09:30:01.000] DEBUG mff_auto::perception: probe\n\
             [09:30:02.000] ERROR mff_auto::scheduler: worker failed\n\
             Traceback line\n\
             [09:30:03.000] WARN  mff_auto: half a li"
        )
        .unwrap();
        assert!(tail.poll().unwrap());
        assert_eq!(tail.all.len(), 4);
        assert_eq!(tail.info.len(), 3);
        assert_eq!(
            tail.errors,
            vec![
                "[09:30:02.000] ERROR mff_auto::scheduler: worker failed".to_string(),
                "Traceback line".to_string()
            ]
        );

        writeln!(file, "ne").unwrap();
        assert!(tail.poll().unwrap());
        assert_eq!(tail.all.back().unwrap(), "[09:30:03.000] WARN  mff_auto: half a line");
        assert_eq!(tail.errors.len(), 2);
        assert!(!tail.poll().unwrap());
    }

    #[test]
    fn test_panes_drop_oldest_lines() {
        let mut pane = VecDeque::new();
        for i in 0..MAX_PANE_LINES + 3 {
            push_capped(&mut pane, &format!("line {i}"));
        }
        assert_eq!(pane.len(), MAX_PANE_LINES);
        assert_eq!(pane.front().map(String::as_str), Some("line 3"));
        assert_eq!(pane.back().map(String::as_str), Some(format!("line {}", MAX_PANE_LINES + 2).as_str()));
    }
}
