//! Worker subprocesses: how they are launched, and the single slot they run in.

use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::process::{Child, ChildStdout, Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{BotError, BotResult};
use crate::modes::Parameters;
use crate::perception::{ElementOnScreen, PerceptionObserver};
use crate::queue::QueueItem;
use crate::settings::GameSettings;

/// How often a joining thread polls its worker.
pub const JOIN_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Everything a worker needs to run one mode.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JobDescriptor {
    pub mode_id: String,
    #[serde(default)]
    pub parameters: Parameters,
    #[serde(default)]
    pub settings: GameSettings,
}

impl JobDescriptor {
    pub fn new(mode_id: &str, parameters: Parameters, settings: GameSettings) -> Self {
        Self {
            mode_id: mode_id.to_string(),
            parameters,
            settings,
        }
    }

    pub fn for_item(item: &QueueItem, settings: &GameSettings) -> Self {
        Self::new(&item.mode_name, item.parameters.clone(), settings.clone())
    }
}

/// Builds the command line for a worker.
pub trait WorkerLauncher: Send + Sync {
    fn command(&self, job: &JobDescriptor) -> BotResult<Command>;
}

/// Runs workers as `<this exe> --worker --log <session log> --job <json>`.
pub struct SelfExeLauncher {
    executable: PathBuf,
    log_path: PathBuf,
}

impl SelfExeLauncher {
    pub fn new(executable: PathBuf, log_path: PathBuf) -> Self {
        Self {
            executable,
            log_path,
        }
    }

    pub fn current(log_path: PathBuf) -> BotResult<Self> {
        Ok(Self::new(std::env::current_exe()?, log_path))
    }
}

impl WorkerLauncher for SelfExeLauncher {
    fn command(&self, job: &JobDescriptor) -> BotResult<Command> {
        let json = serde_json::to_string(job).map_err(|source| BotError::Serialization {
            path: self.log_path.clone(),
            source,
        })?;

        let mut command = Command::new(&self.executable);
        command
            .arg("--worker")
            .arg("--log")
            .arg(&self.log_path)
            .arg("--job")
            .arg(json)
            .env("MFF_LOW_MEMORY_MODE", job.settings.low_memory_env());

        #[cfg(windows)]
        {
            use std::os::windows::process::CommandExt;
            const CREATE_NO_WINDOW: u32 = 0x0800_0000;
            command.creation_flags(CREATE_NO_WINDOW);
        }

        Ok(command)
    }
}

/// How a worker run ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TaskOutcome {
    Completed,
    Failed(String),
    Stopped,
}

struct RunningWorker {
    id: u64,
    mode: String,
    child: Child,
    killed: bool,
}

static NEXT_WORKER_ID: AtomicU64 = AtomicU64::new(1);

/// The one place a worker may run. Clones share the slot.
#[derive(Clone, Default)]
pub struct WorkerSlot {
    current: Arc<Mutex<Option<RunningWorker>>>,
}

impl WorkerSlot {
    fn lock(&self) -> MutexGuard<'_, Option<RunningWorker>> {
        // A panicking joiner cannot leave the slot half-updated.
        self.current.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Starts a worker unless one is alive. Returns its id for [`WorkerSlot::join`].
    ///
    /// Annotation lines on the worker's stdout go to `annotations`; any other
    /// output is logged at debug level.
    pub fn spawn(
        &self,
        launcher: &dyn WorkerLauncher,
        job: &JobDescriptor,
        annotations: Arc<dyn PerceptionObserver>,
    ) -> BotResult<u64> {
        // The slot stays taken until the worker has been joined.
        let mut slot = self.lock();
        if slot.is_some() {
            return Err(BotError::WorkerBusy);
        }

        let mut child = launcher
            .command(job)?
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .spawn()?;
        let id = NEXT_WORKER_ID.fetch_add(1, Ordering::SeqCst);
        log::info!("Started worker #{} (pid {}) for '{}'", id, child.id(), job.mode_id);

        if let Some(stdout) = child.stdout.take() {
            forward_output(stdout, annotations);
        }

        *slot = Some(RunningWorker {
            id,
            mode: job.mode_id.clone(),
            child,
            killed: false,
        });
        Ok(id)
    }

    /// Kills whatever worker is alive right now. Returns false if there was none.
    pub fn kill(&self) -> bool {
        let mut slot = self.lock();
        let Some(worker) = slot.as_mut() else {
            return false;
        };
        if matches!(worker.child.try_wait(), Ok(Some(_))) {
            return false;
        }
        match worker.child.kill() {
            Ok(()) => {
                worker.killed = true;
                log::info!("Killed worker #{} ('{}')", worker.id, worker.mode);
                true
            }
            Err(e) => {
                log::warn!("Failed to kill worker #{}: {}", worker.id, e);
                false
            }
        }
    }

    /// Whether a worker is running or waiting to be joined.
    pub fn is_busy(&self) -> bool {
        self.lock().is_some()
    }

    /// Waits for worker `id` to exit and frees the slot.
    pub fn join(&self, id: u64) -> BotResult<TaskOutcome> {
        loop {
            {
                let mut slot = self.lock();
                let worker = match slot.as_mut() {
                    Some(worker) if worker.id == id => worker,
                    _ => {
                        return Err(BotError::Io(std::io::Error::other(format!(
                            "worker #{} is not in the slot",
                            id
                        ))));
                    }
                };
                if let Some(status) = worker.child.try_wait()? {
                    let outcome = outcome_of(&worker.mode, status, worker.killed);
                    *slot = None;
                    return Ok(outcome);
                }
            }
            thread::sleep(JOIN_POLL_INTERVAL);
        }
    }
}

fn outcome_of(mode: &str, status: ExitStatus, killed: bool) -> TaskOutcome {
    if killed {
        log::info!("Worker for '{}' was stopped", mode);
        return TaskOutcome::Stopped;
    }
    if status.success() {
        log::info!("Worker for '{}' finished", mode);
        return TaskOutcome::Completed;
    }
    let err = BotError::WorkerException {
        mode: mode.to_string(),
        status: status.to_string(),
    };
    log::error!("{}", err);
    TaskOutcome::Failed(err.to_string())
}

fn forward_output(stdout: ChildStdout, annotations: Arc<dyn PerceptionObserver>) {
    thread::spawn(move || {
        for line in BufReader::new(stdout).lines() {
            let Ok(line) = line else { break };
            match ElementOnScreen::from_line(&line) {
                Some(element) => annotations.record(element),
                None if !line.trim().is_empty() => log::debug!(target: "worker", "{}", line),
                None => {}
            }
        }
    });
}

#[cfg(all(test, unix))]
pub mod testing {
    use super::*;

    /// Runs `sh -c <mode_id>` so tests can script worker behaviour.
    pub struct ShellLauncher;

    impl WorkerLauncher for ShellLauncher {
        fn command(&self, job: &JobDescriptor) -> BotResult<Command> {
            let mut command = Command::new("sh");
            command.arg("-c").arg(&job.mode_id);
            Ok(command)
        }
    }

    pub fn job(script: &str) -> JobDescriptor {
        JobDescriptor::new(script, Parameters::new(), GameSettings::default())
    }
}
