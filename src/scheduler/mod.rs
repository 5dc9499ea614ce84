//! Runs modes in worker subprocesses, one at a time.
//!
//! The GUI owns a [`Scheduler`]. Single tasks and queue runs both go through
//! its shared [`WorkerSlot`], so at most one worker is ever alive. Progress
//! comes back as [`SchedulerEvent`]s which the GUI drains once per frame.

mod task;
mod worker;

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread;

use crate::error::{BotError, BotResult};
use crate::perception::{NoopObserver, PerceptionObserver};
use crate::queue::QueueItem;
use crate::settings::GameSettings;

pub use task::{MultiOptionTask, SingleTask, TaskOption, TaskState};
pub use worker::{JobDescriptor, SelfExeLauncher, TaskOutcome, WorkerLauncher, WorkerSlot, JOIN_POLL_INTERVAL};

#[cfg(all(test, unix))]
pub use worker::testing;

#[derive(Clone, Debug, PartialEq)]
pub enum SchedulerEvent {
    /// Queue item `index` is about to run.
    Progress(usize),
    /// Queue item `index` is disabled and was passed over.
    Skipped(usize),
    ItemFinished { index: usize, outcome: TaskOutcome },
    QueueFinished { stopped: bool },
    /// A single task's worker exited.
    TaskFinished { task: String, outcome: TaskOutcome },
    Error(String),
}

pub struct Scheduler {
    slot: WorkerSlot,
    launcher: Arc<dyn WorkerLauncher>,
    annotations: Arc<dyn PerceptionObserver>,
    events_tx: Sender<SchedulerEvent>,
    events_rx: Receiver<SchedulerEvent>,
    queue_running: Arc<AtomicBool>,
    stop_requested: Arc<AtomicBool>,
}

impl Scheduler {
    pub fn new(launcher: Arc<dyn WorkerLauncher>) -> Self {
        let (events_tx, events_rx) = mpsc::channel();
        Self {
            slot: WorkerSlot::default(),
            launcher,
            annotations: Arc::new(NoopObserver),
            events_tx,
            events_rx,
            queue_running: Arc::new(AtomicBool::new(false)),
            stop_requested: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Where annotation lines from workers end up.
    pub fn with_annotations(mut self, annotations: Arc<dyn PerceptionObserver>) -> Self {
        self.annotations = annotations;
        self
    }

    /// Events since the last call, oldest first.
    pub fn drain_events(&self) -> Vec<SchedulerEvent> {
        self.events_rx.try_iter().collect()
    }

    pub fn is_worker_alive(&self) -> bool {
        self.slot.is_busy()
    }

    pub fn is_queue_running(&self) -> bool {
        self.queue_running.load(Ordering::SeqCst)
    }

    /// Starts `job` for a single task and reports `TaskFinished` when it exits.
    pub fn start_task(&self, task: &str, job: &JobDescriptor) -> BotResult<()> {
        if self.is_queue_running() {
            return Err(BotError::WorkerBusy);
        }
        let id = self.slot.spawn(self.launcher.as_ref(), job, self.annotations.clone())?;

        let slot = self.slot.clone();
        let tx = self.events_tx.clone();
        let task = task.to_string();
        thread::spawn(move || {
            let outcome = slot
                .join(id)
                .unwrap_or_else(|e| TaskOutcome::Failed(e.to_string()));
            let _ = tx.send(SchedulerEvent::TaskFinished { task, outcome });
        });
        Ok(())
    }

    /// Kills the worker alive right now, if any.
    pub fn stop_task(&self) -> bool {
        self.slot.kill()
    }

    /// Runs a snapshot of the queue on a pool thread.
    pub fn run_queue(&self, items: Vec<QueueItem>, settings: GameSettings) -> BotResult<()> {
        if self.slot.is_busy() || self.queue_running.swap(true, Ordering::SeqCst) {
            return Err(BotError::WorkerBusy);
        }
        self.stop_requested.store(false, Ordering::SeqCst);
        log::info!("Running queue of {} item(s)", items.len());

        let run = QueueRun {
            slot: self.slot.clone(),
            launcher: self.launcher.clone(),
            annotations: self.annotations.clone(),
            events: self.events_tx.clone(),
            stop_requested: self.stop_requested.clone(),
        };
        let running = self.queue_running.clone();
        let stop_requested = self.stop_requested.clone();
        let tx = self.events_tx.clone();

        thread::spawn(move || {
            let result = panic::catch_unwind(AssertUnwindSafe(|| run.execute(&items, &settings)));
            let stopped = stop_requested.swap(false, Ordering::SeqCst);
            running.store(false, Ordering::SeqCst);
            if let Err(payload) = result {
                let message = panic_message(payload.as_ref());
                log::error!("Queue runner panicked: {}", message);
                let _ = tx.send(SchedulerEvent::Error(message));
            }
            log::info!("Queue {}", if stopped { "stopped" } else { "finished" });
            let _ = tx.send(SchedulerEvent::QueueFinished { stopped });
        });
        Ok(())
    }

    /// Stops a running queue after killing its current worker. No-op when idle.
    pub fn stop_queue(&self) -> bool {
        if !self.is_queue_running() {
            return false;
        }
        self.stop_requested.store(true, Ordering::SeqCst);
        self.slot.kill();
        true
    }
}

struct QueueRun {
    slot: WorkerSlot,
    launcher: Arc<dyn WorkerLauncher>,
    annotations: Arc<dyn PerceptionObserver>,
    events: Sender<SchedulerEvent>,
    stop_requested: Arc<AtomicBool>,
}

impl QueueRun {
    fn stopping(&self) -> bool {
        self.stop_requested.load(Ordering::SeqCst)
    }

    fn send(&self, event: SchedulerEvent) {
        let _ = self.events.send(event);
    }

    fn execute(&self, items: &[QueueItem], settings: &GameSettings) {
        for (index, item) in items.iter().enumerate() {
            if self.stopping() {
                break;
            }
            if !item.checked {
                log::debug!("Skipping disabled item {} ('{}')", index, item.mode_name);
                self.send(SchedulerEvent::Skipped(index));
                continue;
            }

            self.send(SchedulerEvent::Progress(index));
            let job = JobDescriptor::for_item(item, settings);
            let outcome = match self.slot.spawn(self.launcher.as_ref(), &job, self.annotations.clone()) {
                Ok(id) => {
                    // Stop may have landed between the loop check and the spawn.
                    if self.stopping() {
                        self.slot.kill();
                    }
                    self.slot
                        .join(id)
                        .unwrap_or_else(|e| TaskOutcome::Failed(e.to_string()))
                }
                Err(e) => {
                    log::error!("Failed to start '{}': {}", item.mode_name, e);
                    TaskOutcome::Failed(e.to_string())
                }
            };
            self.send(SchedulerEvent::ItemFinished { index, outcome });
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::testing::{job, ShellLauncher};
    use super::*;
    use std::time::{Duration, Instant};

    fn scheduler() -> Scheduler {
        Scheduler::new(Arc::new(ShellLauncher))
    }

    fn wait_for_queue(scheduler: &Scheduler, limit: Duration) -> Vec<SchedulerEvent> {
        let start = Instant::now();
        let mut events = Vec::new();
        while start.elapsed() < limit {
            events.extend(scheduler.drain_events());
            if events.iter().any(|e| matches!(e, SchedulerEvent::QueueFinished { .. })) {
                return events;
            }
            thread::sleep(Duration::from_millis(10));
        }
        panic!("queue did not finish within {:?}: {:?}", limit, events);
    }

    #[test]
    fn test_disabled_items_are_skipped() {
        let s = scheduler();
        let items = vec![
            QueueItem::new("exit 0"),
            QueueItem::new("exit 0").with_checked(false),
            QueueItem::new("exit 0"),
        ];
        s.run_queue(items, GameSettings::default()).unwrap();
        let events = wait_for_queue(&s, Duration::from_secs(10));

        let progress: Vec<usize> = events
            .iter()
            .filter_map(|e| match e {
                SchedulerEvent::Progress(i) => Some(*i),
                _ => None,
            })
            .collect();
        assert_eq!(progress, vec![0, 2]);
        assert!(events.contains(&SchedulerEvent::Skipped(1)));
        assert_eq!(events.last(), Some(&SchedulerEvent::QueueFinished { stopped: false }));
        assert!(!s.is_queue_running());
    }

    #[test]
    fn test_stop_skips_remaining_items() {
        let s = scheduler();
        let items = vec![QueueItem::new("sleep 5"), QueueItem::new("exit 0")];
        s.run_queue(items, GameSettings::default()).unwrap();

        let start = Instant::now();
        while !s.is_worker_alive() && start.elapsed() < Duration::from_secs(5) {
            thread::sleep(Duration::from_millis(10));
        }
        assert!(s.stop_queue());

        let events = wait_for_queue(&s, Duration::from_secs(2));
        assert!(start.elapsed() < Duration::from_secs(5));
        assert!(!events.contains(&SchedulerEvent::Progress(1)));
        assert!(events.contains(&SchedulerEvent::ItemFinished {
            index: 0,
            outcome: TaskOutcome::Stopped
        }));
        assert_eq!(events.last(), Some(&SchedulerEvent::QueueFinished { stopped: true }));

        // The flag is cleared, so the next run goes through.
        s.run_queue(vec![QueueItem::new("exit 0")], GameSettings::default()).unwrap();
        let events = wait_for_queue(&s, Duration::from_secs(10));
        assert!(events.contains(&SchedulerEvent::Progress(0)));
    }

    #[test]
    fn test_stop_while_idle_is_a_no_op() {
        let s = scheduler();
        assert!(!s.stop_queue());
        assert!(!s.stop_queue());
        assert!(!s.is_queue_running());
        assert!(s.drain_events().is_empty());
    }

    #[test]
    fn test_only_one_worker_at_a_time() {
        let s = scheduler();
        s.start_task("first", &job("sleep 5")).unwrap();
        assert!(matches!(s.start_task("second", &job("exit 0")), Err(BotError::WorkerBusy)));
        assert!(matches!(
            s.run_queue(vec![QueueItem::new("exit 0")], GameSettings::default()),
            Err(BotError::WorkerBusy)
        ));

        assert!(s.stop_task());
        let start = Instant::now();
        let mut events = Vec::new();
        while events.is_empty() && start.elapsed() < Duration::from_secs(2) {
            events = s.drain_events();
            thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(
            events,
            vec![SchedulerEvent::TaskFinished {
                task: "first".into(),
                outcome: TaskOutcome::Stopped
            }]
        );
    }
}
