//! Two-state task buttons.

use super::{JobDescriptor, Scheduler, SchedulerEvent};
use crate::error::BotResult;
use crate::modes::Parameters;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TaskState {
    Idle,
    Running,
    /// Killed, waiting for the worker to be joined.
    Stopping,
}

/// A button that starts one mode and, while it runs, stops it.
#[derive(Clone, Debug)]
pub struct SingleTask {
    label: String,
    running_label: String,
    job: JobDescriptor,
    state: TaskState,
}

impl SingleTask {
    pub fn new(label: &str, job: JobDescriptor) -> Self {
        Self {
            label: label.to_string(),
            running_label: "Stop".to_string(),
            job,
            state: TaskState::Idle,
        }
    }

    pub fn with_running_label(mut self, label: &str) -> Self {
        self.running_label = label.to_string();
        self
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn job(&self) -> &JobDescriptor {
        &self.job
    }

    pub fn job_mut(&mut self) -> &mut JobDescriptor {
        &mut self.job
    }

    /// Text shown on the button.
    pub fn button_label(&self) -> &str {
        match self.state {
            TaskState::Idle => &self.label,
            TaskState::Running => &self.running_label,
            TaskState::Stopping => "Stopping...",
        }
    }

    /// Starts the worker when idle, kills it when running.
    ///
    /// A killed task stays in [`TaskState::Stopping`] until its
    /// `TaskFinished` event arrives, so it cannot be restarted while the old
    /// worker still holds the slot.
    pub fn activate(&mut self, scheduler: &Scheduler) -> BotResult<()> {
        match self.state {
            TaskState::Idle => {
                scheduler.start_task(&self.label, &self.job)?;
                self.state = TaskState::Running;
            }
            TaskState::Running => {
                scheduler.stop_task();
                self.state = TaskState::Stopping;
            }
            TaskState::Stopping => {}
        }
        Ok(())
    }

    pub fn on_event(&mut self, event: &SchedulerEvent) {
        if let SchedulerEvent::TaskFinished { task, .. } = event {
            if *task == self.label {
                self.state = TaskState::Idle;
            }
        }
    }
}

/// A labelled parameter set for a [`MultiOptionTask`].
#[derive(Clone, Debug)]
pub struct TaskOption {
    pub label: String,
    pub parameters: Parameters,
}

/// A task button with a menu of parameter sets for the same mode.
#[derive(Clone, Debug)]
pub struct MultiOptionTask {
    task: SingleTask,
    options: Vec<TaskOption>,
    selected: usize,
}

impl MultiOptionTask {
    pub fn new(task: SingleTask, options: Vec<TaskOption>) -> Self {
        let mut multi = Self {
            task,
            options,
            selected: 0,
        };
        multi.apply_selection();
        multi
    }

    fn apply_selection(&mut self) {
        if let Some(option) = self.options.get(self.selected) {
            self.task.job_mut().parameters = option.parameters.clone();
        }
    }

    pub fn task(&self) -> &SingleTask {
        &self.task
    }

    /// The underlying task. Option selection still goes through [`MultiOptionTask::select`].
    pub fn task_mut(&mut self) -> &mut SingleTask {
        &mut self.task
    }

    pub fn options(&self) -> &[TaskOption] {
        &self.options
    }

    pub fn selected(&self) -> usize {
        self.selected
    }

    pub fn menu_enabled(&self) -> bool {
        self.task.state() == TaskState::Idle
    }

    /// Picks an option. Ignored while the task runs.
    pub fn select(&mut self, index: usize) -> bool {
        if !self.menu_enabled() || index >= self.options.len() {
            return false;
        }
        self.selected = index;
        self.apply_selection();
        true
    }

    pub fn activate(&mut self, scheduler: &Scheduler) -> BotResult<()> {
        self.task.activate(scheduler)
    }

    pub fn on_event(&mut self, event: &SchedulerEvent) {
        self.task.on_event(event);
    }
}
