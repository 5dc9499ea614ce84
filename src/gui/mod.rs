//! GUI module for the application.
//!
//! Provides the queue editor, task buttons, screen preview and log panes
//! using egui/eframe. All widget state lives on the GUI thread; workers
//! report back through the scheduler's event channel.

pub mod render;
pub mod state;

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use eframe::egui::{self, TextureHandle, Vec2};

use crate::emulator::{self, discover, Emulator};
use crate::modes::Parameters;
use crate::queue::{persist, QueueItem};
use crate::scheduler::{
    JobDescriptor, MultiOptionTask, Scheduler, SchedulerEvent, SelfExeLauncher, SingleTask, TaskOption,
    TaskState,
};
use crate::settings::GameSettings;
use crate::video::{self, AnnotationBuffer, FrameSource, Overlay, Recorder};
use crate::paths;

use render::{QueueAction, TaskAction};
use state::{EmulatorStatus, GuiState, LOG_REFRESH, PREVIEW_REFRESH};

/// Main GUI application struct.
pub struct GuiApp {
    state: GuiState,
    scheduler: Scheduler,
    tasks: Vec<SingleTask>,
    energy_task: MultiOptionTask,
    emulator: Option<Arc<Mutex<Emulator>>>,
    annotations: Arc<AnnotationBuffer>,
    overlay: Overlay,
    preview: Option<TextureHandle>,
    recorder: Option<Recorder>,
}

fn energy_option(label: &str, min_energy: u32) -> TaskOption {
    let mut parameters = Parameters::new();
    parameters.insert("min_energy".into(), min_energy.into());
    TaskOption {
        label: label.to_string(),
        parameters,
    }
}

impl GuiApp {
    pub fn new(log_path: PathBuf) -> Result<Self> {
        let settings = GameSettings::load(&paths::get_game_settings_path());
        let slots = persist::load_slots(&paths::get_queue_path());
        let annotations = Arc::new(AnnotationBuffer::new());
        let scheduler = Scheduler::new(Arc::new(SelfExeLauncher::current(log_path.clone())?))
            .with_annotations(annotations.clone());

        let job = |mode: &str| JobDescriptor::new(mode, Parameters::new(), settings.clone());
        let tasks = vec![
            SingleTask::new("Restart game", job("RestartGame")),
            SingleTask::new("Heroic quest rewards", job("AcquireHeroicQuestRewards")),
        ];
        let energy_task = MultiOptionTask::new(
            SingleTask::new("Wait for energy", job("WaitForEnergy")),
            vec![
                energy_option("60", 60),
                energy_option("90", 90),
                energy_option("120", 120),
            ],
        );

        let mut app = Self {
            state: GuiState::new(settings, slots, log_path),
            scheduler,
            tasks,
            energy_task,
            emulator: None,
            annotations,
            overlay: Overlay::load(),
            preview: None,
            recorder: None,
        };
        app.rescan_emulator();
        Ok(app)
    }

    fn rescan_emulator(&mut self) {
        let found = emulator::platform_backend()
            .and_then(|backend| discover(backend, self.state.settings.preferred_emulator()));
        match found {
            Ok(emulator) => {
                log::info!("GUI: Using {} {}", emulator.kind(), emulator.version());
                self.state.settings.emulator_name = emulator.process_name().to_string();
                self.state.settings.emulator_type = emulator.kind();
                self.state.emulator_status = EmulatorStatus::from_emulator(&emulator);
                self.emulator = Some(Arc::new(Mutex::new(emulator)));
            }
            Err(e) => {
                log::warn!("GUI: {}", e);
                self.state.emulator_status = EmulatorStatus::Error(e.to_string());
                self.emulator = None;
            }
        }
    }

    /// Settings as they should reach the next worker.
    fn job_settings(&self) -> GameSettings {
        self.state.settings.clone()
    }

    fn handle_events(&mut self) {
        for event in self.scheduler.drain_events() {
            self.state.slots.queue.apply(&event);
            for task in &mut self.tasks {
                task.on_event(&event);
            }
            self.energy_task.on_event(&event);

            match &event {
                SchedulerEvent::QueueFinished { .. } | SchedulerEvent::TaskFinished { .. } => {
                    if let Some(recorder) = &self.recorder {
                        recorder.pause();
                    }
                }
                SchedulerEvent::Error(msg) => {
                    self.state.status_message = Some(msg.clone());
                }
                _ => {}
            }
        }
    }

    fn apply_queue_action(&mut self, action: QueueAction) {
        match action {
            QueueAction::SwitchSlot(slot) => {
                self.state.slots.switch_to(slot);
            }
            QueueAction::SelectAll(checked) => {
                self.state.slots.queue.set_select_all(checked);
            }
            QueueAction::Toggle(index, checked) => {
                self.state.slots.queue.set_checked(index, checked);
            }
            QueueAction::MoveUp(index) => {
                self.state.slots.queue.move_item(index, index.saturating_sub(1));
            }
            QueueAction::MoveDown(index) => {
                self.state.slots.queue.move_item(index, index + 1);
            }
            QueueAction::Remove(index) => {
                self.state.slots.queue.remove(index);
            }
            QueueAction::Add(mode) => {
                self.state.slots.queue.push(QueueItem::new(mode));
            }
            QueueAction::Run => self.handle_run(),
            QueueAction::Stop => {
                self.scheduler.stop_queue();
                log::info!("GUI: Requested queue stop");
            }
        }
    }

    fn handle_run(&mut self) {
        let settings = self.job_settings();
        let items = self.state.slots.queue.begin_run();
        match self.scheduler.run_queue(items, settings) {
            Ok(()) => {
                self.state.status_message = None;
                self.start_or_resume_recording();
            }
            Err(e) => {
                log::error!("GUI: Failed to start queue: {}", e);
                self.state.status_message = Some(e.to_string());
                self.state.slots.queue.apply(&SchedulerEvent::QueueFinished { stopped: true });
            }
        }
    }

    fn apply_task_action(&mut self, action: TaskAction) {
        let settings = self.job_settings();
        let result = match action {
            TaskAction::Activate(i) => match self.tasks.get_mut(i) {
                Some(task) => {
                    task.job_mut().settings = settings;
                    task.activate(&self.scheduler)
                }
                None => Ok(()),
            },
            TaskAction::ActivateMulti => {
                self.energy_task.task_mut().job_mut().settings = settings;
                self.energy_task.activate(&self.scheduler)
            }
            TaskAction::SelectOption(i) => {
                self.energy_task.select(i);
                Ok(())
            }
        };
        match result {
            Ok(()) if self.any_task_running() => self.start_or_resume_recording(),
            Ok(()) => {}
            Err(e) => {
                log::error!("GUI: {}", e);
                self.state.status_message = Some(e.to_string());
            }
        }
    }

    fn any_task_running(&self) -> bool {
        self.tasks
            .iter()
            .chain(std::iter::once(self.energy_task.task()))
            .any(|t| t.state() == TaskState::Running)
    }

    fn start_or_resume_recording(&mut self) {
        if !self.state.settings.record_video {
            return;
        }
        if let Some(recorder) = &self.recorder {
            recorder.resume();
            return;
        }
        let Some(emulator) = &self.emulator else {
            return;
        };
        let path = paths::get_logs_dir().join(paths::video_file_name(chrono::Local::now()));
        match video::open_mp4(&path) {
            Ok(sink) => {
                let source: Box<dyn FrameSource> = Box::new(emulator.clone());
                self.recorder = Some(Recorder::start(source, sink, self.annotations.clone(), Overlay::load()));
            }
            Err(e) => {
                log::warn!("GUI: Video unavailable: {:#}", e);
                self.state.settings.record_video = false;
            }
        }
    }

    fn refresh_logs(&mut self) {
        if self.state.last_log_poll.elapsed() < LOG_REFRESH {
            return;
        }
        self.state.last_log_poll = Instant::now();
        if let Err(e) = self.state.tail.poll() {
            log::debug!("GUI: Failed to read {}: {}", self.state.tail.path().display(), e);
        }
    }

    fn refresh_preview(&mut self, ctx: &egui::Context) {
        if self.state.last_preview.elapsed() < PREVIEW_REFRESH {
            return;
        }
        self.state.last_preview = Instant::now();
        let Some(emulator) = &self.emulator else {
            return;
        };

        let mut source = emulator.clone();
        match source.grab() {
            Ok(mut frame) => {
                self.overlay.draw(&mut frame, &self.annotations.live());
                let size = [frame.width() as usize, frame.height() as usize];
                let image = egui::ColorImage::from_rgb(size, frame.as_raw());
                match &mut self.preview {
                    Some(texture) => texture.set(image, egui::TextureOptions::LINEAR),
                    None => {
                        self.preview = Some(ctx.load_texture("preview", image, egui::TextureOptions::LINEAR));
                    }
                }
            }
            Err(e) if e.is_fatal() => {
                log::warn!("GUI: {}", e);
                self.state.emulator_status = EmulatorStatus::Error(e.to_string());
                self.emulator = None;
                self.preview = None;
            }
            Err(e) => log::debug!("GUI: Preview capture failed: {}", e),
        }
    }

    fn save(&mut self) {
        if let Err(e) = self.state.settings.save(&paths::get_game_settings_path()) {
            log::error!("GUI: Failed to save settings: {}", e);
        }
        if let Err(e) = persist::save_slots(&paths::get_queue_path(), &self.state.slots) {
            log::error!("GUI: Failed to save queue: {}", e);
        }
    }
}

impl eframe::App for GuiApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.handle_events();
        self.refresh_logs();
        self.refresh_preview(ctx);

        if let Some(rect) = ctx.input(|i| i.viewport().inner_rect) {
            self.state.settings.window_size = Some([rect.width(), rect.height()]);
        }

        let mut queue_actions = Vec::new();
        let mut task_actions = Vec::new();
        let mut rescan = false;

        egui::TopBottomPanel::top("header").show(ctx, |ui| {
            rescan = render::render_header(ui, &mut self.state, self.recorder.is_some());
        });

        egui::TopBottomPanel::bottom("logs")
            .resizable(true)
            .default_height(180.0)
            .show(ctx, |ui| render::render_logs(ui, &mut self.state));

        egui::SidePanel::left("queue")
            .resizable(true)
            .default_width(340.0)
            .show(ctx, |ui| {
                queue_actions = render::render_queue(ui, &mut self.state);
                ui.add_space(12.0);
                ui.separator();
                task_actions = render::render_tasks(
                    ui,
                    &self.tasks,
                    &self.energy_task,
                    self.scheduler.is_queue_running(),
                );
            });

        egui::CentralPanel::default().show(ctx, |ui| {
            render::render_preview(ui, self.preview.as_ref());
        });

        if rescan {
            self.rescan_emulator();
        }
        for action in queue_actions {
            self.apply_queue_action(action);
        }
        for action in task_actions {
            self.apply_task_action(action);
        }

        ctx.request_repaint_after(Duration::from_millis(100));
    }
}

impl Drop for GuiApp {
    fn drop(&mut self) {
        self.scheduler.stop_queue();
        self.scheduler.stop_task();
        if let Some(recorder) = self.recorder.take() {
            if let Err(e) = recorder.stop() {
                log::error!("GUI: Failed to finish recording: {:#}", e);
            }
        }
        self.save();
        log::info!("GUI: Settings and queues saved");
    }
}

/// Run the GUI application.
/// This function blocks until the window is closed.
pub fn run_gui(log_path: PathBuf) -> Result<()> {
    let app = GuiApp::new(log_path)?;
    let size = app.state.settings.window_size.unwrap_or([960.0, 720.0]);

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size(Vec2::new(size[0], size[1]))
            .with_min_inner_size(Vec2::new(640.0, 480.0))
            .with_title("MFF Auto")
            // Disable drag-and-drop to avoid COM conflict with RoInitialize (multithreaded)
            .with_drag_and_drop(false),
        ..Default::default()
    };

    eframe::run_native("MFF Auto", options, Box::new(move |_cc| Ok(Box::new(app))))
        .map_err(|e| anyhow!("GUI error: {}", e))
}
