//! GUI rendering functions.
//!
//! Each function draws one panel and reports what the user clicked; the
//! app applies the actions after drawing.

use eframe::egui::{self, Color32, RichText, TextureHandle, Vec2};

use super::state::{GuiState, LogPane};
use crate::modes::MODES;
use crate::queue::{SelectAllState, SLOT_COUNT};
use crate::scheduler::{MultiOptionTask, SingleTask, TaskState};

#[derive(Clone, Debug, PartialEq)]
pub enum QueueAction {
    SwitchSlot(usize),
    SelectAll(bool),
    Toggle(usize, bool),
    MoveUp(usize),
    MoveDown(usize),
    Remove(usize),
    Add(&'static str),
    Run,
    Stop,
}

#[derive(Clone, Debug, PartialEq)]
pub enum TaskAction {
    Activate(usize),
    ActivateMulti,
    SelectOption(usize),
}

/// Emulator status line. Returns true when "Rescan" was clicked.
pub fn render_header(ui: &mut egui::Ui, state: &mut GuiState, recording: bool) -> bool {
    let mut rescan = false;
    ui.horizontal(|ui| {
        ui.label("Emulator:");
        let color = if state.emulator_status.is_connected() {
            Color32::from_rgb(0, 150, 0)
        } else {
            Color32::from_rgb(200, 0, 0)
        };
        ui.label(RichText::new(state.emulator_status.status_text()).color(color));
        if ui.button("Rescan").clicked() {
            rescan = true;
        }
        ui.add_space(20.0);
        ui.checkbox(&mut state.settings.low_memory_mode, "Low memory mode");
        ui.checkbox(&mut state.settings.record_video, "Record video");
        if recording {
            ui.label(RichText::new("● REC").color(Color32::RED));
        }
    });
    if let Some(msg) = &state.status_message {
        ui.label(RichText::new(msg).color(Color32::from_rgb(200, 150, 0)));
    }
    rescan
}

fn to_color(rgb: [u8; 3]) -> Color32 {
    Color32::from_rgb(rgb[0], rgb[1], rgb[2])
}

/// Slot tabs, the queue list and its controls.
pub fn render_queue(ui: &mut egui::Ui, state: &mut GuiState) -> Vec<QueueAction> {
    let mut actions = Vec::new();
    let running = state.slots.queue.is_running();

    ui.horizontal(|ui| {
        for slot in 0..SLOT_COUNT {
            let selected = state.slots.current() == slot;
            let tab = ui.add_enabled(!running, egui::SelectableLabel::new(selected, format!("Queue {}", slot + 1)));
            if tab.clicked() && !selected {
                actions.push(QueueAction::SwitchSlot(slot));
            }
        }
    });
    ui.separator();

    let queue = &state.slots.queue;
    ui.add_enabled_ui(!running, |ui| {
        let select_all = queue.select_all_state();
        let mut checked = select_all == SelectAllState::Checked;
        let response = ui.add(
            egui::Checkbox::new(&mut checked, "Select All")
                .indeterminate(select_all == SelectAllState::PartiallyChecked),
        );
        if response.changed() {
            // From partial, a click checks everything.
            let target = select_all != SelectAllState::Checked;
            actions.push(QueueAction::SelectAll(target));
        }
    });

    egui::ScrollArea::vertical()
        .id_salt("queue_items")
        .max_height(260.0)
        .show(ui, |ui| {
            let len = queue.len();
            for (index, item) in queue.items().iter().enumerate() {
                let fill = queue
                    .highlight(index)
                    .rgb()
                    .map(to_color)
                    .unwrap_or(Color32::TRANSPARENT);
                egui::Frame::none().fill(fill).show(ui, |ui| {
                    ui.horizontal(|ui| {
                        ui.add_enabled_ui(!running, |ui| {
                            let mut checked = item.checked;
                            if ui.checkbox(&mut checked, "").changed() {
                                actions.push(QueueAction::Toggle(index, checked));
                            }
                        });
                        let title = crate::modes::find(&item.mode_name)
                            .map(|m| m.title)
                            .unwrap_or(item.mode_name.as_str());
                        let text = RichText::new(title);
                        let text = if fill == Color32::TRANSPARENT { text } else { text.color(Color32::BLACK) };
                        ui.label(text);
                        ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                            ui.add_enabled_ui(!running, |ui| {
                                if ui.small_button("✖").clicked() {
                                    actions.push(QueueAction::Remove(index));
                                }
                                if index + 1 < len && ui.small_button("▼").clicked() {
                                    actions.push(QueueAction::MoveDown(index));
                                }
                                if index > 0 && ui.small_button("▲").clicked() {
                                    actions.push(QueueAction::MoveUp(index));
                                }
                            });
                        });
                    });
                });
            }
        });

    ui.add_space(8.0);
    ui.horizontal(|ui| {
        ui.add_enabled_ui(!running, |ui| {
            let selected = MODES.get(state.add_mode).map(|m| m.title).unwrap_or("");
            egui::ComboBox::from_id_salt("add_mode")
                .selected_text(selected)
                .show_ui(ui, |ui| {
                    for (i, mode) in MODES.iter().enumerate() {
                        ui.selectable_value(&mut state.add_mode, i, mode.title);
                    }
                });
            if ui.button("Add").clicked() {
                if let Some(mode) = MODES.get(state.add_mode) {
                    actions.push(QueueAction::Add(mode.id));
                }
            }
        });

        ui.add_space(20.0);
        if running {
            if ui.button(RichText::new("◼ Stop").size(16.0)).clicked() {
                actions.push(QueueAction::Stop);
            }
        } else {
            let runnable = state.slots.queue.items().iter().any(|i| i.checked);
            ui.add_enabled_ui(runnable, |ui| {
                if ui.button(RichText::new("▶ Run").size(16.0)).clicked() {
                    actions.push(QueueAction::Run);
                }
            });
        }
    });

    actions
}

/// Single-task buttons. Disabled while the queue runs.
pub fn render_tasks(
    ui: &mut egui::Ui,
    tasks: &[SingleTask],
    multi: &MultiOptionTask,
    queue_running: bool,
) -> Vec<TaskAction> {
    let mut actions = Vec::new();
    ui.heading("Tasks");
    ui.add_enabled_ui(!queue_running, |ui| {
        for (i, task) in tasks.iter().enumerate() {
            let button = egui::Button::new(task.button_label());
            if ui.add_enabled(task.state() != TaskState::Stopping, button).clicked() {
                actions.push(TaskAction::Activate(i));
            }
        }

        ui.horizontal(|ui| {
            let option = multi
                .options()
                .get(multi.selected())
                .map(|o| o.label.as_str())
                .unwrap_or("");
            let label = match multi.task().state() {
                TaskState::Idle => format!("{} ({})", multi.task().button_label(), option),
                TaskState::Running | TaskState::Stopping => multi.task().button_label().to_string(),
            };
            let enabled = multi.task().state() != TaskState::Stopping;
            if ui.add_enabled(enabled, egui::Button::new(label)).clicked() {
                actions.push(TaskAction::ActivateMulti);
            }
            ui.add_enabled_ui(multi.menu_enabled(), |ui| {
                ui.menu_button("▾", |ui| {
                    for (i, option) in multi.options().iter().enumerate() {
                        if ui.selectable_label(i == multi.selected(), &option.label).clicked() {
                            actions.push(TaskAction::SelectOption(i));
                            ui.close_menu();
                        }
                    }
                });
            });
        });
    });
    actions
}

/// Latest emulator frame, scaled to the panel width.
pub fn render_preview(ui: &mut egui::Ui, preview: Option<&TextureHandle>) {
    ui.heading("Screen");
    let width = ui.available_width();
    match preview {
        Some(texture) => {
            let [w, h] = texture.size();
            let height = width * h as f32 / w.max(1) as f32;
            ui.image((texture.id(), Vec2::new(width, height)));
        }
        None => {
            let (rect, _response) = ui.allocate_exact_size(Vec2::new(width, width * 0.5625), egui::Sense::hover());
            ui.painter().rect_filled(rect, 4.0, Color32::from_gray(40));
            ui.painter().text(
                rect.center(),
                egui::Align2::CENTER_CENTER,
                "No capture",
                egui::FontId::proportional(16.0),
                Color32::from_gray(160),
            );
        }
    }
}

/// Log panes with All / Info / Errors tabs.
pub fn render_logs(ui: &mut egui::Ui, state: &mut GuiState) {
    ui.horizontal(|ui| {
        for pane in LogPane::ALL {
            ui.selectable_value(&mut state.log_pane, pane, pane.title());
        }
    });
    egui::ScrollArea::vertical()
        .id_salt("log_lines")
        .stick_to_bottom(true)
        .auto_shrink([false, false])
        .show(ui, |ui| {
            for line in state.pane_lines() {
                let text = RichText::new(line).monospace().size(11.0);
                let text = match crate::logging::line_level(line) {
                    Some(log::Level::Error) => text.color(Color32::from_rgb(220, 50, 50)),
                    Some(log::Level::Warn) => text.color(Color32::from_rgb(200, 150, 0)),
                    _ => text,
                };
                ui.label(text);
            }
        });
}
