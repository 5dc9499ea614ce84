//! The user's queue of modes: items, enable flags, highlights and slots.

pub mod persist;

use serde::{Deserialize, Serialize};

use crate::modes::Parameters;
use crate::scheduler::SchedulerEvent;

/// Number of independently persisted queues.
pub const SLOT_COUNT: usize = 4;

/// One queued mode run.
///
/// Serialized flat: `{"mode_name": ..., "checked": ..., <parameters>...}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QueueItem {
    pub mode_name: String,
    #[serde(default = "default_checked")]
    pub checked: bool,
    #[serde(flatten)]
    pub parameters: Parameters,
}

fn default_checked() -> bool {
    true
}

impl QueueItem {
    pub fn new(mode_name: &str) -> Self {
        Self {
            mode_name: mode_name.to_string(),
            checked: true,
            parameters: Parameters::new(),
        }
    }

    pub fn with_checked(mut self, checked: bool) -> Self {
        self.checked = checked;
        self
    }

    pub fn with_parameter(mut self, key: &str, value: serde_json::Value) -> Self {
        self.parameters.insert(key.to_string(), value);
        self
    }
}

/// State of the synthetic "Select All" row.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SelectAllState {
    Checked,
    Unchecked,
    PartiallyChecked,
}

/// Row background during and after a run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Highlight {
    #[default]
    None,
    Executing,
    Completed,
    Skipped,
}

impl Highlight {
    /// Background colour as RGB, `None` for transparent.
    pub fn rgb(&self) -> Option<[u8; 3]> {
        match self {
            Highlight::None => None,
            Highlight::Executing => Some([255, 255, 0]),
            Highlight::Completed => Some([0, 200, 0]),
            Highlight::Skipped => Some([160, 160, 160]),
        }
    }
}

/// The queue shown in the editor.
///
/// Edits are refused while a run is in progress; every accepted edit clears
/// the highlights of the previous run.
#[derive(Clone, Debug, Default)]
pub struct Queue {
    items: Vec<QueueItem>,
    highlights: Vec<Highlight>,
    running: bool,
}

impl Queue {
    pub fn new(items: Vec<QueueItem>) -> Self {
        let highlights = vec![Highlight::None; items.len()];
        Self {
            items,
            highlights,
            running: false,
        }
    }

    pub fn items(&self) -> &[QueueItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn highlight(&self, index: usize) -> Highlight {
        self.highlights.get(index).copied().unwrap_or_default()
    }

    pub fn highlights(&self) -> &[Highlight] {
        &self.highlights
    }

    fn editable(&mut self) -> bool {
        if self.running {
            log::warn!("The queue cannot be edited while it is running");
            return false;
        }
        self.clear_highlights();
        true
    }

    fn clear_highlights(&mut self) {
        self.highlights = vec![Highlight::None; self.items.len()];
    }

    pub fn push(&mut self, item: QueueItem) -> bool {
        if !self.editable() {
            return false;
        }
        self.items.push(item);
        self.highlights.push(Highlight::None);
        true
    }

    pub fn remove(&mut self, index: usize) -> Option<QueueItem> {
        if index >= self.items.len() || !self.editable() {
            return None;
        }
        self.highlights.remove(index);
        Some(self.items.remove(index))
    }

    /// Moves an item to a new position, shifting the ones in between.
    pub fn move_item(&mut self, from: usize, to: usize) -> bool {
        if from >= self.items.len() || to >= self.items.len() || !self.editable() {
            return false;
        }
        let item = self.items.remove(from);
        self.items.insert(to, item);
        true
    }

    pub fn set_checked(&mut self, index: usize, checked: bool) -> bool {
        if index >= self.items.len() || !self.editable() {
            return false;
        }
        self.items[index].checked = checked;
        true
    }

    /// Replaces all items, e.g. when switching slots.
    pub fn replace(&mut self, items: Vec<QueueItem>) -> bool {
        if !self.editable() {
            return false;
        }
        self.items = items;
        self.clear_highlights();
        true
    }

    /// Derived state of the "Select All" row. An empty queue is unchecked.
    pub fn select_all_state(&self) -> SelectAllState {
        let checked = self.items.iter().filter(|i| i.checked).count();
        if checked == 0 {
            SelectAllState::Unchecked
        } else if checked == self.items.len() {
            SelectAllState::Checked
        } else {
            SelectAllState::PartiallyChecked
        }
    }

    /// Toggling the "Select All" row sets every item.
    pub fn set_select_all(&mut self, checked: bool) -> bool {
        if !self.editable() {
            return false;
        }
        for item in &mut self.items {
            item.checked = checked;
        }
        true
    }

    /// Starts a run: locks editing, clears highlights, returns the items to run.
    pub fn begin_run(&mut self) -> Vec<QueueItem> {
        self.clear_highlights();
        self.running = true;
        self.items.clone()
    }

    /// Applies a queue event from the scheduler.
    pub fn apply(&mut self, event: &SchedulerEvent) {
        let mut set = |index: usize, h: Highlight| {
            if let Some(slot) = self.highlights.get_mut(index) {
                *slot = h;
            }
        };
        match event {
            SchedulerEvent::Progress(index) => set(*index, Highlight::Executing),
            SchedulerEvent::Skipped(index) => set(*index, Highlight::Skipped),
            SchedulerEvent::ItemFinished { index, .. } => set(*index, Highlight::Completed),
            SchedulerEvent::QueueFinished { .. } => self.running = false,
            _ => {}
        }
    }
}

/// Four queues, one of which is shown in the editor.
#[derive(Clone, Debug)]
pub struct QueueSlots {
    slots: Vec<Vec<QueueItem>>,
    current: usize,
    pub queue: Queue,
}

impl Default for QueueSlots {
    fn default() -> Self {
        Self::from_slots(Vec::new())
    }
}

impl QueueSlots {
    /// Builds slots from persisted lists, padding or truncating to four.
    pub fn from_slots(mut slots: Vec<Vec<QueueItem>>) -> Self {
        if slots.len() != SLOT_COUNT {
            log::warn!("Expected {} queue slots, found {}", SLOT_COUNT, slots.len());
        }
        slots.resize_with(SLOT_COUNT, Vec::new);
        let queue = Queue::new(slots[0].clone());
        Self {
            slots,
            current: 0,
            queue,
        }
    }

    pub fn current(&self) -> usize {
        self.current
    }

    /// Stores the shown queue into its slot and shows another one.
    pub fn switch_to(&mut self, slot: usize) -> bool {
        if slot >= SLOT_COUNT || self.queue.is_running() {
            return false;
        }
        if slot == self.current {
            return true;
        }
        self.slots[self.current] = self.queue.items().to_vec();
        if !self.queue.replace(self.slots[slot].clone()) {
            return false;
        }
        self.current = slot;
        true
    }

    /// All four slots with the shown queue written back.
    pub fn to_slots(&self) -> Vec<Vec<QueueItem>> {
        let mut slots = self.slots.clone();
        slots[self.current] = self.queue.items().to_vec();
        slots
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::TaskOutcome;
    use serde_json::json;

    fn abc() -> Queue {
        Queue::new(vec![
            QueueItem::new("A"),
            QueueItem::new("B").with_checked(false),
            QueueItem::new("C"),
        ])
    }

    #[test]
    fn test_item_serializes_flat() {
        let item = QueueItem::new("WaitForEnergy").with_parameter("min_energy", json!(80));
        let value = serde_json::to_value(&item).unwrap();
        assert_eq!(value, json!({"mode_name": "WaitForEnergy", "checked": true, "min_energy": 80}));

        let back: QueueItem = serde_json::from_value(value).unwrap();
        assert_eq!(back, item);
    }

    #[test]
    fn test_select_all_tri_state() {
        let mut queue = Queue::new(vec![QueueItem::new("A"), QueueItem::new("B").with_checked(false)]);
        assert_eq!(queue.select_all_state(), SelectAllState::PartiallyChecked);

        queue.set_select_all(true);
        assert!(queue.items().iter().all(|i| i.checked));
        assert_eq!(queue.select_all_state(), SelectAllState::Checked);

        queue.set_checked(0, false);
        assert_eq!(queue.select_all_state(), SelectAllState::PartiallyChecked);

        queue.set_select_all(false);
        assert_eq!(queue.select_all_state(), SelectAllState::Unchecked);

        assert_eq!(Queue::default().select_all_state(), SelectAllState::Unchecked);
    }

    #[test]
    fn test_highlights_follow_run() {
        let mut queue = abc();
        let snapshot = queue.begin_run();
        assert_eq!(snapshot.len(), 3);
        assert!(!queue.push(QueueItem::new("D")));

        let done = |index| SchedulerEvent::ItemFinished {
            index,
            outcome: TaskOutcome::Completed,
        };
        queue.apply(&SchedulerEvent::Progress(0));
        assert_eq!(queue.highlight(0), Highlight::Executing);
        queue.apply(&done(0));
        queue.apply(&SchedulerEvent::Skipped(1));
        queue.apply(&SchedulerEvent::Progress(2));
        queue.apply(&done(2));
        queue.apply(&SchedulerEvent::QueueFinished { stopped: false });

        assert_eq!(
            queue.highlights(),
            &[Highlight::Completed, Highlight::Skipped, Highlight::Completed]
        );
        assert!(!queue.is_running());

        // The next edit clears the previous run's colours.
        assert!(queue.move_item(2, 0));
        assert!(queue.highlights().iter().all(|h| *h == Highlight::None));
        assert_eq!(queue.items()[0].mode_name, "C");
    }

    #[test]
    fn test_slot_switching() {
        let mut slots = QueueSlots::from_slots(vec![vec![QueueItem::new("A")]]);
        assert_eq!(slots.to_slots().len(), SLOT_COUNT);

        slots.queue.push(QueueItem::new("B"));
        assert!(slots.switch_to(2));
        assert!(slots.queue.is_empty());
        slots.queue.push(QueueItem::new("DailyTrivia"));

        assert!(slots.switch_to(0));
        let names: Vec<&str> = slots.queue.items().iter().map(|i| i.mode_name.as_str()).collect();
        assert_eq!(names, vec!["A", "B"]);

        let all = slots.to_slots();
        assert_eq!(all[2], vec![QueueItem::new("DailyTrivia")]);
        assert!(!slots.switch_to(SLOT_COUNT));
    }

    #[test]
    fn test_slot_switch_refused_while_running() {
        let mut slots = QueueSlots::default();
        slots.queue.begin_run();
        assert!(!slots.switch_to(1));
        assert_eq!(slots.current(), 0);
    }
}
