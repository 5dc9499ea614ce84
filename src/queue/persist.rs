//! Reading and writing `settings/gui/queue.json`.

use std::path::Path;

use super::{QueueItem, QueueSlots};
use crate::error::BotResult;
use crate::settings::{load_json_or_default, save_json};

/// Loads all slots; missing or malformed files give four empty slots.
pub fn load_slots(path: &Path) -> QueueSlots {
    let slots: Vec<Vec<QueueItem>> = load_json_or_default(path);
    QueueSlots::from_slots(slots)
}

pub fn save_slots(path: &Path, slots: &QueueSlots) -> BotResult<()> {
    save_json(path, &slots.to_slots())?;
    log::debug!("Saved queue slots to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::SLOT_COUNT;
    use serde_json::json;
    use std::fs;

    #[test]
    fn test_slot_two_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("queue.json");

        let mut slots = QueueSlots::default();
        assert!(slots.switch_to(2));
        slots.queue.push(QueueItem::new("DailyTrivia"));
        save_slots(&path, &slots).unwrap();

        let mut reopened = load_slots(&path);
        assert!(reopened.switch_to(2));
        assert_eq!(reopened.queue.items().len(), 1);
        let value = serde_json::to_value(&reopened.queue.items()[0]).unwrap();
        assert_eq!(value, json!({"mode_name": "DailyTrivia", "checked": true}));
    }

    #[test]
    fn test_round_trip_preserves_everything() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("queue.json");

        let slots = QueueSlots::from_slots(vec![
            vec![
                QueueItem::new("WaitForEnergy")
                    .with_parameter("min_energy", json!(90))
                    .with_parameter("timeout_secs", json!(600)),
                QueueItem::new("UnknownMode").with_checked(false),
            ],
            vec![],
            vec![QueueItem::new("RestartGame").with_parameter("note", json!({"nested": [1, 2]}))],
            vec![QueueItem::new("AcquireHeroicQuestRewards")],
        ]);
        save_slots(&path, &slots).unwrap();

        assert_eq!(load_slots(&path).to_slots(), slots.to_slots());
    }

    #[test]
    fn test_bad_files_give_empty_slots() {
        let dir = tempfile::tempdir().unwrap();
        let missing = load_slots(&dir.path().join("queue.json"));
        assert_eq!(missing.to_slots(), vec![Vec::<QueueItem>::new(); SLOT_COUNT]);

        let path = dir.path().join("broken.json");
        fs::write(&path, "[[{\"checked\": true}]]").unwrap();
        assert!(load_slots(&path).to_slots().iter().all(|s| s.is_empty()));

        let short = dir.path().join("short.json");
        fs::write(&short, r#"[[{"mode_name": "A", "checked": false}]]"#).unwrap();
        let slots = load_slots(&short).to_slots();
        assert_eq!(slots.len(), SLOT_COUNT);
        assert_eq!(slots[0][0], QueueItem::new("A").with_checked(false));
    }
}
