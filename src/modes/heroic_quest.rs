use std::thread;
use std::time::Duration;

use anyhow::Result;

use super::Mode;
use crate::game::Game;
use crate::ui;

const SCREEN_TIMEOUT: Duration = Duration::from_secs(10);
const REWARD_DIALOG_DELAY: Duration = Duration::from_millis(800);

/// Collects every finished heroic quest from the quest list.
pub struct AcquireHeroicQuestRewards {
    /// Upper bound on rewards taken in one run.
    pub max_rewards: usize,
}

impl Default for AcquireHeroicQuestRewards {
    fn default() -> Self {
        Self { max_rewards: 20 }
    }
}

impl Mode for AcquireHeroicQuestRewards {
    fn run(&mut self, game: &mut Game) -> Result<()> {
        if !game.settings().acquire_heroic_quest_rewards {
            log::info!("Heroic quest rewards are disabled in settings, skipping");
            return Ok(());
        }

        if !game.click_if_visible(&ui::QUEST_NOTIFICATION)? {
            log::info!("No quest notification, nothing to acquire");
            return Ok(());
        }

        game.wait_for(&ui::HEROIC_QUEST_TAB, SCREEN_TIMEOUT)?;
        game.click(&ui::HEROIC_QUEST_TAB)?;

        let mut acquired = 0;
        while acquired < self.max_rewards && game.is_visible(&ui::HEROIC_QUEST_ACQUIRE)? {
            game.click(&ui::HEROIC_QUEST_ACQUIRE)?;
            thread::sleep(REWARD_DIALOG_DELAY);
            if !(game.click_if_visible(&ui::ACQUIRE_REWARD_BUTTON)? || game.click_if_visible(&ui::OK_BUTTON)?) {
                log::warn!("No reward dialog after clicking {}, stopping", ui::HEROIC_QUEST_ACQUIRE.name);
                break;
            }
            acquired += 1;
            log::info!("Acquired heroic quest reward #{}", acquired);
        }

        log::info!("Acquired {} heroic quest reward(s)", acquired);
        Ok(())
    }
}
