use anyhow::Result;

use super::Mode;
use crate::game::{Game, GAME_START_TIMEOUT};

/// Closes and relaunches the game, then waits for the lobby.
pub struct RestartGame;

impl Mode for RestartGame {
    fn run(&mut self, game: &mut Game) -> Result<()> {
        game.restart_game(GAME_START_TIMEOUT)?;
        Ok(())
    }
}
