//! Game modes runnable by workers, looked up by id.
//!
//! A queue item or single task only carries a mode id and a JSON parameter
//! map; the worker builds the mode from the [`MODES`] registry and runs it
//! against a freshly constructed [`Game`].

mod energy;
mod heroic_quest;
mod restart;

use anyhow::{anyhow, Result};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::game::Game;

pub use energy::{WaitForEnergy, WaitForEnergyParams};
pub use heroic_quest::AcquireHeroicQuestRewards;
pub use restart::RestartGame;

/// Parameters of a queue item or task, `option -> value`.
pub type Parameters = Map<String, Value>;

/// A scripted game activity.
pub trait Mode {
    fn run(&mut self, game: &mut Game) -> Result<()>;
}

/// Registry entry: how to build a mode from its parameters.
pub struct ModeEntry {
    pub id: &'static str,
    pub title: &'static str,
    pub build: fn(&Parameters) -> Result<Box<dyn Mode>>,
}

pub static MODES: &[ModeEntry] = &[
    ModeEntry {
        id: "RestartGame",
        title: "Restart game",
        build: build_restart,
    },
    ModeEntry {
        id: "AcquireHeroicQuestRewards",
        title: "Acquire heroic quest rewards",
        build: build_heroic_quest,
    },
    ModeEntry {
        id: "WaitForEnergy",
        title: "Wait for energy",
        build: build_wait_for_energy,
    },
];

fn build_restart(_: &Parameters) -> Result<Box<dyn Mode>> {
    Ok(Box::new(RestartGame))
}

fn build_heroic_quest(_: &Parameters) -> Result<Box<dyn Mode>> {
    Ok(Box::new(AcquireHeroicQuestRewards::default()))
}

fn build_wait_for_energy(params: &Parameters) -> Result<Box<dyn Mode>> {
    Ok(Box::new(WaitForEnergy::new(parse_params(params)?)))
}

pub fn find(id: &str) -> Option<&'static ModeEntry> {
    MODES.iter().find(|m| m.id == id)
}

/// Builds a mode by id.
pub fn build(id: &str, params: &Parameters) -> Result<Box<dyn Mode>> {
    let entry = find(id).ok_or_else(|| anyhow!("Unknown mode '{}'", id))?;
    (entry.build)(params)
}

/// Deserializes a parameter map into a mode's typed parameters.
pub fn parse_params<T: DeserializeOwned>(params: &Parameters) -> Result<T> {
    Ok(serde_json::from_value(Value::Object(params.clone()))?)
}
