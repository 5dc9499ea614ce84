use std::thread;
use std::time::{Duration, Instant};

use anyhow::{bail, Result};
use serde::Deserialize;

use super::Mode;
use crate::game::Game;

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct WaitForEnergyParams {
    #[serde(default = "default_min_energy")]
    pub min_energy: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_min_energy() -> u32 {
    60
}

fn default_timeout_secs() -> u64 {
    3600
}

fn default_poll_interval_ms() -> u64 {
    30_000
}

/// Polls the energy counter until it reaches a minimum.
pub struct WaitForEnergy {
    params: WaitForEnergyParams,
}

impl WaitForEnergy {
    pub fn new(params: WaitForEnergyParams) -> Self {
        Self { params }
    }
}

impl Mode for WaitForEnergy {
    fn run(&mut self, game: &mut Game) -> Result<()> {
        let timeout = Duration::from_secs(self.params.timeout_secs);
        let interval = Duration::from_millis(self.params.poll_interval_ms);
        let start = Instant::now();

        loop {
            match game.current_energy()? {
                Some((current, max)) if current >= self.params.min_energy => {
                    log::info!("Energy {}/{} reached {}", current, max, self.params.min_energy);
                    return Ok(());
                }
                Some((current, max)) => log::info!(
                    "Energy {}/{}, waiting for {}",
                    current,
                    max,
                    self.params.min_energy
                ),
                None => log::warn!("Could not read the energy counter"),
            }
            if start.elapsed() >= timeout {
                bail!(
                    "Energy stayed below {} for {:?}",
                    self.params.min_energy,
                    timeout
                );
            }
            thread::sleep(interval);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::testing::{fake_backend, fake_game};
    use crate::modes::{parse_params, Parameters};
    use image::RgbImage;
    use serde_json::json;

    fn params(value: serde_json::Value) -> Parameters {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_params_defaults() {
        let p: WaitForEnergyParams = parse_params(&Parameters::new()).unwrap();
        assert_eq!(p.min_energy, 60);
        assert_eq!(p.timeout_secs, 3600);

        let p: WaitForEnergyParams = parse_params(&params(json!({"min_energy": 100}))).unwrap();
        assert_eq!(p.min_energy, 100);
    }

    #[test]
    fn test_waits_until_threshold() {
        let mut game = fake_game(fake_backend(RgbImage::new(400, 300)), &["10/120", "", "75/120"]);
        let p = parse_params(&params(json!({"min_energy": 70, "poll_interval_ms": 1}))).unwrap();
        WaitForEnergy::new(p).run(&mut game).unwrap();
    }

    #[test]
    fn test_gives_up_after_timeout() {
        let mut game = fake_game(fake_backend(RgbImage::new(400, 300)), &["10/120"]);
        let p = parse_params(&params(json!({"min_energy": 70, "timeout_secs": 0, "poll_interval_ms": 1})))
            .unwrap();
        let err = WaitForEnergy::new(p).run(&mut game).unwrap_err();
        assert!(err.to_string().contains("below 70"));
    }
}
