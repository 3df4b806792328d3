use std::path::Path;

use log::info;
use serde::{Deserialize, Serialize};

use crate::audio::EnergyWeighting;
use crate::error::{GameError, Result};
use crate::game::{Difficulty, LaneLayout};

/// Player-facing settings, persisted as JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub difficulty: Difficulty,
    /// Multiplier on note fall speed; travel time is `base_travel_secs / note_speed`.
    pub note_speed: f32,
    pub base_travel_secs: f32,
    pub sync_offset_ms: i32,
    /// Nudge the sync offset toward the player's timing on perfect hits.
    pub auto_calibrate: bool,
    pub lanes: LaneLayout,
    pub tick_interval_ms: u64,
    pub energy_weighting: EnergyWeighting,
    pub min_energy: f32,
    pub seed: Option<u64>,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            difficulty: Difficulty::Normal,
            note_speed: 1.0,
            base_travel_secs: 2.0,
            sync_offset_ms: 0,
            auto_calibrate: false,
            lanes: LaneLayout::Four,
            tick_interval_ms: 16,
            energy_weighting: EnergyWeighting::Magnitude,
            min_energy: 1.0,
            seed: None,
        }
    }
}

impl GameConfig {
    pub fn travel_ms(&self) -> f64 {
        (self.base_travel_secs / self.note_speed) as f64 * 1000.0
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.note_speed > 0.0 && self.note_speed.is_finite()) {
            return Err(GameError::InvalidConfig(format!(
                "note_speed must be positive, got {}",
                self.note_speed
            )));
        }
        if !(self.base_travel_secs > 0.0 && self.base_travel_secs.is_finite()) {
            return Err(GameError::InvalidConfig(format!(
                "base_travel_secs must be positive, got {}",
                self.base_travel_secs
            )));
        }
        if self.tick_interval_ms == 0 {
            return Err(GameError::InvalidConfig("tick_interval_ms must be non-zero".into()));
        }
        if self.min_energy < 0.0 {
            return Err(GameError::InvalidConfig(format!(
                "min_energy must not be negative, got {}",
                self.min_energy
            )));
        }
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = std::fs::read_to_string(path.as_ref())?;
        let config: GameConfig = serde_json::from_str(&json)?;
        config.validate()?;
        info!("loaded config from {}", path.as_ref().display());
        Ok(config)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}
