use serde::{Deserialize, Serialize};

use crate::audio::onset::OnsetSettings;
use crate::audio::Band;
use crate::game::judgment::{AccuracyWeights, JudgmentWindows, ScoreTable};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    #[default]
    Normal,
    Hard,
}

impl Difficulty {
    pub const ALL: [Difficulty; 3] = [Difficulty::Easy, Difficulty::Normal, Difficulty::Hard];

    pub fn profile(self) -> DifficultyProfile {
        DifficultyProfile::for_difficulty(self)
    }

    pub fn name(self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Normal => "normal",
            Difficulty::Hard => "hard",
        }
    }
}

impl std::str::FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "easy" => Ok(Difficulty::Easy),
            "normal" => Ok(Difficulty::Normal),
            "hard" => Ok(Difficulty::Hard),
            other => Err(format!("unknown difficulty '{other}'")),
        }
    }
}

/// Inclusive hold-note duration range in ms.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HoldRange {
    pub min_ms: f64,
    pub max_ms: f64,
}

/// Everything a difficulty changes. Read-only once a session is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DifficultyProfile {
    pub difficulty: Difficulty,
    pub trigger: [f32; Band::COUNT],
    pub min_interval_ms: [f64; Band::COUNT],
    pub hold_chance: f64,
    /// Per-band scale on `hold_chance`.
    pub band_hold_weight: [f64; Band::COUNT],
    pub hold_range: HoldRange,
    pub history_size: usize,
    pub pattern_interval_ms: f64,
    pub windows: JudgmentWindows,
    pub scores: ScoreTable,
    pub accuracy: AccuracyWeights,
    /// Releasing this close to the tail still completes a hold.
    pub release_tolerance_ms: f64,
    /// How long past the head a released hold survives before failing.
    pub hold_grace_ms: f64,
}

impl DifficultyProfile {
    pub fn for_difficulty(difficulty: Difficulty) -> Self {
        let (trigger, interval, hold_chance, hold_range, history_size, accuracy) = match difficulty {
            Difficulty::Easy => (
                1.6,
                300.0,
                0.2,
                HoldRange { min_ms: 300.0, max_ms: 600.0 },
                40,
                AccuracyWeights { perfect: 100.0, great: 80.0, good: 50.0 },
            ),
            Difficulty::Normal => (
                1.4,
                200.0,
                0.3,
                HoldRange { min_ms: 300.0, max_ms: 800.0 },
                30,
                AccuracyWeights { perfect: 100.0, great: 70.0, good: 40.0 },
            ),
            Difficulty::Hard => (
                1.2,
                100.0,
                0.4,
                HoldRange { min_ms: 200.0, max_ms: 800.0 },
                20,
                AccuracyWeights { perfect: 100.0, great: 70.0, good: 40.0 },
            ),
        };

        Self {
            difficulty,
            trigger: [trigger; Band::COUNT],
            min_interval_ms: [interval; Band::COUNT],
            hold_chance,
            band_hold_weight: [1.0, 1.0, 1.0, 0.7],
            hold_range,
            history_size,
            pattern_interval_ms: 800.0,
            windows: JudgmentWindows::default(),
            scores: ScoreTable::default(),
            accuracy,
            release_tolerance_ms: 100.0,
            hold_grace_ms: 200.0,
        }
    }

    pub fn onset_settings(&self, min_energy: f32) -> OnsetSettings {
        OnsetSettings {
            trigger: self.trigger,
            min_interval_ms: self.min_interval_ms,
            history_size: self.history_size,
            trim_outliers: true,
            min_energy,
            pattern_min_bands: 3,
            pattern_interval_ms: self.pattern_interval_ms,
        }
    }

    pub fn hold_chance_for(&self, band: Band) -> f64 {
        (self.hold_chance * self.band_hold_weight[band.index()]).clamp(0.0, 1.0)
    }
}

impl Default for DifficultyProfile {
    fn default() -> Self {
        Self::for_difficulty(Difficulty::Normal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn harder_profiles_trigger_more_easily() {
        let easy = Difficulty::Easy.profile();
        let normal = Difficulty::Normal.profile();
        let hard = Difficulty::Hard.profile();
        assert!(easy.trigger[0] > normal.trigger[0]);
        assert!(normal.trigger[0] > hard.trigger[0]);
        assert!(easy.min_interval_ms[0] > hard.min_interval_ms[0]);
        assert!(easy.hold_chance < hard.hold_chance);
    }

    #[test]
    fn high_band_holds_are_rarer() {
        let profile = Difficulty::Normal.profile();
        assert!(profile.hold_chance_for(Band::High) < profile.hold_chance_for(Band::Bass));
    }

    #[test]
    fn parses_names() {
        assert_eq!("HARD".parse::<Difficulty>(), Ok(Difficulty::Hard));
        assert!("expert".parse::<Difficulty>().is_err());
    }
}
