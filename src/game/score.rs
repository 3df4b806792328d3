use serde::{Deserialize, Serialize};

use super::judgment::{AccuracyWeights, Judgment, JudgmentTally};

/// Score, combo and accuracy. Accuracy is a percentage of the best possible
/// weighted result over every note spawned so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreState {
    pub score: u64,
    pub combo: u32,
    pub max_combo: u32,
    pub accuracy: f64,
}

impl ScoreState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts a successful head hit and returns the new combo.
    pub fn add_hit(&mut self, points: u64) -> u32 {
        self.score += points;
        self.combo += 1;
        self.max_combo = self.max_combo.max(self.combo);
        self.combo
    }

    pub fn add_bonus(&mut self, points: u64) {
        self.score += points;
    }

    pub fn break_combo(&mut self) {
        self.combo = 0;
    }

    pub fn recompute_accuracy(&mut self, tally: &JudgmentTally, total_notes: u32, weights: &AccuracyWeights) {
        if total_notes == 0 {
            self.accuracy = 0.0;
            return;
        }
        let best = total_notes as f64 * weights.perfect;
        self.accuracy = (tally.weighted_sum(weights) / best * 100.0).clamp(0.0, 100.0);
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Immutable view published to the UI after every change.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreSnapshot {
    pub score: u64,
    pub combo: u32,
    pub max_combo: u32,
    pub accuracy: f64,
    pub tally: JudgmentTally,
    pub total_notes: u32,
}

impl ScoreSnapshot {
    pub fn accuracy_percent(&self) -> u32 {
        self.accuracy.round() as u32
    }

    pub fn count(&self, judgment: Judgment) -> u32 {
        match judgment {
            Judgment::Perfect => self.tally.perfect,
            Judgment::Great => self.tally.great,
            Judgment::Good => self.tally.good,
            Judgment::Miss => self.tally.miss,
        }
    }
}
