use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Judgment {
    Perfect,
    Great,
    Good,
    Miss,
}

impl Judgment {
    pub fn is_miss(self) -> bool {
        self == Judgment::Miss
    }

    pub fn name(self) -> &'static str {
        match self {
            Judgment::Perfect => "PERFECT",
            Judgment::Great => "GREAT",
            Judgment::Good => "GOOD",
            Judgment::Miss => "MISS",
        }
    }
}

/// Nested timing windows in ms: perfect <= great <= good.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct JudgmentWindows {
    pub perfect_ms: f64,
    pub great_ms: f64,
    pub good_ms: f64,
}

impl Default for JudgmentWindows {
    fn default() -> Self {
        Self {
            perfect_ms: 60.0,
            great_ms: 120.0,
            good_ms: 180.0,
        }
    }
}

impl JudgmentWindows {
    pub fn is_nested(&self) -> bool {
        0.0 <= self.perfect_ms && self.perfect_ms <= self.great_ms && self.great_ms <= self.good_ms
    }

    /// Tier for an absolute timing error, or `None` outside the good window.
    pub fn classify(&self, distance_ms: f64) -> Option<Judgment> {
        let distance = distance_ms.abs();
        if distance <= self.perfect_ms {
            Some(Judgment::Perfect)
        } else if distance <= self.great_ms {
            Some(Judgment::Great)
        } else if distance <= self.good_ms {
            Some(Judgment::Good)
        } else {
            None
        }
    }
}

/// Points awarded per tier at the head of a note.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreTable {
    pub perfect: u64,
    pub great: u64,
    pub good: u64,
    /// Awarded when a hold completes.
    pub hold_bonus: u64,
    /// `floor(combo / combo_step) * combo_bonus` is added on every hit.
    pub combo_step: u32,
    pub combo_bonus: u64,
}

impl Default for ScoreTable {
    fn default() -> Self {
        Self {
            perfect: 1000,
            great: 500,
            good: 100,
            hold_bonus: 500,
            combo_step: 10,
            combo_bonus: 100,
        }
    }
}

impl ScoreTable {
    pub fn points(&self, judgment: Judgment) -> u64 {
        match judgment {
            Judgment::Perfect => self.perfect,
            Judgment::Great => self.great,
            Judgment::Good => self.good,
            Judgment::Miss => 0,
        }
    }

    pub fn combo_bonus(&self, combo: u32) -> u64 {
        if self.combo_step == 0 {
            return 0;
        }
        (combo / self.combo_step) as u64 * self.combo_bonus
    }
}

/// Per-tier weights used for the accuracy percentage.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AccuracyWeights {
    pub perfect: f64,
    pub great: f64,
    pub good: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JudgmentTally {
    pub perfect: u32,
    pub great: u32,
    pub good: u32,
    pub miss: u32,
}

impl JudgmentTally {
    pub fn record(&mut self, judgment: Judgment) {
        match judgment {
            Judgment::Perfect => self.perfect += 1,
            Judgment::Great => self.great += 1,
            Judgment::Good => self.good += 1,
            Judgment::Miss => self.miss += 1,
        }
    }

    pub fn total(&self) -> u32 {
        self.perfect + self.great + self.good + self.miss
    }

    pub fn weighted_sum(&self, weights: &AccuracyWeights) -> f64 {
        self.perfect as f64 * weights.perfect + self.great as f64 * weights.great + self.good as f64 * weights.good
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
