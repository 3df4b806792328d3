use std::ops::Range;

use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::audio::{Band, OnsetEvent, PatternEvent};

use super::difficulty::{DifficultyProfile, HoldRange};
use super::note::{Note, NoteId, NoteKind};

/// Fixed burst shapes a pattern event can expand into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternShape {
    /// Every lane left to right, 150ms apart.
    Staircase,
    /// Both outermost lanes at once.
    Pair,
    /// 500ms holds in the centre lanes, the second 250ms later.
    CrossedHolds,
    /// 800ms holds in the outer lanes, then centre taps 400ms later.
    HoldPair,
}

impl PatternShape {
    pub const ALL: [PatternShape; 4] = [
        PatternShape::Staircase,
        PatternShape::Pair,
        PatternShape::CrossedHolds,
        PatternShape::HoldPair,
    ];

    /// `(delay_ms, lane, kind)` for every note the shape produces.
    pub fn layout(self, lane_count: usize) -> Vec<(f64, usize, NoteKind)> {
        let last = lane_count.saturating_sub(1);
        let centre_left = (lane_count / 2).saturating_sub(1);
        let centre_right = (lane_count / 2).min(last);
        match self {
            PatternShape::Staircase => (0..lane_count)
                .map(|lane| (lane as f64 * 150.0, lane, NoteKind::Tap))
                .collect(),
            PatternShape::Pair => vec![(0.0, 0, NoteKind::Tap), (0.0, last, NoteKind::Tap)],
            PatternShape::CrossedHolds => vec![
                (0.0, centre_left, NoteKind::Hold { duration_ms: 500.0 }),
                (250.0, centre_right, NoteKind::Hold { duration_ms: 500.0 }),
            ],
            PatternShape::HoldPair => vec![
                (0.0, 0, NoteKind::Hold { duration_ms: 800.0 }),
                (0.0, last, NoteKind::Hold { duration_ms: 800.0 }),
                (400.0, centre_left, NoteKind::Tap),
                (400.0, centre_right, NoteKind::Tap),
            ],
        }
    }
}

/// A note decided on but not yet placed in the live set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlannedNote {
    pub lane: usize,
    pub kind: NoteKind,
    pub band: Option<Band>,
    pub due_ms: f64,
}

/// Turns onsets and patterns into notes: picks lanes, rolls tap vs hold and
/// stamps the expected arrival time.
pub struct NoteScheduler {
    lane_count: usize,
    travel_ms: f64,
    hold_chance: [f64; Band::COUNT],
    hold_range: HoldRange,
    seed: Option<u64>,
    rng: StdRng,
    queue: Vec<PlannedNote>,
    next_id: NoteId,
}

impl NoteScheduler {
    pub fn new(lane_count: usize, profile: &DifficultyProfile, travel_ms: f64, seed: Option<u64>) -> Self {
        let lane_count = lane_count.max(1);
        Self {
            lane_count,
            travel_ms,
            hold_chance: Band::ALL.map(|band| profile.hold_chance_for(band)),
            hold_range: profile.hold_range,
            seed,
            rng: Self::make_rng(seed),
            queue: Vec::new(),
            next_id: 1,
        }
    }

    fn make_rng(seed: Option<u64>) -> StdRng {
        match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }

    pub fn lane_count(&self) -> usize {
        self.lane_count
    }

    pub fn travel_ms(&self) -> f64 {
        self.travel_ms
    }

    /// Lanes `[b*L/B, (b+1)*L/B)`, widened to one lane when that is empty.
    pub fn lanes_for(&self, band: Band) -> Range<usize> {
        let b = band.index();
        let start = (b * self.lane_count / Band::COUNT).min(self.lane_count - 1);
        let end = ((b + 1) * self.lane_count / Band::COUNT).max(start + 1);
        start..end
    }

    /// Queues a single note for a band onset, due immediately.
    pub fn plan_onset(&mut self, onset: &OnsetEvent) -> PlannedNote {
        let lanes = self.lanes_for(onset.band);
        let lane = self.rng.gen_range(lanes);
        let kind = if self.rng.gen_bool(self.hold_chance[onset.band.index()]) {
            let duration_ms = if self.hold_range.max_ms > self.hold_range.min_ms {
                self.rng.gen_range(self.hold_range.min_ms..=self.hold_range.max_ms).round()
            } else {
                self.hold_range.min_ms
            };
            NoteKind::Hold { duration_ms }
        } else {
            NoteKind::Tap
        };
        let planned = PlannedNote {
            lane,
            kind,
            band: Some(onset.band),
            due_ms: onset.time_ms,
        };
        self.queue.push(planned);
        planned
    }

    /// Queues a random pattern shape, staggered from the pattern time.
    pub fn plan_pattern(&mut self, pattern: &PatternEvent) -> PatternShape {
        let shape = PatternShape::ALL[self.rng.gen_range(0..PatternShape::ALL.len())];
        debug!("pattern {:?} from {} bands", shape, pattern.bands.len());
        for (delay_ms, lane, kind) in shape.layout(self.lane_count) {
            self.queue.push(PlannedNote {
                lane,
                kind,
                band: None,
                due_ms: pattern.time_ms + delay_ms,
            });
        }
        shape
    }

    /// Removes and returns every queued note due at or before `now_ms`, in
    /// due order.
    pub fn take_due(&mut self, now_ms: f64) -> Vec<PlannedNote> {
        let (mut due, waiting): (Vec<_>, Vec<_>) = self.queue.drain(..).partition(|p| p.due_ms <= now_ms);
        self.queue = waiting;
        due.sort_by(|a, b| a.due_ms.total_cmp(&b.due_ms));
        due
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Cancels every staggered spawn still waiting. Returns how many.
    pub fn flush(&mut self) -> usize {
        let count = self.queue.len();
        self.queue.clear();
        count
    }

    /// Builds the note for a planned spawn at tick time `now_ms`.
    pub fn instantiate(&mut self, planned: PlannedNote, now_ms: f64) -> Note {
        let id = self.next_id;
        self.next_id += 1;
        Note::new(id, planned.lane, planned.kind, planned.band, now_ms, self.travel_ms)
    }

    /// Back to the state right after construction, re-seeding the RNG.
    pub fn reset(&mut self) {
        self.rng = Self::make_rng(self.seed);
        self.queue.clear();
        self.next_id = 1;
    }
}
