use log::{debug, info, trace};

use crate::audio::{Detection, EnergyExtractor, OnsetDetector, SpectrumFrame};
use crate::config::GameConfig;

use super::difficulty::DifficultyProfile;
use super::events::{EventSink, GameEvent};
use super::judgment::{Judgment, JudgmentTally};
use super::note::{LiveNotes, Note, NoteId};
use super::scheduler::NoteScheduler;
use super::score::{ScoreSnapshot, ScoreState};
use super::sync::SyncOffset;

/// A note leaving the live set with its final tier.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Resolution {
    pub id: NoteId,
    pub lane: usize,
    pub judgment: Judgment,
    pub hold_completed: bool,
}

/// Everything one tick did.
#[derive(Debug, Default)]
pub struct TickReport {
    pub detection: Detection,
    pub spawned: Vec<NoteId>,
    pub resolved: Vec<Resolution>,
}

/// All mutable gameplay state for one play session: detector, scheduler,
/// live notes, holds, tally, score and sync offset. Timing methods take the
/// raw playback time; the sync offset is applied inside.
pub struct Session {
    pub(super) profile: DifficultyProfile,
    pub(super) lane_count: usize,
    pub(super) auto_calibrate: bool,
    pub(super) extractor: EnergyExtractor,
    pub(super) detector: OnsetDetector,
    pub(super) scheduler: NoteScheduler,
    pub(super) notes: LiveNotes,
    pub(super) active_holds: Vec<Option<NoteId>>,
    pub(super) tally: JudgmentTally,
    pub(super) score: ScoreState,
    pub(super) sync: SyncOffset,
    pub(super) total_notes: u32,
    pub(super) discarded_notes: u32,
    pub(super) events: EventSink,
}

impl Session {
    pub fn new(config: &GameConfig, events: EventSink) -> Self {
        Self::with_profile(config, config.difficulty.profile(), events)
    }

    /// Like [`Session::new`] but with a hand-tuned profile instead of the
    /// one named by `config.difficulty`.
    pub fn with_profile(config: &GameConfig, profile: DifficultyProfile, events: EventSink) -> Self {
        let lane_count = config.lanes.lane_count();
        info!(
            "session: {} difficulty, {} lanes, travel {:.0}ms",
            profile.difficulty.name(),
            lane_count,
            config.travel_ms()
        );
        Self {
            extractor: EnergyExtractor::new(config.energy_weighting),
            detector: OnsetDetector::new(profile.onset_settings(config.min_energy)),
            scheduler: NoteScheduler::new(lane_count, &profile, config.travel_ms(), config.seed),
            notes: LiveNotes::new(),
            active_holds: vec![None; lane_count],
            tally: JudgmentTally::default(),
            score: ScoreState::new(),
            sync: SyncOffset::new(config.sync_offset_ms),
            total_notes: 0,
            discarded_notes: 0,
            auto_calibrate: config.auto_calibrate,
            lane_count,
            profile,
            events,
        }
    }

    pub fn profile(&self) -> &DifficultyProfile {
        &self.profile
    }

    pub fn lane_count(&self) -> usize {
        self.lane_count
    }

    pub fn live_notes(&self) -> &LiveNotes {
        &self.notes
    }

    pub fn active_hold(&self, lane: usize) -> Option<&Note> {
        let id = (*self.active_holds.get(lane)?)?;
        self.notes.get(id)
    }

    pub fn tally(&self) -> &JudgmentTally {
        &self.tally
    }

    pub fn score(&self) -> &ScoreState {
        &self.score
    }

    /// Notes spawned and not discarded at end.
    pub fn total_notes(&self) -> u32 {
        self.total_notes
    }

    pub fn discarded_notes(&self) -> u32 {
        self.discarded_notes
    }

    pub fn queued_spawns(&self) -> usize {
        self.scheduler.queued()
    }

    pub fn sync_offset(&self) -> i32 {
        self.sync.ms()
    }

    pub fn set_sync_offset(&mut self, offset_ms: i32) {
        self.sync.set(offset_ms);
        self.events.emit(GameEvent::SyncOffsetChanged(offset_ms));
    }

    /// Manual ±10ms step.
    pub fn step_sync_offset(&mut self, up: bool) -> i32 {
        let offset = if up { self.sync.step_up() } else { self.sync.step_down() };
        self.events.emit(GameEvent::SyncOffsetChanged(offset));
        offset
    }

    pub fn snapshot(&self) -> ScoreSnapshot {
        ScoreSnapshot {
            score: self.score.score,
            combo: self.score.combo,
            max_combo: self.score.max_combo,
            accuracy: self.score.accuracy,
            tally: self.tally,
            total_notes: self.total_notes,
        }
    }

    /// One gameplay tick: spectrum to band energies to onsets, queued spawns
    /// released, then every live note aged.
    pub fn advance(&mut self, raw_now_ms: f64, frame: &SpectrumFrame) -> TickReport {
        let energies = self.extractor.extract(frame);
        let detection = self.detector.observe_all(&energies, raw_now_ms);
        self.apply_detection(&detection);

        let spawned = self.spawn_due(raw_now_ms);
        let resolved = self.age(raw_now_ms);
        if !spawned.is_empty() || !resolved.is_empty() {
            trace!("tick {:.0}ms: {} live notes", raw_now_ms, self.notes.len());
        }

        TickReport {
            detection,
            spawned,
            resolved,
        }
    }

    /// Hands onsets and patterns to the scheduler. Nothing spawns until
    /// [`Session::spawn_due`] runs.
    pub fn apply_detection(&mut self, detection: &Detection) {
        if let Some(pattern) = &detection.pattern {
            self.scheduler.plan_pattern(pattern);
        }
        for onset in &detection.onsets {
            self.scheduler.plan_onset(onset);
        }
    }

    /// Places every queued note due by `raw_now_ms` into the live set.
    pub fn spawn_due(&mut self, raw_now_ms: f64) -> Vec<NoteId> {
        let due = self.scheduler.take_due(raw_now_ms);
        if due.is_empty() {
            return Vec::new();
        }

        let mut spawned = Vec::with_capacity(due.len());
        for planned in due {
            let note = self.scheduler.instantiate(planned, raw_now_ms);
            debug!(
                "spawn note {} lane {} {:?}, hit at {:.0}ms",
                note.id, note.lane, note.kind, note.expected_hit_ms
            );
            self.events.emit(GameEvent::NoteSpawned {
                id: note.id,
                lane: note.lane,
                kind: note.kind,
                travel_ms: note.travel_ms,
            });
            spawned.push(note.id);
            self.notes.push(note);
            self.total_notes += 1;
        }
        self.publish_score();
        spawned
    }

    /// Resolves a tap at its head tier.
    pub(super) fn finish(&mut self, id: NoteId, judgment: Judgment) -> Option<Resolution> {
        let mut note = self.notes.take(id)?;
        if !note.resolve(judgment) {
            return None;
        }
        self.tally.record(judgment);
        self.events.emit(GameEvent::NoteResolved {
            id,
            lane: note.lane,
            judgment,
        });
        self.publish_score();
        Some(Resolution {
            id,
            lane: note.lane,
            judgment,
            hold_completed: false,
        })
    }

    /// Completes a hold: its head tier is tallied and the hold bonus paid.
    pub(super) fn complete_hold(&mut self, id: NoteId) -> Option<Resolution> {
        let mut note = self.notes.take(id)?;
        let judgment = note.head_judgment.unwrap_or(Judgment::Good);
        if !note.resolve(judgment) {
            return None;
        }
        self.release_lane(note.lane, id);

        let bonus = self.profile.scores.hold_bonus;
        self.score.add_bonus(bonus);
        self.tally.record(judgment);
        debug!("hold {} in lane {} complete (+{})", id, note.lane, bonus);
        self.events.emit(GameEvent::HoldCompleted {
            id,
            lane: note.lane,
            bonus,
        });
        self.events.emit(GameEvent::NoteResolved {
            id,
            lane: note.lane,
            judgment,
        });
        self.publish_score();
        Some(Resolution {
            id,
            lane: note.lane,
            judgment,
            hold_completed: true,
        })
    }

    /// Missed head or failed hold: tallied as a miss and the combo breaks.
    pub(super) fn resolve_miss(&mut self, id: NoteId) -> Option<Resolution> {
        let mut note = self.notes.take(id)?;
        if !note.resolve(Judgment::Miss) {
            return None;
        }
        self.release_lane(note.lane, id);

        self.tally.record(Judgment::Miss);
        self.score.break_combo();
        debug!("miss note {} in lane {}", id, note.lane);
        self.events.emit(GameEvent::NoteResolved {
            id,
            lane: note.lane,
            judgment: Judgment::Miss,
        });
        self.publish_score();
        Some(Resolution {
            id,
            lane: note.lane,
            judgment: Judgment::Miss,
            hold_completed: false,
        })
    }

    fn release_lane(&mut self, lane: usize, id: NoteId) {
        if let Some(slot) = self.active_holds.get_mut(lane) {
            if *slot == Some(id) {
                *slot = None;
                self.events.emit(GameEvent::HoldStateChanged { lane, active: false });
            }
        }
    }

    pub(super) fn publish_score(&mut self) {
        self.score
            .recompute_accuracy(&self.tally, self.total_notes, &self.profile.accuracy);
        self.events.emit(GameEvent::ScoreChanged(self.snapshot()));
    }

    /// Stops gameplay: queued spawns are cancelled and live notes dropped
    /// without a judgment, so they leave `total_notes` as well.
    pub fn end(&mut self) -> ScoreSnapshot {
        let cancelled = self.scheduler.flush();
        for lane in 0..self.lane_count {
            if self.active_holds[lane].take().is_some() {
                self.events.emit(GameEvent::HoldStateChanged { lane, active: false });
            }
        }
        let discarded = self.notes.discard_all() as u32;
        self.total_notes -= discarded;
        self.discarded_notes += discarded;
        self.publish_score();

        let snapshot = self.snapshot();
        info!(
            "session ended: score {} max combo {} accuracy {:.1}% ({} discarded, {} spawns cancelled)",
            snapshot.score, snapshot.max_combo, snapshot.accuracy, discarded, cancelled
        );
        debug_assert_eq!(self.tally.total(), self.total_notes);
        snapshot
    }

    /// Back to a fresh session with the same profile and seed. The sync
    /// offset is kept.
    pub fn reset(&mut self) {
        self.detector.reset();
        self.scheduler.reset();
        self.notes.discard_all();
        self.active_holds.iter_mut().for_each(|slot| *slot = None);
        self.tally.reset();
        self.score.reset();
        self.total_notes = 0;
        self.discarded_notes = 0;
        self.events.emit(GameEvent::ScoreChanged(self.snapshot()));
    }
}
