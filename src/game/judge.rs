use log::debug;

use crate::error::{GameError, Result};

use super::events::GameEvent;
use super::judgment::Judgment;
use super::note::{NoteId, NoteState};
use super::state::{Resolution, Session};

/// What a key-up did to the lane's active hold.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HoldRelease {
    /// Released inside the tail tolerance; the hold is complete.
    Completed(Resolution),
    /// Released early; the aging step fails it once the grace period ends.
    Early(NoteId),
}

impl Session {
    fn check_lane(&self, lane: usize) -> Result<()> {
        if lane >= self.lane_count {
            return Err(GameError::LaneOutOfRange {
                lane,
                lane_count: self.lane_count,
            });
        }
        Ok(())
    }

    /// Picks a released hold back up when the lane is pressed again inside
    /// its grace period. Only reached when no pending note is in range.
    fn regrab_hold(&mut self, lane: usize, now: f64) {
        let Some(id) = self.notes.released_hold(lane) else {
            return;
        };
        let grace_ms = self.profile.hold_grace_ms;
        let Some(note) = self.notes.get_mut(id) else {
            return;
        };
        if now > note.expected_hit_ms + grace_ms {
            return;
        }
        note.state = NoteState::Holding;
        self.active_holds[lane] = Some(id);
        self.events.emit(GameEvent::HoldStateChanged { lane, active: true });
        debug!("hold {} re-grabbed in lane {}", id, lane);
    }

    /// Judges the nearest pending note in `lane`. A press with no note inside
    /// the good window is ignored, as is a press on a lane already holding.
    pub fn on_key_down(&mut self, lane: usize, raw_now_ms: f64) -> Result<Option<Judgment>> {
        self.check_lane(lane)?;
        if self.active_holds[lane].is_some() {
            return Ok(None);
        }
        let now = self.sync.apply(raw_now_ms);

        let windows = self.profile.windows;
        let Some(id) = self.notes.nearest_pending(lane, now, windows.good_ms) else {
            self.regrab_hold(lane, now);
            return Ok(None);
        };
        let Some(note) = self.notes.get(id) else {
            return Ok(None);
        };
        let expected_hit = note.expected_hit_ms;
        let is_hold = note.is_hold();
        let Some(judgment) = windows.classify(now - expected_hit) else {
            return Ok(None);
        };

        let scores = self.profile.scores;
        let combo = self.score.add_hit(scores.points(judgment));
        self.score.add_bonus(scores.combo_bonus(combo));
        debug!(
            "{} in lane {} ({:+.0}ms), combo {}",
            judgment.name(),
            lane,
            now - expected_hit,
            combo
        );

        if judgment == Judgment::Perfect && self.auto_calibrate {
            let before = self.sync.ms();
            self.sync.calibrate(expected_hit - raw_now_ms);
            if self.sync.ms() != before {
                self.events.emit(GameEvent::SyncOffsetChanged(self.sync.ms()));
            }
        }

        if is_hold {
            if let Some(note) = self.notes.get_mut(id) {
                note.state = NoteState::Holding;
                note.head_judgment = Some(judgment);
            }
            self.active_holds[lane] = Some(id);
            self.events.emit(GameEvent::HeadHit { id, lane, judgment });
            self.events.emit(GameEvent::HoldStateChanged { lane, active: true });
            self.publish_score();
        } else {
            self.finish(id, judgment);
        }

        Ok(Some(judgment))
    }

    /// Ends the hold in `lane`, if any. Without an active hold this changes
    /// nothing.
    pub fn on_key_up(&mut self, lane: usize, raw_now_ms: f64) -> Result<Option<HoldRelease>> {
        self.check_lane(lane)?;
        let Some(id) = self.active_holds[lane].take() else {
            return Ok(None);
        };
        self.events.emit(GameEvent::HoldStateChanged { lane, active: false });

        let now = self.sync.apply(raw_now_ms);
        let Some(note) = self.notes.get_mut(id) else {
            return Ok(None);
        };
        let end = note.expected_end_ms.unwrap_or(note.expected_hit_ms);
        if end - now <= self.profile.release_tolerance_ms {
            return Ok(self.complete_hold(id).map(HoldRelease::Completed));
        }

        note.state = NoteState::HeadHit;
        debug!("hold {} in lane {} released {:.0}ms early", id, lane, end - now);
        Ok(Some(HoldRelease::Early(id)))
    }
}
