use serde::{Deserialize, Serialize};

use crate::audio::Band;

use super::judgment::Judgment;

pub type NoteId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum NoteKind {
    Tap,
    Hold { duration_ms: f64 },
}

impl NoteKind {
    pub fn is_hold(&self) -> bool {
        matches!(self, NoteKind::Hold { .. })
    }
}

/// Lifecycle of a live note.
///
/// `HeadHit` is a hold whose head was judged but whose key was released
/// before the tail; it either gets re-pressed inside the grace period or is
/// failed by the aging step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoteState {
    Pending,
    HeadHit,
    Holding,
    Resolved,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub id: NoteId,
    pub lane: usize,
    pub kind: NoteKind,
    /// Band that produced the note; `None` for pattern notes.
    pub band: Option<Band>,
    pub created_at_ms: f64,
    pub travel_ms: f64,
    pub expected_hit_ms: f64,
    pub expected_end_ms: Option<f64>,
    pub state: NoteState,
    /// Tier awarded at the head of a hold, kept until the hold resolves.
    pub head_judgment: Option<Judgment>,
    pub judgment: Option<Judgment>,
}

impl Note {
    pub fn new(id: NoteId, lane: usize, kind: NoteKind, band: Option<Band>, created_at_ms: f64, travel_ms: f64) -> Self {
        let expected_hit_ms = created_at_ms + travel_ms;
        let expected_end_ms = match kind {
            NoteKind::Tap => None,
            NoteKind::Hold { duration_ms } => Some(expected_hit_ms + duration_ms),
        };
        Self {
            id,
            lane,
            kind,
            band,
            created_at_ms,
            travel_ms,
            expected_hit_ms,
            expected_end_ms,
            state: NoteState::Pending,
            head_judgment: None,
            judgment: None,
        }
    }

    pub fn is_hold(&self) -> bool {
        self.kind.is_hold()
    }

    /// Fraction of the way from spawn to the judgment line. Presentation only.
    pub fn progress(&self, now_ms: f64) -> f64 {
        if self.travel_ms <= 0.0 {
            return 1.0;
        }
        (now_ms - self.created_at_ms) / self.travel_ms
    }

    /// Marks the note terminal. Returns `false` if it was already resolved.
    pub(crate) fn resolve(&mut self, judgment: Judgment) -> bool {
        if self.state == NoteState::Resolved {
            return false;
        }
        self.state = NoteState::Resolved;
        self.judgment = Some(judgment);
        true
    }
}

/// The single owner of every unresolved note, in spawn order.
#[derive(Debug, Default)]
pub struct LiveNotes {
    notes: Vec<Note>,
}

impl LiveNotes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, note: Note) {
        debug_assert!(note.state != NoteState::Resolved);
        self.notes.push(note);
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Note> {
        self.notes.iter()
    }

    pub fn get(&self, id: NoteId) -> Option<&Note> {
        self.notes.iter().find(|note| note.id == id)
    }

    pub fn get_mut(&mut self, id: NoteId) -> Option<&mut Note> {
        self.notes.iter_mut().find(|note| note.id == id)
    }

    pub fn ids(&self) -> Vec<NoteId> {
        self.notes.iter().map(|note| note.id).collect()
    }

    /// Removes and returns a note; every resolution goes through here.
    pub fn take(&mut self, id: NoteId) -> Option<Note> {
        let index = self.notes.iter().position(|note| note.id == id)?;
        Some(self.notes.remove(index))
    }

    /// Drops every live note without judging it. Returns how many were dropped.
    pub fn discard_all(&mut self) -> usize {
        let count = self.notes.len();
        self.notes.clear();
        count
    }

    /// Nearest pending note in `lane` within `window_ms` of `now_ms`.
    /// Equal distances go to the earliest spawned note, then the lowest id.
    pub fn nearest_pending(&self, lane: usize, now_ms: f64, window_ms: f64) -> Option<NoteId> {
        self.notes
            .iter()
            .filter(|note| note.lane == lane && note.state == NoteState::Pending)
            .map(|note| ((now_ms - note.expected_hit_ms).abs(), note))
            .filter(|(distance, _)| *distance <= window_ms)
            .min_by(|(da, a), (db, b)| {
                da.total_cmp(db)
                    .then(a.created_at_ms.total_cmp(&b.created_at_ms))
                    .then(a.id.cmp(&b.id))
            })
            .map(|(_, note)| note.id)
    }

    /// A released hold in `lane` still waiting for its grace period to run out.
    pub fn released_hold(&self, lane: usize) -> Option<NoteId> {
        self.notes
            .iter()
            .find(|note| note.lane == lane && note.state == NoteState::HeadHit)
            .map(|note| note.id)
    }
}
