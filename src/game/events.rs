use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender};
use log::warn;
use serde::{Deserialize, Serialize};

use crate::session::SessionState;

use super::judgment::Judgment;
use super::note::{NoteId, NoteKind};
use super::score::ScoreSnapshot;

/// Outbound notifications for whatever renders the game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GameEvent {
    NoteSpawned {
        id: NoteId,
        lane: usize,
        kind: NoteKind,
        travel_ms: f64,
    },
    /// Head of a hold judged; the note stays live until the tail.
    HeadHit {
        id: NoteId,
        lane: usize,
        judgment: Judgment,
    },
    NoteResolved {
        id: NoteId,
        lane: usize,
        judgment: Judgment,
    },
    HoldStateChanged {
        lane: usize,
        active: bool,
    },
    HoldCompleted {
        id: NoteId,
        lane: usize,
        bonus: u64,
    },
    ScoreChanged(ScoreSnapshot),
    SyncOffsetChanged(i32),
    StateChanged {
        from: SessionState,
        to: SessionState,
    },
    Countdown(u32),
    Alert(String),
}

/// Cloneable sending half. A dropped receiver is reported once and then
/// ignored.
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    sender: Option<Sender<GameEvent>>,
    disconnected: Arc<AtomicBool>,
}

impl EventSink {
    pub fn channel() -> (Self, Receiver<GameEvent>) {
        let (sender, receiver) = crossbeam_channel::unbounded();
        (
            Self {
                sender: Some(sender),
                disconnected: Arc::new(AtomicBool::new(false)),
            },
            receiver,
        )
    }

    /// A sink that drops everything.
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn emit(&self, event: GameEvent) {
        let Some(sender) = &self.sender else {
            return;
        };
        if sender.send(event).is_err() && !self.disconnected.swap(true, Ordering::Relaxed) {
            warn!("event receiver dropped; further game events are discarded");
        }
    }
}
