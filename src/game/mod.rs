pub mod aging;
pub mod clock;
pub mod difficulty;
pub mod events;
pub mod input;
pub mod judge;
pub mod judgment;
pub mod note;
pub mod scheduler;
pub mod score;
pub mod state;
pub mod sync;

pub use clock::{ManualClock, PlaybackClock, SystemTimeProvider, TimeProvider};
pub use difficulty::{Difficulty, DifficultyProfile, HoldRange};
pub use events::{EventSink, GameEvent};
pub use input::{InputGate, Key, LaneInput, LaneLayout};
pub use judge::HoldRelease;
pub use judgment::{AccuracyWeights, Judgment, JudgmentTally, JudgmentWindows, ScoreTable};
pub use note::{LiveNotes, Note, NoteId, NoteKind, NoteState};
pub use scheduler::{NoteScheduler, PatternShape, PlannedNote};
pub use score::{ScoreSnapshot, ScoreState};
pub use state::{Resolution, Session, TickReport};
pub use sync::SyncOffset;
