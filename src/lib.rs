//! Audio-driven rhythm game core: spectrum energy in, falling notes and
//! judged key presses out.

pub mod audio;
pub mod config;
pub mod error;
pub mod game;
pub mod session;

pub use config::GameConfig;
pub use error::{GameError, Result};
pub use game::{Difficulty, GameEvent, Judgment, Session};
pub use session::{GameDriver, SessionController, SessionState};
