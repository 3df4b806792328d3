use thiserror::Error;

use crate::audio::SpectrumError;
use crate::session::{MediaError, SessionState};

#[derive(Debug, Error)]
pub enum GameError {
    #[error("cannot {command} while {from:?}")]
    InvalidTransition {
        from: SessionState,
        command: &'static str,
    },

    #[error("media player is not ready")]
    PlayerNotReady,

    #[error("lane {lane} out of range (lane count {lane_count})")]
    LaneOutOfRange { lane: usize, lane_count: usize },

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Media(#[from] MediaError),

    #[error(transparent)]
    Spectrum(#[from] SpectrumError),

    #[error("config I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse failed: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T, E = GameError> = std::result::Result<T, E>;
