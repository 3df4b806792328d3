use std::sync::{Arc, OnceLock};

use log::{debug, info};
use regex::Regex;
use thiserror::Error;

use crate::game::TimeProvider;

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("not a recognised video URL: {0}")]
    InvalidUrl(String),
    #[error("no video cued")]
    NothingCued,
    #[error("player error {code}: {message}")]
    Player { code: u32, message: &'static str },
}

impl MediaError {
    pub fn player(code: u32) -> Self {
        MediaError::Player {
            code,
            message: error_message(code),
        }
    }
}

/// Player state notifications, delivered to the session controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaEvent {
    Ready,
    Playing,
    Paused,
    Ended,
    Buffering,
    Error(u32),
}

/// User-facing text for an embedded player error code.
pub fn error_message(code: u32) -> &'static str {
    match code {
        2 => "the request contains an invalid parameter",
        5 => "the requested content cannot be played in an HTML5 player",
        100 => "the requested video was not found",
        101 | 150 => "the owner of the requested video does not allow embedding",
        _ => "an unknown player error occurred",
    }
}

/// Playback control the game needs from whatever plays the music.
pub trait MediaPlayer: Send {
    fn cue(&mut self, video_id: &str) -> Result<(), MediaError>;
    fn play(&mut self) -> Result<(), MediaError>;
    fn pause(&mut self) -> Result<(), MediaError>;
    fn stop(&mut self) -> Result<(), MediaError>;
    fn seek(&mut self, seconds: f64) -> Result<(), MediaError>;
    fn current_time(&self) -> f64;
    fn duration(&self) -> f64;
}

fn video_id_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            r"(?i)(?:https?://)?(?:www\.)?youtube\.com/watch\?v=([^&]+)",
            r"(?i)(?:https?://)?(?:www\.)?youtube\.com/embed/([^/?]+)",
            r"(?i)(?:https?://)?(?:www\.)?youtu\.be/([^/?]+)",
            r"(?i)(?:https?://)?(?:www\.)?youtube\.com/shorts/([^/?]+)",
        ]
        .iter()
        .filter_map(|pattern| Regex::new(pattern).ok())
        .collect()
    })
}

/// Pulls the video id out of a watch, embed, short-link or shorts URL.
pub fn extract_video_id(url: &str) -> Option<String> {
    video_id_patterns()
        .iter()
        .find_map(|pattern| pattern.captures(url))
        .and_then(|captures| captures.get(1))
        .map(|id| id.as_str().to_string())
        .filter(|id| !id.is_empty())
}

/// Clock-backed player for headless runs: it "plays" a track of fixed
/// length by measuring elapsed time.
pub struct SimulatedPlayer {
    clock: Arc<dyn TimeProvider>,
    duration_secs: f64,
    cued: Option<String>,
    position_secs: f64,
    playing_since_ms: Option<f64>,
}

impl SimulatedPlayer {
    pub fn new(clock: Arc<dyn TimeProvider>, duration_secs: f64) -> Self {
        Self {
            clock,
            duration_secs,
            cued: None,
            position_secs: 0.0,
            playing_since_ms: None,
        }
    }

    pub fn cued(&self) -> Option<&str> {
        self.cued.as_deref()
    }

    pub fn is_playing(&self) -> bool {
        self.playing_since_ms.is_some()
    }

    pub fn has_ended(&self) -> bool {
        self.current_time() >= self.duration_secs
    }
}

impl MediaPlayer for SimulatedPlayer {
    fn cue(&mut self, video_id: &str) -> Result<(), MediaError> {
        info!("cued simulated video {}", video_id);
        self.cued = Some(video_id.to_string());
        self.position_secs = 0.0;
        self.playing_since_ms = None;
        Ok(())
    }

    fn play(&mut self) -> Result<(), MediaError> {
        if self.cued.is_none() {
            return Err(MediaError::NothingCued);
        }
        if self.playing_since_ms.is_none() {
            self.playing_since_ms = Some(self.clock.now_ms());
        }
        Ok(())
    }

    fn pause(&mut self) -> Result<(), MediaError> {
        self.position_secs = self.current_time();
        self.playing_since_ms = None;
        Ok(())
    }

    fn stop(&mut self) -> Result<(), MediaError> {
        self.position_secs = 0.0;
        self.playing_since_ms = None;
        Ok(())
    }

    fn seek(&mut self, seconds: f64) -> Result<(), MediaError> {
        if self.cued.is_none() {
            return Err(MediaError::NothingCued);
        }
        debug!("seek to {:.2}s", seconds);
        self.position_secs = seconds.clamp(0.0, self.duration_secs);
        if self.playing_since_ms.is_some() {
            self.playing_since_ms = Some(self.clock.now_ms());
        }
        Ok(())
    }

    fn current_time(&self) -> f64 {
        let playing = self
            .playing_since_ms
            .map_or(0.0, |since| (self.clock.now_ms() - since) / 1000.0);
        (self.position_secs + playing).min(self.duration_secs)
    }

    fn duration(&self) -> f64 {
        self.duration_secs
    }
}
