use std::sync::Arc;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::audio::{SimulatedSpectrum, SpectrumFrame, SpectrumSource};
use crate::config::GameConfig;
use crate::error::{GameError, Result};
use crate::game::{
    EventSink, GameEvent, HoldRelease, InputGate, Judgment, Key, LaneInput, PlaybackClock, ScoreSnapshot, Session,
    TimeProvider,
};

use super::media::{error_message, extract_video_id, MediaError, MediaEvent, MediaPlayer};
use super::ticker::TickControl;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Waiting,
    Countdown,
    Playing,
    Paused,
    Result,
}

pub const COUNTDOWN_FROM: u32 = 3;
const COUNTDOWN_STEP_MS: f64 = 1000.0;
const FALLBACK_BPM: f32 = 120.0;

#[derive(Debug, Clone, Copy)]
struct Countdown {
    remaining: u32,
    next_at_ms: f64,
}

/// Drives one game through waiting, countdown, playing, paused and result,
/// and owns the collaborators around the gameplay [`Session`].
pub struct SessionController {
    config: GameConfig,
    state: SessionState,
    session: Option<Session>,
    wall: Arc<dyn TimeProvider>,
    clock: PlaybackClock,
    player: Box<dyn MediaPlayer>,
    player_ready: bool,
    spectrum: Box<dyn SpectrumSource>,
    using_fallback: bool,
    countdown: Option<Countdown>,
    input: InputGate,
    events: EventSink,
    last_result: Option<ScoreSnapshot>,
}

impl SessionController {
    pub fn new(
        config: GameConfig,
        wall: Arc<dyn TimeProvider>,
        player: Box<dyn MediaPlayer>,
        spectrum: Box<dyn SpectrumSource>,
        events: EventSink,
    ) -> Result<Self> {
        config.validate()?;
        info!("spectrum source: {}", spectrum.source_type());
        Ok(Self {
            input: InputGate::new(config.lanes),
            clock: PlaybackClock::new(wall.clone()),
            state: SessionState::Waiting,
            session: None,
            player_ready: false,
            using_fallback: false,
            countdown: None,
            last_result: None,
            config,
            wall,
            player,
            spectrum,
            events,
        })
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn player(&self) -> &dyn MediaPlayer {
        self.player.as_ref()
    }

    pub fn is_player_ready(&self) -> bool {
        self.player_ready
    }

    pub fn using_fallback_spectrum(&self) -> bool {
        self.using_fallback
    }

    /// Frozen score of the last finished game.
    pub fn last_result(&self) -> Option<&ScoreSnapshot> {
        self.last_result.as_ref()
    }

    /// Playback time the game is judged against, in ms.
    pub fn playback_ms(&self) -> f64 {
        self.clock.now_ms()
    }

    /// Whether the tick loop has work to do in the current state.
    pub fn wants_ticks(&self) -> bool {
        matches!(self.state, SessionState::Countdown | SessionState::Playing)
    }

    fn transition(&mut self, to: SessionState) {
        let from = self.state;
        if from == to {
            return;
        }
        info!("session {:?} -> {:?}", from, to);
        self.state = to;
        self.events.emit(GameEvent::StateChanged { from, to });
    }

    fn invalid(&self, command: &'static str) -> GameError {
        GameError::InvalidTransition {
            from: self.state,
            command,
        }
    }

    fn alert(&self, message: String) {
        warn!("{}", message);
        self.events.emit(GameEvent::Alert(message));
    }

    /// Cues a video from a URL. The player must report `Ready` before a
    /// game can start.
    pub fn load(&mut self, url: &str) -> Result<String> {
        if self.state != SessionState::Waiting {
            return Err(self.invalid("load"));
        }
        let Some(video_id) = extract_video_id(url) else {
            self.alert(format!("not a valid video URL: {url}"));
            return Err(MediaError::InvalidUrl(url.to_string()).into());
        };
        self.player_ready = false;
        self.player.cue(&video_id)?;
        Ok(video_id)
    }

    pub fn handle_media(&mut self, event: MediaEvent) {
        debug!("media event {:?} while {:?}", event, self.state);
        match event {
            MediaEvent::Ready => self.player_ready = true,
            MediaEvent::Playing => {
                if self.state == SessionState::Paused {
                    self.clock.resume();
                    self.transition(SessionState::Playing);
                }
            }
            MediaEvent::Paused => {
                if self.state == SessionState::Playing {
                    self.clock.pause();
                    self.transition(SessionState::Paused);
                }
            }
            MediaEvent::Ended => {
                if matches!(self.state, SessionState::Playing | SessionState::Paused) {
                    self.finish();
                }
            }
            MediaEvent::Buffering => {}
            MediaEvent::Error(code) => {
                self.alert(format!("player error: {}", error_message(code)));
                self.player_ready = false;
                if self.state != SessionState::Waiting {
                    self.abandon();
                }
            }
        }
    }

    /// Waiting to countdown. Builds the session on first start and resets it
    /// on later ones; the sync offset carries over.
    pub fn start(&mut self) -> Result<()> {
        if self.state != SessionState::Waiting {
            return Err(self.invalid("start"));
        }
        if !self.player_ready {
            return Err(GameError::PlayerNotReady);
        }

        match self.session.as_mut() {
            Some(session) => session.reset(),
            None => self.session = Some(Session::new(&self.config, self.events.clone())),
        }
        self.input.reset();
        self.last_result = None;
        self.countdown = Some(Countdown {
            remaining: COUNTDOWN_FROM,
            next_at_ms: self.wall.now_ms() + COUNTDOWN_STEP_MS,
        });
        self.transition(SessionState::Countdown);
        self.events.emit(GameEvent::Countdown(COUNTDOWN_FROM));
        Ok(())
    }

    /// One loop iteration. Returns `Stop` once the state no longer needs
    /// ticking.
    pub fn tick(&mut self) -> Result<TickControl> {
        match self.state {
            SessionState::Countdown => self.tick_countdown()?,
            SessionState::Playing => self.tick_playing(),
            _ => {}
        }
        Ok(if self.wants_ticks() {
            TickControl::Continue
        } else {
            TickControl::Stop
        })
    }

    fn tick_countdown(&mut self) -> Result<()> {
        let now = self.wall.now_ms();
        let Some(countdown) = self.countdown.as_mut() else {
            return Ok(());
        };
        if now < countdown.next_at_ms {
            return Ok(());
        }
        countdown.remaining -= 1;
        countdown.next_at_ms += COUNTDOWN_STEP_MS;
        let remaining = countdown.remaining;
        if remaining > 0 {
            self.events.emit(GameEvent::Countdown(remaining));
            return Ok(());
        }
        self.countdown = None;
        self.begin_play()
    }

    fn begin_play(&mut self) -> Result<()> {
        let started = self.player.seek(0.0).and_then(|_| self.player.play());
        if let Err(err) = started {
            self.alert(format!("could not start playback: {err}"));
            self.abandon();
            return Err(err.into());
        }
        self.clock.start();
        self.transition(SessionState::Playing);
        Ok(())
    }

    fn tick_playing(&mut self) {
        let duration = self.player.duration();
        if duration > 0.0 && self.player.current_time() >= duration {
            self.handle_media(MediaEvent::Ended);
            return;
        }

        let now = self.clock.now_ms();
        let frame = self.next_frame(now);
        if let Some(session) = self.session.as_mut() {
            session.advance(now, &frame);
        }
    }

    fn next_frame(&mut self, now_ms: f64) -> SpectrumFrame {
        match self.spectrum.frame(now_ms) {
            Ok(frame) => return frame,
            Err(err) if self.using_fallback => {
                warn!("simulated spectrum failed: {}", err);
                return SpectrumFrame::default();
            }
            Err(err) => {
                self.alert(format!("spectrum source failed ({err}); switching to simulated energy"));
            }
        }
        self.spectrum = Box::new(SimulatedSpectrum::new(self.config.seed.unwrap_or(0), FALLBACK_BPM));
        self.using_fallback = true;
        self.spectrum.frame(now_ms).unwrap_or_default()
    }

    pub fn pause(&mut self) -> Result<()> {
        if self.state != SessionState::Playing {
            return Err(self.invalid("pause"));
        }
        if let Err(err) = self.player.pause() {
            self.alert(format!("player did not pause: {err}"));
        }
        self.clock.pause();
        self.transition(SessionState::Paused);
        Ok(())
    }

    pub fn resume(&mut self) -> Result<()> {
        if self.state != SessionState::Paused {
            return Err(self.invalid("resume"));
        }
        self.player.play()?;
        self.clock.resume();
        self.transition(SessionState::Playing);
        Ok(())
    }

    /// Explicit end: same as the player reporting the track ended.
    pub fn end(&mut self) -> Result<ScoreSnapshot> {
        if !matches!(self.state, SessionState::Playing | SessionState::Paused) {
            return Err(self.invalid("end"));
        }
        self.finish();
        self.last_result.ok_or_else(|| self.invalid("end"))
    }

    fn finish(&mut self) {
        if let Some(session) = self.session.as_mut() {
            self.last_result = Some(session.end());
            self.config.sync_offset_ms = session.sync_offset();
        }
        if let Err(err) = self.player.stop() {
            warn!("player did not stop: {}", err);
        }
        self.clock.stop();
        self.input.reset();
        self.transition(SessionState::Result);
    }

    /// Drops everything in flight and returns to waiting without a result.
    fn abandon(&mut self) {
        if let Some(session) = self.session.as_mut() {
            session.end();
            self.config.sync_offset_ms = session.sync_offset();
        }
        self.countdown = None;
        self.clock.stop();
        self.input.reset();
        if let Err(err) = self.player.stop() {
            debug!("player stop after failure: {}", err);
        }
        self.transition(SessionState::Waiting);
    }

    /// Result to waiting, keeping the session for the next start.
    pub fn restart(&mut self) -> Result<()> {
        if self.state != SessionState::Result {
            return Err(self.invalid("restart"));
        }
        self.transition(SessionState::Waiting);
        Ok(())
    }

    /// Leaves any state for waiting and discards the session.
    pub fn quit(&mut self) -> Result<()> {
        match self.state {
            SessionState::Waiting => return Err(self.invalid("quit")),
            SessionState::Result => self.transition(SessionState::Waiting),
            _ => self.abandon(),
        }
        self.session = None;
        Ok(())
    }

    pub fn step_sync_offset(&mut self, up: bool) -> i32 {
        let offset = match self.session.as_mut() {
            Some(session) => session.step_sync_offset(up),
            None => {
                let step = crate::game::SyncOffset::STEP_MS;
                self.config.sync_offset_ms += if up { step } else { -step };
                self.config.sync_offset_ms
            }
        };
        self.config.sync_offset_ms = offset;
        offset
    }

    /// Raw key press. Only lane keys and Escape do anything, and only while
    /// playing.
    pub fn key_down(&mut self, key: Key) -> Result<Option<Judgment>> {
        if self.state != SessionState::Playing {
            return Ok(None);
        }
        match self.input.key_down(key) {
            Some(LaneInput::Down(lane)) => self.press_lane(lane),
            Some(LaneInput::Pause) => {
                self.pause()?;
                Ok(None)
            }
            _ => Ok(None),
        }
    }

    /// Raw key release. Also honoured while paused, so a hold let go during
    /// the pause is not credited on resume.
    pub fn key_up(&mut self, key: Key) -> Result<Option<HoldRelease>> {
        match self.input.key_up(key) {
            Some(LaneInput::Up(lane)) => self.release_lane(lane),
            _ => Ok(None),
        }
    }

    /// Lane press that skips key mapping and repeat filtering.
    pub fn press_lane(&mut self, lane: usize) -> Result<Option<Judgment>> {
        if self.state != SessionState::Playing {
            return Ok(None);
        }
        let now = self.clock.now_ms();
        match self.session.as_mut() {
            Some(session) => session.on_key_down(lane, now),
            None => Ok(None),
        }
    }

    pub fn release_lane(&mut self, lane: usize) -> Result<Option<HoldRelease>> {
        if !matches!(self.state, SessionState::Playing | SessionState::Paused) {
            return Ok(None);
        }
        let now = self.clock.now_ms();
        match self.session.as_mut() {
            Some(session) => session.on_key_up(lane, now),
            None => Ok(None),
        }
    }
}
