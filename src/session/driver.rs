use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use log::warn;

use crate::error::Result;
use crate::game::{HoldRelease, Judgment, Key, ScoreSnapshot};

use super::controller::{SessionController, SessionState};
use super::media::MediaEvent;
use super::ticker::{TickControl, Ticker};

fn lock(controller: &Mutex<SessionController>) -> MutexGuard<'_, SessionController> {
    controller.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Runs a [`SessionController`] on the tokio runtime. Ticks, key events and
/// media events all go through one mutex, so a judgment never sees a
/// half-aged note.
pub struct GameDriver {
    controller: Arc<Mutex<SessionController>>,
    interval: Duration,
    ticker: Option<Ticker>,
}

impl GameDriver {
    pub fn new(controller: SessionController) -> Self {
        let interval = Duration::from_millis(controller.config().tick_interval_ms);
        Self {
            controller: Arc::new(Mutex::new(controller)),
            interval,
            ticker: None,
        }
    }

    pub fn controller(&self) -> Arc<Mutex<SessionController>> {
        self.controller.clone()
    }

    pub fn state(&self) -> SessionState {
        lock(&self.controller).state()
    }

    pub fn is_ticking(&self) -> bool {
        self.ticker.as_ref().is_some_and(Ticker::is_running)
    }

    fn arm(&mut self) {
        if self.is_ticking() {
            return;
        }
        let controller = self.controller.clone();
        self.ticker = Some(Ticker::start(self.interval, move || {
            match lock(&controller).tick() {
                Ok(control) => control,
                Err(err) => {
                    warn!("tick failed: {}", err);
                    TickControl::Stop
                }
            }
        }));
    }

    fn disarm(&mut self) {
        if let Some(mut ticker) = self.ticker.take() {
            ticker.stop();
        }
    }

    /// Keeps the ticker in line with what the controller state needs.
    fn sync_ticker(&mut self) {
        if lock(&self.controller).wants_ticks() {
            self.arm();
        } else {
            self.disarm();
        }
    }

    pub fn load(&mut self, url: &str) -> Result<String> {
        lock(&self.controller).load(url)
    }

    pub fn start(&mut self) -> Result<()> {
        lock(&self.controller).start()?;
        self.arm();
        Ok(())
    }

    pub fn pause(&mut self) -> Result<()> {
        lock(&self.controller).pause()?;
        self.disarm();
        Ok(())
    }

    pub fn resume(&mut self) -> Result<()> {
        lock(&self.controller).resume()?;
        self.arm();
        Ok(())
    }

    pub fn end(&mut self) -> Result<ScoreSnapshot> {
        let result = lock(&self.controller).end();
        self.disarm();
        result
    }

    pub fn restart(&mut self) -> Result<()> {
        lock(&self.controller).restart()
    }

    pub fn quit(&mut self) -> Result<()> {
        let result = lock(&self.controller).quit();
        self.disarm();
        result
    }

    pub fn media(&mut self, event: MediaEvent) {
        lock(&self.controller).handle_media(event);
        self.sync_ticker();
    }

    pub fn key_down(&mut self, key: Key) -> Result<Option<Judgment>> {
        let judgment = lock(&self.controller).key_down(key);
        self.sync_ticker();
        judgment
    }

    pub fn key_up(&mut self, key: Key) -> Result<Option<HoldRelease>> {
        lock(&self.controller).key_up(key)
    }

    /// Waits until the game reaches its result screen and returns the score.
    pub async fn finished(&mut self, poll: Duration) -> Option<ScoreSnapshot> {
        loop {
            {
                let controller = lock(&self.controller);
                match controller.state() {
                    SessionState::Result => return controller.last_result().copied(),
                    SessionState::Waiting => return None,
                    _ => {}
                }
            }
            tokio::time::sleep(poll).await;
        }
    }
}

impl Drop for GameDriver {
    fn drop(&mut self) {
        self.disarm();
    }
}
