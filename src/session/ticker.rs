use std::time::Duration;

use log::trace;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickControl {
    Continue,
    Stop,
}

/// Fixed-interval callback on the tokio runtime. A tick always runs to
/// completion before the next one is awaited, and late ticks are skipped
/// rather than bunched up.
pub struct Ticker {
    handle: Option<JoinHandle<()>>,
}

impl Ticker {
    /// Must be called from inside a tokio runtime.
    pub fn start<F>(interval: Duration, mut tick: F) -> Self
    where
        F: FnMut() -> TickControl + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            let mut timer = tokio::time::interval(interval);
            timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                timer.tick().await;
                if tick() == TickControl::Stop {
                    trace!("ticker disarmed by callback");
                    break;
                }
            }
        });
        Self { handle: Some(handle) }
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|handle| !handle.is_finished())
    }

    /// Cancels the loop; no tick runs after this returns to the runtime.
    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.stop();
    }
}
