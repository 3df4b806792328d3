use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use log::debug;

/// Source of wall-clock milliseconds from an arbitrary epoch.
pub trait TimeProvider: Send + Sync {
    fn now_ms(&self) -> f64;
}

pub struct SystemTimeProvider {
    start: Instant,
}

impl SystemTimeProvider {
    pub fn new() -> Self {
        Self { start: Instant::now() }
    }
}

impl Default for SystemTimeProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeProvider for SystemTimeProvider {
    fn now_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }
}

/// Hand-driven clock. Clones share the same time, so a test can keep one
/// handle while the session owns another.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    bits: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_ms(&self, ms: f64) {
        self.bits.store(ms.to_bits(), Ordering::SeqCst);
    }

    pub fn advance_ms(&self, delta_ms: f64) {
        self.set_ms(self.now_ms() + delta_ms);
    }
}

impl TimeProvider for ManualClock {
    fn now_ms(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::SeqCst))
    }
}

/// Elapsed playback time that stands still while paused, so note timestamps
/// stay valid across a pause.
pub struct PlaybackClock {
    provider: Arc<dyn TimeProvider>,
    origin_ms: Option<f64>,
    paused_at_ms: Option<f64>,
    paused_total_ms: f64,
}

impl PlaybackClock {
    pub fn new(provider: Arc<dyn TimeProvider>) -> Self {
        Self {
            provider,
            origin_ms: None,
            paused_at_ms: None,
            paused_total_ms: 0.0,
        }
    }

    pub fn start(&mut self) {
        self.origin_ms = Some(self.provider.now_ms());
        self.paused_at_ms = None;
        self.paused_total_ms = 0.0;
    }

    pub fn stop(&mut self) {
        self.origin_ms = None;
        self.paused_at_ms = None;
        self.paused_total_ms = 0.0;
    }

    pub fn pause(&mut self) {
        if self.origin_ms.is_some() && self.paused_at_ms.is_none() {
            self.paused_at_ms = Some(self.provider.now_ms());
        }
    }

    pub fn resume(&mut self) {
        if let Some(paused_at) = self.paused_at_ms.take() {
            let paused_for = self.provider.now_ms() - paused_at;
            self.paused_total_ms += paused_for;
            debug!("playback clock resumed after {:.0}ms pause", paused_for);
        }
    }

    pub fn is_running(&self) -> bool {
        self.origin_ms.is_some() && self.paused_at_ms.is_none()
    }

    pub fn is_paused(&self) -> bool {
        self.paused_at_ms.is_some()
    }

    /// Playback milliseconds since `start`, excluding paused time.
    pub fn now_ms(&self) -> f64 {
        let Some(origin) = self.origin_ms else {
            return 0.0;
        };
        let wall = self.paused_at_ms.unwrap_or_else(|| self.provider.now_ms());
        (wall - origin - self.paused_total_ms).max(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_shared_between_clones() {
        let clock = ManualClock::new();
        let handle = clock.clone();
        handle.advance_ms(250.0);
        assert_eq!(clock.now_ms(), 250.0);
    }

    #[test]
    fn playback_clock_excludes_pause() {
        let wall = ManualClock::new();
        wall.set_ms(10_000.0);
        let mut clock = PlaybackClock::new(Arc::new(wall.clone()));
        assert_eq!(clock.now_ms(), 0.0);

        clock.start();
        wall.advance_ms(1000.0);
        assert_eq!(clock.now_ms(), 1000.0);

        clock.pause();
        wall.advance_ms(60_000.0);
        assert_eq!(clock.now_ms(), 1000.0);
        assert!(clock.is_paused());

        clock.resume();
        wall.advance_ms(500.0);
        assert_eq!(clock.now_ms(), 1500.0);
        assert!(clock.is_running());
    }

    #[test]
    fn system_provider_is_monotonic() {
        let provider = SystemTimeProvider::new();
        let a = provider.now_ms();
        let b = provider.now_ms();
        assert!(b >= a);
    }
}
