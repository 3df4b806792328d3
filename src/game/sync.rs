use log::debug;

/// Signed correction in ms added to the playback clock before every timing
/// comparison.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncOffset {
    offset_ms: i32,
}

impl SyncOffset {
    pub const STEP_MS: i32 = 10;
    const DECAY: f64 = 0.9;

    pub fn new(offset_ms: i32) -> Self {
        Self { offset_ms }
    }

    pub fn ms(&self) -> i32 {
        self.offset_ms
    }

    pub fn apply(&self, now_ms: f64) -> f64 {
        now_ms + self.offset_ms as f64
    }

    pub fn step_up(&mut self) -> i32 {
        self.offset_ms += Self::STEP_MS;
        self.offset_ms
    }

    pub fn step_down(&mut self) -> i32 {
        self.offset_ms -= Self::STEP_MS;
        self.offset_ms
    }

    pub fn set(&mut self, offset_ms: i32) {
        self.offset_ms = offset_ms;
    }

    /// Exponential moving average toward `error_ms`
    /// (`offset * 0.9 + error * 0.1`), where the error is the expected hit
    /// time minus the raw press time.
    pub fn calibrate(&mut self, error_ms: f64) {
        let next = self.offset_ms as f64 * Self::DECAY + error_ms * (1.0 - Self::DECAY);
        let next = next.round() as i32;
        if next != self.offset_ms {
            debug!("sync offset {}ms -> {}ms", self.offset_ms, next);
        }
        self.offset_ms = next;
    }
}
