use std::collections::VecDeque;

use log::{debug, trace};

use super::{Band, BandEnergies};

/// Bounded FIFO of recent energies for one band.
#[derive(Debug, Clone)]
pub struct EnergyHistory {
    samples: VecDeque<f32>,
    capacity: usize,
}

impl EnergyHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, energy: f32) {
        self.samples.push_back(energy);
        while self.samples.len() > self.capacity {
            self.samples.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    /// Arithmetic mean of the history. With `trim_outliers` the samples are
    /// sorted and only the lowest `floor(len * 0.9)` are averaged.
    pub fn average(&self, trim_outliers: bool) -> f32 {
        if self.samples.is_empty() {
            return 0.0;
        }

        if !trim_outliers {
            return self.samples.iter().sum::<f32>() / self.samples.len() as f32;
        }

        let mut sorted: Vec<f32> = self.samples.iter().copied().collect();
        sorted.sort_by(|a, b| a.total_cmp(b));
        let cutoff = sorted.len() * 9 / 10;
        if cutoff == 0 {
            return 0.0;
        }
        sorted[..cutoff].iter().sum::<f32>() / cutoff as f32
    }
}

/// Thresholds for one detector instance, taken from the difficulty profile.
#[derive(Debug, Clone)]
pub struct OnsetSettings {
    /// Onset fires when `energy > average * trigger`.
    pub trigger: [f32; Band::COUNT],
    /// Refractory interval per band, in ms.
    pub min_interval_ms: [f64; Band::COUNT],
    pub history_size: usize,
    pub trim_outliers: bool,
    /// Energies at or below this floor never fire.
    pub min_energy: f32,
    /// Bands that must exceed their trigger in one tick to form a pattern.
    pub pattern_min_bands: usize,
    pub pattern_interval_ms: f64,
}

impl Default for OnsetSettings {
    fn default() -> Self {
        Self {
            trigger: [1.4; Band::COUNT],
            min_interval_ms: [200.0; Band::COUNT],
            history_size: 30,
            trim_outliers: true,
            min_energy: 1.0,
            pattern_min_bands: 3,
            pattern_interval_ms: 800.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OnsetEvent {
    pub band: Band,
    pub energy: f32,
    pub average: f32,
    pub time_ms: f64,
}

impl OnsetEvent {
    pub fn strength(&self) -> f32 {
        self.energy / self.average.max(f32::EPSILON)
    }
}

/// Several bands rising together in one tick.
#[derive(Debug, Clone, PartialEq)]
pub struct PatternEvent {
    pub bands: Vec<Band>,
    pub time_ms: f64,
}

/// Result of one detector tick: either a pattern or zero or more band onsets.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Detection {
    pub onsets: Vec<OnsetEvent>,
    pub pattern: Option<PatternEvent>,
}

impl Detection {
    pub fn is_empty(&self) -> bool {
        self.onsets.is_empty() && self.pattern.is_none()
    }
}

pub struct OnsetDetector {
    settings: OnsetSettings,
    histories: [EnergyHistory; Band::COUNT],
    last_onset: [Option<f64>; Band::COUNT],
    last_pattern: Option<f64>,
    tick_count: u64,
}

impl OnsetDetector {
    pub fn new(settings: OnsetSettings) -> Self {
        let size = settings.history_size;
        Self {
            histories: std::array::from_fn(|_| EnergyHistory::new(size)),
            last_onset: [None; Band::COUNT],
            last_pattern: None,
            tick_count: 0,
            settings,
        }
    }

    pub fn settings(&self) -> &OnsetSettings {
        &self.settings
    }

    pub fn history(&self, band: Band) -> &EnergyHistory {
        &self.histories[band.index()]
    }

    pub fn last_onset(&self, band: Band) -> Option<f64> {
        self.last_onset[band.index()]
    }

    pub fn reset(&mut self) {
        for history in &mut self.histories {
            history.clear();
        }
        self.last_onset = [None; Band::COUNT];
        self.last_pattern = None;
        self.tick_count = 0;
    }

    /// Feeds one band sample. Returns an onset when the energy clears the
    /// trigger over the rolling average and the band is out of its refractory
    /// interval.
    pub fn observe(&mut self, band: Band, energy: f32, now_ms: f64) -> Option<OnsetEvent> {
        let (exceeds, average) = self.push_and_compare(band, energy);
        if exceeds && self.refractory_elapsed(band, now_ms) {
            self.last_onset[band.index()] = Some(now_ms);
            debug!("onset {} energy={:.2} avg={:.2} at {:.0}ms", band.name(), energy, average, now_ms);
            return Some(OnsetEvent {
                band,
                energy,
                average,
                time_ms: now_ms,
            });
        }
        None
    }

    /// Feeds a full tick of band energies. When enough bands exceed their
    /// trigger together and the pattern interval has elapsed, a single
    /// pattern replaces the individual onsets and every band's refractory
    /// clock restarts.
    pub fn observe_all(&mut self, energies: &BandEnergies, now_ms: f64) -> Detection {
        self.tick_count += 1;

        let mut exceeding = Vec::with_capacity(Band::COUNT);
        let mut averages = [0.0f32; Band::COUNT];
        for (band, energy) in energies.iter() {
            let (exceeds, average) = self.push_and_compare(band, energy);
            averages[band.index()] = average;
            if exceeds {
                exceeding.push(band);
            }
        }

        if self.tick_count % 120 == 0 {
            trace!(
                "energies bass={:.1}/{:.1} mid-low={:.1}/{:.1} mid-high={:.1}/{:.1} high={:.1}/{:.1}",
                energies.bass,
                averages[0],
                energies.mid_low,
                averages[1],
                energies.mid_high,
                averages[2],
                energies.high,
                averages[3]
            );
        }

        let pattern_ready = self
            .last_pattern
            .map_or(true, |last| now_ms - last >= self.settings.pattern_interval_ms);
        if self.settings.pattern_min_bands > 0
            && exceeding.len() >= self.settings.pattern_min_bands
            && pattern_ready
        {
            self.last_pattern = Some(now_ms);
            self.last_onset = [Some(now_ms); Band::COUNT];
            debug!("pattern over {} bands at {:.0}ms", exceeding.len(), now_ms);
            return Detection {
                onsets: Vec::new(),
                pattern: Some(PatternEvent {
                    bands: exceeding,
                    time_ms: now_ms,
                }),
            };
        }

        let mut onsets = Vec::new();
        for band in exceeding {
            if self.refractory_elapsed(band, now_ms) {
                self.last_onset[band.index()] = Some(now_ms);
                let energy = energies.get(band);
                let average = averages[band.index()];
                debug!("onset {} energy={:.2} avg={:.2} at {:.0}ms", band.name(), energy, average, now_ms);
                onsets.push(OnsetEvent {
                    band,
                    energy,
                    average,
                    time_ms: now_ms,
                });
            }
        }

        Detection {
            onsets,
            pattern: None,
        }
    }

    fn push_and_compare(&mut self, band: Band, energy: f32) -> (bool, f32) {
        let history = &mut self.histories[band.index()];
        history.push(energy);
        let average = history.average(self.settings.trim_outliers);

        // A zero baseline means nothing has been learned yet.
        if average <= 0.0 || energy <= self.settings.min_energy {
            return (false, average);
        }

        (energy > average * self.settings.trigger[band.index()], average)
    }

    fn refractory_elapsed(&self, band: Band, now_ms: f64) -> bool {
        match self.last_onset[band.index()] {
            Some(last) => now_ms - last >= self.settings.min_interval_ms[band.index()],
            None => true,
        }
    }
}
