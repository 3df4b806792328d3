pub mod energy;
pub mod fft;
pub mod onset;
pub mod spectrum;
pub mod wav;

pub use energy::{band_energy, EnergyExtractor, EnergyWeighting, FrequencyRange};
pub use fft::SpectrumAnalyser;
pub use onset::{Detection, EnergyHistory, OnsetDetector, OnsetEvent, PatternEvent};
pub use spectrum::{SimulatedSpectrum, SpectrumError, SpectrumFrame, SpectrumSource};
pub use wav::WavSpectrumSource;

use serde::{Deserialize, Serialize};

/// Named frequency bands the detector tracks, lowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Band {
    Bass,
    MidLow,
    MidHigh,
    High,
}

impl Band {
    pub const COUNT: usize = 4;
    pub const ALL: [Band; Band::COUNT] = [Band::Bass, Band::MidLow, Band::MidHigh, Band::High];

    pub fn index(self) -> usize {
        match self {
            Band::Bass => 0,
            Band::MidLow => 1,
            Band::MidHigh => 2,
            Band::High => 3,
        }
    }

    /// Frequency range aggregated into this band.
    pub fn range(self) -> FrequencyRange {
        match self {
            Band::Bass => FrequencyRange::new(20.0, 200.0),
            Band::MidLow => FrequencyRange::new(200.0, 800.0),
            Band::MidHigh => FrequencyRange::new(800.0, 2500.0),
            Band::High => FrequencyRange::new(2500.0, 10000.0),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Band::Bass => "bass",
            Band::MidLow => "mid-low",
            Band::MidHigh => "mid-high",
            Band::High => "high",
        }
    }
}

/// Per-band energy for one tick. Recomputed every tick, never stored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BandEnergies {
    pub bass: f32,
    pub mid_low: f32,
    pub mid_high: f32,
    pub high: f32,
}

impl BandEnergies {
    pub fn get(&self, band: Band) -> f32 {
        match band {
            Band::Bass => self.bass,
            Band::MidLow => self.mid_low,
            Band::MidHigh => self.mid_high,
            Band::High => self.high,
        }
    }

    pub fn set(&mut self, band: Band, value: f32) {
        let slot = match band {
            Band::Bass => &mut self.bass,
            Band::MidLow => &mut self.mid_low,
            Band::MidHigh => &mut self.mid_high,
            Band::High => &mut self.high,
        };
        *slot = value.max(0.0);
    }

    pub fn iter(&self) -> impl Iterator<Item = (Band, f32)> + '_ {
        Band::ALL.into_iter().map(move |band| (band, self.get(band)))
    }
}
