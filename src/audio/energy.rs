use serde::{Deserialize, Serialize};

use super::{Band, BandEnergies, SpectrumFrame};

/// Closed frequency interval in Hz.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrequencyRange {
    pub min_hz: f32,
    pub max_hz: f32,
}

impl FrequencyRange {
    pub const fn new(min_hz: f32, max_hz: f32) -> Self {
        Self { min_hz, max_hz }
    }
}

/// How bin magnitudes are aggregated into a band energy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnergyWeighting {
    /// Mean of the raw magnitudes.
    #[default]
    Magnitude,
    /// Mean of the squared magnitudes.
    Power,
}

/// Energy of `range` in a magnitude array whose bin `i` sits at `i * nyquist / N` Hz.
///
/// Covers bins `floor(min/nyquist*N) ..= min(floor(max/nyquist*N), N-1)`.
/// Returns 0.0 when the array is empty, the nyquist is not positive,
/// or the range selects no bins.
pub fn band_energy(
    magnitudes: &[f32],
    nyquist_hz: f32,
    range: FrequencyRange,
    weighting: EnergyWeighting,
) -> f32 {
    let bin_count = magnitudes.len();
    if bin_count == 0 || nyquist_hz <= 0.0 {
        return 0.0;
    }

    let min_bin = (range.min_hz / nyquist_hz * bin_count as f32).floor().max(0.0) as usize;
    let max_bin = (range.max_hz / nyquist_hz * bin_count as f32).floor().max(0.0) as usize;
    let max_bin = max_bin.min(bin_count - 1);

    if min_bin > max_bin {
        return 0.0;
    }

    let bins = &magnitudes[min_bin..=max_bin];
    let sum: f32 = match weighting {
        EnergyWeighting::Magnitude => bins.iter().sum(),
        EnergyWeighting::Power => bins.iter().map(|m| m * m).sum(),
    };
    sum / bins.len() as f32
}

/// Maps a spectrum frame onto the four detector bands. Stateless.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnergyExtractor {
    weighting: EnergyWeighting,
}

impl EnergyExtractor {
    pub fn new(weighting: EnergyWeighting) -> Self {
        Self { weighting }
    }

    pub fn weighting(&self) -> EnergyWeighting {
        self.weighting
    }

    pub fn extract(&self, frame: &SpectrumFrame) -> BandEnergies {
        let mut energies = BandEnergies::default();
        for band in Band::ALL {
            let energy = band_energy(&frame.magnitudes, frame.nyquist_hz, band.range(), self.weighting);
            energies.set(band, energy);
        }
        energies
    }
}
