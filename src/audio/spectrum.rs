use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;

use super::Band;

/// One refresh of per-bin magnitudes. Bin `i` sits at `i * nyquist_hz / len` Hz.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpectrumFrame {
    pub magnitudes: Vec<f32>,
    pub nyquist_hz: f32,
}

impl SpectrumFrame {
    pub fn silent(bins: usize, nyquist_hz: f32) -> Self {
        Self {
            magnitudes: vec![0.0; bins],
            nyquist_hz,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.magnitudes.is_empty()
    }
}

#[derive(Debug, Error)]
pub enum SpectrumError {
    #[error("spectrum source unavailable: {0}")]
    Unavailable(String),
    #[error("failed to read audio: {0}")]
    Decode(#[from] hound::Error),
}

/// Anything that can hand the game a fresh magnitude array once per tick.
pub trait SpectrumSource: Send {
    /// Magnitudes for the playback position `now_ms`.
    fn frame(&mut self, now_ms: f64) -> Result<SpectrumFrame, SpectrumError>;

    /// Short identification used in logs ("simulated", "wav", ...).
    fn source_type(&self) -> &'static str;
}

struct PulseTrack {
    band: Band,
    period_ms: f64,
    offset_ms: f64,
    amplitude: f32,
}

/// Deterministic stand-in for a real analyser: seeded noise floor plus
/// periodic pulses in each band at a fixed tempo.
pub struct SimulatedSpectrum {
    rng: StdRng,
    bins: usize,
    nyquist_hz: f32,
    noise_floor: f32,
    pulse_width_ms: f64,
    tracks: Vec<PulseTrack>,
}

impl SimulatedSpectrum {
    pub const DEFAULT_BINS: usize = 1024;
    pub const DEFAULT_NYQUIST_HZ: f32 = 22050.0;

    pub fn new(seed: u64, bpm: f32) -> Self {
        let beat_ms = 60_000.0 / bpm.max(1.0) as f64;
        let tracks = vec![
            PulseTrack {
                band: Band::Bass,
                period_ms: beat_ms,
                offset_ms: 0.0,
                amplitude: 180.0,
            },
            PulseTrack {
                band: Band::MidLow,
                period_ms: beat_ms,
                offset_ms: beat_ms / 2.0,
                amplitude: 140.0,
            },
            PulseTrack {
                band: Band::MidHigh,
                period_ms: beat_ms * 2.0,
                offset_ms: beat_ms * 0.75,
                amplitude: 120.0,
            },
            PulseTrack {
                band: Band::High,
                period_ms: beat_ms / 2.0,
                offset_ms: beat_ms / 4.0,
                amplitude: 100.0,
            },
        ];

        Self {
            rng: StdRng::seed_from_u64(seed),
            bins: Self::DEFAULT_BINS,
            nyquist_hz: Self::DEFAULT_NYQUIST_HZ,
            noise_floor: 30.0,
            pulse_width_ms: 48.0,
            tracks,
        }
    }

    fn bin_range(&self, band: Band) -> std::ops::Range<usize> {
        let range = band.range();
        let per_hz = self.bins as f32 / self.nyquist_hz;
        let start = (range.min_hz * per_hz).floor() as usize;
        let end = ((range.max_hz * per_hz).floor() as usize + 1).min(self.bins);
        start.min(end)..end
    }
}

impl SpectrumSource for SimulatedSpectrum {
    fn frame(&mut self, now_ms: f64) -> Result<SpectrumFrame, SpectrumError> {
        let noise_floor = self.noise_floor;
        let mut magnitudes: Vec<f32> = (0..self.bins)
            .map(|_| noise_floor * self.rng.gen_range(0.6..1.0))
            .collect();

        for track in &self.tracks {
            let shifted = now_ms - track.offset_ms;
            if shifted < 0.0 {
                continue;
            }
            let phase = shifted % track.period_ms;
            if phase >= self.pulse_width_ms {
                continue;
            }
            let envelope = 1.0 - (phase / self.pulse_width_ms) as f32;
            for bin in self.bin_range(track.band) {
                magnitudes[bin] += track.amplitude * envelope;
            }
        }

        Ok(SpectrumFrame {
            magnitudes,
            nyquist_hz: self.nyquist_hz,
        })
    }

    fn source_type(&self) -> &'static str {
        "simulated"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{EnergyExtractor, OnsetDetector};
    use crate::audio::onset::OnsetSettings;

    #[test]
    fn same_seed_same_frames() {
        let mut a = SimulatedSpectrum::new(7, 120.0);
        let mut b = SimulatedSpectrum::new(7, 120.0);
        for t in [0.0, 16.0, 250.0, 1000.0] {
            assert_eq!(a.frame(t).unwrap(), b.frame(t).unwrap());
        }
    }

    #[test]
    fn bass_pulse_lands_on_the_beat() {
        let mut source = SimulatedSpectrum::new(1, 120.0);
        let extractor = EnergyExtractor::default();
        let on_beat = extractor.extract(&source.frame(1000.0).unwrap());
        let off_beat = extractor.extract(&source.frame(1100.0).unwrap());
        assert!(on_beat.bass > off_beat.bass * 3.0);
    }

    #[test]
    fn drives_the_detector() {
        let mut source = SimulatedSpectrum::new(3, 120.0);
        let extractor = EnergyExtractor::default();
        let mut detector = OnsetDetector::new(OnsetSettings::default());
        let mut onsets = 0;
        let mut t = 0.0;
        while t < 4000.0 {
            let energies = extractor.extract(&source.frame(t).unwrap());
            let detection = detector.observe_all(&energies, t);
            onsets += detection.onsets.len() + usize::from(detection.pattern.is_some());
            t += 16.0;
        }
        assert!(onsets >= 4, "only {onsets} onsets in four seconds");
    }
}
