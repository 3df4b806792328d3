use std::sync::Arc;

use rustfft::{num_complex::Complex, Fft, FftPlanner};

use super::SpectrumFrame;

/// Analyser-node style spectrum: Hann-windowed FFT, exponential smoothing
/// across calls, then decibels mapped linearly onto 0..=255.
pub struct SpectrumAnalyser {
    sample_rate: f32,
    fft_size: usize,
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    smoothing: f32,
    min_decibels: f32,
    max_decibels: f32,
    smoothed: Vec<f32>,
}

impl SpectrumAnalyser {
    pub const DEFAULT_FFT_SIZE: usize = 2048;
    pub const DEFAULT_SMOOTHING: f32 = 0.8;
    pub const DEFAULT_MIN_DB: f32 = -90.0;
    pub const DEFAULT_MAX_DB: f32 = -30.0;

    pub fn new(sample_rate: f32, fft_size: usize) -> Self {
        let fft_size = fft_size.max(2);
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(fft_size);

        Self {
            sample_rate,
            fft_size,
            fft,
            window: Self::hann_window(fft_size),
            smoothing: Self::DEFAULT_SMOOTHING,
            min_decibels: Self::DEFAULT_MIN_DB,
            max_decibels: Self::DEFAULT_MAX_DB,
            smoothed: vec![0.0; fft_size / 2],
        }
    }

    pub fn with_smoothing(mut self, smoothing: f32) -> Self {
        self.smoothing = smoothing.clamp(0.0, 1.0);
        self
    }

    pub fn with_decibel_range(mut self, min_decibels: f32, max_decibels: f32) -> Self {
        if max_decibels > min_decibels {
            self.min_decibels = min_decibels;
            self.max_decibels = max_decibels;
        }
        self
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    pub fn bin_count(&self) -> usize {
        self.fft_size / 2
    }

    pub fn nyquist_hz(&self) -> f32 {
        self.sample_rate / 2.0
    }

    fn hann_window(size: usize) -> Vec<f32> {
        (0..size)
            .map(|i| {
                let phase = 2.0 * std::f32::consts::PI * i as f32 / (size - 1) as f32;
                0.5 * (1.0 - phase.cos())
            })
            .collect()
    }

    /// Analyses the most recent `fft_size` samples (zero-padded when short).
    pub fn analyze(&mut self, samples: &[f32]) -> SpectrumFrame {
        let start = samples.len().saturating_sub(self.fft_size);
        let recent = &samples[start..];

        let mut buffer: Vec<Complex<f32>> = recent
            .iter()
            .zip(self.window.iter())
            .map(|(&x, &w)| Complex::new(x * w, 0.0))
            .collect();
        buffer.resize(self.fft_size, Complex::new(0.0, 0.0));

        self.fft.process(&mut buffer);

        let scale = 1.0 / self.fft_size as f32;
        let smoothing = self.smoothing;
        let min_db = self.min_decibels;
        let db_span = self.max_decibels - self.min_decibels;
        let magnitudes = buffer[..self.fft_size / 2]
            .iter()
            .zip(self.smoothed.iter_mut())
            .map(|(c, previous)| {
                let magnitude = c.norm() * scale;
                *previous = smoothing * *previous + (1.0 - smoothing) * magnitude;
                let db = 20.0 * previous.max(1e-12).log10();
                (255.0 * (db - min_db) / db_span).clamp(0.0, 255.0).floor()
            })
            .collect();

        SpectrumFrame {
            magnitudes,
            nyquist_hz: self.nyquist_hz(),
        }
    }

    pub fn reset(&mut self) {
        self.smoothed.iter_mut().for_each(|v| *v = 0.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f32, sample_rate: f32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| (2.0 * std::f32::consts::PI * freq * i as f32 / sample_rate).sin())
            .collect()
    }

    #[test]
    fn silence_maps_to_zero() {
        let mut analyser = SpectrumAnalyser::new(44100.0, 1024);
        let frame = analyser.analyze(&vec![0.0; 1024]);
        assert_eq!(frame.magnitudes.len(), 512);
        assert!(frame.magnitudes.iter().all(|&m| m == 0.0));
    }

    #[test]
    fn tone_peaks_in_its_bin() {
        let mut analyser = SpectrumAnalyser::new(44100.0, 2048)
            .with_smoothing(0.0)
            .with_decibel_range(-120.0, 0.0);
        let frame = analyser.analyze(&sine(1000.0, 44100.0, 2048));
        let peak = frame
            .magnitudes
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap();
        let expected = (1000.0 / 22050.0 * 1024.0) as usize;
        assert!(peak.abs_diff(expected) <= 1, "peak at {peak}, expected near {expected}");
    }

    #[test]
    fn smoothing_carries_over_between_calls() {
        let mut analyser = SpectrumAnalyser::new(44100.0, 1024);
        let tone = sine(440.0, 44100.0, 1024);
        let first = analyser.analyze(&tone);
        let second = analyser.analyze(&tone);
        let sum = |f: &SpectrumFrame| f.magnitudes.iter().sum::<f32>();
        assert!(sum(&second) > sum(&first));
    }
}
