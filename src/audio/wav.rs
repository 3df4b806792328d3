use std::path::Path;

use log::info;

use super::{SpectrumAnalyser, SpectrumError, SpectrumFrame, SpectrumSource};

/// Spectrum source backed by a decoded WAV file, analysed at the playback
/// position the game asks for.
pub struct WavSpectrumSource {
    samples: Vec<f32>,
    sample_rate: u32,
    analyser: SpectrumAnalyser,
}

impl WavSpectrumSource {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, SpectrumError> {
        let reader = hound::WavReader::open(&path)?;
        let spec = reader.spec();
        let channels = spec.channels.max(1) as usize;

        let interleaved: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Float => reader.into_samples::<f32>().collect::<Result<_, _>>()?,
            hound::SampleFormat::Int => {
                let scale = (1i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
                reader
                    .into_samples::<i32>()
                    .map(|s| s.map(|v| v as f32 / scale))
                    .collect::<Result<_, _>>()?
            }
        };

        // Mix down to mono for analysis
        let samples: Vec<f32> = interleaved
            .chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect();

        info!(
            "Loaded WAV {:?} ({}Hz, {} channels, {:.2}s)",
            path.as_ref(),
            spec.sample_rate,
            channels,
            samples.len() as f32 / spec.sample_rate as f32
        );

        Ok(Self::from_samples(samples, spec.sample_rate))
    }

    pub fn from_samples(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
            analyser: SpectrumAnalyser::new(sample_rate as f32, SpectrumAnalyser::DEFAULT_FFT_SIZE),
        }
    }

    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate.max(1) as f64
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

impl SpectrumSource for WavSpectrumSource {
    fn frame(&mut self, now_ms: f64) -> Result<SpectrumFrame, SpectrumError> {
        if self.samples.is_empty() {
            return Err(SpectrumError::Unavailable("WAV file has no samples".to_string()));
        }

        let position = ((now_ms.max(0.0) / 1000.0) * self.sample_rate as f64) as usize;
        let end = position.min(self.samples.len());
        Ok(self.analyser.analyze(&self.samples[..end]))
    }

    fn source_type(&self) -> &'static str {
        "wav"
    }
}
