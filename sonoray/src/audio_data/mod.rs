//! Dry (unprocessed) audio: decoding, resampling and caching.

mod cache;
mod load_options;
mod memory;
mod resampler;
mod source;
mod symphonia_source;

use crate::error::{Result, SonorayError};
pub use cache::CachedAudioSource;
pub use load_options::LoadOptions;
pub use memory::MemoryAudioSource;
pub use resampler::AudioResampler;
pub use source::DryAudioSource;
use std::sync::Arc;
use std::time::Duration;
pub use symphonia_source::SymphoniaAudioSource;

/// A mono recording with reference-counted sharing.
///
/// Cloning is cheap; the samples are shared between the cache and every
/// worker that renders the sound.
#[derive(Debug, Clone)]
pub struct DryAudio {
    inner: Arc<DryAudioInner>,
}

#[derive(Debug)]
struct DryAudioInner {
    /// Mono samples in [-1, 1]
    samples: Vec<f32>,
    sample_rate: u32,
    /// Playback speed factor; 1.0 plays at the nominal rate
    pitch: f32,
}

impl DryAudio {
    /// Wraps mono samples.
    ///
    /// # Errors
    ///
    /// Returns [`SonorayError::AudioFormat`] for a zero sample rate and
    /// [`SonorayError::NumericDegenerate`] if any sample is NaN or infinite.
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Result<Self> {
        if sample_rate == 0 {
            return Err(SonorayError::AudioFormat(
                "Sample rate must be greater than 0".to_string(),
            ));
        }
        if let Some(index) = samples.iter().position(|s| !s.is_finite()) {
            return Err(SonorayError::NumericDegenerate(format!(
                "non-finite sample at index {index}"
            )));
        }
        Ok(Self {
            inner: Arc::new(DryAudioInner {
                samples,
                sample_rate,
                pitch: 1.0,
            }),
        })
    }

    /// Returns a copy tagged with a playback speed factor.
    pub fn with_pitch(&self, pitch: f32) -> Result<Self> {
        if !pitch.is_finite() || pitch <= 0.0 {
            return Err(SonorayError::Configuration(format!(
                "pitch must be positive, got {pitch}"
            )));
        }
        Ok(Self {
            inner: Arc::new(DryAudioInner {
                samples: self.inner.samples.clone(),
                sample_rate: self.inner.sample_rate,
                pitch,
            }),
        })
    }

    pub fn samples(&self) -> &[f32] {
        &self.inner.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.inner.sample_rate
    }

    pub fn pitch(&self) -> f32 {
        self.inner.pitch
    }

    pub fn len(&self) -> usize {
        self.inner.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.samples.is_empty()
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.len() as f64 / self.sample_rate() as f64)
    }

    /// Resample to a different sample rate using rubato. The pitch is kept.
    pub fn resample(&self, target_sample_rate: u32) -> Result<Self> {
        if target_sample_rate == self.sample_rate() {
            return Ok(self.clone());
        }
        let resampler = AudioResampler::new(self.sample_rate(), target_sample_rate, Some(1024))?;
        let samples = resampler.resample(self.samples())?;
        Self::new(samples, target_sample_rate)?.with_pitch(self.pitch())
    }

    /// Averages interleaved frames down to one channel.
    pub fn downmix(interleaved: &[f32], channels: usize) -> Vec<f32> {
        if channels <= 1 {
            return interleaved.to_vec();
        }
        interleaved
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_bad_input() {
        assert!(DryAudio::new(vec![0.0], 0).is_err());
        assert!(matches!(
            DryAudio::new(vec![0.0, f32::NAN], 44_100),
            Err(SonorayError::NumericDegenerate(_))
        ));
    }

    #[test]
    fn duration_and_pitch() {
        let audio = DryAudio::new(vec![0.0; 22_050], 44_100).unwrap();
        assert_eq!(audio.duration(), Duration::from_millis(500));
        assert_eq!(audio.pitch(), 1.0);
        let faster = audio.with_pitch(1.5).unwrap();
        assert_eq!(faster.pitch(), 1.5);
        assert_eq!(faster.len(), audio.len());
        assert!(audio.with_pitch(0.0).is_err());
    }

    #[test]
    fn downmix_averages_frames() {
        assert_eq!(DryAudio::downmix(&[1.0, 0.0, 0.5, 0.5], 2), vec![0.5, 0.5]);
        assert_eq!(DryAudio::downmix(&[0.3, 0.1], 1), vec![0.3, 0.1]);
    }

    #[test]
    fn resampling_keeps_pitch() {
        let audio = DryAudio::new((0..4800).map(|i| (i as f32 * 0.01).sin()).collect(), 48_000)
            .unwrap()
            .with_pitch(0.8)
            .unwrap();
        let resampled = audio.resample(44_100).unwrap();
        assert_eq!(resampled.sample_rate(), 44_100);
        assert_eq!(resampled.pitch(), 0.8);
        assert_eq!(resampled.len(), 4410);
    }
}
