use crate::error::{Result, SonorayError};
use std::time::Duration;

/// How the listener receives sound.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EarLayout {
    /// One reception point at the head centre.
    Mono,
    /// Two reception points offset from the head centre along the listener's
    /// right vector by `half_width`.
    Binaural { half_width: f32 },
}

impl Default for EarLayout {
    fn default() -> Self {
        Self::Binaural { half_width: 0.1 }
    }
}

/// Configuration descriptor for an acoustic engine.
///
/// Unlike [`super::AcousticConfig`] these values size resources and are fixed
/// for the lifetime of the engine.
#[derive(Debug, Clone)]
pub struct EngineDesc {
    /// Sample rate of impulse responses and rendered audio
    pub ir_sample_rate: u32,
    /// Hard cap on impulse response length; later taps are dropped
    pub max_ir_duration: Duration,
    /// Ticks without a new tap after which an event is baked
    pub quiescence_ticks: u64,
    /// Cap on pending plus active rays
    pub max_active_rays: usize,
    /// Ticks a traced ray is retained after emission
    pub ray_lifetime_ticks: u64,
    /// Number of background convolution threads
    pub worker_threads: usize,
    /// Minimum dry segment length for overlap-add convolution (None = one FFT)
    pub convolution_block_size: Option<usize>,
    /// Listener reception layout
    pub ear_layout: EarLayout,
    /// Seed for ray directions; None draws one from the thread RNG
    pub rng_seed: Option<u64>,
}

impl Default for EngineDesc {
    fn default() -> Self {
        Self {
            ir_sample_rate: 44_100,
            max_ir_duration: Duration::from_secs(2),
            quiescence_ticks: 3,
            max_active_rays: 10_000,
            ray_lifetime_ticks: 2,
            worker_threads: 2,
            convolution_block_size: Some(8192),
            ear_layout: EarLayout::default(),
            rng_seed: None,
        }
    }
}

impl EngineDesc {
    /// Maximum impulse response length in samples.
    pub fn max_ir_samples(&self) -> usize {
        (self.max_ir_duration.as_secs_f64() * self.ir_sample_rate as f64).round() as usize
    }

    pub fn validate(&self) -> Result<()> {
        if self.ir_sample_rate == 0 {
            return Err(SonorayError::Configuration(
                "ir_sample_rate must be greater than 0".into(),
            ));
        }
        if self.max_ir_samples() == 0 {
            return Err(SonorayError::Configuration(
                "max_ir_duration must cover at least one sample".into(),
            ));
        }
        if self.quiescence_ticks == 0 {
            return Err(SonorayError::Configuration(
                "quiescence_ticks must be at least 1".into(),
            ));
        }
        if self.max_active_rays == 0 {
            return Err(SonorayError::Configuration(
                "max_active_rays must be greater than 0".into(),
            ));
        }
        if self.worker_threads == 0 {
            return Err(SonorayError::Configuration(
                "worker_threads must be greater than 0".into(),
            ));
        }
        if let Some(block) = self.convolution_block_size {
            if block == 0 {
                return Err(SonorayError::Configuration(
                    "convolution_block_size must be greater than 0".into(),
                ));
            }
        }
        if let EarLayout::Binaural { half_width } = self.ear_layout {
            if !(half_width.is_finite() && half_width > 0.0) {
                return Err(SonorayError::Configuration(
                    "binaural half_width must be positive".into(),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_desc_caps_ir_at_two_seconds() {
        let desc = EngineDesc::default();
        assert!(desc.validate().is_ok());
        assert_eq!(desc.max_ir_samples(), 88_200);
    }

    #[test]
    fn zero_sized_resources_are_rejected() {
        let desc = EngineDesc {
            worker_threads: 0,
            ..Default::default()
        };
        assert!(desc.validate().is_err());

        let desc = EngineDesc {
            ear_layout: EarLayout::Binaural { half_width: 0.0 },
            ..Default::default()
        };
        assert!(desc.validate().is_err());
    }
}
