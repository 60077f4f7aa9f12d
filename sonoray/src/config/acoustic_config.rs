use crate::error::{Result, SonorayError};

/// Numeric knobs that shape a single acoustic event.
///
/// The engine reads a copy of this at the start of each tick; changing it
/// through [`crate::AcousticEngine::set_config`] affects rays emitted afterwards.
///
/// # Example
///
/// ```
/// use sonoray::config::AcousticConfig;
///
/// let config = AcousticConfig::default()
///     .with_rays_per_emission(400)
///     .with_binaural_mix(0.5);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct AcousticConfig {
    /// Rays launched per emission (1..=10000)
    pub rays_per_emission: usize,
    /// Propagation speed in world units per second
    pub speed_of_sound: f32,
    /// Maximum number of specular reflections per ray
    pub max_bounces: u32,
    /// Maximum travel distance of a ray
    pub max_distance: f32,
    /// Maximum travel distance since the last reflection (or emission)
    pub max_distance_without_reflection: f32,
    /// Length of each occlusion query segment while marching a ray
    pub step_length: f32,
    /// Offset along the ray direction applied at emission
    pub emission_offset: f32,
    /// Energy below which a ray is frozen
    pub audibility_threshold: f32,
    /// 0 = fully panned, 1 = both ears weighted equally
    pub binaural_mix: f32,
    /// Gain applied to every reflected tap
    pub reflections_mix: f32,
    /// Damping at t = 0 inside the early-reflection window (0 = none)
    pub early_reflection_damping: f32,
    /// Length of the early-reflection window in seconds
    pub early_reflection_window: f32,
    /// Gain applied when a tap is accumulated into an impulse response
    pub master_gain: f32,
    /// Taps whose panning weight falls below this are dropped
    pub min_capture_weight: f32,
}

impl Default for AcousticConfig {
    fn default() -> Self {
        Self {
            rays_per_emission: 100,
            speed_of_sound: 343.0,
            max_bounces: 40,
            max_distance: 1000.0,
            max_distance_without_reflection: 256.0,
            step_length: 1.0,
            emission_offset: 0.1,
            audibility_threshold: 0.001,
            binaural_mix: 0.7,
            reflections_mix: 1.0,
            early_reflection_damping: 0.6,
            early_reflection_window: 0.025,
            master_gain: 1.0,
            min_capture_weight: 0.01,
        }
    }
}

impl AcousticConfig {
    pub const MAX_RAYS_PER_EMISSION: usize = 10_000;
    pub const MAX_SPEED_OF_SOUND: f32 = 10_000.0;
    pub const MAX_BOUNCES: u32 = 1000;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rays_per_emission(mut self, rays: usize) -> Self {
        self.rays_per_emission = rays;
        self
    }

    pub fn with_speed_of_sound(mut self, speed: f32) -> Self {
        self.speed_of_sound = speed;
        self
    }

    pub fn with_max_bounces(mut self, bounces: u32) -> Self {
        self.max_bounces = bounces;
        self
    }

    pub fn with_max_distance(mut self, distance: f32) -> Self {
        self.max_distance = distance;
        self
    }

    pub fn with_max_distance_without_reflection(mut self, distance: f32) -> Self {
        self.max_distance_without_reflection = distance;
        self
    }

    pub fn with_step_length(mut self, step: f32) -> Self {
        self.step_length = step;
        self
    }

    pub fn with_binaural_mix(mut self, mix: f32) -> Self {
        self.binaural_mix = mix;
        self
    }

    pub fn with_reflections_mix(mut self, mix: f32) -> Self {
        self.reflections_mix = mix;
        self
    }

    pub fn with_early_reflection_damping(mut self, damping: f32) -> Self {
        self.early_reflection_damping = damping;
        self
    }

    pub fn with_master_gain(mut self, gain: f32) -> Self {
        self.master_gain = gain;
        self
    }

    pub fn with_emission_offset(mut self, offset: f32) -> Self {
        self.emission_offset = offset;
        self
    }

    pub fn with_audibility_threshold(mut self, threshold: f32) -> Self {
        self.audibility_threshold = threshold;
        self
    }

    /// Length in seconds of the early-reflection damping ramp.
    pub fn with_early_reflection_window(mut self, window: f32) -> Self {
        self.early_reflection_window = window;
        self
    }

    pub fn with_min_capture_weight(mut self, weight: f32) -> Self {
        self.min_capture_weight = weight;
        self
    }

    /// Checks every knob against its documented range.
    ///
    /// # Errors
    ///
    /// Returns [`SonorayError::Configuration`] naming the first offending knob.
    pub fn validate(&self) -> Result<()> {
        fn check(ok: bool, what: &str) -> Result<()> {
            if ok {
                Ok(())
            } else {
                Err(SonorayError::Configuration(what.to_string()))
            }
        }

        check(
            (1..=Self::MAX_RAYS_PER_EMISSION).contains(&self.rays_per_emission),
            "rays_per_emission must be between 1 and 10000",
        )?;
        check(
            self.speed_of_sound > 0.0 && self.speed_of_sound <= Self::MAX_SPEED_OF_SOUND,
            "speed_of_sound must be in (0, 10000]",
        )?;
        check(
            self.max_bounces <= Self::MAX_BOUNCES,
            "max_bounces must not exceed 1000",
        )?;
        check(
            self.max_distance.is_finite() && self.max_distance > 0.0,
            "max_distance must be positive",
        )?;
        check(
            self.max_distance_without_reflection.is_finite()
                && self.max_distance_without_reflection > 0.0,
            "max_distance_without_reflection must be positive",
        )?;
        check(
            self.step_length.is_finite() && self.step_length > 0.0,
            "step_length must be positive",
        )?;
        check(
            self.emission_offset.is_finite() && self.emission_offset >= 0.0,
            "emission_offset must not be negative",
        )?;
        check(
            self.audibility_threshold > 0.0 && self.audibility_threshold < 1.0,
            "audibility_threshold must be in (0, 1)",
        )?;
        check(
            (0.0..=1.0).contains(&self.binaural_mix),
            "binaural_mix must be between 0.0 and 1.0",
        )?;
        check(
            self.reflections_mix.is_finite() && self.reflections_mix >= 0.0,
            "reflections_mix must not be negative",
        )?;
        check(
            (0.0..=1.0).contains(&self.early_reflection_damping),
            "early_reflection_damping must be between 0.0 and 1.0",
        )?;
        check(
            self.early_reflection_window.is_finite() && self.early_reflection_window >= 0.0,
            "early_reflection_window must not be negative",
        )?;
        check(
            self.master_gain.is_finite() && self.master_gain >= 0.0,
            "master_gain must not be negative",
        )?;
        check(
            (0.0..1.0).contains(&self.min_capture_weight),
            "min_capture_weight must be in [0, 1)",
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(AcousticConfig::default().validate().is_ok());
    }

    #[test]
    fn every_knob_has_a_setter() {
        let config = AcousticConfig::default()
            .with_emission_offset(0.25)
            .with_audibility_threshold(0.01)
            .with_early_reflection_window(0.05)
            .with_min_capture_weight(0.2);
        assert_eq!(config.emission_offset, 0.25);
        assert_eq!(config.audibility_threshold, 0.01);
        assert_eq!(config.early_reflection_window, 0.05);
        assert_eq!(config.min_capture_weight, 0.2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn out_of_range_knobs_are_rejected() {
        let bad = [
            AcousticConfig::default().with_rays_per_emission(0),
            AcousticConfig::default().with_rays_per_emission(10_001),
            AcousticConfig::default().with_speed_of_sound(0.0),
            AcousticConfig::default().with_binaural_mix(1.5),
            AcousticConfig::default().with_reflections_mix(-0.1),
            AcousticConfig::default().with_early_reflection_damping(f32::NAN),
            AcousticConfig::default().with_master_gain(f32::INFINITY),
            AcousticConfig::default().with_step_length(0.0),
            AcousticConfig::default().with_emission_offset(-0.5),
            AcousticConfig::default().with_audibility_threshold(1.0),
            AcousticConfig::default().with_early_reflection_window(f32::NAN),
            AcousticConfig::default().with_min_capture_weight(1.0),
        ];
        for config in bad {
            assert!(
                matches!(config.validate(), Err(SonorayError::Configuration(_))),
                "{config:?} should be rejected"
            );
        }
    }
}
