//! Impulse response accumulation and baking.

use crate::capture::{Ear, RayImpulseCapture};
use crate::config::{AcousticConfig, EngineDesc};
use crate::propagation::SoundId;

/// Identifies the impulse response of one event at one ear.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IrKey {
    pub sound: SoundId,
    pub ear: Ear,
}

impl IrKey {
    pub fn new(sound: SoundId, ear: Ear) -> Self {
        Self { sound, ear }
    }
}

/// Why [`IrBuilder::add`] refused a tap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TapRejection {
    /// The tap arrives after the impulse response cutoff
    OutOfRange,
    /// A field of the tap is NaN or infinite
    NonFinite,
}

/// Accumulates taps for one [`IrKey`] into a time-indexed buffer.
///
/// The gain knobs are copied from the [`AcousticConfig`] in force when the
/// builder was created and stay fixed for the whole event.
#[derive(Debug, Clone)]
pub struct IrBuilder {
    key: IrKey,
    sample_rate: u32,
    max_samples: usize,
    master_gain: f32,
    early_damping: f32,
    early_window: f32,
    taps: Vec<f32>,
    accepted: usize,
    dropped: usize,
}

impl IrBuilder {
    pub fn new(key: IrKey, config: &AcousticConfig, desc: &EngineDesc) -> Self {
        Self {
            key,
            sample_rate: desc.ir_sample_rate,
            max_samples: desc.max_ir_samples(),
            master_gain: config.master_gain,
            early_damping: config.early_reflection_damping,
            early_window: config.early_reflection_window,
            taps: Vec::new(),
            accepted: 0,
            dropped: 0,
        }
    }

    pub fn key(&self) -> &IrKey {
        &self.key
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Damping factor for a tap arriving at `time` seconds.
    ///
    /// Rises linearly from `1 - early_damping` at t = 0 to 1 at the end of the
    /// early-reflection window.
    pub fn early_damping_factor(&self, time: f32) -> f32 {
        if self.early_window <= 0.0 || time >= self.early_window {
            return 1.0;
        }
        let progress = (time / self.early_window).clamp(0.0, 1.0);
        1.0 - self.early_damping * (1.0 - progress)
    }

    /// Accumulates `weight × attenuation × master gain` (times the early
    /// damping factor) into the sample nearest to the tap's arrival time.
    ///
    /// # Errors
    ///
    /// Taps past the cutoff or with non-finite fields are dropped and
    /// counted; the builder is unchanged.
    pub fn add(&mut self, tap: &RayImpulseCapture) -> Result<usize, TapRejection> {
        if !tap.is_finite() || tap.time < 0.0 {
            self.dropped += 1;
            return Err(TapRejection::NonFinite);
        }
        let index = (tap.time as f64 * self.sample_rate as f64).round() as usize;
        if index >= self.max_samples {
            self.dropped += 1;
            return Err(TapRejection::OutOfRange);
        }

        let value = tap.amplitude() * self.master_gain * self.early_damping_factor(tap.time);
        if !value.is_finite() {
            self.dropped += 1;
            return Err(TapRejection::NonFinite);
        }
        if self.taps.len() <= index {
            self.taps.resize(index + 1, 0.0);
        }
        self.taps[index] += value;
        self.accepted += 1;
        Ok(index)
    }

    /// Raw accumulated values.
    pub fn taps(&self) -> &[f32] {
        &self.taps
    }

    pub fn len(&self) -> usize {
        self.taps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.taps.is_empty()
    }

    pub fn accepted(&self) -> usize {
        self.accepted
    }

    pub fn dropped(&self) -> usize {
        self.dropped
    }

    /// Finalizes the impulse response.
    ///
    /// If the peak magnitude exceeds 1 the whole response is scaled down so
    /// the peak becomes 1; quieter responses are left as they are. Samples are
    /// then quantized to 16 bits. An empty builder bakes to an empty response.
    pub fn bake(self) -> BakedIr {
        let peak = self.taps.iter().fold(0.0f32, |peak, s| peak.max(s.abs()));
        let scale = if peak > 1.0 { 1.0 / peak } else { 1.0 };
        let samples = self
            .taps
            .iter()
            .map(|s| ((s * scale).clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16)
            .collect();
        BakedIr {
            key: self.key,
            sample_rate: self.sample_rate,
            samples,
        }
    }
}

/// A finished, quantized impulse response.
#[derive(Debug, Clone, PartialEq)]
pub struct BakedIr {
    pub key: IrKey,
    pub sample_rate: u32,
    pub samples: Vec<i16>,
}

impl BakedIr {
    /// True when no audible reflections were captured.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Samples scaled back to [-1, 1].
    pub fn to_f32(&self) -> Vec<f32> {
        self.samples
            .iter()
            .map(|&s| s as f32 / i16::MAX as f32)
            .collect()
    }
}
