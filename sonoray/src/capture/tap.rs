use super::Ear;
use crate::math::Vec3;
use crate::propagation::SoundId;

/// One energy contribution arriving at one ear at one time offset.
#[derive(Debug, Clone, PartialEq)]
pub struct RayImpulseCapture {
    pub sound: SoundId,
    pub source_position: Vec3,
    /// Total path length from source to ear
    pub distance: f32,
    /// Ear position the path ended at
    pub listener_position: Vec3,
    /// Arrival time in seconds after emission
    pub time: f32,
    /// Reflection order; 0 for the direct path
    pub bounce: u32,
    /// Distance, material and mix attenuation combined
    pub attenuation: f32,
    pub ear: Ear,
    /// Panning weight for `ear`
    pub weight: f32,
}

impl RayImpulseCapture {
    /// Amplitude this tap contributes before master gain and damping.
    pub fn amplitude(&self) -> f32 {
        self.weight * self.attenuation
    }

    pub fn is_direct(&self) -> bool {
        self.bounce == 0
    }

    /// False if any numeric field is NaN or infinite.
    pub fn is_finite(&self) -> bool {
        self.time.is_finite()
            && self.attenuation.is_finite()
            && self.weight.is_finite()
            && self.distance.is_finite()
    }
}
