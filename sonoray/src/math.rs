//! Math types for Sonoray

pub use glam::{Quat, Vec3};
use rand::Rng;

/// Position and orientation of a listener's head.
///
/// The forward axis is `-Z` and the up axis is `+Y` in the pose's local frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    pub position: Vec3,
    pub rotation: Quat,
}

impl Pose {
    pub fn new(position: Vec3, rotation: Quat) -> Self {
        Self { position, rotation }
    }

    pub fn identity() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
        }
    }

    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            rotation: Quat::IDENTITY,
        }
    }

    pub fn forward(&self) -> Vec3 {
        self.rotation * (-Vec3::Z)
    }

    pub fn up(&self) -> Vec3 {
        self.rotation * Vec3::Y
    }

    pub fn right(&self) -> Vec3 {
        self.rotation * Vec3::X
    }

    /// Turns the pose so that it faces `target`. A zero-length direction leaves
    /// the rotation untouched.
    pub fn look_at(&mut self, target: Vec3) {
        if let Some(forward) = (target - self.position).try_normalize() {
            self.rotation = Quat::from_rotation_arc(-Vec3::Z, forward);
        }
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self::identity()
    }
}

/// Draws a direction uniformly distributed over the unit sphere.
///
/// Uses the inverse-transform method: the azimuth is `U * 2π` and the polar
/// angle is `acos(2U - 1)`.
pub fn random_unit_vector<R: Rng + ?Sized>(rng: &mut R) -> Vec3 {
    let theta = rng.random::<f32>() * std::f32::consts::TAU;
    let phi = (2.0 * rng.random::<f32>() - 1.0).clamp(-1.0, 1.0).acos();
    let (sin_phi, cos_phi) = phi.sin_cos();
    let (sin_theta, cos_theta) = theta.sin_cos();
    Vec3::new(sin_phi * cos_theta, cos_phi, sin_phi * sin_theta)
}

/// Mirrors `direction` about the plane with the given unit `normal`.
#[inline]
pub fn reflect(direction: Vec3, normal: Vec3) -> Vec3 {
    direction - 2.0 * direction.dot(normal) * normal
}

/// Inverse-distance attenuation with a floor of one unit.
#[inline]
pub fn distance_attenuation(distance: f32) -> f32 {
    1.0 / distance.max(1.0)
}
