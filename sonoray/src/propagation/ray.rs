use crate::capture::Ear;
use crate::math::Vec3;
use crate::scene::MaterialId;
use std::fmt;
use std::sync::Arc;

/// Identifier of the sound that started an acoustic event.
///
/// Taps, impulse responses and rendered buffers are all grouped by this key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SoundId(Arc<str>);

impl SoundId {
    pub fn new(id: impl Into<Arc<str>>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SoundId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SoundId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for SoundId {
    fn from(id: String) -> Self {
        Self::new(id)
    }
}

/// Whether a path point is an ordinary waypoint or a specular bounce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BounceStatus {
    Straight,
    Reflection,
}

/// One vertex of a ray's path.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathPoint {
    pub position: Vec3,
    pub status: BounceStatus,
    /// Surface normal; zero unless `status` is [`BounceStatus::Reflection`]
    pub normal: Vec3,
    /// Material struck at a reflection vertex
    pub material: Option<MaterialId>,
    /// Distance travelled from the sound source to this point
    pub distance: f32,
}

impl PathPoint {
    pub fn straight(position: Vec3, distance: f32) -> Self {
        Self {
            position,
            status: BounceStatus::Straight,
            normal: Vec3::ZERO,
            material: None,
            distance,
        }
    }

    pub fn reflection(position: Vec3, normal: Vec3, material: MaterialId, distance: f32) -> Self {
        Self {
            position,
            status: BounceStatus::Reflection,
            normal,
            material: Some(material),
            distance,
        }
    }

    pub fn is_reflection(&self) -> bool {
        self.status == BounceStatus::Reflection
    }
}

/// Why a ray stopped producing path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    MaxDistance,
    MaxBounces,
    NoReflectionCeiling,
    /// Energy fell below the audibility threshold
    Inaudible,
    /// Zero-length or non-finite direction
    Degenerate,
}

/// A single traced path from a sound source.
///
/// Rays are built by [`super::RayManager`] at emission, filled in once by
/// [`super::PathTracer`] and then only read, apart from the capture
/// bookkeeping that keeps one tap per bounce level and ear.
#[derive(Debug, Clone)]
pub struct AcousticRay {
    sound: SoundId,
    source: Vec3,
    origin: Vec3,
    direction: Vec3,
    max_bounces: u32,
    max_distance: f32,
    max_distance_without_reflection: f32,
    energy: f32,
    bounces: u32,
    path: Vec<PathPoint>,
    termination: Option<Termination>,
    max_audible_distance: f32,
    captured_levels: Vec<(u32, Ear)>,
    emitted_tick: u64,
    expire_tick: u64,
}

impl AcousticRay {
    /// Creates an untraced ray.
    ///
    /// # Arguments
    ///
    /// * `sound` - Event this ray belongs to
    /// * `source` - Position of the sound source
    /// * `direction` - Initial direction; normalized here
    /// * `emission_offset` - Distance from `source` at which the ray starts
    pub fn new(sound: SoundId, source: Vec3, direction: Vec3, emission_offset: f32) -> Self {
        let direction = direction.normalize_or_zero();
        Self {
            sound,
            source,
            origin: source + direction * emission_offset,
            direction,
            max_bounces: 0,
            max_distance: f32::INFINITY,
            max_distance_without_reflection: f32::INFINITY,
            energy: 1.0,
            bounces: 0,
            path: Vec::new(),
            termination: None,
            max_audible_distance: f32::INFINITY,
            captured_levels: Vec::new(),
            emitted_tick: 0,
            expire_tick: 0,
        }
    }

    pub fn with_limits(
        mut self,
        max_bounces: u32,
        max_distance: f32,
        max_distance_without_reflection: f32,
    ) -> Self {
        self.max_bounces = max_bounces;
        self.max_distance = max_distance;
        self.max_distance_without_reflection = max_distance_without_reflection;
        self
    }

    pub fn with_lifetime(mut self, emitted_tick: u64, lifetime_ticks: u64) -> Self {
        self.emitted_tick = emitted_tick;
        self.expire_tick = emitted_tick.saturating_add(lifetime_ticks);
        self
    }

    pub fn sound(&self) -> &SoundId {
        &self.sound
    }

    pub fn source(&self) -> Vec3 {
        self.source
    }

    pub fn origin(&self) -> Vec3 {
        self.origin
    }

    pub fn direction(&self) -> Vec3 {
        self.direction
    }

    pub fn max_bounces(&self) -> u32 {
        self.max_bounces
    }

    pub fn max_distance(&self) -> f32 {
        self.max_distance
    }

    pub fn max_distance_without_reflection(&self) -> f32 {
        self.max_distance_without_reflection
    }

    /// Product of `(1 - absorption)` over every bounce so far.
    pub fn energy(&self) -> f32 {
        self.energy
    }

    pub fn bounces(&self) -> u32 {
        self.bounces
    }

    pub fn path(&self) -> &[PathPoint] {
        &self.path
    }

    pub fn is_traced(&self) -> bool {
        self.termination.is_some()
    }

    pub fn termination(&self) -> Option<Termination> {
        self.termination
    }

    /// Distance travelled up to the last path point.
    pub fn total_distance(&self) -> f32 {
        self.path.last().map_or(0.0, |p| p.distance)
    }

    /// Distance after which the ray no longer contributes. Infinite until the
    /// ray is frozen.
    pub fn max_audible_distance(&self) -> f32 {
        self.max_audible_distance
    }

    pub fn is_frozen(&self) -> bool {
        self.max_audible_distance.is_finite()
    }

    /// Records the audible limit. The limit can only shrink.
    pub fn shorten_audible_distance(&mut self, distance: f32) {
        if distance < self.max_audible_distance {
            self.max_audible_distance = distance;
        }
    }

    pub fn emitted_tick(&self) -> u64 {
        self.emitted_tick
    }

    pub fn is_expired(&self, tick: u64) -> bool {
        tick >= self.expire_tick
    }

    /// Claims the capture slot for `level` and `ear`.
    ///
    /// Returns false if a tap was already taken at that level for that ear.
    pub fn try_mark_captured(&mut self, level: u32, ear: Ear) -> bool {
        if self.captured_levels.contains(&(level, ear)) {
            return false;
        }
        self.captured_levels.push((level, ear));
        true
    }

    pub fn captured_levels(&self) -> &[(u32, Ear)] {
        &self.captured_levels
    }

    pub(crate) fn push_point(&mut self, point: PathPoint) {
        if point.is_reflection() {
            self.bounces += 1;
        }
        self.path.push(point);
    }

    pub(crate) fn attenuate(&mut self, reflectance: f32) {
        self.energy *= reflectance;
    }

    pub(crate) fn finish(&mut self, termination: Termination) {
        self.termination = Some(termination);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emission_offsets_the_origin() {
        let ray = AcousticRay::new("a".into(), Vec3::ZERO, Vec3::new(0.0, 2.0, 0.0), 0.1);
        assert_eq!(ray.direction(), Vec3::Y);
        assert!((ray.origin() - Vec3::new(0.0, 0.1, 0.0)).length() < 1e-6);
        assert!(!ray.is_traced());
    }

    #[test]
    fn audible_distance_only_shrinks() {
        let mut ray = AcousticRay::new("a".into(), Vec3::ZERO, Vec3::X, 0.0);
        assert!(!ray.is_frozen());
        ray.shorten_audible_distance(50.0);
        ray.shorten_audible_distance(80.0);
        assert_eq!(ray.max_audible_distance(), 50.0);
        ray.shorten_audible_distance(20.0);
        assert_eq!(ray.max_audible_distance(), 20.0);
    }

    #[test]
    fn one_capture_per_level_and_ear() {
        let mut ray = AcousticRay::new("a".into(), Vec3::ZERO, Vec3::X, 0.0);
        assert!(ray.try_mark_captured(2, Ear::Left));
        assert!(!ray.try_mark_captured(2, Ear::Left));
        assert!(ray.try_mark_captured(2, Ear::Right));
        assert!(ray.try_mark_captured(3, Ear::Left));
        assert_eq!(ray.captured_levels().len(), 3);
    }

    #[test]
    fn lifetime_expiry() {
        let ray = AcousticRay::new("a".into(), Vec3::ZERO, Vec3::X, 0.0).with_lifetime(10, 2);
        assert!(!ray.is_expired(11));
        assert!(ray.is_expired(12));
    }
}
