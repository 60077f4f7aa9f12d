//! Occlusion query interface between the acoustic core and the host's world.
//!
//! The core never inspects geometry directly. Everything it needs to know
//! about solid matter comes from asking whether a straight segment is blocked.

use super::MaterialId;
use crate::math::Vec3;

/// First solid surface struck along a segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceHit {
    /// Point where the segment enters solid matter
    pub point: Vec3,
    /// Unit normal of the struck face
    pub normal: Vec3,
    /// Material of the struck surface
    pub material: MaterialId,
}

/// Result of an occlusion query.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum SegmentHit {
    #[default]
    Miss,
    Hit(SurfaceHit),
}

impl SegmentHit {
    pub fn hit(point: Vec3, normal: Vec3, material: MaterialId) -> Self {
        Self::Hit(SurfaceHit {
            point,
            normal,
            material,
        })
    }

    pub fn is_miss(&self) -> bool {
        matches!(self, Self::Miss)
    }

    pub fn surface(&self) -> Option<&SurfaceHit> {
        match self {
            Self::Hit(surface) => Some(surface),
            Self::Miss => None,
        }
    }
}

/// Trait for answering segment-versus-world queries.
///
/// Implement this to plug a voxel grid, BVH or GPU tracer into the engine.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`. The engine only calls them from the
/// thread running [`crate::AcousticEngine::tick`], but the world handle is
/// shared through an `Arc` and may be swapped from elsewhere between ticks.
/// The answers must not change while a tick is running.
///
/// # Example
///
/// ```
/// use sonoray::math::Vec3;
/// use sonoray::scene::{MaterialId, OcclusionQuery, SegmentHit};
///
/// /// An infinite floor at y = 0.
/// struct Floor;
///
/// impl OcclusionQuery for Floor {
///     fn query(&self, start: Vec3, end: Vec3) -> SegmentHit {
///         if start.y > 0.0 && end.y <= 0.0 {
///             let t = start.y / (start.y - end.y);
///             SegmentHit::hit(start.lerp(end, t), Vec3::Y, MaterialId(0))
///         } else {
///             SegmentHit::Miss
///         }
///     }
/// }
///
/// assert!(Floor.is_clear(Vec3::new(0.0, 1.0, 0.0), Vec3::new(3.0, 2.0, 0.0)));
/// ```
pub trait OcclusionQuery: Send + Sync {
    /// Tests the segment from `start` to `end` against solid geometry.
    ///
    /// # Returns
    ///
    /// The surface closest to `start` that the segment enters, or
    /// [`SegmentHit::Miss`]. A segment that begins inside solid matter need
    /// not report the surface it starts in.
    fn query(&self, start: Vec3, end: Vec3) -> SegmentHit;

    /// True when nothing solid lies between `from` and `to`.
    fn is_clear(&self, from: Vec3, to: Vec3) -> bool {
        self.query(from, to).is_miss()
    }
}

impl<T: OcclusionQuery + ?Sized> OcclusionQuery for std::sync::Arc<T> {
    fn query(&self, start: Vec3, end: Vec3) -> SegmentHit {
        (**self).query(start, end)
    }

    fn is_clear(&self, from: Vec3, to: Vec3) -> bool {
        (**self).is_clear(from, to)
    }
}

/// A world with no solid matter at all.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenField;

impl OcclusionQuery for OpenField {
    fn query(&self, _start: Vec3, _end: Vec3) -> SegmentHit {
        SegmentHit::Miss
    }
}
