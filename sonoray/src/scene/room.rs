//! Analytic shoebox room: an axis-aligned box of air surrounded by solid
//! walls, optionally furnished with solid axis-aligned blocks.

use super::{MaterialId, OcclusionQuery, SegmentHit};
use crate::math::Vec3;

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    /// Builds a box from two opposite corners in any order.
    pub fn new(a: Vec3, b: Vec3) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    pub fn contains(&self, p: Vec3) -> bool {
        p.cmpge(self.min).all() && p.cmple(self.max).all()
    }

    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    /// Slab test for a segment entering the box from outside.
    ///
    /// Returns the segment parameter in [0, 1] and the outward normal of the
    /// entered face. Segments that start inside the box report nothing.
    fn entry(&self, start: Vec3, end: Vec3) -> Option<(f32, Vec3)> {
        let delta = end - start;
        let mut t_enter = f32::NEG_INFINITY;
        let mut t_exit = f32::INFINITY;
        let mut normal = Vec3::ZERO;

        for axis in 0..3 {
            let (s, d) = (start[axis], delta[axis]);
            if d.abs() < f32::EPSILON {
                if s < self.min[axis] || s > self.max[axis] {
                    return None;
                }
                continue;
            }
            let t0 = (self.min[axis] - s) / d;
            let t1 = (self.max[axis] - s) / d;
            let (near, far) = if t0 < t1 { (t0, t1) } else { (t1, t0) };
            if near > t_enter {
                t_enter = near;
                normal = Vec3::ZERO;
                normal[axis] = -d.signum();
            }
            t_exit = t_exit.min(far);
        }

        if t_enter < 0.0 || t_enter > t_exit || t_enter > 1.0 {
            return None;
        }
        Some((t_enter, normal))
    }
}

/// Face of a [`ShoeboxRoom`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Face {
    NegX,
    PosX,
    Floor,
    Ceiling,
    NegZ,
    PosZ,
}

impl Face {
    pub const ALL: [Face; 6] = [
        Face::NegX,
        Face::PosX,
        Face::Floor,
        Face::Ceiling,
        Face::NegZ,
        Face::PosZ,
    ];

    fn index(self) -> usize {
        self as usize
    }

    /// Normal pointing into the room.
    pub fn inward_normal(self) -> Vec3 {
        match self {
            Face::NegX => Vec3::X,
            Face::PosX => -Vec3::X,
            Face::Floor => Vec3::Y,
            Face::Ceiling => -Vec3::Y,
            Face::NegZ => Vec3::Z,
            Face::PosZ => -Vec3::Z,
        }
    }
}

/// A closed rectangular room with one material per face.
///
/// Everything outside `interior` is solid. Segments that start outside the
/// interior are treated as starting in solid matter and report no hit.
///
/// # Example
///
/// ```
/// use sonoray::math::Vec3;
/// use sonoray::scene::{MaterialId, OcclusionQuery, ShoeboxRoom};
///
/// let room = ShoeboxRoom::new(Vec3::ZERO, Vec3::new(10.0, 3.0, 8.0), MaterialId(2));
/// let hit = room.query(Vec3::new(5.0, 1.5, 4.0), Vec3::new(12.0, 1.5, 4.0));
/// let point = hit.surface().unwrap().point;
/// assert!((point - Vec3::new(10.0, 1.5, 4.0)).length() < 1e-4);
/// ```
#[derive(Debug, Clone)]
pub struct ShoeboxRoom {
    interior: Aabb,
    face_materials: [MaterialId; 6],
    obstacles: Vec<(Aabb, MaterialId)>,
}

impl ShoeboxRoom {
    pub fn new(min: Vec3, max: Vec3, material: MaterialId) -> Self {
        Self {
            interior: Aabb::new(min, max),
            face_materials: [material; 6],
            obstacles: Vec::new(),
        }
    }

    pub fn with_face_material(mut self, face: Face, material: MaterialId) -> Self {
        self.face_materials[face.index()] = material;
        self
    }

    /// Adds a solid block inside the room.
    pub fn with_obstacle(mut self, block: Aabb, material: MaterialId) -> Self {
        self.obstacles.push((block, material));
        self
    }

    pub fn interior(&self) -> &Aabb {
        &self.interior
    }

    pub fn face_material(&self, face: Face) -> MaterialId {
        self.face_materials[face.index()]
    }

    fn wall_exit(&self, start: Vec3, end: Vec3) -> Option<(f32, Face)> {
        let delta = end - start;
        let mut best: Option<(f32, Face)> = None;
        let mut consider = |t: f32, face: Face| {
            if (0.0..=1.0).contains(&t) && best.is_none_or(|(b, _)| t < b) {
                best = Some((t, face));
            }
        };

        let faces = [
            (Face::NegX, Face::PosX),
            (Face::Floor, Face::Ceiling),
            (Face::NegZ, Face::PosZ),
        ];
        for (axis, (neg, pos)) in faces.into_iter().enumerate() {
            let d = delta[axis];
            if d > 0.0 && end[axis] > self.interior.max[axis] {
                consider((self.interior.max[axis] - start[axis]) / d, pos);
            } else if d < 0.0 && end[axis] < self.interior.min[axis] {
                consider((self.interior.min[axis] - start[axis]) / d, neg);
            }
        }
        best
    }
}

impl OcclusionQuery for ShoeboxRoom {
    fn query(&self, start: Vec3, end: Vec3) -> SegmentHit {
        if !self.interior.contains(start) {
            return SegmentHit::Miss;
        }

        let mut nearest: Option<(f32, Vec3, MaterialId)> = self
            .wall_exit(start, end)
            .map(|(t, face)| (t, face.inward_normal(), self.face_material(face)));

        for (block, material) in &self.obstacles {
            if let Some((t, normal)) = block.entry(start, end) {
                if nearest.is_none_or(|(best, _, _)| t < best) {
                    nearest = Some((t, normal, *material));
                }
            }
        }

        match nearest {
            Some((t, normal, material)) => {
                SegmentHit::hit(start + (end - start) * t, normal, material)
            }
            None => SegmentHit::Miss,
        }
    }
}
