//! Dense voxel grid world.

use super::{MaterialId, OcclusionQuery, SegmentHit};
use crate::math::Vec3;
use glam::IVec3;

/// A block world made of unit cubes.
///
/// A cube is identified by the integer coordinates of its most negative
/// corner. Cubes outside the grid bounds are air.
#[derive(Debug, Clone)]
pub struct VoxelWorld {
    origin: IVec3,
    size: IVec3,
    cells: Vec<Option<MaterialId>>,
}

impl VoxelWorld {
    /// Creates an all-air grid covering `origin .. origin + size`.
    pub fn new(origin: IVec3, size: IVec3) -> Self {
        let size = size.max(IVec3::ZERO);
        let len = (size.x as usize) * (size.y as usize) * (size.z as usize);
        Self {
            origin,
            size,
            cells: vec![None; len],
        }
    }

    fn index(&self, cube: IVec3) -> Option<usize> {
        let local = cube - self.origin;
        if local.cmplt(IVec3::ZERO).any() || local.cmpge(self.size).any() {
            return None;
        }
        let (x, y, z) = (local.x as usize, local.y as usize, local.z as usize);
        Some((z * self.size.y as usize + y) * self.size.x as usize + x)
    }

    pub fn get(&self, cube: IVec3) -> Option<MaterialId> {
        self.index(cube).and_then(|i| self.cells[i])
    }

    /// Sets one cube. Returns false when the cube lies outside the grid.
    pub fn set(&mut self, cube: IVec3, material: Option<MaterialId>) -> bool {
        match self.index(cube) {
            Some(i) => {
                self.cells[i] = material;
                true
            }
            None => false,
        }
    }

    /// Fills every cube in the inclusive range `min..=max`.
    pub fn fill(&mut self, min: IVec3, max: IVec3, material: Option<MaterialId>) {
        for z in min.z..=max.z {
            for y in min.y..=max.y {
                for x in min.x..=max.x {
                    self.set(IVec3::new(x, y, z), material);
                }
            }
        }
    }

    /// Builds a one-cube-thick shell around the inclusive range `min..=max`,
    /// leaving the inside empty.
    pub fn hollow_box(&mut self, min: IVec3, max: IVec3, material: MaterialId) {
        self.fill(min, max, Some(material));
        self.fill(min + IVec3::ONE, max - IVec3::ONE, None);
    }

    pub fn solid_count(&self) -> usize {
        self.cells.iter().filter(|c| c.is_some()).count()
    }
}

impl OcclusionQuery for VoxelWorld {
    // Amanatides & Woo, "A Fast Voxel Traversal Algorithm for Ray Tracing" (1987).
    // The cube containing `start` is never reported.
    fn query(&self, start: Vec3, end: Vec3) -> SegmentHit {
        let delta = end - start;
        let length = delta.length();
        if !length.is_finite() || length <= 0.0 {
            return SegmentHit::Miss;
        }
        let direction = delta / length;

        let mut cube = start.floor().as_ivec3();
        let mut step = IVec3::ZERO;
        let mut t_max = Vec3::splat(f32::INFINITY);
        let mut t_delta = Vec3::splat(f32::INFINITY);
        for axis in 0..3 {
            let d = direction[axis];
            if d > 0.0 {
                step[axis] = 1;
                t_delta[axis] = 1.0 / d;
                t_max[axis] = (cube[axis] as f32 + 1.0 - start[axis]) / d;
            } else if d < 0.0 {
                step[axis] = -1;
                t_delta[axis] = -1.0 / d;
                t_max[axis] = (start[axis] - cube[axis] as f32) / -d;
            }
        }

        loop {
            let axis = if t_max.x < t_max.y {
                if t_max.x < t_max.z { 0 } else { 2 }
            } else if t_max.y < t_max.z {
                1
            } else {
                2
            };

            let t = t_max[axis];
            if t > length {
                return SegmentHit::Miss;
            }
            cube[axis] += step[axis];
            t_max[axis] += t_delta[axis];

            if let Some(material) = self.get(cube) {
                let mut normal = Vec3::ZERO;
                normal[axis] = -(step[axis] as f32);
                return SegmentHit::hit(start + direction * t, normal, material);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn walled_room() -> VoxelWorld {
        let mut world = VoxelWorld::new(IVec3::splat(-1), IVec3::splat(12));
        world.hollow_box(IVec3::splat(-1), IVec3::splat(10), MaterialId(4));
        world
    }

    #[test]
    fn hollow_box_is_a_shell() {
        let world = walled_room();
        assert_eq!(world.get(IVec3::new(-1, 5, 5)), Some(MaterialId(4)));
        assert_eq!(world.get(IVec3::new(5, 5, 5)), None);
        assert_eq!(world.solid_count(), 12 * 12 * 12 - 10 * 10 * 10);
    }

    #[test]
    fn traversal_reports_the_entered_face() {
        let world = walled_room();
        let hit = world.query(Vec3::new(5.5, 5.5, 5.5), Vec3::new(20.5, 5.5, 5.5));
        let surface = hit.surface().copied().unwrap();
        assert!((surface.point - Vec3::new(10.0, 5.5, 5.5)).length() < 1e-4);
        assert_eq!(surface.normal, -Vec3::X);
        assert_eq!(surface.material, MaterialId(4));
    }

    #[test]
    fn diagonal_traversal_hits_the_floor() {
        let world = walled_room();
        let hit = world.query(Vec3::new(2.5, 4.5, 2.5), Vec3::new(6.5, -1.5, 3.5));
        let surface = hit.surface().copied().unwrap();
        assert!((surface.point.y - 0.0).abs() < 1e-4, "{surface:?}");
        assert_eq!(surface.normal, Vec3::Y);
    }

    #[test]
    fn short_segments_miss() {
        let world = walled_room();
        assert!(world.is_clear(Vec3::new(1.5, 1.5, 1.5), Vec3::new(8.5, 8.5, 8.5)));
    }

    #[test]
    fn starting_on_a_face_looks_away_from_it() {
        let world = walled_room();
        // A reflection vertex lies exactly on the wall surface.
        assert!(world.is_clear(Vec3::new(10.0, 5.5, 5.5), Vec3::new(2.0, 5.5, 5.5)));
    }

    #[test]
    fn out_of_bounds_writes_are_ignored() {
        let mut world = VoxelWorld::new(IVec3::ZERO, IVec3::splat(2));
        assert!(!world.set(IVec3::splat(5), Some(MaterialId(1))));
        assert!(world.set(IVec3::ONE, Some(MaterialId(1))));
        assert_eq!(world.solid_count(), 1);
    }
}
