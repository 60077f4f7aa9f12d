//! Scene description consumed by the acoustic core: materials and the
//! occlusion queries that stand in for world geometry.

mod material;
mod occlusion;
mod room;
mod voxel;

pub use material::{AcousticMaterial, MaterialAbsorptionTable, MaterialId};
pub use occlusion::{OcclusionQuery, OpenField, SegmentHit, SurfaceHit};
pub use room::{Aabb, Face, ShoeboxRoom};
pub use voxel::VoxelWorld;
