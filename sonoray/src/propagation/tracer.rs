use super::{AcousticRay, PathPoint, Termination};
use crate::config::AcousticConfig;
use crate::math::{distance_attenuation, reflect};
use crate::scene::{MaterialAbsorptionTable, OcclusionQuery, SegmentHit};

/// Queries restart this far along the ray after touching a surface so the
/// surface just left is not reported again.
const SURFACE_EPSILON: f32 = 1e-4;

/// Hits with `|d·n|` below this are tangent to the surface and pass through.
pub const GRAZING_COSINE: f32 = 1e-3;

/// Marches rays through a world, reflecting them specularly and freezing them
/// once they become inaudible.
pub struct PathTracer<'a> {
    config: &'a AcousticConfig,
    materials: &'a MaterialAbsorptionTable,
    world: &'a dyn OcclusionQuery,
}

impl<'a> PathTracer<'a> {
    pub fn new(
        config: &'a AcousticConfig,
        materials: &'a MaterialAbsorptionTable,
        world: &'a dyn OcclusionQuery,
    ) -> Self {
        Self {
            config,
            materials,
            world,
        }
    }

    /// Fills in the path of an untraced ray. Already traced rays are left
    /// untouched.
    ///
    /// The path starts at the ray origin and ends at the point where the ray
    /// stopped; reflection vertices carry the struck normal and material.
    /// Termination happens when the distance budget runs out, when another
    /// bounce would exceed the bounce budget, when the ray travels too far
    /// without reflecting, or when `energy / max(1, distance)` drops below the
    /// audibility threshold.
    pub fn trace(&self, ray: &mut AcousticRay) {
        if ray.is_traced() {
            return;
        }

        let mut position = ray.origin();
        let mut direction = ray.direction();
        let mut travelled = ray.source().distance(position);
        ray.push_point(PathPoint::straight(position, travelled));

        if !direction.is_finite() || direction.length_squared() < 0.5 || !position.is_finite() {
            ray.finish(Termination::Degenerate);
            return;
        }

        let threshold = self.config.audibility_threshold;
        let mut since_reflection = 0.0f32;

        let termination = loop {
            let remaining = ray.max_distance() - travelled;
            if remaining <= 0.0 {
                break Termination::MaxDistance;
            }
            let remaining_free = ray.max_distance_without_reflection() - since_reflection;
            if remaining_free <= 0.0 {
                break Termination::NoReflectionCeiling;
            }
            if ray.energy() * distance_attenuation(travelled) < threshold {
                ray.shorten_audible_distance(travelled);
                break Termination::Inaudible;
            }

            let step = self.config.step_length.min(remaining).min(remaining_free);
            let query_start = position + direction * SURFACE_EPSILON.min(step * 0.5);
            let query_end = position + direction * step;

            let surface = match self.world.query(query_start, query_end) {
                SegmentHit::Miss => {
                    position = query_end;
                    travelled += step;
                    since_reflection += step;
                    continue;
                }
                SegmentHit::Hit(surface) => surface,
            };

            let leg = position.distance(surface.point).min(step);
            position = surface.point;
            travelled += leg;
            since_reflection += leg;

            let normal = surface.normal.normalize_or_zero();
            if direction.dot(normal).abs() < GRAZING_COSINE {
                // Skim past the surface instead of bouncing off it.
                let skip = (step - leg)
                    .max(SURFACE_EPSILON * 10.0)
                    .min(ray.max_distance() - travelled)
                    .max(0.0);
                ray.push_point(PathPoint::straight(position, travelled));
                position += direction * skip;
                travelled += skip;
                since_reflection += skip;
                continue;
            }

            if ray.bounces() >= ray.max_bounces() {
                ray.push_point(PathPoint::straight(position, travelled));
                ray.finish(Termination::MaxBounces);
                return;
            }

            ray.attenuate(1.0 - self.materials.absorption(surface.material));
            ray.push_point(PathPoint::reflection(
                position,
                normal,
                surface.material,
                travelled,
            ));

            if ray.energy() * distance_attenuation(travelled) < threshold {
                ray.shorten_audible_distance(travelled);
                ray.finish(Termination::Inaudible);
                return;
            }

            direction = reflect(direction, normal).normalize_or_zero();
            since_reflection = 0.0;
        };

        ray.push_point(PathPoint::straight(position, travelled));
        ray.finish(termination);
    }
}
