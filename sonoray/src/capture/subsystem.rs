use super::{Ear, Listener, RayImpulseCapture};
use crate::config::AcousticConfig;
use crate::math::{Vec3, distance_attenuation};
use crate::propagation::{AcousticRay, SoundId};
use crate::scene::{MaterialAbsorptionTable, OcclusionQuery};
use std::collections::HashSet;

/// Line-of-sight checks start this far off a reflecting surface.
const VERTEX_LIFT: f32 = 1e-3;

/// Everything a capture pass reads.
pub struct CaptureContext<'a> {
    pub listener: &'a Listener,
    pub world: &'a dyn OcclusionQuery,
    pub materials: &'a MaterialAbsorptionTable,
    pub config: &'a AcousticConfig,
}

/// Turns traced rays into impulse taps for the listener.
///
/// The only state kept across rays is the set of events whose direct path has
/// already been captured for each ear; see [`Self::clear_direct`].
#[derive(Debug, Default)]
pub struct CaptureSubsystem {
    direct_emitted: HashSet<(SoundId, Ear)>,
}

impl CaptureSubsystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Produces the taps a traced ray delivers to the listener.
    ///
    /// The direct path is taken from the true source position and is
    /// captured at most once per event and ear. Every reflection vertex with
    /// a clear line of sight to an ear yields one tap for that ear, at most
    /// one per reflection order, until the ray's energy drops below the
    /// audibility threshold or the ray's audible distance is reached.
    ///
    /// Untraced and degenerate rays yield nothing.
    pub fn capture(
        &mut self,
        ray: &mut AcousticRay,
        ctx: &CaptureContext<'_>,
    ) -> Vec<RayImpulseCapture> {
        let mut taps = Vec::new();
        if ray.path().len() < 2 || ray.total_distance() <= 0.0 {
            return taps;
        }

        self.capture_direct(ray, ctx, &mut taps);
        capture_reflections(ray, ctx, &mut taps);
        taps
    }

    fn capture_direct(
        &mut self,
        ray: &mut AcousticRay,
        ctx: &CaptureContext<'_>,
        taps: &mut Vec<RayImpulseCapture>,
    ) {
        let source = ray.source();
        for (ear, ear_position) in ctx.listener.ears() {
            let key = (ray.sound().clone(), ear);
            if self.direct_emitted.contains(&key) {
                continue;
            }
            let distance = source.distance(ear_position);
            if !distance.is_finite() || distance <= f32::EPSILON {
                continue;
            }
            if !ctx.world.is_clear(source, ear_position) {
                continue;
            }
            let weight = ctx
                .listener
                .weight(ear, source, ctx.config.binaural_mix);
            if weight < ctx.config.min_capture_weight {
                continue;
            }
            let tap = RayImpulseCapture {
                sound: ray.sound().clone(),
                source_position: source,
                distance,
                listener_position: ear_position,
                time: distance / ctx.config.speed_of_sound,
                bounce: 0,
                attenuation: distance_attenuation(distance),
                ear,
                weight,
            };
            if !tap.is_finite() || !ray.try_mark_captured(0, ear) {
                continue;
            }

            self.direct_emitted.insert(key);
            taps.push(tap);
        }
    }

    pub fn direct_emitted(&self, sound: &SoundId, ear: Ear) -> bool {
        self.direct_emitted.contains(&(sound.clone(), ear))
    }

    /// Forgets that the direct path of `sound` was captured, so the next
    /// emission of the same sound is treated as a new event.
    pub fn clear_direct(&mut self, sound: &SoundId) {
        self.direct_emitted.retain(|(s, _)| s != sound);
    }
}

fn capture_reflections(
    ray: &mut AcousticRay,
    ctx: &CaptureContext<'_>,
    taps: &mut Vec<RayImpulseCapture>,
) {
    let config = ctx.config;
    let vertices: Vec<_> = ray
        .path()
        .iter()
        .filter(|p| p.is_reflection())
        .copied()
        .collect();

    let mut reflection_attenuation = 1.0f32;
    for (level, vertex) in (1u32..).zip(vertices) {
        if vertex.distance >= ray.max_audible_distance() {
            break;
        }
        let absorption = vertex
            .material
            .map_or(ctx.materials.default_material().absorption, |m| {
                ctx.materials.absorption(m)
            });
        reflection_attenuation *= 1.0 - absorption;
        if reflection_attenuation * distance_attenuation(vertex.distance)
            < config.audibility_threshold
        {
            break;
        }

        let lifted: Vec3 = vertex.position + vertex.normal * VERTEX_LIFT;
        for (ear, ear_position) in ctx.listener.ears() {
            if !ctx.world.is_clear(lifted, ear_position) {
                continue;
            }
            let weight = ctx
                .listener
                .weight(ear, vertex.position, config.binaural_mix);
            if weight < config.min_capture_weight {
                continue;
            }
            if !ray.try_mark_captured(level, ear) {
                continue;
            }

            let distance = vertex.distance + vertex.position.distance(ear_position);
            let tap = RayImpulseCapture {
                sound: ray.sound().clone(),
                source_position: ray.source(),
                distance,
                listener_position: ear_position,
                time: distance / config.speed_of_sound,
                bounce: level,
                attenuation: distance_attenuation(distance)
                    * reflection_attenuation
                    * config.reflections_mix,
                ear,
                weight,
            };
            if tap.is_finite() {
                taps.push(tap);
            }
        }
    }
}
