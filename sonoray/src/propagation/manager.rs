use super::{AcousticRay, SoundId};
use crate::config::AcousticConfig;
use crate::math::{Vec3, random_unit_vector};
use rand::Rng;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Outcome of handing rays to the manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EnqueueOutcome {
    pub accepted: usize,
    pub rejected: usize,
}

/// What a call to [`RayManager::step`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StepReport {
    /// Rays moved from pending to active
    pub migrated: usize,
    /// Rays handed to the step callback
    pub processed: usize,
    /// Rays dropped because their lifetime ended
    pub expired: usize,
}

/// Owns every ray between emission and expiry.
///
/// Emission only ever touches the pending list. A step first migrates pending
/// rays into the active list and only then walks the active list, so rays can
/// be emitted from another thread while a step is running.
#[derive(Debug)]
pub struct RayManager {
    pending: Mutex<Vec<AcousticRay>>,
    active: Mutex<Vec<AcousticRay>>,
    max_rays: usize,
    lifetime_ticks: u64,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl RayManager {
    pub fn new(max_rays: usize, lifetime_ticks: u64) -> Self {
        Self {
            pending: Mutex::new(Vec::new()),
            active: Mutex::new(Vec::new()),
            max_rays,
            lifetime_ticks,
        }
    }

    /// Builds `config.rays_per_emission` rays with uniformly random directions
    /// and queues them for the next step.
    ///
    /// # Arguments
    ///
    /// * `source` - Position of the sound source
    /// * `sound` - Event the rays belong to
    /// * `config` - Supplies ray count, limits and emission offset
    /// * `tick` - Simulation tick of the emission
    /// * `rng` - Direction source
    ///
    /// # Returns
    ///
    /// How many rays were queued and how many were rejected by the ray cap.
    pub fn emit<R: Rng + ?Sized>(
        &self,
        source: Vec3,
        sound: &SoundId,
        config: &AcousticConfig,
        tick: u64,
        rng: &mut R,
    ) -> EnqueueOutcome {
        let rays = (0..config.rays_per_emission).map(|_| {
            AcousticRay::new(
                sound.clone(),
                source,
                random_unit_vector(rng),
                config.emission_offset,
            )
            .with_limits(
                config.max_bounces,
                config.max_distance,
                config.max_distance_without_reflection,
            )
            .with_lifetime(tick, self.lifetime_ticks)
        });
        self.enqueue(rays)
    }

    /// Queues prepared rays, rejecting any beyond the ray cap.
    pub fn enqueue(&self, rays: impl IntoIterator<Item = AcousticRay>) -> EnqueueOutcome {
        let active = lock(&self.active).len();
        let mut pending = lock(&self.pending);
        let mut outcome = EnqueueOutcome::default();
        for ray in rays {
            if active + pending.len() < self.max_rays {
                pending.push(ray);
                outcome.accepted += 1;
            } else {
                outcome.rejected += 1;
            }
        }
        outcome
    }

    /// Runs one simulation step.
    ///
    /// Pending rays are migrated first. `process` is then called once for
    /// every active ray that has not been traced yet; finally rays whose
    /// lifetime has ended at `tick` are dropped.
    pub fn step<F>(&self, tick: u64, mut process: F) -> StepReport
    where
        F: FnMut(&mut AcousticRay),
    {
        let mut active = lock(&self.active);
        let migrated = {
            let mut pending = lock(&self.pending);
            let n = pending.len();
            active.append(&mut pending);
            n
        };

        let mut processed = 0;
        for ray in active.iter_mut().filter(|r| !r.is_traced()) {
            process(ray);
            processed += 1;
        }

        let before = active.len();
        active.retain(|r| !r.is_expired(tick));

        StepReport {
            migrated,
            processed,
            expired: before - active.len(),
        }
    }

    /// Runs `f` over the active rays, e.g. to draw them.
    pub fn with_active<R>(&self, f: impl FnOnce(&[AcousticRay]) -> R) -> R {
        f(&lock(&self.active))
    }

    pub fn active_len(&self) -> usize {
        lock(&self.active).len()
    }

    pub fn pending_len(&self) -> usize {
        lock(&self.pending).len()
    }

    pub fn clear(&self) {
        lock(&self.pending).clear();
        lock(&self.active).clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::propagation::Termination;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;

    fn mark_traced(ray: &mut AcousticRay) {
        ray.finish(Termination::MaxDistance);
    }

    #[test]
    fn emission_lands_in_pending_until_the_next_step() {
        let manager = RayManager::new(10_000, 2);
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(1);
        let config = AcousticConfig::default();
        let outcome = manager.emit(Vec3::ZERO, &"a".into(), &config, 0, &mut rng);
        assert_eq!(outcome.accepted, 100);
        assert_eq!(manager.pending_len(), 100);
        assert_eq!(manager.active_len(), 0);

        let report = manager.step(0, mark_traced);
        assert_eq!(report.migrated, 100);
        assert_eq!(report.processed, 100);
        assert_eq!(manager.pending_len(), 0);
        assert_eq!(manager.active_len(), 100);
    }

    #[test]
    fn rays_are_processed_once_and_expire() {
        let manager = RayManager::new(10_000, 2);
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(2);
        let config = AcousticConfig::default().with_rays_per_emission(5);
        manager.emit(Vec3::ZERO, &"a".into(), &config, 10, &mut rng);

        assert_eq!(manager.step(10, mark_traced).processed, 5);
        let report = manager.step(11, mark_traced);
        assert_eq!(report.processed, 0);
        assert_eq!(report.expired, 0);
        let report = manager.step(12, mark_traced);
        assert_eq!(report.expired, 5);
        assert_eq!(manager.active_len(), 0);
    }

    #[test]
    fn ray_cap_rejects_the_excess() {
        let manager = RayManager::new(150, 2);
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(3);
        let config = AcousticConfig::default();
        manager.emit(Vec3::ZERO, &"a".into(), &config, 0, &mut rng);
        manager.step(0, mark_traced);
        let outcome = manager.emit(Vec3::ZERO, &"b".into(), &config, 0, &mut rng);
        assert_eq!(outcome, EnqueueOutcome { accepted: 50, rejected: 50 });
        assert_eq!(manager.active_len() + manager.pending_len(), 150);
    }

    #[test]
    fn emission_during_a_step_waits_for_the_next_one() {
        let manager = RayManager::new(10_000, 5);
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(4);
        let config = AcousticConfig::default().with_rays_per_emission(3);
        manager.emit(Vec3::ZERO, &"a".into(), &config, 0, &mut rng);

        let mut extra = Vec::new();
        let report = manager.step(0, |ray| {
            mark_traced(ray);
            extra.push(
                AcousticRay::new("echo".into(), Vec3::ZERO, Vec3::X, 0.0).with_lifetime(0, 5),
            );
        });
        assert_eq!(report.processed, 3);
        manager.enqueue(extra);
        assert_eq!(manager.pending_len(), 3);
        assert_eq!(manager.step(1, mark_traced).processed, 3);
    }
}
