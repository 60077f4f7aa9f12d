//! The host-owned acoustic engine.

use crate::audio_data::DryAudioSource;
use crate::capture::{CaptureContext, CaptureSubsystem, Listener, RayImpulseCapture};
use crate::config::{AcousticConfig, EngineDesc};
use crate::error::{Result, SonorayError};
use crate::events::SonorayEvent;
use crate::impulse_response::{IrBuilder, IrKey};
use crate::math::{Pose, Vec3};
use crate::propagation::{PathTracer, RayManager, SoundId};
use crate::scene::{MaterialAbsorptionTable, OcclusionQuery};
use crate::scheduler::Debouncer;
use crate::sink::AudioSink;
use crate::worker::{BakeRequest, ConvolutionPool};
use crossbeam_channel::{Receiver, Sender};
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// What one call to [`AcousticEngine::tick`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TickReport {
    /// Rays traced and captured this tick
    pub rays_traced: usize,
    /// Rays dropped because their lifetime ended
    pub rays_expired: usize,
    pub taps_added: usize,
    /// Taps refused by an impulse response builder
    pub taps_dropped: usize,
    /// Events handed to the convolution workers
    pub events_dispatched: usize,
}

/// Turns sound emissions in a world into convolved audio for a listener.
///
/// The host calls [`Self::emit`] when a sound plays and [`Self::tick`] once
/// per simulation step, then drains finished audio with [`Self::deliver`].
/// Baking, asset loading and convolution run on background workers; their
/// results only reach the host through `deliver`.
pub struct AcousticEngine {
    config: AcousticConfig,
    desc: EngineDesc,
    materials: Arc<MaterialAbsorptionTable>,
    world: Option<Arc<dyn OcclusionQuery>>,
    rays: RayManager,
    capture: CaptureSubsystem,
    builders: HashMap<IrKey, IrBuilder>,
    /// Variant seed of every open event
    event_seeds: HashMap<SoundId, u64>,
    debouncer: Debouncer,
    pool: ConvolutionPool,
    rng: Xoshiro256PlusPlus,
    current_tick: u64,
    event_sender: Sender<SonorayEvent>,
    event_receiver: Receiver<SonorayEvent>,
}

impl AcousticEngine {
    /// Create a new engine and start its convolution workers.
    ///
    /// # Errors
    ///
    /// Returns [`SonorayError::Configuration`] if either configuration is
    /// invalid, or [`SonorayError::Worker`] if a worker thread cannot start.
    pub fn new(
        config: AcousticConfig,
        desc: EngineDesc,
        materials: MaterialAbsorptionTable,
        dry_source: Arc<dyn DryAudioSource>,
    ) -> Result<Self> {
        config.validate()?;
        desc.validate()?;

        let (event_sender, event_receiver) = crossbeam_channel::unbounded();
        let pool = ConvolutionPool::new(
            desc.worker_threads,
            dry_source,
            desc.ir_sample_rate,
            desc.convolution_block_size,
            event_sender.clone(),
        )?;
        let seed = desc.rng_seed.unwrap_or_else(|| rand::rng().random());

        log::info!(
            "Acoustic engine created: {} Hz impulse responses, {} workers",
            desc.ir_sample_rate,
            pool.worker_count()
        );

        Ok(Self {
            rays: RayManager::new(desc.max_active_rays, desc.ray_lifetime_ticks),
            debouncer: Debouncer::new(desc.quiescence_ticks),
            config,
            desc,
            materials: Arc::new(materials),
            world: None,
            capture: CaptureSubsystem::new(),
            builders: HashMap::new(),
            event_seeds: HashMap::new(),
            pool,
            rng: Xoshiro256PlusPlus::seed_from_u64(seed),
            current_tick: 0,
            event_sender,
            event_receiver,
        })
    }

    /// Installs or removes the world rays are traced against.
    pub fn set_world(&mut self, world: Option<Arc<dyn OcclusionQuery>>) {
        self.world = world;
    }

    pub fn has_world(&self) -> bool {
        self.world.is_some()
    }

    /// Replaces the acoustic knobs. Builders of events already in progress
    /// keep the gains they were created with.
    pub fn set_config(&mut self, config: AcousticConfig) -> Result<()> {
        config.validate()?;
        self.config = config;
        Ok(())
    }

    pub fn config(&self) -> &AcousticConfig {
        &self.config
    }

    pub fn desc(&self) -> &EngineDesc {
        &self.desc
    }

    pub fn materials(&self) -> &MaterialAbsorptionTable {
        &self.materials
    }

    /// A listener at `pose` using the engine's ear layout.
    pub fn listener(&self, pose: &Pose) -> Listener {
        Listener::from_pose(pose, self.desc.ear_layout)
    }

    /// Emits `rays_per_emission` rays for `sound` from `source`.
    ///
    /// Returns how many rays were queued. Without a world nothing is emitted
    /// and 0 is returned.
    pub fn emit(&mut self, source: Vec3, sound: impl Into<SoundId>) -> usize {
        let sound = sound.into();
        if self.world.is_none() {
            log::debug!("No world loaded, skipping emission of {}", sound);
            self.send_event(SonorayEvent::EmissionSkipped {
                sound,
                reason: SonorayError::WorldUnavailable.to_string(),
            });
            return 0;
        }
        if !source.is_finite() {
            log::warn!("Ignoring emission of {} from non-finite position", sound);
            self.send_event(SonorayEvent::EmissionSkipped {
                sound,
                reason: "non-finite source position".into(),
            });
            return 0;
        }

        let outcome = self.rays.emit(
            source,
            &sound,
            &self.config,
            self.current_tick,
            &mut self.rng,
        );
        if outcome.rejected > 0 {
            log::warn!(
                "Ray cap of {} reached, rejected {} rays of {}",
                self.desc.max_active_rays,
                outcome.rejected,
                sound
            );
            self.send_event(SonorayEvent::RaysRejected {
                sound: sound.clone(),
                rejected: outcome.rejected,
            });
        }
        if outcome.accepted > 0 {
            // The emission itself opens the event, so it ends in a dispatch
            // even if no ray ever reaches the listener.
            self.debouncer.record(&sound, self.current_tick);
            self.event_seeds
                .entry(sound.clone())
                .or_insert_with(|| self.rng.random());
            self.send_event(SonorayEvent::RaysEmitted {
                sound,
                accepted: outcome.accepted,
            });
        }
        outcome.accepted
    }

    /// Runs one simulation step.
    ///
    /// Newly emitted rays are traced against the world and captured for
    /// `listener`; their taps go into the per-event builders. Events that
    /// received no tap for `quiescence_ticks` are then sent to the workers.
    ///
    /// # Errors
    ///
    /// Returns [`SonorayError::Worker`] if the convolution pool has stopped.
    pub fn tick(&mut self, tick: u64, listener: &Listener) -> Result<TickReport> {
        self.current_tick = tick;
        let mut report = TickReport::default();

        let mut taps: Vec<RayImpulseCapture> = Vec::new();
        if let Some(world) = self.world.clone() {
            let tracer = PathTracer::new(&self.config, &self.materials, world.as_ref());
            let ctx = CaptureContext {
                listener,
                world: world.as_ref(),
                materials: &self.materials,
                config: &self.config,
            };
            let capture = &mut self.capture;
            let step = self.rays.step(tick, |ray| {
                tracer.trace(ray);
                taps.extend(capture.capture(ray, &ctx));
            });
            report.rays_traced = step.processed;
            report.rays_expired = step.expired;
        } else {
            // Rays emitted before the world was removed wait untraced until
            // they expire.
            report.rays_expired = self.rays.step(tick, |_| {}).expired;
        }

        for tap in &taps {
            if self.add_tap(tap, tick) {
                report.taps_added += 1;
            } else {
                report.taps_dropped += 1;
            }
        }

        for sound in self.debouncer.take_quiescent(tick) {
            if self.dispatch(&sound)? {
                report.events_dispatched += 1;
            }
        }
        Ok(report)
    }

    /// Adds a tap to the builder of its event and ear, creating the builder
    /// on first use. Returns false if the builder refused the tap.
    ///
    /// Every tap, accepted or not, postpones the event's dispatch.
    pub fn add_tap(&mut self, tap: &RayImpulseCapture, tick: u64) -> bool {
        let key = IrKey::new(tap.sound.clone(), tap.ear);
        let builder = self
            .builders
            .entry(key)
            .or_insert_with_key(|key| IrBuilder::new(key.clone(), &self.config, &self.desc));
        let accepted = builder.add(tap).is_ok();
        self.debouncer.record(&tap.sound, tick);
        accepted
    }

    /// Hands every builder of `sound` to the workers. An event without
    /// builders is reported silent and false is returned.
    fn dispatch(&mut self, sound: &SoundId) -> Result<bool> {
        let keys: Vec<IrKey> = self
            .builders
            .keys()
            .filter(|key| &key.sound == sound)
            .cloned()
            .collect();
        let mut builders: Vec<IrBuilder> = keys
            .iter()
            .filter_map(|key| self.builders.remove(key))
            .collect();
        builders.sort_by(|a, b| a.key().cmp(b.key()));
        self.capture.clear_direct(sound);
        let seed = self.event_seeds.remove(sound).unwrap_or_default();

        if builders.is_empty() {
            log::debug!("No ray of {} reached the listener", sound);
            self.send_event(SonorayEvent::EventSilent {
                sound: sound.clone(),
            });
            return Ok(false);
        }

        let dropped: usize = builders.iter().map(IrBuilder::dropped).sum();
        if dropped > 0 {
            log::debug!("{} taps of {} fell outside the impulse response", dropped, sound);
        }
        log::debug!(
            "Dispatching {} with {} impulse responses",
            sound,
            builders.len()
        );
        self.send_event(SonorayEvent::EventDispatched {
            sound: sound.clone(),
            impulse_responses: builders.len(),
        });
        self.pool.submit(BakeRequest {
            sound: sound.clone(),
            builders,
            seed,
        })?;
        Ok(true)
    }

    /// Dispatches every open event without waiting for quiescence.
    pub fn flush(&mut self) -> Result<usize> {
        let mut sounds = self.debouncer.take_all();
        for key in self.builders.keys() {
            if !sounds.contains(&key.sound) {
                sounds.push(key.sound.clone());
            }
        }
        let mut dispatched = 0;
        for sound in sounds {
            if self.dispatch(&sound)? {
                dispatched += 1;
            }
        }
        Ok(dispatched)
    }

    /// Blocks until the workers have finished every dispatched event or
    /// `timeout` passes. Meant for offline rendering; never call it from a
    /// real-time thread.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        self.pool.wait_idle(timeout)
    }

    /// Moves finished audio into `sink` on the calling thread.
    ///
    /// If the sink is no longer live, results are discarded instead. Returns
    /// the number of buffers delivered.
    pub fn deliver(&mut self, sink: &mut dyn AudioSink) -> usize {
        let mut delivered = 0;
        while let Some(audio) = self.pool.try_recv() {
            if !sink.is_live() {
                log::debug!(
                    "Sink is not live, discarding {} ({})",
                    audio.sound,
                    audio.ear.as_str()
                );
                self.send_event(SonorayEvent::DeliveryDiscarded {
                    sound: audio.sound,
                    ear: audio.ear,
                });
                continue;
            }
            self.send_event(SonorayEvent::AudioDelivered {
                sound: audio.sound.clone(),
                ear: audio.ear,
                samples: audio.samples.len(),
            });
            sink.deliver(audio);
            delivered += 1;
        }
        delivered
    }

    /// Drains pending notifications.
    pub fn poll_events(&self) -> Vec<SonorayEvent> {
        self.event_receiver.try_iter().collect()
    }

    /// Number of emitted events that have not been dispatched yet.
    pub fn open_events(&self) -> usize {
        self.debouncer.pending()
    }

    /// Pending plus active rays.
    pub fn active_rays(&self) -> usize {
        self.rays.active_len() + self.rays.pending_len()
    }

    /// Rays currently held, e.g. for drawing their paths.
    pub fn rays(&self) -> &RayManager {
        &self.rays
    }

    /// Requests still being processed by the workers.
    pub fn in_flight(&self) -> usize {
        self.pool.in_flight()
    }

    pub fn current_tick(&self) -> u64 {
        self.current_tick
    }

    fn send_event(&self, event: SonorayEvent) {
        let _ = self.event_sender.send(event);
    }
}

impl Drop for AcousticEngine {
    fn drop(&mut self) {
        self.pool.shutdown();
        log::debug!("Acoustic engine shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio_data::{DryAudio, MemoryAudioSource};
    use crate::capture::Ear;
    use crate::config::EarLayout;
    use crate::scene::{MaterialId, ShoeboxRoom};
    use crate::sink::CollectingSink;

    fn click() -> DryAudio {
        let mut samples = vec![0.0f32; 441];
        samples[0] = 0.8;
        samples[1] = -0.4;
        DryAudio::new(samples, 44_100).unwrap()
    }

    fn engine(source: MemoryAudioSource) -> AcousticEngine {
        let desc = EngineDesc {
            rng_seed: Some(42),
            worker_threads: 1,
            ..EngineDesc::default()
        };
        let config = AcousticConfig::default().with_rays_per_emission(64);
        let mut engine = AcousticEngine::new(
            config,
            desc,
            MaterialAbsorptionTable::with_presets(),
            Arc::new(source),
        )
        .unwrap();
        let room = ShoeboxRoom::new(
            Vec3::ZERO,
            Vec3::new(20.0, 6.0, 20.0),
            MaterialId(2),
        );
        engine.set_world(Some(Arc::new(room)));
        engine
    }

    fn listener() -> Listener {
        Listener::new(
            Vec3::new(15.0, 2.0, 10.0),
            -Vec3::Z,
            Vec3::Y,
            EarLayout::Binaural { half_width: 0.1 },
        )
    }

    #[test]
    fn events_render_after_quiescence() {
        let mut engine = engine(MemoryAudioSource::new().with("clap", click()));
        let listener = listener();

        assert_eq!(engine.emit(Vec3::new(5.0, 2.0, 10.0), "clap"), 64);
        let first = engine.tick(0, &listener).unwrap();
        assert_eq!(first.rays_traced, 64);
        assert!(first.taps_added >= 2);
        assert_eq!(first.events_dispatched, 0);
        assert_eq!(engine.open_events(), 1);

        assert_eq!(engine.tick(1, &listener).unwrap().events_dispatched, 0);
        assert_eq!(engine.tick(2, &listener).unwrap().events_dispatched, 0);
        assert_eq!(engine.tick(3, &listener).unwrap().events_dispatched, 1);
        assert_eq!(engine.open_events(), 0);

        assert!(engine.wait_idle(Duration::from_secs(30)));
        let mut sink = CollectingSink::new();
        assert_eq!(engine.deliver(&mut sink), 2);
        assert_eq!(sink.for_ear(Ear::Left).count(), 1);
        assert_eq!(sink.for_ear(Ear::Right).count(), 1);
        for audio in &sink.buffers {
            assert_eq!(audio.sample_rate, 44_100);
            assert!(audio.samples.len() > 441);
            assert!(audio.peak() > 0.0);
            assert!(audio.peak() <= 1.0);
        }

        // The source is to the listener's left, so the left ear hears the
        // direct path first and louder.
        let left = sink.for_ear(Ear::Left).next().unwrap();
        let right = sink.for_ear(Ear::Right).next().unwrap();
        let onset = |samples: &[f32]| samples.iter().position(|s| s.abs() > 1e-4).unwrap();
        assert!(onset(&left.samples) <= onset(&right.samples));

        let events = engine.poll_events();
        assert!(events.iter().any(|e| matches!(e, SonorayEvent::RaysEmitted { accepted: 64, .. })));
        assert!(events.iter().any(|e| matches!(e, SonorayEvent::EventDispatched { impulse_responses: 2, .. })));
        assert_eq!(
            events
                .iter()
                .filter(|e| matches!(e, SonorayEvent::AudioDelivered { .. }))
                .count(),
            2
        );
    }

    #[test]
    fn rays_expire_after_their_lifetime() {
        let mut engine = engine(MemoryAudioSource::new());
        let listener = listener();
        engine.emit(Vec3::new(5.0, 2.0, 10.0), "step");
        assert_eq!(engine.active_rays(), 64);
        engine.tick(0, &listener).unwrap();
        assert_eq!(engine.active_rays(), 64);
        let report = engine.tick(2, &listener).unwrap();
        assert_eq!(report.rays_traced, 0);
        assert_eq!(report.rays_expired, 64);
        assert_eq!(engine.active_rays(), 0);
    }

    #[test]
    fn emission_without_world_is_skipped() {
        let mut engine = engine(MemoryAudioSource::new());
        engine.set_world(None);
        assert_eq!(engine.emit(Vec3::ZERO, "lost"), 0);
        assert_eq!(engine.active_rays(), 0);
        let report = engine.tick(0, &listener()).unwrap();
        assert_eq!(report, TickReport::default());
        assert!(matches!(
            engine.poll_events().as_slice(),
            [SonorayEvent::EmissionSkipped { .. }]
        ));
    }

    #[test]
    fn unheard_emissions_end_silent() {
        let mut engine = engine(MemoryAudioSource::new().with("muffled", click()));
        // Outside the room: every path to the listener crosses a wall.
        let outside = Listener::new(
            Vec3::new(25.0, 2.0, 10.0),
            -Vec3::Z,
            Vec3::Y,
            EarLayout::Binaural { half_width: 0.1 },
        );

        assert_eq!(engine.emit(Vec3::new(5.0, 2.0, 10.0), "muffled"), 64);
        let first = engine.tick(0, &outside).unwrap();
        assert_eq!(first.taps_added, 0);
        assert_eq!(engine.open_events(), 1);
        for tick in 1..=3 {
            assert_eq!(engine.tick(tick, &outside).unwrap().events_dispatched, 0);
        }
        assert_eq!(engine.open_events(), 0);

        let events = engine.poll_events();
        assert!(events.contains(&SonorayEvent::EventSilent {
            sound: "muffled".into()
        }));
        assert_eq!(engine.in_flight(), 0);

        // The event is closed; later ticks report nothing more.
        engine.tick(10, &outside).unwrap();
        assert!(engine.poll_events().is_empty());
    }

    #[test]
    fn missing_asset_aborts_only_that_event() {
        let mut engine = engine(MemoryAudioSource::new().with("known", click()));
        let listener = listener();
        engine.emit(Vec3::new(5.0, 2.0, 10.0), "unknown");
        engine.emit(Vec3::new(5.0, 2.0, 8.0), "known");
        engine.tick(0, &listener).unwrap();
        assert_eq!(engine.flush().unwrap(), 2);
        assert!(engine.wait_idle(Duration::from_secs(30)));

        let mut sink = CollectingSink::new();
        engine.deliver(&mut sink);
        assert!(!sink.buffers.is_empty());
        assert!(sink.buffers.iter().all(|b| b.sound.as_str() == "known"));
        assert!(engine.poll_events().iter().any(|e| matches!(
            e,
            SonorayEvent::EventAborted { sound, .. } if sound.as_str() == "unknown"
        )));
    }

    #[test]
    fn closed_sink_discards_results() {
        let mut engine = engine(MemoryAudioSource::new().with("clap", click()));
        engine.emit(Vec3::new(5.0, 2.0, 10.0), "clap");
        engine.tick(0, &listener()).unwrap();
        engine.flush().unwrap();
        assert!(engine.wait_idle(Duration::from_secs(30)));

        let mut sink = CollectingSink::new();
        sink.close();
        assert_eq!(engine.deliver(&mut sink), 0);
        assert!(sink.buffers.is_empty());
        assert!(
            engine
                .poll_events()
                .iter()
                .any(|e| matches!(e, SonorayEvent::DeliveryDiscarded { .. }))
        );
    }

    #[test]
    fn ray_cap_rejects_excess_rays() {
        let desc = EngineDesc {
            max_active_rays: 100,
            rng_seed: Some(1),
            ..EngineDesc::default()
        };
        let mut engine = AcousticEngine::new(
            AcousticConfig::default().with_rays_per_emission(64),
            desc,
            MaterialAbsorptionTable::with_presets(),
            Arc::new(MemoryAudioSource::new()),
        )
        .unwrap();
        engine.set_world(Some(Arc::new(ShoeboxRoom::new(
            Vec3::ZERO,
            Vec3::splat(10.0),
            MaterialId(0),
        ))));
        assert_eq!(engine.emit(Vec3::splat(5.0), "a"), 64);
        assert_eq!(engine.emit(Vec3::splat(5.0), "b"), 36);
        assert!(engine.poll_events().iter().any(|e| matches!(
            e,
            SonorayEvent::RaysRejected { rejected: 28, .. }
        )));
    }

    #[test]
    fn invalid_config_is_rejected() {
        let mut engine = engine(MemoryAudioSource::new());
        let bad = AcousticConfig::default().with_speed_of_sound(-1.0);
        assert!(matches!(
            engine.set_config(bad),
            Err(SonorayError::Configuration(_))
        ));
        assert_eq!(engine.config().speed_of_sound, 343.0);
    }
}
