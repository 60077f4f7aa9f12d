//! Background baking and convolution.

use crate::audio_data::DryAudioSource;
use crate::dsp::{convolve, convolve_blocked, pitched_sample_rate};
use crate::error::{Result, SonorayError};
use crate::events::SonorayEvent;
use crate::impulse_response::{BakedIr, IrBuilder};
use crate::propagation::SoundId;
use crate::sink::RenderedAudio;
use crossbeam_channel::{Receiver, Sender, TryRecvError};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Every impulse response of one finished event.
#[derive(Debug)]
pub struct BakeRequest {
    pub sound: SoundId,
    pub builders: Vec<IrBuilder>,
    /// Picks the asset variant the event plays
    pub seed: u64,
}

/// A fixed set of threads that bake impulse responses, load dry audio and
/// convolve.
///
/// Requests go in over an unbounded channel and results come back over
/// another; the engine drains results on its own thread. Nothing here holds a
/// lock shared with the simulation.
pub struct ConvolutionPool {
    requests: Option<Sender<BakeRequest>>,
    results: Receiver<RenderedAudio>,
    workers: Vec<JoinHandle<()>>,
    in_flight: Arc<AtomicUsize>,
}

#[derive(Clone)]
struct WorkerContext {
    source: Arc<dyn DryAudioSource>,
    ir_sample_rate: u32,
    block_size: Option<usize>,
    results: Sender<RenderedAudio>,
    events: Sender<SonorayEvent>,
    in_flight: Arc<AtomicUsize>,
}

impl ConvolutionPool {
    /// Spawns `threads` workers (at least one).
    pub fn new(
        threads: usize,
        source: Arc<dyn DryAudioSource>,
        ir_sample_rate: u32,
        block_size: Option<usize>,
        events: Sender<SonorayEvent>,
    ) -> Result<Self> {
        let (request_tx, request_rx) = crossbeam_channel::unbounded::<BakeRequest>();
        let (result_tx, result_rx) = crossbeam_channel::unbounded();
        let in_flight = Arc::new(AtomicUsize::new(0));

        let context = WorkerContext {
            source,
            ir_sample_rate,
            block_size,
            results: result_tx,
            events,
            in_flight: in_flight.clone(),
        };

        let mut workers = Vec::with_capacity(threads.max(1));
        for index in 0..threads.max(1) {
            let requests = request_rx.clone();
            let context = context.clone();
            let handle = std::thread::Builder::new()
                .name(format!("sonoray-convolver-{index}"))
                .spawn(move || worker_loop(requests, context))
                .map_err(|e| SonorayError::Worker(format!("Failed to spawn worker: {}", e)))?;
            workers.push(handle);
        }
        log::debug!("Started {} convolution workers", workers.len());

        Ok(Self {
            requests: Some(request_tx),
            results: result_rx,
            workers,
            in_flight,
        })
    }

    /// Queues an event for baking. Never blocks.
    pub fn submit(&self, request: BakeRequest) -> Result<()> {
        let sender = self
            .requests
            .as_ref()
            .ok_or_else(|| SonorayError::Worker("Convolution pool is shut down".into()))?;
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        sender.send(request).map_err(|e| {
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            SonorayError::Worker(format!("Failed to queue request: {}", e))
        })
    }

    /// Takes one finished buffer if any is ready.
    pub fn try_recv(&self) -> Option<RenderedAudio> {
        match self.results.try_recv() {
            Ok(audio) => Some(audio),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    /// Requests submitted but not yet fully processed.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Blocks until every submitted request has been processed or `timeout`
    /// passes. Returns true when the pool went idle.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.in_flight() > 0 {
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        true
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Closes the request channel and joins the workers. Requests already
    /// queued are still processed.
    pub fn shutdown(&mut self) {
        self.requests.take();
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                log::error!("Convolution worker panicked");
            }
        }
    }
}

impl Drop for ConvolutionPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Decrements the in-flight counter when a request is finished, however it
/// finished.
struct InFlightGuard<'a>(&'a AtomicUsize);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

fn worker_loop(requests: Receiver<BakeRequest>, context: WorkerContext) {
    while let Ok(request) = requests.recv() {
        let _guard = InFlightGuard(&context.in_flight);
        let sound = request.sound.clone();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| render(request, &context)))
            .unwrap_or_else(|payload| {
                Err(SonorayError::Worker(format!(
                    "panic while rendering: {}",
                    panic_message(payload.as_ref())
                )))
            });
        match outcome {
            Ok(buffers) if buffers.is_empty() => {
                log::debug!("Event {} produced no audible output", sound);
                let _ = context.events.send(SonorayEvent::EventSilent { sound });
            }
            Ok(buffers) => {
                for audio in buffers {
                    if context.results.send(audio).is_err() {
                        log::debug!("Result channel closed, dropping output of {}", sound);
                        break;
                    }
                }
            }
            Err(e) => {
                log::warn!("Aborting event {}: {}", sound, e);
                let _ = context.events.send(SonorayEvent::EventAborted {
                    sound,
                    error: e.to_string(),
                });
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        *message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "unknown panic"
    }
}

/// Bakes every builder of the request, then convolves the event's dry audio
/// with each non-empty impulse response.
///
/// Dry audio is only loaded when at least one response is non-empty.
fn render(request: BakeRequest, context: &WorkerContext) -> Result<Vec<RenderedAudio>> {
    let baked: Vec<BakedIr> = request
        .builders
        .into_iter()
        .map(IrBuilder::bake)
        .filter(|ir| !ir.is_empty())
        .collect();
    if baked.is_empty() {
        return Ok(Vec::new());
    }

    let asset = context.source.variant(&request.sound, request.seed);
    let dry = context.source.load(&asset)?;
    if dry.is_empty() {
        return Ok(Vec::new());
    }
    let dry = dry.resample(context.ir_sample_rate)?;

    let mut rendered = Vec::with_capacity(baked.len());
    for ir in baked {
        let ir_samples = ir.to_f32();
        let wet = match context.block_size {
            Some(block_size) => convolve_blocked(dry.samples(), &ir_samples, block_size),
            None => convolve(dry.samples(), &ir_samples),
        };
        match wet {
            Some(samples) => rendered.push(RenderedAudio {
                sound: ir.key.sound,
                ear: ir.key.ear,
                samples,
                sample_rate: pitched_sample_rate(ir.sample_rate, dry.pitch()),
            }),
            None => log::warn!(
                "Convolution for {} ({}) was not finite, skipping",
                ir.key.sound,
                ir.key.ear.as_str()
            ),
        }
    }
    Ok(rendered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio_data::{DryAudio, MemoryAudioSource};
    use crate::capture::{Ear, RayImpulseCapture};
    use crate::config::{AcousticConfig, EngineDesc};
    use crate::impulse_response::IrKey;
    use crate::math::Vec3;

    fn builder(sound: &str, ear: Ear, taps: &[(f32, f32)]) -> IrBuilder {
        let config = AcousticConfig::default().with_early_reflection_damping(0.0);
        let desc = EngineDesc::default();
        let mut builder = IrBuilder::new(IrKey::new(sound.into(), ear), &config, &desc);
        for &(time, attenuation) in taps {
            let tap = RayImpulseCapture {
                sound: sound.into(),
                source_position: Vec3::ZERO,
                distance: time * 343.0,
                listener_position: Vec3::X,
                time,
                bounce: 0,
                attenuation,
                ear,
                weight: 1.0,
            };
            builder.add(&tap).unwrap();
        }
        builder
    }

    fn pool(source: MemoryAudioSource) -> (ConvolutionPool, Receiver<SonorayEvent>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        let pool = ConvolutionPool::new(2, Arc::new(source), 44_100, Some(64), tx).unwrap();
        (pool, rx)
    }

    fn drain(pool: &ConvolutionPool) -> Vec<RenderedAudio> {
        std::iter::from_fn(|| pool.try_recv()).collect()
    }

    #[test]
    fn renders_each_ear() {
        let dry = DryAudio::new(vec![0.5, 0.25, 0.0, -0.25], 44_100).unwrap();
        let (pool, _events) = pool(MemoryAudioSource::new().with("clap", dry));

        pool.submit(BakeRequest {
            sound: "clap".into(),
            builders: vec![
                builder("clap", Ear::Left, &[(0.0, 1.0)]),
                builder("clap", Ear::Right, &[(0.0, 0.5)]),
            ],
            seed: 0,
        })
        .unwrap();
        assert!(pool.wait_idle(Duration::from_secs(10)));

        let mut rendered = drain(&pool);
        rendered.sort_by_key(|r| r.ear);
        assert_eq!(rendered.len(), 2);
        assert_eq!(rendered[0].ear, Ear::Left);
        assert_eq!(rendered[0].sample_rate, 44_100);
        assert!((rendered[0].samples[0] - 0.5).abs() < 1e-3);
        assert!((rendered[1].samples[0] - 0.25).abs() < 1e-3);
    }

    #[test]
    fn missing_audio_aborts_the_event() {
        let (pool, events) = pool(MemoryAudioSource::new());
        pool.submit(BakeRequest {
            sound: "ghost".into(),
            builders: vec![builder("ghost", Ear::Mono, &[(0.001, 0.3)])],
            seed: 0,
        })
        .unwrap();
        assert!(pool.wait_idle(Duration::from_secs(10)));

        assert!(drain(&pool).is_empty());
        let event = events.try_recv().unwrap();
        assert!(matches!(event, SonorayEvent::EventAborted { .. }));
        assert_eq!(event.sound().as_str(), "ghost");
    }

    #[test]
    fn empty_responses_are_silent_without_loading() {
        // The source is empty, so a load would abort instead.
        let (pool, events) = pool(MemoryAudioSource::new());
        pool.submit(BakeRequest {
            sound: "quiet".into(),
            builders: vec![builder("quiet", Ear::Left, &[])],
            seed: 0,
        })
        .unwrap();
        assert!(pool.wait_idle(Duration::from_secs(10)));

        assert!(drain(&pool).is_empty());
        assert_eq!(
            events.try_recv().unwrap(),
            SonorayEvent::EventSilent {
                sound: "quiet".into()
            }
        );
    }

    #[test]
    fn pitch_sets_the_playback_rate() {
        let dry = DryAudio::new(vec![0.2; 32], 44_100)
            .unwrap()
            .with_pitch(2.0)
            .unwrap();
        let (pool, _events) = pool(MemoryAudioSource::new().with("chirp", dry));
        pool.submit(BakeRequest {
            sound: "chirp".into(),
            builders: vec![builder("chirp", Ear::Mono, &[(0.0, 1.0)])],
            seed: 0,
        })
        .unwrap();
        assert!(pool.wait_idle(Duration::from_secs(10)));

        let rendered = drain(&pool);
        assert_eq!(rendered.len(), 1);
        assert_eq!(rendered[0].sample_rate, 88_200);
    }

    struct Exploding;

    impl DryAudioSource for Exploding {
        fn load(&self, sound: &SoundId) -> Result<DryAudio> {
            if sound.as_str() == "boom" {
                panic!("decoder blew up");
            }
            DryAudio::new(vec![0.5; 8], 44_100)
        }
    }

    #[test]
    fn a_panicking_load_aborts_only_that_event() {
        let (tx, events) = crossbeam_channel::unbounded();
        let pool = ConvolutionPool::new(1, Arc::new(Exploding), 44_100, None, tx).unwrap();

        pool.submit(BakeRequest {
            sound: "boom".into(),
            builders: vec![builder("boom", Ear::Mono, &[(0.0, 1.0)])],
            seed: 0,
        })
        .unwrap();
        assert!(pool.wait_idle(Duration::from_secs(10)));
        assert_eq!(pool.in_flight(), 0);
        match events.try_recv().unwrap() {
            SonorayEvent::EventAborted { sound, error } => {
                assert_eq!(sound.as_str(), "boom");
                assert!(error.contains("decoder blew up"));
            }
            other => panic!("unexpected event {other:?}"),
        }

        // The single worker survived and still renders.
        pool.submit(BakeRequest {
            sound: "fine".into(),
            builders: vec![builder("fine", Ear::Mono, &[(0.0, 1.0)])],
            seed: 0,
        })
        .unwrap();
        assert!(pool.wait_idle(Duration::from_secs(10)));
        assert_eq!(drain(&pool).len(), 1);
    }

    #[test]
    fn shutdown_rejects_new_work() {
        let (mut pool, _events) = pool(MemoryAudioSource::new());
        assert_eq!(pool.worker_count(), 2);
        pool.shutdown();
        let result = pool.submit(BakeRequest {
            sound: "late".into(),
            builders: Vec::new(),
            seed: 0,
        });
        assert!(matches!(result, Err(SonorayError::Worker(_))));
        assert_eq!(pool.in_flight(), 0);
    }
}
