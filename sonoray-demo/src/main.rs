//! sonoray demo - renders a sound in a shoebox room
//!
//! `render` traces one emission offline and prints what each ear received;
//! `play` does the same and plays the result on the default output device.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sonoray::audio_data::{
    CachedAudioSource, DryAudio, LoadOptions, MemoryAudioSource, SymphoniaAudioSource,
};
use sonoray::math::{Pose, Vec3};
use sonoray::scene::{Face, MaterialAbsorptionTable, MaterialId, ShoeboxRoom};
use sonoray::{
    AcousticConfig, AcousticEngine, AudioSink, CollectingSink, DryAudioSource, EngineDesc,
    PlaybackDesc, PlaybackEngine, SonorayEvent, SoundId,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Preset ids from `MaterialAbsorptionTable::with_presets`.
const CONCRETE: MaterialId = MaterialId(2);
const CARPET: MaterialId = MaterialId(5);

#[derive(Parser)]
#[command(name = "sonoray-demo")]
#[command(about = "Ray-traced room acoustics demo", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(clap::Args)]
struct SceneArgs {
    /// Directory holding sound files; without it a synthesized click is used
    #[arg(long)]
    assets: Option<PathBuf>,
    /// Sound id to render, e.g. `door:slam` for `door/slam.ogg`
    #[arg(long, default_value = "click")]
    sound: String,
    /// Room size in metres (x, y, z)
    #[arg(long, num_args = 3, default_values_t = [12.0, 4.0, 9.0])]
    room: Vec<f32>,
    /// Source position
    #[arg(long, num_args = 3, default_values_t = [3.0, 1.5, 4.5])]
    source: Vec<f32>,
    /// Listener position; the listener faces -Z
    #[arg(long, num_args = 3, default_values_t = [9.0, 1.6, 4.5])]
    listener: Vec<f32>,
    /// Rays per emission
    #[arg(long, default_value_t = 2000)]
    rays: usize,
    /// Carpet the floor
    #[arg(long)]
    carpet: bool,
    /// Seed for ray directions
    #[arg(long)]
    seed: Option<u64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Render offline and print statistics
    Render {
        #[command(flatten)]
        scene: SceneArgs,
    },
    /// Render and play on the default output device
    Play {
        #[command(flatten)]
        scene: SceneArgs,
        /// Number of emissions, one per second
        #[arg(long, default_value_t = 3)]
        repeat: u32,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    env_logger::Builder::from_default_env()
        .filter_level(if cli.verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        })
        .init();

    match cli.command {
        Commands::Render { scene } => render(&scene),
        Commands::Play { scene, repeat } => play(&scene, repeat),
    }
}

fn vec3(values: &[f32]) -> Vec3 {
    Vec3::new(values[0], values[1], values[2])
}

fn click() -> Result<DryAudio> {
    let samples = (0..2205)
        .map(|i| {
            let t = i as f32 / 44_100.0;
            (t * 2_000.0 * std::f32::consts::TAU).sin() * (-t * 400.0).exp() * 0.8
        })
        .collect();
    Ok(DryAudio::new(samples, 44_100)?)
}

fn dry_source(scene: &SceneArgs) -> Result<Arc<dyn DryAudioSource>> {
    match &scene.assets {
        Some(root) => {
            let options = LoadOptions::default().target_sample_rate(44_100);
            let files = SymphoniaAudioSource::new(root).with_options(options);
            Ok(Arc::new(CachedAudioSource::new(files)))
        }
        None => Ok(Arc::new(
            MemoryAudioSource::new().with(scene.sound.as_str(), click()?),
        )),
    }
}

fn build_engine(scene: &SceneArgs) -> Result<(AcousticEngine, Pose)> {
    let config = AcousticConfig::default().with_rays_per_emission(scene.rays);
    let desc = EngineDesc {
        rng_seed: scene.seed,
        ..EngineDesc::default()
    };
    let mut engine = AcousticEngine::new(
        config,
        desc,
        MaterialAbsorptionTable::with_presets(),
        dry_source(scene)?,
    )
    .context("Failed to create acoustic engine")?;

    let mut room = ShoeboxRoom::new(Vec3::ZERO, vec3(&scene.room), CONCRETE);
    if scene.carpet {
        room = room.with_face_material(Face::Floor, CARPET);
    }
    engine.set_world(Some(Arc::new(room)));

    let pose = Pose::from_position(vec3(&scene.listener));
    Ok((engine, pose))
}

/// Emits once, ticks until the event is dispatched and waits for the result.
fn run_emission(
    engine: &mut AcousticEngine,
    pose: &Pose,
    source: Vec3,
    sound: &SoundId,
    sink: &mut dyn AudioSink,
) -> Result<usize> {
    let listener = engine.listener(pose);
    let accepted = engine.emit(source, sound.clone());
    log::info!("Emitted {} rays for {}", accepted, sound);

    let start = engine.current_tick() + 1;
    for tick in start..start + 1 + engine.desc().quiescence_ticks {
        let report = engine.tick(tick, &listener)?;
        log::debug!("Tick {}: {:?}", tick, report);
    }
    engine.flush()?;
    if !engine.wait_idle(Duration::from_secs(30)) {
        anyhow::bail!("Timed out waiting for convolution");
    }
    Ok(engine.deliver(sink))
}

fn log_events(engine: &AcousticEngine) {
    for event in engine.poll_events() {
        match &event {
            SonorayEvent::EventAborted { sound, error } => {
                log::error!("{} aborted: {}", sound, error)
            }
            SonorayEvent::EventSilent { sound } => log::warn!("{} was inaudible", sound),
            _ => log::debug!("{:?}", event),
        }
    }
}

fn render(scene: &SceneArgs) -> Result<()> {
    let (mut engine, pose) = build_engine(scene)?;
    let sound = SoundId::from(scene.sound.as_str());
    let mut sink = CollectingSink::new();

    let delivered = run_emission(&mut engine, &pose, vec3(&scene.source), &sound, &mut sink)?;
    log_events(&engine);

    println!("Rendered {} buffers for {}", delivered, sound);
    for audio in &sink.buffers {
        let onset = audio.samples.iter().position(|s| s.abs() > 1e-3);
        println!(
            "  {:>5}: {} samples at {} Hz ({:.2} s), peak {:.3}, onset {}",
            audio.ear.as_str(),
            audio.samples.len(),
            audio.sample_rate,
            audio.duration().as_secs_f32(),
            audio.peak(),
            onset.map_or("none".to_string(), |i| {
                format!("{:.1} ms", i as f32 * 1000.0 / audio.sample_rate as f32)
            }),
        );
    }
    Ok(())
}

fn play(scene: &SceneArgs, repeat: u32) -> Result<()> {
    let (mut engine, pose) = build_engine(scene)?;
    let sound = SoundId::from(scene.sound.as_str());

    let mut playback = PlaybackEngine::new(PlaybackDesc::default())?;
    playback.start().context("Failed to start playback")?;
    let mut sink = playback.sink();

    for _ in 0..repeat {
        run_emission(&mut engine, &pose, vec3(&scene.source), &sound, &mut sink)?;
        log_events(&engine);
        std::thread::sleep(Duration::from_secs(1));
    }
    std::thread::sleep(Duration::from_secs(2));

    log::info!("Played {} frames", playback.frames_processed());
    playback.stop();
    Ok(())
}
