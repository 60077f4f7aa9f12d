pub mod audio_data;
pub mod capture;
pub mod config;
pub mod dsp;
pub mod engine;
pub mod error;
pub mod events;
pub mod impulse_response;
pub mod math;
#[cfg(feature = "playback")]
pub mod playback;
pub mod propagation;
pub mod scene;
pub mod scheduler;
pub mod sink;
pub mod worker;

pub use audio_data::{DryAudio, DryAudioSource};
pub use capture::{Ear, Listener, RayImpulseCapture};
pub use config::{AcousticConfig, EarLayout, EngineDesc};
pub use engine::{AcousticEngine, TickReport};
pub use error::SonorayError;
pub use events::SonorayEvent;
pub use impulse_response::{BakedIr, IrBuilder, IrKey};
#[cfg(feature = "playback")]
pub use playback::{PlaybackDesc, PlaybackEngine, PlaybackSink};
pub use propagation::{AcousticRay, SoundId};
pub use scene::{MaterialAbsorptionTable, MaterialId, OcclusionQuery, ShoeboxRoom, VoxelWorld};
pub use sink::{AudioSink, CollectingSink, RenderedAudio};
