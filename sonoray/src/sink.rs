//! Hand-off of rendered audio to the host.

use crate::capture::Ear;
use crate::propagation::SoundId;
use std::time::Duration;

/// A convolved buffer ready for playback.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedAudio {
    pub sound: SoundId,
    pub ear: Ear,
    /// Mono samples in [-1, 1]
    pub samples: Vec<f32>,
    /// Rate the samples should be played at, pitch included
    pub sample_rate: u32,
}

impl RenderedAudio {
    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.samples.len() as f64 / self.sample_rate.max(1) as f64)
    }

    pub fn peak(&self) -> f32 {
        self.samples.iter().fold(0.0f32, |peak, s| peak.max(s.abs()))
    }

    pub fn is_finite(&self) -> bool {
        self.samples.iter().all(|s| s.is_finite())
    }
}

/// Receives rendered buffers on the thread that calls
/// [`crate::AcousticEngine::deliver`].
///
/// The sink owns device playback and any cleanup. The ear tag says which
/// output channel a buffer was rendered for; mono buffers go to every channel.
pub trait AudioSink {
    fn deliver(&mut self, audio: RenderedAudio);

    /// False once the sink can no longer play anything (device gone, host
    /// shutting down). Results are then discarded instead of delivered.
    fn is_live(&self) -> bool {
        true
    }
}

/// Keeps every delivered buffer in memory.
#[derive(Debug, Default)]
pub struct CollectingSink {
    pub buffers: Vec<RenderedAudio>,
    closed: bool,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stops accepting buffers.
    pub fn close(&mut self) {
        self.closed = true;
    }

    pub fn for_ear(&self, ear: Ear) -> impl Iterator<Item = &RenderedAudio> {
        self.buffers.iter().filter(move |b| b.ear == ear)
    }

    pub fn take(&mut self) -> Vec<RenderedAudio> {
        std::mem::take(&mut self.buffers)
    }
}

impl AudioSink for CollectingSink {
    fn deliver(&mut self, audio: RenderedAudio) {
        self.buffers.push(audio);
    }

    fn is_live(&self) -> bool {
        !self.closed
    }
}
