use super::{DryAudio, DryAudioSource};
use crate::error::{Result, SonorayError};
use crate::propagation::SoundId;
use std::collections::HashMap;

/// Dry audio held in memory, keyed by sound id.
#[derive(Debug, Clone, Default)]
pub struct MemoryAudioSource {
    sounds: HashMap<SoundId, DryAudio>,
}

impl MemoryAudioSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, sound: impl Into<SoundId>, audio: DryAudio) {
        self.sounds.insert(sound.into(), audio);
    }

    pub fn with(mut self, sound: impl Into<SoundId>, audio: DryAudio) -> Self {
        self.insert(sound, audio);
        self
    }

    pub fn len(&self) -> usize {
        self.sounds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sounds.is_empty()
    }
}

impl DryAudioSource for MemoryAudioSource {
    fn load(&self, sound: &SoundId) -> Result<DryAudio> {
        self.sounds
            .get(sound)
            .cloned()
            .ok_or_else(|| SonorayError::AssetMissing(sound.to_string()))
    }
}
