use super::{DryAudio, DryAudioSource};
use crate::error::Result;
use crate::propagation::SoundId;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

/// Remembers every successfully loaded sound.
///
/// Failed loads are not cached, so an asset that appears later is picked up
/// by the next event that needs it.
pub struct CachedAudioSource<S> {
    inner: S,
    cache: Mutex<HashMap<SoundId, DryAudio>>,
    hits: AtomicUsize,
    misses: AtomicUsize,
}

impl<S: DryAudioSource> CachedAudioSource<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            cache: Mutex::new(HashMap::new()),
            hits: AtomicUsize::new(0),
            misses: AtomicUsize::new(0),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> usize {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl<S: DryAudioSource> DryAudioSource for CachedAudioSource<S> {
    fn load(&self, sound: &SoundId) -> Result<DryAudio> {
        if let Some(audio) = self
            .cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(sound)
        {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(audio.clone());
        }

        // Decode outside the lock; two workers racing on the same sound both
        // decode it and the second insert wins.
        self.misses.fetch_add(1, Ordering::Relaxed);
        let audio = self.inner.load(sound)?;
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(sound.clone(), audio.clone());
        Ok(audio)
    }

    fn variant(&self, sound: &SoundId, seed: u64) -> SoundId {
        self.inner.variant(sound, seed)
    }
}
