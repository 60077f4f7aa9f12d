use super::DryAudio;
use crate::error::Result;
use crate::propagation::SoundId;

/// Trait for fetching the dry recording behind a sound.
///
/// Loads run on the background convolution workers, so implementations may
/// block on I/O but must be `Send + Sync`.
///
/// # Example
///
/// ```
/// use sonoray::audio_data::{DryAudio, DryAudioSource};
/// use sonoray::error::{Result, SonorayError};
/// use sonoray::propagation::SoundId;
///
/// struct Beeper;
///
/// impl DryAudioSource for Beeper {
///     fn load(&self, sound: &SoundId) -> Result<DryAudio> {
///         if sound.as_str() != "beep" {
///             return Err(SonorayError::AssetMissing(sound.to_string()));
///         }
///         let samples = (0..4410).map(|i| (i as f32 * 0.06).sin() * 0.3).collect();
///         DryAudio::new(samples, 44_100)
///     }
/// }
///
/// assert!(Beeper.load(&"beep".into()).is_ok());
/// assert!(Beeper.load(&"boop".into()).is_err());
/// ```
pub trait DryAudioSource: Send + Sync {
    /// Loads the mono recording for `sound`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::SonorayError::AssetMissing`] when there is no
    /// asset for the sound, or a decoding error when the asset is unusable.
    /// Either aborts only the event that needed the sound.
    fn load(&self, sound: &SoundId) -> Result<DryAudio>;

    /// The asset one event of `sound` plays, for sounds recorded in several
    /// variants. The same `seed` always picks the same asset; the default is
    /// `sound` itself.
    fn variant(&self, sound: &SoundId, seed: u64) -> SoundId {
        let _ = seed;
        sound.clone()
    }
}

impl<T: DryAudioSource + ?Sized> DryAudioSource for std::sync::Arc<T> {
    fn load(&self, sound: &SoundId) -> Result<DryAudio> {
        (**self).load(sound)
    }

    fn variant(&self, sound: &SoundId, seed: u64) -> SoundId {
        (**self).variant(sound, seed)
    }
}
