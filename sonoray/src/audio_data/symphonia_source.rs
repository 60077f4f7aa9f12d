use crate::{
    audio_data::{DryAudio, DryAudioSource, LoadOptions},
    error::{Result, SonorayError},
    propagation::SoundId,
};
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use symphonia::{
    core::{
        audio::SampleBuffer, codecs::DecoderOptions, errors::Error, formats::FormatOptions,
        io::MediaSourceStream, meta::MetadataOptions, probe::Hint,
    },
    default::{get_codecs, get_probe},
};

/// Dry audio source that decodes files below a root directory with
/// Symphonia.
///
/// A sound id such as `block.door:open` is looked up as `<root>/block.door/open`
/// followed by each configured extension, unless the id already names an
/// existing file. Multi-channel files are averaged down to mono.
///
/// A sound can be backed by several weighted variants; each event then plays
/// one of them, chosen from the event's seed.
///
/// # Examples
///
/// ```ignore
/// use sonoray::audio_data::{DryAudioSource, LoadOptions, SymphoniaAudioSource};
///
/// let source = SymphoniaAudioSource::new("assets/sounds")
///     .with_options(LoadOptions::new().target_sample_rate(44_100))
///     .with_pitch("creature:step", 1.25)
///     .with_variants("creature:step", [("creature:step1", 2), ("creature:step2", 1)]);
/// let audio = source.load(&"creature:step".into())?;
/// ```
pub struct SymphoniaAudioSource {
    root: PathBuf,
    options: LoadOptions,
    pitches: HashMap<SoundId, f32>,
    variants: HashMap<SoundId, Vec<(SoundId, u32)>>,
}

impl SymphoniaAudioSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            options: LoadOptions::default(),
            pitches: HashMap::new(),
            variants: HashMap::new(),
        }
    }

    pub fn with_options(mut self, options: LoadOptions) -> Self {
        self.options = options;
        self
    }

    /// Tags every load of `sound` with a playback speed factor.
    pub fn with_pitch(mut self, sound: impl Into<SoundId>, pitch: f32) -> Self {
        self.pitches.insert(sound.into(), pitch);
        self
    }

    /// Backs `sound` with weighted variants. Zero weights are ignored.
    pub fn with_variants<I, S>(mut self, sound: impl Into<SoundId>, variants: I) -> Self
    where
        I: IntoIterator<Item = (S, u32)>,
        S: Into<SoundId>,
    {
        let variants = variants
            .into_iter()
            .filter(|(_, weight)| *weight > 0)
            .map(|(variant, weight)| (variant.into(), weight))
            .collect();
        self.variants.insert(sound.into(), variants);
        self
    }

    /// Finds the file backing `sound`.
    pub fn resolve(&self, sound: &SoundId) -> Option<PathBuf> {
        let relative: PathBuf = sound.as_str().split(':').collect();
        let direct = self.root.join(&relative);
        if direct.is_file() {
            return Some(direct);
        }
        self.options
            .extensions
            .iter()
            .map(|ext| {
                let mut name = direct.clone().into_os_string();
                name.push(".");
                name.push(ext);
                PathBuf::from(name)
            })
            .find(|candidate| candidate.is_file())
    }

    /// Decodes a file into interleaved samples, returning them with the
    /// sample rate and channel count.
    pub fn decode_file(path: &Path) -> Result<(Vec<f32>, u32, usize)> {
        let file = File::open(path)?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let probed = get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| {
                SonorayError::AudioLoading(format!("Failed to probe audio format: {:?}", e))
            })?;
        let mut format = probed.format;

        let track = format.default_track().ok_or_else(|| {
            SonorayError::AudioLoading("No default audio track found".to_string())
        })?;
        let track_id = track.id;
        let sample_rate = track
            .codec_params
            .sample_rate
            .ok_or_else(|| SonorayError::AudioLoading("Sample rate not found".to_string()))?;
        let channels = track
            .codec_params
            .channels
            .ok_or_else(|| SonorayError::AudioLoading("Channel count not found".to_string()))?
            .count();

        let mut decoder = get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| SonorayError::AudioLoading(format!("Failed to create decoder: {:?}", e)))?;

        let mut samples: Vec<f32> = Vec::new();
        loop {
            let packet = match format.next_packet() {
                Ok(packet) => packet,
                Err(Error::IoError(_)) => break, // end-of-file
                Err(e) => {
                    return Err(SonorayError::AudioLoading(format!(
                        "Error reading packet: {:?}",
                        e
                    )));
                }
            };
            if packet.track_id() != track_id {
                continue;
            }

            let decoded = match decoder.decode(&packet) {
                Ok(decoded) => decoded,
                Err(Error::IoError(_)) => break,
                Err(Error::DecodeError(_)) => continue, // recoverable corruption
                Err(e) => {
                    return Err(SonorayError::AudioLoading(format!(
                        "Error decoding packet: {:?}",
                        e
                    )));
                }
            };

            let spec = *decoded.spec();
            let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
            buffer.copy_interleaved_ref(decoded);
            samples.extend_from_slice(buffer.samples());
        }

        Ok((samples, sample_rate, channels))
    }
}

impl DryAudioSource for SymphoniaAudioSource {
    fn load(&self, sound: &SoundId) -> Result<DryAudio> {
        let path = self
            .resolve(sound)
            .ok_or_else(|| SonorayError::AssetMissing(sound.to_string()))?;
        log::debug!("Decoding {} from {}", sound, path.display());

        let (interleaved, sample_rate, channels) = Self::decode_file(&path)?;
        let mut audio = DryAudio::new(DryAudio::downmix(&interleaved, channels), sample_rate)?;

        if let Some(target) = self.options.target_sample_rate {
            if target != audio.sample_rate() {
                let resampler = super::AudioResampler::new(
                    audio.sample_rate(),
                    target,
                    Some(self.options.resampler_chunk_size),
                )?;
                audio = DryAudio::new(resampler.resample(audio.samples())?, target)?;
            }
        }

        match self.pitches.get(sound) {
            Some(&pitch) => audio.with_pitch(pitch),
            None => Ok(audio),
        }
    }

    fn variant(&self, sound: &SoundId, seed: u64) -> SoundId {
        let Some(variants) = self.variants.get(sound) else {
            return sound.clone();
        };
        let total: u64 = variants.iter().map(|(_, weight)| *weight as u64).sum();
        if total == 0 {
            return sound.clone();
        }

        let mut pick = Xoshiro256PlusPlus::seed_from_u64(seed).random_range(0..total);
        for (variant, weight) in variants {
            if pick < *weight as u64 {
                return variant.clone();
            }
            pick -= *weight as u64;
        }
        sound.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_assets_are_reported() {
        let source = SymphoniaAudioSource::new(std::env::temp_dir().join("sonoray-missing-root"));
        assert!(matches!(
            source.load(&"nowhere:nothing".into()),
            Err(SonorayError::AssetMissing(_))
        ));
    }

    #[test]
    fn variants_follow_the_seed_and_weights() {
        let source = SymphoniaAudioSource::new("unused").with_variants(
            "door:slam",
            [("door:slam1", 3), ("door:slam2", 1), ("door:never", 0)],
        );
        let sound: SoundId = "door:slam".into();

        assert_eq!(source.variant(&sound, 17), source.variant(&sound, 17));
        let mut counts: HashMap<SoundId, usize> = HashMap::new();
        for seed in 0..4000 {
            *counts.entry(source.variant(&sound, seed)).or_default() += 1;
        }
        assert_eq!(counts.len(), 2);
        let first = counts[&SoundId::from("door:slam1")];
        assert!((2700..3300).contains(&first), "slam1 picked {first} times");

        // Sounds without variants play themselves.
        let plain: SoundId = "bell".into();
        assert_eq!(source.variant(&plain, 5), plain);
    }

    #[test]
    fn resolve_tries_each_extension() {
        let root = std::env::temp_dir().join(format!("sonoray-resolve-{}", std::process::id()));
        std::fs::create_dir_all(root.join("ambient")).unwrap();
        std::fs::write(root.join("ambient").join("wind.wav"), b"not really audio").unwrap();

        let source = SymphoniaAudioSource::new(&root);
        let found = source.resolve(&"ambient:wind".into()).unwrap();
        assert_eq!(found, root.join("ambient").join("wind.wav"));
        assert!(source.resolve(&"ambient:rain".into()).is_none());

        // The bytes are not a wave file, so decoding fails without panicking.
        assert!(source.load(&"ambient:wind".into()).is_err());
        std::fs::remove_dir_all(&root).unwrap();
    }
}
