//! Real-time output of rendered audio through cpal.

use crate::capture::Ear;
use crate::error::{Result, SonorayError};
use crate::sink::{AudioSink, RenderedAudio};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, SizedSample};
use crossbeam_channel::{Receiver, Sender, TrySendError};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Output stream settings.
#[derive(Debug, Clone)]
pub struct PlaybackDesc {
    /// Device sample rate; None uses the device default
    pub sample_rate: Option<u32>,
    /// Output channels; left and right go to the first two
    pub channels: u16,
    /// Fixed callback block size in frames; None lets the host decide
    pub block_size: Option<u32>,
    /// Upper bound on simultaneously playing buffers
    pub max_voices: usize,
}

impl Default for PlaybackDesc {
    fn default() -> Self {
        Self {
            sample_rate: None,
            channels: 2,
            block_size: None,
            max_voices: 64,
        }
    }
}

/// One rendered buffer being played.
#[derive(Debug, Clone)]
struct Voice {
    samples: Vec<f32>,
    ear: Ear,
    sample_rate: u32,
    position: f64,
}

impl Voice {
    fn from_audio(audio: RenderedAudio) -> Self {
        Self {
            samples: audio.samples,
            ear: audio.ear,
            sample_rate: audio.sample_rate,
            position: 0.0,
        }
    }

    fn is_finished(&self) -> bool {
        self.position >= self.samples.len() as f64
    }

    /// Linear interpolation at the current read position.
    fn sample(&self) -> f32 {
        let index = self.position.floor() as usize;
        let frac = (self.position - index as f64) as f32;
        let a = self.samples.get(index).copied().unwrap_or(0.0);
        let b = self.samples.get(index + 1).copied().unwrap_or(0.0);
        a + (b - a) * frac
    }
}

/// Mixes queued voices into interleaved output frames.
///
/// Lives inside the audio callback and never blocks or frees memory: new
/// voices are taken with `try_recv` and finished ones are sent back over a
/// bounded channel to be dropped on the control thread.
pub struct VoiceMixer {
    incoming: Receiver<Voice>,
    retired: Sender<Voice>,
    voices: Vec<Voice>,
    /// Finished voices waiting for room in `retired`
    parked: Vec<Voice>,
    max_voices: usize,
}

impl VoiceMixer {
    fn new(incoming: Receiver<Voice>, retired: Sender<Voice>, max_voices: usize) -> Self {
        Self {
            incoming,
            retired,
            voices: Vec::with_capacity(max_voices),
            parked: Vec::with_capacity(max_voices),
            max_voices,
        }
    }

    pub fn active_voices(&self) -> usize {
        self.voices.len()
    }

    /// Fills `buffer` with `channels`-interleaved frames at `sample_rate`.
    ///
    /// Left voices go to channel 0, right voices to channel 1 and mono
    /// voices to every channel. Voices whose rate differs from the device
    /// rate are stepped at the ratio of the two. Returns the number of frames
    /// written.
    pub fn fill(&mut self, buffer: &mut [f32], sample_rate: u32, channels: u16) -> usize {
        self.retire_parked();
        while self.voices.len() + self.parked.len() < self.max_voices {
            match self.incoming.try_recv() {
                Ok(voice) => self.voices.push(voice),
                Err(_) => break,
            }
        }

        buffer.fill(0.0);
        let channels = channels.max(1) as usize;
        let frames = buffer.len() / channels;
        if sample_rate == 0 {
            return frames;
        }

        for voice in &mut self.voices {
            let step = voice.sample_rate as f64 / sample_rate as f64;
            for frame in buffer.chunks_exact_mut(channels) {
                if voice.is_finished() {
                    break;
                }
                let value = voice.sample();
                match voice.ear {
                    Ear::Left => frame[0] += value,
                    Ear::Right => frame[1.min(channels - 1)] += value,
                    Ear::Mono => frame.iter_mut().for_each(|s| *s += value),
                }
                voice.position += step;
            }
        }
        let mut index = 0;
        while index < self.voices.len() {
            if self.voices[index].is_finished() {
                let voice = self.voices.swap_remove(index);
                self.parked.push(voice);
            } else {
                index += 1;
            }
        }
        self.retire_parked();

        for sample in buffer.iter_mut() {
            *sample = sample.clamp(-1.0, 1.0);
        }
        frames
    }

    fn retire_parked(&mut self) {
        while let Some(voice) = self.parked.pop() {
            if let Err(TrySendError::Full(voice) | TrySendError::Disconnected(voice)) =
                self.retired.try_send(voice)
            {
                self.parked.push(voice);
                break;
            }
        }
    }
}

/// Sends rendered buffers to a running [`PlaybackEngine`].
#[derive(Clone)]
pub struct PlaybackSink {
    voices: Sender<Voice>,
    retired: Receiver<Voice>,
    is_running: Arc<AtomicBool>,
}

impl PlaybackSink {
    /// Frees the voices the mixer has finished with. Called on every
    /// delivery.
    pub fn collect_finished(&self) -> usize {
        self.retired.try_iter().count()
    }
}

impl AudioSink for PlaybackSink {
    fn deliver(&mut self, audio: RenderedAudio) {
        self.collect_finished();
        if self.voices.send(Voice::from_audio(audio)).is_err() {
            log::debug!("Playback stream closed, dropping buffer");
        }
    }

    fn is_live(&self) -> bool {
        self.is_running.load(Ordering::Relaxed)
    }
}

/// Owns the output stream and mixes delivered buffers into it.
pub struct PlaybackEngine {
    desc: PlaybackDesc,
    stream: Option<cpal::Stream>,
    is_running: Arc<AtomicBool>,
    frames_processed: Arc<AtomicUsize>,
    voices: Sender<Voice>,
    retired: Receiver<Voice>,
    mixer: Option<VoiceMixer>,
}

impl PlaybackEngine {
    pub fn new(desc: PlaybackDesc) -> Result<Self> {
        if desc.channels == 0 {
            return Err(SonorayError::Configuration(
                "channels must be greater than 0".into(),
            ));
        }
        let max_voices = desc.max_voices.max(1);
        let (voices, incoming) = crossbeam_channel::unbounded();
        let (retire, retired) = crossbeam_channel::bounded(max_voices);
        let mixer = VoiceMixer::new(incoming, retire, max_voices);
        Ok(Self {
            desc,
            stream: None,
            is_running: Arc::new(AtomicBool::new(false)),
            frames_processed: Arc::new(AtomicUsize::new(0)),
            voices,
            retired,
            mixer: Some(mixer),
        })
    }

    /// A sink that feeds this engine. Buffers delivered before
    /// [`Self::start`] are discarded by the engine, since the sink is not
    /// live yet.
    pub fn sink(&self) -> PlaybackSink {
        PlaybackSink {
            voices: self.voices.clone(),
            retired: self.retired.clone(),
            is_running: self.is_running.clone(),
        }
    }

    /// Opens the default output device and starts the stream.
    pub fn start(&mut self) -> Result<()> {
        if self.is_running.load(Ordering::Relaxed) {
            return Ok(());
        }
        let mixer = self
            .mixer
            .take()
            .ok_or_else(|| SonorayError::Engine("Playback cannot be restarted".into()))?;

        let host = cpal::default_host();
        let device = host.default_output_device().ok_or_else(|| {
            SonorayError::AudioDevice("No default output device available".into())
        })?;
        let default_config = device
            .default_output_config()
            .map_err(|e| SonorayError::AudioDevice(format!("Failed to get default config: {}", e)))?;

        let sample_rate = self
            .desc
            .sample_rate
            .unwrap_or(default_config.sample_rate().0);
        let config = cpal::StreamConfig {
            channels: self.desc.channels,
            sample_rate: cpal::SampleRate(sample_rate),
            buffer_size: match self.desc.block_size {
                Some(frames) => cpal::BufferSize::Fixed(frames),
                None => cpal::BufferSize::Default,
            },
        };

        let stream = match default_config.sample_format() {
            cpal::SampleFormat::F32 => self.create_stream::<f32>(&device, &config, mixer)?,
            cpal::SampleFormat::I16 => self.create_stream::<i16>(&device, &config, mixer)?,
            cpal::SampleFormat::U16 => self.create_stream::<u16>(&device, &config, mixer)?,
            _ => {
                return Err(SonorayError::AudioFormat(
                    "Unsupported sample format".into(),
                ));
            }
        };

        stream
            .play()
            .map_err(|e| SonorayError::AudioDevice(format!("Failed to start stream: {}", e)))?;

        log::info!(
            "Playback started: {} Hz, {} channels",
            sample_rate,
            self.desc.channels
        );
        self.stream = Some(stream);
        self.is_running.store(true, Ordering::Relaxed);
        Ok(())
    }

    /// Stops the stream. Sinks report not live afterwards.
    pub fn stop(&mut self) {
        if let Some(stream) = self.stream.take() {
            self.is_running.store(false, Ordering::Relaxed);
            drop(stream);
        }
    }

    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::Relaxed)
    }

    pub fn frames_processed(&self) -> usize {
        self.frames_processed.load(Ordering::Relaxed)
    }

    pub fn desc(&self) -> &PlaybackDesc {
        &self.desc
    }

    /// Frees finished voices returned by the audio callback.
    pub fn collect_finished(&self) -> usize {
        self.retired.try_iter().count()
    }

    fn create_stream<T>(
        &self,
        device: &cpal::Device,
        config: &cpal::StreamConfig,
        mut mixer: VoiceMixer,
    ) -> Result<cpal::Stream>
    where
        T: SizedSample + FromSample<f32>,
    {
        let is_running = self.is_running.clone();
        let frames_processed = self.frames_processed.clone();
        let sample_rate = config.sample_rate.0;
        let channels = config.channels;
        let mut scratch: Vec<f32> = Vec::new();

        device
            .build_output_stream(
                config,
                move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                    if !is_running.load(Ordering::Relaxed) {
                        for sample in data.iter_mut() {
                            *sample = T::from_sample(0.0f32);
                        }
                        return;
                    }

                    scratch.resize(data.len(), 0.0);
                    let frames = mixer.fill(&mut scratch, sample_rate, channels);
                    for (out, &value) in data.iter_mut().zip(scratch.iter()) {
                        *out = T::from_sample(value);
                    }
                    frames_processed.fetch_add(frames, Ordering::Relaxed);
                },
                move |err| {
                    log::error!("Audio stream error: {}", err);
                },
                None,
            )
            .map_err(|e| SonorayError::AudioDevice(format!("Failed to build stream: {}", e)))
    }
}

impl Drop for PlaybackEngine {
    fn drop(&mut self) {
        self.stop();
    }
}
