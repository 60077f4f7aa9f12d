use crate::error::{Result, SonorayError};
use rubato::{FftFixedIn, Resampler};

/// Offline resampler for mono dry audio.
pub struct AudioResampler {
    source_sample_rate: u32,
    target_sample_rate: u32,
    chunk_size: usize,
}

impl AudioResampler {
    /// Creates a new resampler.
    ///
    /// # Arguments
    /// * `source_sample_rate` - The sample rate of the input audio
    /// * `target_sample_rate` - The desired sample rate of the output audio
    /// * `chunk_size` - Optional size of processing chunks (defaults to 1024)
    pub fn new(
        source_sample_rate: u32,
        target_sample_rate: u32,
        chunk_size: Option<usize>,
    ) -> Result<Self> {
        if source_sample_rate == 0 || target_sample_rate == 0 {
            return Err(SonorayError::AudioFormat(
                "Sample rates must be greater than 0".to_string(),
            ));
        }

        Ok(Self {
            source_sample_rate,
            target_sample_rate,
            chunk_size: chunk_size.unwrap_or(1024).max(1),
        })
    }

    /// Resamples a mono signal.
    ///
    /// The resampler's output delay is skipped and the input is followed by
    /// silence until the tail has been flushed, so a sample at input index
    /// `i` lands at output index `round(i × target / source)`. The output has
    /// `round(len × target / source)` samples.
    pub fn resample(&self, samples: &[f32]) -> Result<Vec<f32>> {
        if self.source_sample_rate == self.target_sample_rate || samples.is_empty() {
            return Ok(samples.to_vec());
        }

        let mut resampler = FftFixedIn::<f32>::new(
            self.source_sample_rate as usize,
            self.target_sample_rate as usize,
            self.chunk_size,
            2, // sub_chunks
            1,
        )
        .map_err(|e| SonorayError::AudioLoading(format!("Failed to create resampler: {}", e)))?;

        let delay = resampler.output_delay();
        let expected_len = self.expected_len(samples.len());
        let mut output = Vec::with_capacity(expected_len + delay + self.chunk_size);
        let mut position = 0;
        while output.len() < expected_len + delay {
            // Past the end of the input only silence is fed
            let mut input_chunk = vec![0.0f32; self.chunk_size];
            if position < samples.len() {
                let end = (position + self.chunk_size).min(samples.len());
                input_chunk[..end - position].copy_from_slice(&samples[position..end]);
            }
            position += self.chunk_size;

            let waves_out = resampler
                .process(&[input_chunk], None)
                .map_err(|e| SonorayError::AudioLoading(format!("Resampling error: {}", e)))?;
            match waves_out.first() {
                Some(channel) if !channel.is_empty() => output.extend_from_slice(channel),
                _ => {
                    return Err(SonorayError::AudioLoading(
                        "Resampler produced no output".to_string(),
                    ));
                }
            }
        }

        output.drain(..delay);
        output.truncate(expected_len);
        Ok(output)
    }

    fn expected_len(&self, input_len: usize) -> usize {
        (input_len as f64 * self.resample_ratio()).round() as usize
    }

    pub fn source_sample_rate(&self) -> u32 {
        self.source_sample_rate
    }

    pub fn target_sample_rate(&self) -> u32 {
        self.target_sample_rate
    }

    /// Ratio of target to source sample rate.
    pub fn resample_ratio(&self) -> f64 {
        self.target_sample_rate as f64 / self.source_sample_rate as f64
    }
}
