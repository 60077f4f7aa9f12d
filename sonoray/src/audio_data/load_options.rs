/// How decoded assets are prepared before they reach the convolver.
#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// Resample decoded audio to this rate; None keeps the file's rate
    pub target_sample_rate: Option<u32>,
    /// Chunk size handed to the resampler
    pub resampler_chunk_size: usize,
    /// File extensions tried, in order, when a sound id has none
    pub extensions: Vec<String>,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            target_sample_rate: None,
            resampler_chunk_size: 1024,
            extensions: vec!["ogg".into(), "wav".into(), "flac".into(), "mp3".into()],
        }
    }
}

impl LoadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn target_sample_rate(mut self, sample_rate: u32) -> Self {
        self.target_sample_rate = Some(sample_rate);
        self
    }

    pub fn extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extensions = extensions.into_iter().map(Into::into).collect();
        self
    }
}
