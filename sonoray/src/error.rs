//! Error types for Sonoray

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SonorayError {
    #[error("Audio device error: {0}")]
    AudioDevice(String),

    #[error("Audio format error: {0}")]
    AudioFormat(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Audio loading error: {0}")]
    AudioLoading(String),

    #[error("Audio asset missing: {0}")]
    AssetMissing(String),

    #[error("No world loaded for occlusion queries")]
    WorldUnavailable,

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Numeric error: {0}")]
    NumericDegenerate(String),

    #[error("Worker error: {0}")]
    Worker(String),

    #[error("Engine error: {0}")]
    Engine(String),
}

pub type Result<T> = std::result::Result<T, SonorayError>;
