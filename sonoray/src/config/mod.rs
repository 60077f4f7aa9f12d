mod acoustic_config;
mod engine_desc;

pub use acoustic_config::AcousticConfig;
pub use engine_desc::{EarLayout, EngineDesc};
