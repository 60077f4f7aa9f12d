//! Signal processing: FFT primitive and convolution.

mod complex;
mod convolution;
mod fft;

pub use complex::Complex;
pub use convolution::{
    MAX_PLAYBACK_RATE, MIN_PLAYBACK_RATE, convolve, convolve_blocked, pitched_sample_rate,
};
pub use fft::{fft, ifft};
