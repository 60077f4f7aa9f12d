//! Radix-2 Cooley–Tukey transform.

use super::Complex;
use crate::error::{Result, SonorayError};
use std::f64::consts::TAU;

fn check_len(len: usize) -> Result<()> {
    if len == 0 || !len.is_power_of_two() {
        return Err(SonorayError::NumericDegenerate(format!(
            "FFT length must be a non-zero power of two, got {len}"
        )));
    }
    Ok(())
}

/// Forward discrete Fourier transform.
///
/// Recursive decimation in time. The input length must be a power of two;
/// callers zero-pad as needed.
///
/// # Errors
///
/// Returns [`SonorayError::NumericDegenerate`] for other lengths.
pub fn fft(input: &[Complex]) -> Result<Vec<Complex>> {
    check_len(input.len())?;
    Ok(fft_recursive(input))
}

fn fft_recursive(input: &[Complex]) -> Vec<Complex> {
    let n = input.len();
    if n == 1 {
        return vec![input[0]];
    }

    let even: Vec<Complex> = input.iter().step_by(2).copied().collect();
    let odd: Vec<Complex> = input.iter().skip(1).step_by(2).copied().collect();
    let even = fft_recursive(&even);
    let odd = fft_recursive(&odd);

    let half = n / 2;
    let mut output = vec![Complex::ZERO; n];
    for k in 0..half {
        let twiddle = Complex::from_angle(-TAU * k as f64 / n as f64) * odd[k];
        output[k] = even[k] + twiddle;
        output[k + half] = even[k] - twiddle;
    }
    output
}

/// Inverse transform via `conj(fft(conj(x))) / n`.
pub fn ifft(input: &[Complex]) -> Result<Vec<Complex>> {
    let conjugated: Vec<Complex> = input.iter().map(|c| c.conj()).collect();
    let scale = 1.0 / input.len() as f64;
    Ok(fft(&conjugated)?
        .into_iter()
        .map(|c| c.conj().scale(scale))
        .collect())
}
