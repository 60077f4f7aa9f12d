use super::{Complex, fft, ifft};

/// Lowest playback rate a pitched buffer is tagged with.
pub const MIN_PLAYBACK_RATE: u32 = 4_000;
/// Highest playback rate a pitched buffer is tagged with.
pub const MAX_PLAYBACK_RATE: u32 = 96_000;

/// Linear convolution of `dry` with `ir` through one zero-padded FFT.
///
/// The output has `dry.len() + ir.len() - 1` samples, clamped to [-1, 1]
/// without any other rescaling.
///
/// # Returns
///
/// `None` if either input is empty or the result is not finite.
pub fn convolve(dry: &[f32], ir: &[f32]) -> Option<Vec<f32>> {
    convolve_raw(dry, ir).map(clamp_output)
}

/// Overlap-add convolution over segments of the dry signal.
///
/// The impulse response is transformed once with an FFT of length
/// `next_pow2(block_size + ir.len() - 1)`; the dry signal is cut into the
/// longest segments that FFT can hold (never shorter than `block_size`), and
/// each segment's result is added in at its offset. Produces the same result
/// as [`convolve`] without one transform spanning the whole dry signal.
pub fn convolve_blocked(dry: &[f32], ir: &[f32], block_size: usize) -> Option<Vec<f32>> {
    if dry.is_empty() || ir.is_empty() || block_size == 0 {
        return None;
    }
    let fft_len = (block_size + ir.len() - 1).next_power_of_two();
    let segment_len = fft_len - ir.len() + 1;
    if dry.len() <= segment_len {
        return convolve(dry, ir);
    }

    let ir_spectrum = fft(&pad(ir, fft_len)).ok()?;
    let mut output = vec![0.0f64; dry.len() + ir.len() - 1];
    for (index, segment) in dry.chunks(segment_len).enumerate() {
        let spectrum = fft(&pad(segment, fft_len)).ok()?;
        let product: Vec<Complex> = spectrum
            .iter()
            .zip(&ir_spectrum)
            .map(|(a, b)| *a * *b)
            .collect();
        let wet = ifft(&product).ok()?;

        let offset = index * segment_len;
        let len = segment.len() + ir.len() - 1;
        for (out, value) in output[offset..offset + len].iter_mut().zip(&wet) {
            *out += value.re;
        }
    }

    if output.iter().all(|s| s.is_finite()) {
        Some(clamp_output(output))
    } else {
        None
    }
}

fn pad(signal: &[f32], len: usize) -> Vec<Complex> {
    let mut padded: Vec<Complex> = signal
        .iter()
        .map(|&s| Complex::from_real(s as f64))
        .collect();
    padded.resize(len, Complex::ZERO);
    padded
}

fn convolve_raw(dry: &[f32], ir: &[f32]) -> Option<Vec<f64>> {
    if dry.is_empty() || ir.is_empty() {
        return None;
    }
    let output_len = dry.len() + ir.len() - 1;
    let fft_len = output_len.next_power_of_two();

    let dry_spectrum = fft(&pad(dry, fft_len)).ok()?;
    let ir_spectrum = fft(&pad(ir, fft_len)).ok()?;
    let product: Vec<Complex> = dry_spectrum
        .iter()
        .zip(&ir_spectrum)
        .map(|(a, b)| *a * *b)
        .collect();

    let wet: Vec<f64> = ifft(&product)
        .ok()?
        .into_iter()
        .take(output_len)
        .map(|c| c.re)
        .collect();

    if wet.iter().all(|s| s.is_finite()) {
        Some(wet)
    } else {
        None
    }
}

fn clamp_output(wet: Vec<f64>) -> Vec<f32> {
    wet.into_iter()
        .map(|s| s.clamp(-1.0, 1.0) as f32)
        .collect()
}

/// Playback rate for a buffer rendered at `sample_rate` and played back at
/// `pitch` times its normal speed.
///
/// Non-finite or non-positive pitches leave the rate unchanged.
pub fn pitched_sample_rate(sample_rate: u32, pitch: f32) -> u32 {
    if !pitch.is_finite() || pitch <= 0.0 {
        return sample_rate;
    }
    let rate = (sample_rate as f64 * pitch as f64).round();
    rate.clamp(MIN_PLAYBACK_RATE as f64, MAX_PLAYBACK_RATE as f64) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn direct(dry: &[f32], ir: &[f32]) -> Vec<f32> {
        let mut out = vec![0.0f32; dry.len() + ir.len() - 1];
        for (i, x) in dry.iter().enumerate() {
            for (j, h) in ir.iter().enumerate() {
                out[i + j] += x * h;
            }
        }
        out.into_iter().map(|s| s.clamp(-1.0, 1.0)).collect()
    }

    fn signal(len: usize, seed: u32) -> Vec<f32> {
        (0..len)
            .map(|i| (((i as u32).wrapping_mul(2_654_435_761) ^ seed) % 2001) as f32 / 4000.0 - 0.25)
            .collect()
    }

    #[test]
    fn unit_impulse_is_identity() {
        let dry = signal(100, 1);
        let wet = convolve(&dry, &[1.0]).unwrap();
        assert_eq!(wet.len(), dry.len());
        for (a, b) in dry.iter().zip(&wet) {
            assert!((a - b).abs() < 1e-6);
        }
    }

    #[test]
    fn output_length_is_sum_minus_one() {
        for (d, h) in [(1, 1), (3, 5), (100, 1), (257, 31), (1000, 1000)] {
            let wet = convolve(&signal(d, 2), &signal(h, 3)).unwrap();
            assert_eq!(wet.len(), d + h - 1);
        }
    }

    #[test]
    fn matches_direct_convolution() {
        let dry = signal(300, 4);
        let ir: Vec<f32> = signal(45, 5).iter().map(|s| s * 0.1).collect();
        let wet = convolve(&dry, &ir).unwrap();
        for (a, b) in direct(&dry, &ir).iter().zip(&wet) {
            assert!((a - b).abs() < 1e-5);
        }
    }

    #[test]
    fn delayed_impulse_shifts_the_signal() {
        let dry = signal(50, 6);
        let mut ir = vec![0.0; 10];
        ir[9] = 0.5;
        let wet = convolve(&dry, &ir).unwrap();
        assert!(wet[..9].iter().all(|s| s.abs() < 1e-6));
        for (i, x) in dry.iter().enumerate() {
            assert!((wet[i + 9] - x * 0.5).abs() < 1e-6);
        }
    }

    #[test]
    fn loud_results_are_clamped_not_rescaled() {
        let wet = convolve(&[0.9, 0.9], &[1.0, 1.0]).unwrap();
        assert_eq!(wet.len(), 3);
        assert!((wet[0] - 0.9).abs() < 1e-6);
        assert_eq!(wet[1], 1.0);
        assert!((wet[2] - 0.9).abs() < 1e-6);
    }

    #[test]
    fn empty_inputs_have_no_result() {
        assert!(convolve(&signal(100, 7), &[]).is_none());
        assert!(convolve(&[], &[1.0]).is_none());
        assert!(convolve_blocked(&signal(100, 7), &[], 64).is_none());
    }

    #[test]
    fn non_finite_input_has_no_result() {
        assert!(convolve(&[0.1, f32::NAN], &[1.0]).is_none());
    }

    #[test]
    fn blocked_matches_single_shot() {
        let dry = signal(700, 8);
        let ir: Vec<f32> = signal(1500, 9).iter().map(|s| s * 0.01).collect();
        let whole = convolve(&dry, &ir).unwrap();
        for block in [64, 500, 1499, 4096] {
            let blocked = convolve_blocked(&dry, &ir, block).unwrap();
            assert_eq!(blocked.len(), whole.len());
            for (a, b) in whole.iter().zip(&blocked) {
                assert!((a - b).abs() < 1e-5, "block size {block}");
            }
        }
    }

    #[test]
    fn blocked_handles_an_ir_longer_than_the_block() {
        // Two seconds of dry audio against a one second response, split into
        // several segments.
        let dry = signal(20_000, 10);
        let ir: Vec<f32> = signal(5_000, 11).iter().map(|s| s * 0.002).collect();
        let whole = convolve(&dry, &ir).unwrap();
        let blocked = convolve_blocked(&dry, &ir, 256).unwrap();
        assert_eq!(blocked.len(), whole.len());
        for (a, b) in whole.iter().zip(&blocked) {
            assert!((a - b).abs() < 1e-5);
        }
    }

    #[test]
    fn blocked_segment_boundaries_line_up() {
        // A lone impulse in the dry signal must come out exactly once, at
        // its own offset, wherever the segment boundaries fall.
        let mut dry = vec![0.0f32; 3000];
        for at in [0, 1, 548, 549, 550, 2999] {
            dry.fill(0.0);
            dry[at] = 0.5;
            let ir = vec![0.25f32; 1500];
            let wet = convolve_blocked(&dry, &ir, 64).unwrap();
            for (i, s) in wet.iter().enumerate() {
                let expected = if (at..at + 1500).contains(&i) { 0.125 } else { 0.0 };
                assert!((s - expected).abs() < 1e-6, "impulse at {at}, sample {i}");
            }
        }
    }

    #[test]
    fn pitch_rate_is_clamped() {
        assert_eq!(pitched_sample_rate(44_100, 1.0), 44_100);
        assert_eq!(pitched_sample_rate(44_100, 2.0), 88_200);
        assert_eq!(pitched_sample_rate(44_100, 3.0), 96_000);
        assert_eq!(pitched_sample_rate(44_100, 0.01), 4_000);
        assert_eq!(pitched_sample_rate(44_100, f32::NAN), 44_100);
    }
}
