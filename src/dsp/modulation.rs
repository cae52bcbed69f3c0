//! Modulation effects
//!
//! Phase modulation displaces samples in time (horizontal jitter on
//! decode), amplitude modulation pumps the level, and harmonic distortion
//! ring-modulates overtones on top of the SSTV band.

use std::f64::consts::TAU;

use rand::Rng;

/// Largest phase-modulation displacement at full depth
const MAX_SHIFT_SECS: f64 = 0.01;

/// Width of the box filter smoothing the chaos signal
const CHAOS_SMOOTHING: usize = 100;

/// Time-varying integer delay driven by `0.7 * LFO + 0.3 * smoothed chaos`
///
/// Samples whose source would fall outside the buffer are left unchanged.
pub fn phase_modulation<R: Rng + ?Sized>(
    samples: &mut [f32],
    sample_rate: u32,
    depth: f64,
    rate_hz: f64,
    rng: &mut R,
) {
    if depth <= 0.0 || samples.is_empty() {
        return;
    }
    let fs = sample_rate as f64;
    let len = samples.len();
    let max_shift = (fs * MAX_SHIFT_SECS * depth).floor();

    let chaos: Vec<f32> = (0..len).map(|_| rng.gen_range(-0.3..0.3)).collect();
    let smoothed = box_smooth(&chaos, CHAOS_SMOOTHING);
    let source = samples.to_vec();

    for (i, sample) in samples.iter_mut().enumerate() {
        let lfo = (TAU * rate_hz * i as f64 / fs).sin();
        let modulation = lfo * 0.7 + smoothed[i] as f64 * 0.3;
        let shift = (modulation * max_shift) as i64;
        let src = i as i64 - shift;
        if src >= 0 && (src as usize) < len {
            *sample = source[src as usize];
        }
    }
}

/// Centred moving average of width `width`; the sum is always divided by
/// `width`, so the ends taper toward zero
fn box_smooth(values: &[f32], width: usize) -> Vec<f32> {
    let len = values.len();
    let before = width / 2;
    let after = width - before;
    let mut out = Vec::with_capacity(len);
    let mut sum = 0.0f64;
    // window for i is [i - before, i + after)
    for &v in values.iter().take(after.min(len)) {
        sum += v as f64;
    }
    for i in 0..len {
        out.push((sum / width as f64) as f32);
        if i + after < len {
            sum += values[i + after] as f64;
        }
        if i >= before {
            sum -= values[i - before] as f64;
        }
    }
    out
}

/// Multi-rate amplitude modulation, output clamped to [-1, 1]
pub fn amplitude_modulation(samples: &mut [f32], sample_rate: u32, depth: f64, rate_hz: f64) {
    if depth <= 0.0 {
        return;
    }
    let fs = sample_rate as f64;
    for (i, sample) in samples.iter_mut().enumerate() {
        let t = i as f64 / fs;
        let modulation = (TAU * rate_hz * t).sin() * 0.5
            + (TAU * rate_hz * 1.618 * t).sin() * 0.3
            + (TAU * rate_hz * 0.5 * t).sin() * 0.2;
        let gain = 1.0 + modulation * depth;
        *sample = (*sample as f64 * gain).clamp(-1.0, 1.0) as f32;
    }
}

/// Ring-modulated overtones on carriers `1800 * (h + 1)` Hz
///
/// Overtone `h` is weighted `amount / (h + 1)`.
pub fn harmonic_distortion(samples: &mut [f32], sample_rate: u32, amount: f64, harmonics: usize) {
    if amount <= 0.0 {
        return;
    }
    let fs = sample_rate as f64;
    let harmonics = harmonics.clamp(1, 5);
    for (i, sample) in samples.iter_mut().enumerate() {
        let t = i as f64 / fs;
        let x = *sample as f64;
        let mut out = x;
        for h in 1..=harmonics {
            let carrier = (TAU * 1800.0 * (h + 1) as f64 * t).sin();
            out += x * carrier * amount / (h + 1) as f64;
        }
        *sample = out as f32;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn ramp(len: usize) -> Vec<f32> {
        (0..len).map(|i| (i as f32 / len as f32) * 2.0 - 1.0).collect()
    }

    #[test]
    fn test_box_smooth_constant() {
        let smoothed = box_smooth(&[1.0; 500], 100);
        assert!((smoothed[250] - 1.0).abs() < 1e-6);
        assert!(smoothed[0] < 0.6);
        assert_eq!(smoothed.len(), 500);
    }

    #[test]
    fn test_phase_modulation_shifts_within_limit() {
        let original = ramp(44100);
        let mut samples = original.clone();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        phase_modulation(&mut samples, 44100, 1.0, 8.0, &mut rng);
        assert_ne!(samples, original);
        // every output sample comes from within 441 samples of its position
        let step = 2.0 / 44100.0;
        for (i, s) in samples.iter().enumerate() {
            let src = ((s + 1.0) / step).round() as i64;
            assert!((src - i as i64).abs() <= 442, "sample {} from {}", i, src);
        }
    }

    #[test]
    fn test_zero_depth_is_identity() {
        let original = ramp(1000);
        let mut samples = original.clone();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        phase_modulation(&mut samples, 44100, 0.0, 8.0, &mut rng);
        amplitude_modulation(&mut samples, 44100, 0.0, 12.0);
        harmonic_distortion(&mut samples, 44100, 0.0, 3);
        assert_eq!(samples, original);
    }

    #[test]
    fn test_amplitude_modulation_stays_in_range() {
        let mut samples = vec![0.95f32; 44100];
        amplitude_modulation(&mut samples, 44100, 1.0, 12.0);
        assert!(samples.iter().all(|s| (-1.0..=1.0).contains(s)));
        assert!(samples.iter().any(|&s| s < 0.5));
    }

    #[test]
    fn test_harmonic_distortion_adds_energy() {
        let mut samples: Vec<f32> = (0..4410)
            .map(|i| (TAU * 1900.0 * i as f64 / 44100.0).sin() as f32 * 0.5)
            .collect();
        let before: f32 = samples.iter().map(|s| s * s).sum();
        harmonic_distortion(&mut samples, 44100, 1.0, 5);
        let after: f32 = samples.iter().map(|s| s * s).sum();
        assert!(after > before);
    }
}
