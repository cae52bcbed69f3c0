//! Line-aware corruption
//!
//! Scanline corruption walks the buffer in regions of one image line of the
//! transmitted mode and damages whole lines. Sync wobble and sync dropout
//! attack the timing reference instead.

use std::f64::consts::TAU;

use rand::Rng;

use super::effect::EffectContext;

/// Polarity flip spacing at zero and full intensity
const FLIP_MS_GENTLE: f64 = 20.0;
const FLIP_MS_HARSH: f64 = 2.0;

/// Line artifact kinds, drawn uniformly per corrupted line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Artifact {
    /// Polarity flips every few ms: each flip is a phase jump the
    /// demodulator reads as a frequency spike
    PhaseInversion,
    /// A brief foreign tone inside the SSTV band
    FrequencySpike,
    /// A silenced span (black bar)
    Silence,
    /// Additive noise across the line
    NoiseBurst,
}

impl Artifact {
    fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        match rng.gen_range(0..4) {
            0 => Artifact::PhaseInversion,
            1 => Artifact::FrequencySpike,
            2 => Artifact::Silence,
            _ => Artifact::NoiseBurst,
        }
    }
}

/// Corrupt whole lines with probability `probability` each
///
/// Regions start after the context's lead-in and are one line long, so
/// every region covers exactly one transmitted line.
pub fn scanline_corruption<R: Rng + ?Sized>(
    samples: &mut [f32],
    sample_rate: u32,
    probability: f64,
    intensity: f64,
    ctx: &EffectContext,
    rng: &mut R,
) {
    if probability <= 0.0 {
        return;
    }
    let fs = sample_rate as f64;
    let line = (ctx.line_duration_ms() * fs / 1000.0).max(1.0);
    let lead_in = ctx.lead_in_ms.max(0.0) * fs / 1000.0;
    let len = samples.len();

    let mut line_index = 0usize;
    loop {
        let start = (lead_in + line_index as f64 * line).round() as usize;
        if start >= len {
            break;
        }
        let end = ((lead_in + (line_index + 1) as f64 * line).round() as usize).min(len);
        line_index += 1;

        if rng.gen::<f64>() >= probability {
            continue;
        }
        let region = &mut samples[start..end];
        match Artifact::random(rng) {
            Artifact::PhaseInversion => invert_phase(region, fs, intensity),
            Artifact::FrequencySpike => frequency_spike(region, fs, intensity, rng),
            Artifact::Silence => silence(region, intensity, rng),
            Artifact::NoiseBurst => {
                for sample in region.iter_mut() {
                    *sample += (rng.gen_range(-1.0..1.0) * intensity * 0.5) as f32;
                }
            }
        }
    }
}

fn invert_phase(region: &mut [f32], fs: f64, intensity: f64) {
    let flip_ms = FLIP_MS_GENTLE + (FLIP_MS_HARSH - FLIP_MS_GENTLE) * intensity.clamp(0.0, 1.0);
    let flip_len = ((flip_ms * fs / 1000.0) as usize).max(1);
    for (i, sample) in region.iter_mut().enumerate() {
        if (i / flip_len) % 2 == 0 {
            *sample = -*sample;
        }
    }
}

/// Replace a brief span with a tone between 1800 and 2200 Hz
fn frequency_spike<R: Rng + ?Sized>(region: &mut [f32], fs: f64, intensity: f64, rng: &mut R) {
    let len = region.len();
    let span = (((0.05 + 0.25 * intensity) * len as f64) as usize).clamp(1, len);
    let offset = rng.gen_range(0..=len - span);
    let freq = rng.gen_range(1800.0..2200.0);
    let amplitude = 0.5 + 0.5 * intensity;
    for (k, sample) in region[offset..offset + span].iter_mut().enumerate() {
        *sample = ((TAU * freq * k as f64 / fs).sin() * amplitude) as f32;
    }
}

/// Zero a span of `intensity` of the line (at least one sample)
fn silence<R: Rng + ?Sized>(region: &mut [f32], intensity: f64, rng: &mut R) {
    let len = region.len();
    let span = ((intensity * len as f64) as usize).clamp(1, len);
    let offset = rng.gen_range(0..=len - span);
    region[offset..offset + span].fill(0.0);
}

/// Gain wobble `1 + (0.7 * LFO + 0.3 * jitter) * amount * 0.15`
pub fn sync_wobble<R: Rng + ?Sized>(
    samples: &mut [f32],
    sample_rate: u32,
    amount: f64,
    rate_hz: f64,
    rng: &mut R,
) {
    if amount <= 0.0 {
        return;
    }
    let fs = sample_rate as f64;
    for (i, sample) in samples.iter_mut().enumerate() {
        let wobble = (TAU * rate_hz * i as f64 / fs).sin();
        let jitter: f64 = rng.gen_range(-0.3..0.3);
        let modulation = wobble * 0.7 + jitter * 0.3;
        *sample = (*sample as f64 * (1.0 + modulation * amount * 0.15)) as f32;
    }
}

/// Interval between dropout checks
const DROPOUT_CHECK_SECS: f64 = 0.05;

/// Residual level inside a dropout
const DROPOUT_FLOOR: f32 = 0.1;

/// Every 50 ms, with chance `probability * 0.05`, attenuate `duration_ms`
/// of audio to 10 % with short linear fades
pub fn sync_dropout<R: Rng + ?Sized>(
    samples: &mut [f32],
    sample_rate: u32,
    probability: f64,
    duration_ms: f64,
    rng: &mut R,
) {
    if probability <= 0.0 {
        return;
    }
    let fs = sample_rate as f64;
    let len = samples.len();
    let dropout = (duration_ms * fs / 1000.0) as usize;
    let interval = ((fs * DROPOUT_CHECK_SECS) as usize).max(1);
    let fade = (dropout / 4).min(20);

    for start in (0..len).step_by(interval) {
        if rng.gen::<f64>() >= probability * 0.05 {
            continue;
        }
        let end = (start + dropout).min(len);
        let hold_start = (start + fade).min(end);
        let hold_end = end.saturating_sub(fade).max(hold_start);

        for (k, sample) in samples[start..hold_start].iter_mut().enumerate() {
            *sample *= fade_gain(fade, fade - 1 - k.min(fade - 1));
        }
        for sample in samples[hold_start..hold_end].iter_mut() {
            *sample *= DROPOUT_FLOOR;
        }
        for (k, sample) in samples[hold_end..end].iter_mut().enumerate() {
            *sample *= fade_gain(fade, k);
        }
    }
}

/// Linear ramp 0 -> 1 over `fade` samples, value at step `k`
fn fade_gain(fade: usize, k: usize) -> f32 {
    if fade <= 1 {
        0.0
    } else {
        k as f32 / (fade - 1) as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sstv::modes::ROBOT_36;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn tone(len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| (TAU * 1900.0 * i as f64 / 44100.0).sin() as f32 * 0.8)
            .collect()
    }

    #[test]
    fn test_full_probability_touches_every_line() {
        let ctx = EffectContext::for_mode(&ROBOT_36, 0.0);
        let line = 6615;
        let original = tone(line * 20);
        let mut samples = original.clone();
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        scanline_corruption(&mut samples, 44100, 1.0, 0.7, &ctx, &mut rng);
        for l in 0..20 {
            let range = l * line..(l + 1) * line;
            assert_ne!(samples[range.clone()], original[range], "line {}", l);
        }
    }

    #[test]
    fn test_zero_probability_is_identity() {
        let original = tone(20_000);
        let mut samples = original.clone();
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        scanline_corruption(&mut samples, 44100, 0.0, 1.0, &EffectContext::default(), &mut rng);
        assert_eq!(samples, original);
    }

    #[test]
    fn test_lead_in_is_untouched() {
        let ctx = EffectContext::for_mode(&ROBOT_36, 910.0);
        let original = tone(44100 * 2);
        let mut samples = original.clone();
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        scanline_corruption(&mut samples, 44100, 1.0, 1.0, &ctx, &mut rng);
        let lead_in = (0.91 * 44100.0) as usize;
        assert_eq!(samples[..lead_in], original[..lead_in]);
        assert_ne!(samples[lead_in..], original[lead_in..]);
    }

    #[test]
    fn test_invert_phase_alternates() {
        let mut region = vec![1.0f32; 100];
        invert_phase(&mut region, 1000.0, 1.0);
        // 2 ms at 1 kHz -> flips every 2 samples
        assert_eq!(&region[..6], &[-1.0, -1.0, 1.0, 1.0, -1.0, -1.0]);
    }

    #[test]
    fn test_dropout_attenuates() {
        let mut samples = vec![1.0f32; 44100 * 10];
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        sync_dropout(&mut samples, 44100, 1.0, 20.0, &mut rng);
        assert!(samples.iter().any(|&s| (s - DROPOUT_FLOOR).abs() < 1e-6));
        assert!(samples.iter().all(|&s| (0.0..=1.0).contains(&s)));
    }

    #[test]
    fn test_wobble_stays_near_unity() {
        let mut samples = vec![0.5f32; 10_000];
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        sync_wobble(&mut samples, 44100, 1.0, 5.0, &mut rng);
        assert!(samples.iter().all(|&s| (0.5 * 0.85..=0.5 * 1.15).contains(&s)));
    }
}
