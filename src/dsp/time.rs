//! Time-based effects
//!
//! Neither effect changes the buffer length. Echo tails past the end are
//! dropped. Time stretch resamples and then pads with silence or truncates,
//! so the decoder sees progressive line drift (and, for rates above 1,
//! silence after the compressed image) rather than a shorter buffer.

use crate::engine::io::resample_linear;
use crate::engine::AudioBuffer;

/// Number of echoes generated by [`delay`]
pub const ECHO_TAPS: usize = 5;

/// Multi-tap echo: tap `k` at `k * delay_ms`, gain `feedback^k`, mixed
/// with the dry signal by `mix`
pub fn delay(samples: &mut [f32], sample_rate: u32, delay_ms: f64, feedback: f64, mix: f64) {
    let spacing = (delay_ms * sample_rate as f64 / 1000.0) as usize;
    if spacing == 0 {
        return;
    }
    let gains: Vec<f64> = (1..=ECHO_TAPS as i32).map(|k| feedback.powi(k)).collect();

    // walk backwards so earlier (still dry) samples feed the echoes
    for i in (0..samples.len()).rev() {
        let dry = samples[i] as f64;
        let mut wet = dry;
        for (k, gain) in gains.iter().enumerate() {
            let offset = spacing * (k + 1);
            if offset > i {
                break;
            }
            wet += samples[i - offset] as f64 * gain;
        }
        samples[i] = (dry * (1.0 - mix) + wet * mix) as f32;
    }
}

/// Resample by `1 / rate` and fit back to the original length
///
/// Rates within 1 % of unity are a no-op.
pub fn time_stretch(buffer: &mut AudioBuffer, rate: f64) {
    if (rate - 1.0).abs() < 0.01 || rate <= 0.0 {
        return;
    }
    let len = buffer.len();
    buffer.samples = resample_linear(&buffer.samples, 1.0 / rate);
    buffer.fit_to_len(len);
}
