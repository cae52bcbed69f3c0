//! Amplitude nonlinearities
//!
//! Soft-clip distortion and bitcrushing. Both are memoryless per sample
//! apart from the bitcrusher's sample-and-hold.

/// `tanh` soft clip with drive-dependent gain, mixed dry/wet by `drive`
pub fn distortion(samples: &mut [f32], drive: f64, clip: f64) {
    let gain = 1.0 + drive * 10.0;
    let threshold = 0.1 + clip * 0.9;
    for sample in samples.iter_mut() {
        let x = *sample as f64;
        let clipped = (x * gain / threshold).tanh() * threshold;
        *sample = (x * (1.0 - drive) + clipped * drive) as f32;
    }
}

/// Sample-and-hold decimation to `target_rate`, then quantisation to
/// `2^bits` levels
pub fn bitcrush(samples: &mut [f32], sample_rate: u32, bits: u32, target_rate: u32) {
    if target_rate > 0 && target_rate < sample_rate {
        let factor = ((sample_rate / target_rate) as usize).max(1);
        if factor > 1 {
            for block in samples.chunks_mut(factor) {
                let held = block[0];
                block.fill(held);
            }
        }
    }

    let half_levels = 2f64.powi(bits.clamp(1, 16) as i32) / 2.0;
    for sample in samples.iter_mut() {
        *sample = ((*sample as f64 * half_levels).round() / half_levels) as f32;
    }
}
