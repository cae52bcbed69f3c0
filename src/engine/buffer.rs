//! Audio Buffer Management
//!
//! Mono floating-point sample buffer shared by the encoder, the effect chain
//! and the decoder. A buffer is owned by the stage that produced it and moved
//! to the next one; stages that need to keep the input clone it explicitly.

use sha2::{Digest, Sha256};

// ============================================================================
// Constants
// ============================================================================

/// Default sample rate shared by encoder, effects and decoder
pub const DEFAULT_SAMPLE_RATE: u32 = 44100;

/// Largest magnitude a sanitized sample may have
pub const SAMPLE_LIMIT: f32 = 1.0;

// ============================================================================
// Helper Functions
// ============================================================================

/// Convert linear amplitude to decibels
///
/// # Arguments
/// * `linear` - Linear amplitude value
///
/// # Returns
/// Value in decibels. Returns -f32::INFINITY for zero input.
#[inline]
pub fn linear_to_db(linear: f32) -> f32 {
    if linear <= 0.0 {
        f32::NEG_INFINITY
    } else {
        20.0 * linear.log10()
    }
}

/// Replace a non-finite sample with the nearest valid value
///
/// NaN becomes silence, infinities become the matching full-scale boundary.
#[inline]
pub fn sanitize_sample(sample: f32) -> f32 {
    if sample.is_nan() {
        0.0
    } else if sample.is_infinite() {
        SAMPLE_LIMIT.copysign(sample)
    } else {
        sample
    }
}

// ============================================================================
// AudioBuffer
// ============================================================================

/// Mono audio buffer with a fixed sample rate
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    /// Sample data, nominally in [-1.0, 1.0]
    pub samples: Vec<f32>,
    /// Sample rate in Hz
    pub sample_rate: u32,
}

impl AudioBuffer {
    /// Create a silent buffer of `num_samples` samples
    pub fn new(num_samples: usize, sample_rate: u32) -> Self {
        Self {
            samples: vec![0.0; num_samples],
            sample_rate,
        }
    }

    /// Wrap existing samples
    pub fn from_samples(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Number of samples
    #[inline]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether the buffer holds no samples
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Duration in seconds
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// Convert a duration in milliseconds to a (fractional) sample count
    #[inline]
    pub fn ms_to_samples(&self, ms: f64) -> f64 {
        ms * self.sample_rate as f64 / 1000.0
    }

    /// Immutable sample slice
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Mutable sample slice
    pub fn samples_mut(&mut self) -> &mut [f32] {
        &mut self.samples
    }

    /// Consume the buffer, returning its samples
    pub fn into_samples(self) -> Vec<f32> {
        self.samples
    }

    /// Absolute peak sample value
    pub fn peak(&self) -> f32 {
        self.samples.iter().map(|s| s.abs()).fold(0.0_f32, f32::max)
    }

    /// Root mean square level (linear)
    pub fn rms(&self) -> f32 {
        if self.samples.is_empty() {
            return 0.0;
        }
        let sum_squares: f64 = self.samples.iter().map(|&s| (s as f64) * (s as f64)).sum();
        (sum_squares / self.samples.len() as f64).sqrt() as f32
    }

    /// Replace every NaN/infinite sample in place
    ///
    /// # Returns
    /// Number of samples that were replaced
    pub fn sanitize(&mut self) -> usize {
        let mut replaced = 0;
        for sample in self.samples.iter_mut() {
            if !sample.is_finite() {
                *sample = sanitize_sample(*sample);
                replaced += 1;
            }
        }
        replaced
    }

    /// Clamp every sample into [-limit, limit]
    pub fn clamp(&mut self, limit: f32) {
        for sample in self.samples.iter_mut() {
            *sample = sample.clamp(-limit, limit);
        }
    }

    /// Scale the buffer down so its peak equals `target` when it exceeds it
    ///
    /// # Returns
    /// The gain that was applied (1.0 when untouched)
    pub fn normalize_peak(&mut self, target: f32) -> f32 {
        let peak = self.peak();
        if peak <= target || peak == 0.0 {
            return 1.0;
        }
        let gain = target / peak;
        // clamp absorbs the rounding of target / peak
        for sample in self.samples.iter_mut() {
            *sample = (*sample * gain).clamp(-target, target);
        }
        gain
    }

    /// Resize to `len` samples, truncating or zero padding the tail
    pub fn fit_to_len(&mut self, len: usize) {
        self.samples.resize(len, 0.0);
    }

    /// SHA-256 fingerprint of the exact sample bits and rate
    ///
    /// Two buffers share a fingerprint only if they are bit-identical, which
    /// is what reproducible presets promise.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.sample_rate.to_le_bytes());
        for sample in &self.samples {
            hasher.update(sample.to_bits().to_le_bytes());
        }
        format!("{:x}", hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_new_is_silent() {
        let buffer = AudioBuffer::new(100, DEFAULT_SAMPLE_RATE);
        assert_eq!(buffer.len(), 100);
        assert_eq!(buffer.peak(), 0.0);
        assert_eq!(buffer.rms(), 0.0);
    }

    #[test]
    fn test_duration() {
        let buffer = AudioBuffer::new(44100, 44100);
        assert_relative_eq!(buffer.duration_secs(), 1.0);
        assert_relative_eq!(buffer.ms_to_samples(10.0), 441.0);
    }

    #[test]
    fn test_sanitize_replaces_non_finite() {
        let mut buffer = AudioBuffer::from_samples(
            vec![0.5, f32::NAN, f32::INFINITY, f32::NEG_INFINITY, -0.25],
            48000,
        );
        assert_eq!(buffer.sanitize(), 3);
        assert_eq!(buffer.samples, vec![0.5, 0.0, 1.0, -1.0, -0.25]);
    }

    #[test]
    fn test_normalize_only_when_over_target() {
        let mut quiet = AudioBuffer::from_samples(vec![0.5, -0.4], 48000);
        assert_eq!(quiet.normalize_peak(1.0), 1.0);
        assert_eq!(quiet.samples, vec![0.5, -0.4]);

        let mut loud = AudioBuffer::from_samples(vec![2.0, -1.0], 48000);
        loud.normalize_peak(1.0);
        assert_relative_eq!(loud.samples[0], 1.0);
        assert_relative_eq!(loud.samples[1], -0.5);
    }

    #[test]
    fn test_fit_to_len() {
        let mut buffer = AudioBuffer::from_samples(vec![1.0, 2.0, 3.0], 48000);
        buffer.fit_to_len(5);
        assert_eq!(buffer.samples, vec![1.0, 2.0, 3.0, 0.0, 0.0]);
        buffer.fit_to_len(2);
        assert_eq!(buffer.samples, vec![1.0, 2.0]);
    }

    #[test]
    fn test_fingerprint_distinguishes_buffers() {
        let a = AudioBuffer::from_samples(vec![0.1, 0.2, 0.3], 44100);
        let b = AudioBuffer::from_samples(vec![0.1, 0.2, 0.3], 44100);
        let c = AudioBuffer::from_samples(vec![0.1, 0.2, 0.30001], 44100);
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_ne!(a.fingerprint(), c.fingerprint());
        assert_eq!(a.fingerprint().len(), 64);
    }

    #[test]
    fn test_linear_to_db() {
        assert_relative_eq!(linear_to_db(1.0), 0.0);
        assert!(linear_to_db(0.0).is_infinite());
    }
}
