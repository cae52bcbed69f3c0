//! Biquad filters
//!
//! Second-order sections from the Audio EQ Cookbook, run causally in a
//! single pass. Cascade sections for steeper slopes.

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Butterworth Q for a single section
pub const BUTTERWORTH_Q: f64 = std::f64::consts::FRAC_1_SQRT_2;

/// Supported section shapes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterKind {
    /// Remove above frequency
    LowPass,
    /// Remove below frequency
    HighPass,
}

/// Biquad filter coefficients
/// Transfer function: H(z) = (b0 + b1*z^-1 + b2*z^-2) / (1 + a1*z^-1 + a2*z^-2)
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BiquadCoeffs {
    b0: f64,
    b1: f64,
    b2: f64,
    a1: f64,
    a2: f64,
}

impl BiquadCoeffs {
    /// Calculate coefficients using Audio EQ Cookbook formulas
    /// Reference: https://www.w3.org/2011/audio/audio-eq-cookbook.html
    pub fn calculate(kind: FilterKind, sample_rate: f64, frequency: f64, q: f64) -> Self {
        // Keep the corner inside (0, Nyquist)
        let freq = frequency.clamp(1.0, sample_rate / 2.0 - 1.0);
        let q = q.clamp(0.1, 10.0);

        let w0 = 2.0 * PI * freq / sample_rate;
        let cos_w0 = w0.cos();
        let alpha = w0.sin() / (2.0 * q);

        let (b0, b1, b2) = match kind {
            FilterKind::LowPass => ((1.0 - cos_w0) / 2.0, 1.0 - cos_w0, (1.0 - cos_w0) / 2.0),
            FilterKind::HighPass => ((1.0 + cos_w0) / 2.0, -(1.0 + cos_w0), (1.0 + cos_w0) / 2.0),
        };
        let a0 = 1.0 + alpha;

        BiquadCoeffs {
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: -2.0 * cos_w0 / a0,
            a2: (1.0 - alpha) / a0,
        }
    }
}

/// Biquad filter state
#[derive(Debug, Clone, Copy, Default)]
pub struct BiquadState {
    x1: f64,
    x2: f64,
    y1: f64,
    y2: f64,
}

impl BiquadState {
    /// Direct Form I
    #[inline]
    pub fn process(&mut self, input: f64, coeffs: &BiquadCoeffs) -> f64 {
        let output = coeffs.b0 * input + coeffs.b1 * self.x1 + coeffs.b2 * self.x2
            - coeffs.a1 * self.y1
            - coeffs.a2 * self.y2;

        self.x2 = self.x1;
        self.x1 = input;
        self.y2 = self.y1;
        self.y1 = output;

        output
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Run a cascade of sections over `samples` in place
pub fn filter_in_place(samples: &mut [f32], sections: &[BiquadCoeffs]) {
    let mut states = vec![BiquadState::default(); sections.len()];
    for sample in samples.iter_mut() {
        let mut value = *sample as f64;
        for (state, coeffs) in states.iter_mut().zip(sections) {
            value = state.process(value, coeffs);
        }
        *sample = value as f32;
    }
}
