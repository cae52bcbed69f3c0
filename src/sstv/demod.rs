//! Streaming FM demodulator
//!
//! Instantaneous frequency from the phase difference of consecutive
//! analytic-signal samples: `arg(z[n] * conj(z[n-1])) * fs / 2pi`.
//!
//! Output `i` of the trace describes the signal interval `[i - D, i - D + 1]`
//! with `D = delay() + 1`, so trace position `t + D` corresponds to signal
//! time `t`.

use std::f64::consts::TAU;

use crate::dsp::hilbert::HilbertFir;

/// Causal per-sample frequency estimator
#[derive(Debug, Clone)]
pub struct FmDemodulator {
    fir: HilbertFir,
    sample_rate: f64,
    prev: (f64, f64),
}

impl FmDemodulator {
    /// Create a demodulator using a `2 * half_len + 1` tap Hilbert filter
    pub fn new(sample_rate: u32, half_len: usize) -> Self {
        Self {
            fir: HilbertFir::new(half_len),
            sample_rate: sample_rate as f64,
            prev: (0.0, 0.0),
        }
    }

    /// Offset between signal time and trace index, in samples
    pub fn trace_delay(&self) -> f64 {
        self.fir.delay() as f64 + 1.0
    }

    /// Push one sample and return the frequency estimate in Hz
    ///
    /// Silence yields 0 Hz.
    #[inline]
    pub fn push(&mut self, sample: f32) -> f32 {
        let (re, im) = self.fir.process(sample as f64);
        let (pre, pim) = self.prev;
        self.prev = (re, im);

        if pre * pre + pim * pim < 1e-18 || re * re + im * im < 1e-18 {
            return 0.0;
        }
        // z * conj(prev)
        let dr = re * pre + im * pim;
        let di = im * pre - re * pim;
        (di.atan2(dr) * self.sample_rate / TAU) as f32
    }

    /// Demodulate a whole slice into `out`
    pub fn push_slice(&mut self, samples: &[f32], out: &mut Vec<f32>) {
        out.reserve(samples.len());
        for &s in samples {
            out.push(self.push(s));
        }
    }
}
