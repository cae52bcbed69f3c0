//! FIR Hilbert transformer
//!
//! Streaming analytic-signal filter shared by the FM demodulator and the
//! frequency shifter. The in-phase output is the input delayed by the
//! filter's group delay, so both branches stay time aligned.

use std::f64::consts::PI;

/// Default half length; 63 taps in total
pub const DEFAULT_HALF_LEN: usize = 31;

/// Hamming-windowed ideal Hilbert taps, `2 * half_len + 1` long
///
/// Even offsets from the centre are zero and the response is antisymmetric.
pub fn hilbert_taps(half_len: usize) -> Vec<f64> {
    let n = 2 * half_len;
    (0..=n)
        .map(|i| {
            let k = i as i64 - half_len as i64;
            if k % 2 == 0 {
                0.0
            } else {
                let window = 0.54 - 0.46 * (2.0 * PI * i as f64 / n as f64).cos();
                2.0 / (PI * k as f64) * window
            }
        })
        .collect()
}

/// Streaming Hilbert filter
///
/// Each call to [`HilbertFir::process`] returns `(i, q)` for the sample
/// `half_len` samples in the past.
#[derive(Debug, Clone)]
pub struct HilbertFir {
    half_len: usize,
    /// Non-zero taps as (offset into history, coefficient)
    taps: Vec<(usize, f64)>,
    /// History stored twice so the newest `len` samples are contiguous
    history: Vec<f64>,
    pos: usize,
}

impl HilbertFir {
    /// Create a filter with `2 * half_len + 1` taps
    pub fn new(half_len: usize) -> Self {
        let half_len = half_len.max(1);
        let len = 2 * half_len + 1;
        let taps = hilbert_taps(half_len)
            .into_iter()
            .enumerate()
            .filter(|(_, c)| *c != 0.0)
            .collect();
        Self {
            half_len,
            taps,
            history: vec![0.0; 2 * len],
            pos: 0,
        }
    }

    /// Group delay in samples
    pub fn delay(&self) -> usize {
        self.half_len
    }

    /// Push one sample, returning the delayed in-phase and quadrature values
    #[inline]
    pub fn process(&mut self, input: f64) -> (f64, f64) {
        let len = 2 * self.half_len + 1;
        self.pos = (self.pos + 1) % len;
        self.history[self.pos] = input;
        self.history[self.pos + len] = input;

        // window[len - 1] is the newest sample, window[0] the oldest
        let window = &self.history[self.pos + 1..self.pos + 1 + len];
        let q = self
            .taps
            .iter()
            .map(|&(k, c)| c * window[len - 1 - k])
            .sum();
        (window[self.half_len], q)
    }

    /// Clear the history
    pub fn reset(&mut self) {
        self.history.iter_mut().for_each(|h| *h = 0.0);
        self.pos = 0;
    }
}

impl Default for HilbertFir {
    fn default() -> Self {
        Self::new(DEFAULT_HALF_LEN)
    }
}
