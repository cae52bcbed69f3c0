//! Sync pulse detection on the frequency trace
//!
//! A sync candidate is a run of trace values near the sync tone whose length
//! is plausible for the mode. Its timestamp comes from the falling edge into
//! the following porch, interpolated to sub-sample precision at the midpoint
//! between sync and black tones. The Hilbert filter is linear phase, so the
//! midpoint crossing sits on the true edge.

use super::modes::{BLACK_FREQ, SYNC_FREQ};

/// Samples to wait for the edge to cross the midpoint before giving up
const EDGE_PATIENCE: u64 = 8;

#[derive(Debug, Clone, Copy, PartialEq)]
enum EdgeState {
    Idle,
    InRun { start: u64 },
    Pending { since: u64 },
}

/// Streaming sync pulse detector
#[derive(Debug, Clone)]
pub struct SyncDetector {
    tolerance_hz: f32,
    threshold_hz: f32,
    min_len: f64,
    max_len: f64,
    sync_len: f64,
    /// Trace index minus signal time of the described interval's midpoint
    trace_offset: f64,
    state: EdgeState,
    last: f32,
}

impl SyncDetector {
    /// Create a detector
    ///
    /// # Arguments
    /// * `sync_len` - Nominal sync length in samples
    /// * `tolerance_hz` - Maximum distance from the sync tone inside a run
    /// * `min_ratio` / `max_ratio` - Accepted run length relative to `sync_len`
    /// * `trace_delay` - Demodulator trace delay in samples
    pub fn new(
        sync_len: f64,
        tolerance_hz: f64,
        min_ratio: f64,
        max_ratio: f64,
        trace_delay: f64,
    ) -> Self {
        Self {
            tolerance_hz: tolerance_hz as f32,
            threshold_hz: ((SYNC_FREQ + BLACK_FREQ) / 2.0) as f32,
            min_len: sync_len * min_ratio,
            max_len: sync_len * max_ratio,
            sync_len,
            trace_offset: trace_delay - 0.5,
            state: EdgeState::Idle,
            last: 0.0,
        }
    }

    /// Signal time (samples) described by trace index `index`
    #[inline]
    fn time_of(&self, index: u64) -> f64 {
        index as f64 - self.trace_offset
    }

    /// Feed trace value `value` at absolute trace index `index`
    ///
    /// # Returns
    /// The estimated start time of a completed sync pulse, in signal samples
    pub fn push(&mut self, index: u64, value: f32) -> Option<f64> {
        let in_band = (value - SYNC_FREQ as f32).abs() < self.tolerance_hz;
        let previous = self.last;
        self.last = value;

        match self.state {
            EdgeState::Idle => {
                if in_band {
                    self.state = EdgeState::InRun { start: index };
                }
                None
            }
            EdgeState::InRun { start } => {
                if in_band {
                    return None;
                }
                let run_len = (index - start) as f64;
                if run_len < self.min_len || run_len > self.max_len || value < SYNC_FREQ as f32 {
                    self.state = EdgeState::Idle;
                    return None;
                }
                self.state = EdgeState::Pending { since: index };
                self.try_edge(index, previous, value)
            }
            EdgeState::Pending { since } => {
                if let Some(t) = self.try_edge(index, previous, value) {
                    return Some(t);
                }
                if index - since > EDGE_PATIENCE {
                    self.state = EdgeState::Idle;
                    return Some(self.time_of(since) - 0.5 - self.sync_len);
                }
                None
            }
        }
    }

    fn try_edge(&mut self, index: u64, previous: f32, value: f32) -> Option<f64> {
        let thr = self.threshold_hz;
        if value >= thr && previous < thr && index > 0 {
            self.state = EdgeState::Idle;
            let frac = ((thr - previous) / (value - previous)) as f64;
            Some(self.time_of(index - 1) + frac - self.sync_len)
        } else if value >= thr {
            self.state = EdgeState::Idle;
            Some(self.time_of(index) - 0.5 - self.sync_len)
        } else {
            None
        }
    }

    /// Forget any run in progress
    pub fn reset(&mut self) {
        self.state = EdgeState::Idle;
        self.last = 0.0;
    }
}
