//! Streaming SSTV decoder
//!
//! Audio is pushed in arbitrary chunks. Every sample goes through the FM
//! demodulator and the sync detector; a line group is decoded as soon as
//! the frequency trace covers it, and its rows are returned immediately.
//!
//! Sync detection runs on the Hilbert frequency trace. Pixel values come
//! from the raw samples instead: a least-squares fit of
//! `x[n-1] + x[n+1] = 2 cos(w) x[n]` over each pixel window, which is exact
//! for a steady tone and has no filter transient at segment edges.
//!
//! Group timing is tracked on a real-valued sample axis. Detected sync
//! pulses re-anchor the timing (`Locked`); when they stop arriving the
//! decoder keeps placing groups at the nominal interval (`Searching`) so a
//! damaged transmission still produces one row per expected line.

use std::collections::VecDeque;
use std::f64::consts::TAU;
use std::fmt;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::dsp::hilbert::DEFAULT_HALF_LEN;
use crate::engine::buffer::{AudioBuffer, DEFAULT_SAMPLE_RATE};
use crate::error::SstvError;
use crate::sstv::demod::FmDemodulator;
use crate::sstv::image::{ycrcb_to_rgb, DecodedImage};
use crate::sstv::modes::{
    freq_to_intensity, ColorSpace, Component, ModeSpec, Segment, BLACK_FREQ, WHITE_FREQ,
};
use crate::sstv::sync::SyncDetector;
use crate::sstv::vis::VIS_DURATION_MS;

/// Extra trace (samples) required past a group before it is decoded
const READY_MARGIN: f64 = 16.0;

/// Pixels whose frequency is this far outside black..white count as unreliable
const IN_RANGE_SLACK_HZ: f64 = 100.0;

/// Window energy below this reads as silence
const SILENCE_ENERGY: f64 = 1e-9;

/// Consumed trace is released once this many samples can be dropped
const DRAIN_THRESHOLD: u64 = 1 << 16;

/// Trace kept behind the earliest possible next group start
const DRAIN_KEEP: f64 = 64.0;

/// Chunk size used by the whole-buffer helpers
const FEED_CHUNK: usize = 4096;

// ============================================================================
// Configuration
// ============================================================================

/// Decoder tunables
///
/// The lock and relock heuristics are product choices rather than protocol
/// constants, so all of them are exposed here.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderConfig {
    /// Input sample rate in Hz
    pub sample_rate: u32,
    /// Expect a 910 ms VIS header before the first line
    pub vis_header: bool,
    /// Hilbert filter half length (taps = 2 * half_len + 1)
    pub hilbert_half_len: usize,
    /// Maximum distance from 1200 Hz inside a sync run
    pub sync_tolerance_hz: f64,
    /// Shortest accepted sync run, relative to the mode's sync length
    pub sync_min_ratio: f64,
    /// Longest accepted sync run, relative to the mode's sync length
    pub sync_max_ratio: f64,
    /// Lines without a sync before the decoder drops to `Searching`
    pub tolerance_factor: f64,
    /// Sync search window while locked, as a fraction of a line group
    pub lock_window: f64,
    /// Sync search window while searching, as a fraction of a line group
    pub relock_window: f64,
    /// Averaging window per pixel, as a fraction of the pixel span
    pub window_fraction: f64,
    /// Samples ignored at both ends of every scan segment
    pub edge_guard_samples: f64,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            vis_header: false,
            hilbert_half_len: DEFAULT_HALF_LEN,
            sync_tolerance_hz: 150.0,
            sync_min_ratio: 0.6,
            sync_max_ratio: 1.6,
            tolerance_factor: 1.5,
            lock_window: 0.15,
            relock_window: 0.5,
            window_fraction: 0.5,
            edge_guard_samples: 4.0,
        }
    }
}

impl DecoderConfig {
    /// Milliseconds of audio preceding the first line group
    pub fn lead_in_ms(&self) -> f64 {
        if self.vis_header {
            VIS_DURATION_MS
        } else {
            0.0
        }
    }
}

// ============================================================================
// Events and status
// ============================================================================

/// One decoded image row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanlineEvent {
    /// Image row
    pub index: usize,
    /// RGB bytes, `width * 3`
    pub pixels: Vec<u8>,
    /// Start of the row in the audio, seconds
    pub timestamp_secs: f64,
    /// 0..1; share of in-band pixels, halved when timing was estimated
    pub confidence: f32,
    /// Row timing came from a detected sync pulse
    pub locked: bool,
}

/// Sync lock state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncState {
    Locked,
    Searching,
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncState::Locked => write!(f, "locked"),
            SyncState::Searching => write!(f, "searching"),
        }
    }
}

/// Whether a session produced every row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Completion {
    Complete,
    Partial,
}

/// Summary of a decode session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodeStatus {
    pub rows_decoded: usize,
    pub expected_rows: usize,
    /// Number of times sync was lost after having been locked
    pub desync_events: usize,
    pub completion: Completion,
}

impl DecodeStatus {
    pub fn is_complete(&self) -> bool {
        self.completion == Completion::Complete
    }
}

// ============================================================================
// Decoder state
// ============================================================================

// Plane slots for one row while a group is assembled
const PLANE_RED: usize = 0;
const PLANE_GREEN: usize = 1;
const PLANE_BLUE: usize = 2;
const PLANE_LUMA: usize = 0;

/// Per-session decoder state
///
/// Owned by exactly one decode session and never shared.
#[derive(Debug, Clone)]
pub struct DecoderState {
    mode: &'static ModeSpec,
    config: DecoderConfig,
    demod: FmDemodulator,
    sync: SyncDetector,
    /// Frequency trace; `trace[0]` has absolute index `trace_start`
    trace: Vec<f32>,
    trace_start: u64,
    trace_delay: f64,
    /// Input samples; `raw[0]` is sample `raw_start`
    raw: Vec<f32>,
    raw_start: u64,
    samples_fed: u64,
    sample_rate: f64,
    group_len: f64,
    next_group: usize,
    anchor_time: f64,
    anchor_group: usize,
    sync_state: SyncState,
    ever_locked: bool,
    /// Detected sync start times, oldest first
    candidates: VecDeque<f64>,
    held_cr: Vec<u8>,
    held_cb: Vec<u8>,
    rows_decoded: usize,
    desync_events: usize,
    finished: bool,
}

/// Begin a decode session for `mode`
pub fn start_session(mode: &'static ModeSpec, config: DecoderConfig) -> DecoderState {
    DecoderState::new(mode, config)
}

impl DecoderState {
    pub fn new(mode: &'static ModeSpec, config: DecoderConfig) -> Self {
        let sample_rate = config.sample_rate.max(1);
        let samples_per_ms = sample_rate as f64 / 1000.0;
        let demod = FmDemodulator::new(sample_rate, config.hilbert_half_len);
        let trace_delay = demod.trace_delay();
        let sync = SyncDetector::new(
            mode.sync_duration_ms() * samples_per_ms,
            config.sync_tolerance_hz,
            config.sync_min_ratio,
            config.sync_max_ratio,
            trace_delay,
        );

        info!(
            "Decode session started: {} at {} Hz{}",
            mode.name,
            sample_rate,
            if config.vis_header { " (VIS header)" } else { "" }
        );

        Self {
            mode,
            config,
            demod,
            sync,
            trace: Vec::new(),
            trace_start: 0,
            trace_delay,
            raw: Vec::new(),
            raw_start: 0,
            samples_fed: 0,
            sample_rate: sample_rate as f64,
            group_len: mode.group_duration_ms() * samples_per_ms,
            next_group: 0,
            anchor_time: config.lead_in_ms() * samples_per_ms,
            anchor_group: 0,
            sync_state: SyncState::Searching,
            ever_locked: false,
            candidates: VecDeque::new(),
            held_cr: vec![128; mode.width],
            held_cb: vec![128; mode.width],
            rows_decoded: 0,
            desync_events: 0,
            finished: false,
        }
    }

    pub fn mode(&self) -> &'static ModeSpec {
        self.mode
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    pub fn sync_state(&self) -> SyncState {
        self.sync_state
    }

    /// Audio samples consumed so far
    pub fn samples_consumed(&self) -> u64 {
        self.samples_fed
    }

    pub fn rows_decoded(&self) -> usize {
        self.rows_decoded
    }

    /// All rows have been emitted
    pub fn is_complete(&self) -> bool {
        self.next_group >= self.mode.groups()
    }

    pub fn status(&self) -> DecodeStatus {
        DecodeStatus {
            rows_decoded: self.rows_decoded,
            expected_rows: self.mode.height,
            desync_events: self.desync_events,
            completion: if self.rows_decoded >= self.mode.height {
                Completion::Complete
            } else {
                Completion::Partial
            },
        }
    }

    /// Push the next chunk of audio
    ///
    /// # Returns
    /// Rows completed by this chunk, in increasing index order
    pub fn feed(&mut self, samples: &[f32]) -> Vec<ScanlineEvent> {
        let mut events = Vec::new();
        if self.finished || self.is_complete() {
            return events;
        }

        for &sample in samples {
            self.raw.push(sample);
            self.push_sample(sample);
            self.samples_fed += 1;
            while !self.is_complete() && self.covered_time() >= self.ready_at(self.next_group) {
                let group = self.next_group;
                let (start, locked) = self.resolve_group_start(group);
                self.render_group(group, start, locked, &mut events);
            }
            if self.is_complete() {
                info!("{} decode complete ({} rows)", self.mode.name, self.rows_decoded);
                break;
            }
        }
        events
    }

    /// End of input: decode every group the received audio fully covers
    ///
    /// Groups cut off by the end of the input are left undecoded.
    pub fn finish(&mut self) -> Vec<ScanlineEvent> {
        let mut events = Vec::new();
        if self.finished {
            return events;
        }
        self.finished = true;

        // flush the filter so the tail of the input reaches the trace
        for _ in 0..=(self.trace_delay as usize) {
            self.push_sample(0.0);
        }

        let end = self.samples_fed as f64;
        while !self.is_complete() {
            let group = self.next_group;
            let (start, locked) = self.resolve_group_start(group);
            // the guarded tail of the last scan is never read
            if start + self.group_len - self.config.edge_guard_samples > end {
                break;
            }
            self.render_group(group, start, locked, &mut events);
        }

        let status = self.status();
        if status.is_complete() {
            info!("{} decode complete ({} rows)", self.mode.name, status.rows_decoded);
        } else {
            info!(
                "{} decode partial: {}/{} rows from {:.2}s of audio",
                self.mode.name,
                status.rows_decoded,
                status.expected_rows,
                end / self.sample_rate
            );
        }
        events
    }

    // ========================================================================
    // Internals
    // ========================================================================

    #[inline]
    fn push_sample(&mut self, sample: f32) {
        let freq = self.demod.push(sample);
        let index = self.trace_start + self.trace.len() as u64;
        self.trace.push(freq);
        if let Some(sync_start) = self.sync.push(index, freq) {
            self.candidates.push_back(sync_start);
        }
    }

    /// Signal time up to which the trace is complete
    #[inline]
    fn covered_time(&self) -> f64 {
        (self.trace_start + self.trace.len() as u64) as f64 - self.trace_delay
    }

    fn predicted_start(&self, group: usize) -> f64 {
        self.anchor_time + (group as f64 - self.anchor_group as f64) * self.group_len
    }

    fn search_window(&self) -> f64 {
        let fraction = match self.sync_state {
            SyncState::Locked => self.config.lock_window,
            SyncState::Searching => self.config.relock_window,
        };
        fraction * self.group_len
    }

    /// Trace needed before `group` can be decided without look-ahead regrets
    fn ready_at(&self, group: usize) -> f64 {
        self.predicted_start(group) + self.search_window() + self.group_len + READY_MARGIN
    }

    /// Place `group` on the time axis, updating the lock state
    ///
    /// # Returns
    /// The group start in samples and whether a sync pulse anchored it
    fn resolve_group_start(&mut self, group: usize) -> (f64, bool) {
        let predicted = self.predicted_start(group);
        let window = self.search_window();
        let sync_offset = self.mode.sync_offset_ms(group) * self.sample_rate / 1000.0;

        let best = self
            .candidates
            .iter()
            .map(|&c| c - sync_offset)
            .filter(|s| (s - predicted).abs() <= window)
            .min_by(|a, b| (a - predicted).abs().total_cmp(&(b - predicted).abs()));

        let (start, locked) = match best {
            Some(start) => {
                if self.sync_state == SyncState::Searching {
                    if self.ever_locked {
                        info!(
                            "{}: sync reacquired at group {} ({:.3}s)",
                            self.mode.name,
                            group,
                            start / self.sample_rate
                        );
                    } else {
                        debug!("{}: sync acquired at group {}", self.mode.name, group);
                    }
                }
                self.sync_state = SyncState::Locked;
                self.ever_locked = true;
                self.anchor_time = start;
                self.anchor_group = group;
                (start, true)
            }
            None => {
                if self.sync_state == SyncState::Locked
                    && predicted - self.anchor_time > self.config.tolerance_factor * self.group_len
                {
                    self.sync_state = SyncState::Searching;
                    self.desync_events += 1;
                    let desync = SstvError::DecodeDesync {
                        position_secs: predicted / self.sample_rate,
                    };
                    warn!("{}: {}", self.mode.name, desync);
                }
                (predicted, false)
            }
        };

        // candidates this early can no longer match any later group
        let horizon = start + sync_offset + 0.5 * self.group_len - 1.0;
        while self.candidates.front().is_some_and(|&c| c < horizon) {
            self.candidates.pop_front();
        }

        (start, locked)
    }

    fn render_group(
        &mut self,
        group: usize,
        start: f64,
        locked: bool,
        events: &mut Vec<ScanlineEvent>,
    ) {
        let mode = self.mode;
        let width = mode.width;
        let rows = mode.rows_per_group;
        let samples_per_ms = self.sample_rate / 1000.0;

        let mut planes = vec![[vec![0u8; width], vec![0u8; width], vec![0u8; width]]; rows];
        let mut in_range = 0usize;
        let mut total = 0usize;
        let mut offset = 0.0;

        for segment in mode.layout(group) {
            let span = segment.duration_ms() * samples_per_ms;
            if let Segment::Scan {
                component,
                rows: scan_rows,
                ..
            } = *segment
            {
                let (values, good) = self.sample_scan(start + offset, span);
                in_range += good;
                total += width;
                match component {
                    Component::ChromaR => self.held_cr.copy_from_slice(&values),
                    Component::ChromaB => self.held_cb.copy_from_slice(&values),
                    _ => {
                        let slot = match component {
                            Component::Red => PLANE_RED,
                            Component::Green => PLANE_GREEN,
                            Component::Blue => PLANE_BLUE,
                            _ => PLANE_LUMA,
                        };
                        for &r in scan_rows {
                            planes[r][slot].copy_from_slice(&values);
                        }
                    }
                }
            }
            offset += span;
        }

        let coverage = if total > 0 {
            in_range as f32 / total as f32
        } else {
            0.0
        };
        let confidence = if locked { coverage } else { coverage * 0.5 };
        let row_len = self.group_len / rows as f64;

        for (r, plane) in planes.iter().enumerate() {
            let mut pixels = Vec::with_capacity(width * 3);
            for x in 0..width {
                let rgb = match mode.color_space {
                    ColorSpace::Rgb => [
                        plane[PLANE_RED][x],
                        plane[PLANE_GREEN][x],
                        plane[PLANE_BLUE][x],
                    ],
                    ColorSpace::YCrCb => {
                        ycrcb_to_rgb([plane[PLANE_LUMA][x], self.held_cr[x], self.held_cb[x]])
                    }
                };
                pixels.extend_from_slice(&rgb);
            }
            events.push(ScanlineEvent {
                index: group * rows + r,
                pixels,
                timestamp_secs: (start + r as f64 * row_len) / self.sample_rate,
                confidence,
                locked,
            });
            self.rows_decoded += 1;
        }

        debug!(
            "{} group {} at {:.1} ({}, confidence {:.2})",
            mode.name,
            group,
            start,
            if locked { "sync" } else { "estimated" },
            confidence
        );

        self.next_group = group + 1;
        self.drain_trace(start);
    }

    /// Intensities of one scan segment plus the count of in-band pixels
    fn sample_scan(&self, scan_start: f64, span: f64) -> (Vec<u8>, usize) {
        let width = self.mode.width;
        let pixel_span = span / width as f64;
        let half = 0.5 * self.config.window_fraction * pixel_span;
        let guard = self.config.edge_guard_samples.max(0.0);
        let lo_limit = scan_start + guard;
        let hi_limit = (scan_start + span - guard).max(lo_limit);

        let mut values = Vec::with_capacity(width);
        let mut good = 0;
        for x in 0..width {
            let pixel_lo = scan_start + x as f64 * pixel_span;
            let centre = pixel_lo + 0.5 * pixel_span;
            let a = (centre - half).max(lo_limit);
            let b = (centre + half).min(hi_limit);
            // narrow windows fall back to the whole pixel
            let freq = self
                .tone_freq(a, b)
                .or_else(|| self.tone_freq(pixel_lo, pixel_lo + pixel_span))
                .unwrap_or_else(|| self.mean_freq(centre - 0.5, centre + 0.5));
            if freq >= BLACK_FREQ - IN_RANGE_SLACK_HZ && freq <= WHITE_FREQ + IN_RANGE_SLACK_HZ {
                good += 1;
            }
            values.push(freq_to_intensity(freq));
        }
        (values, good)
    }

    /// Frequency of the tone held over signal interval `[a, b]`
    ///
    /// Uses every sample `n` whose phase steps in and out (midpoints
    /// `n - 0.5` and `n + 0.5`) both lie inside the interval. `None` when no
    /// sample qualifies; 0 Hz for silence.
    fn tone_freq(&self, a: f64, b: f64) -> Option<f64> {
        let first = (a + 0.5).ceil().max(1.0) as u64;
        let last = (b - 0.5).floor();
        if last < first as f64 {
            return None;
        }
        let last = last as u64;
        if first <= self.raw_start || last + 1 >= self.raw_start + self.raw.len() as u64 {
            return None;
        }

        let mut cross = 0.0;
        let mut energy = 0.0;
        for n in first..=last {
            let i = (n - self.raw_start) as usize;
            let centre = self.raw[i] as f64;
            cross += centre * (self.raw[i - 1] as f64 + self.raw[i + 1] as f64);
            energy += centre * centre;
        }
        if energy < SILENCE_ENERGY {
            return Some(0.0);
        }
        let cos_w = (cross / (2.0 * energy)).clamp(-1.0, 1.0);
        Some(cos_w.acos() * self.sample_rate / TAU)
    }

    /// Overlap-weighted trace mean over signal interval `[a, b]`
    fn mean_freq(&self, a: f64, b: f64) -> f64 {
        let pa = a + self.trace_delay;
        let pb = b + self.trace_delay;
        let first = pa.floor() as i64;
        let last = pb.ceil() as i64;
        let base = self.trace_start as i64;

        let mut sum = 0.0;
        let mut weight = 0.0;
        for i in first..last {
            let overlap = pb.min((i + 1) as f64) - pa.max(i as f64);
            if overlap <= 0.0 {
                continue;
            }
            let rel = i - base;
            if rel < 0 || rel >= self.trace.len() as i64 {
                continue;
            }
            sum += self.trace[rel as usize] as f64 * overlap;
            weight += overlap;
        }
        if weight > 0.0 {
            sum / weight
        } else {
            0.0
        }
    }

    /// Release trace and samples no later group can reach
    fn drain_trace(&mut self, group_start: f64) {
        let keep = group_start + 0.5 * self.group_len - DRAIN_KEEP;
        if keep <= 0.0 {
            return;
        }
        drain_before(&mut self.raw, &mut self.raw_start, keep.floor() as u64);
        drain_before(
            &mut self.trace,
            &mut self.trace_start,
            (keep + self.trace_delay).floor() as u64,
        );
    }
}

/// Drop the entries of `data` before absolute index `keep`, in large steps
fn drain_before(data: &mut Vec<f32>, start: &mut u64, keep: u64) {
    if keep > *start + DRAIN_THRESHOLD {
        let drop = ((keep - *start) as usize).min(data.len());
        data.drain(..drop);
        *start += drop as u64;
    }
}

// ============================================================================
// Whole-buffer helpers
// ============================================================================

/// Decode a complete buffer
///
/// The buffer's sample rate overrides `config.sample_rate`.
pub fn decode_buffer(
    buffer: &AudioBuffer,
    mode: &'static ModeSpec,
    config: DecoderConfig,
) -> (DecodedImage, DecodeStatus) {
    decode_buffer_with(buffer, mode, config, |_| {})
}

/// Decode a complete buffer, calling `on_row` for every row as it is decoded
pub fn decode_buffer_with<F>(
    buffer: &AudioBuffer,
    mode: &'static ModeSpec,
    config: DecoderConfig,
    mut on_row: F,
) -> (DecodedImage, DecodeStatus)
where
    F: FnMut(&ScanlineEvent),
{
    let config = DecoderConfig {
        sample_rate: buffer.sample_rate,
        ..config
    };
    let mut state = start_session(mode, config);
    let mut image = DecodedImage::new(mode.width, mode.height);

    for chunk in buffer.samples.chunks(FEED_CHUNK) {
        for event in state.feed(chunk) {
            on_row(&event);
            image.apply(&event);
        }
        if state.is_complete() {
            break;
        }
    }
    for event in state.finish() {
        on_row(&event);
        image.apply(&event);
    }

    (image, state.status())
}
