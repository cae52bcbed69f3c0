//! SSTV encoder
//!
//! Turns an image into a continuous-phase FM waveform. Frequency is
//! integrated into phase sample by sample, so there are no discontinuities
//! at pixel, segment or line boundaries.
//!
//! Timing is tracked as real-valued sample positions: each segment starts
//! exactly where the previous ended. Sample `n` carries the phase reached so
//! far and the step to `n + 1` uses the frequency in force at `n + 0.5`, the
//! midpoint of that step. A segment ending at `end` owns the samples whose
//! step midpoint falls before `end`.

use std::f64::consts::TAU;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::engine::buffer::{AudioBuffer, DEFAULT_SAMPLE_RATE};
use crate::error::{Result, SstvError};
use crate::sstv::image::{rgb_to_ycrcb, RgbImage};
use crate::sstv::modes::{intensity_to_freq, Component, ModeSpec, Segment, SYNC_FREQ};
use crate::sstv::vis::{vis_tones, VIS_DURATION_MS};

/// Encoder configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderConfig {
    /// Output sample rate in Hz
    pub sample_rate: u32,
    /// Peak amplitude of the generated sine (0..1]
    pub amplitude: f32,
    /// Prepend the 910 ms VIS header
    pub vis_header: bool,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            amplitude: 0.8,
            vis_header: false,
        }
    }
}

impl EncoderConfig {
    /// Milliseconds of audio preceding the first line group
    pub fn lead_in_ms(&self) -> f64 {
        if self.vis_header {
            VIS_DURATION_MS
        } else {
            0.0
        }
    }
}

/// Image to audio encoder
#[derive(Debug, Clone, Default)]
pub struct Encoder {
    config: EncoderConfig,
}

impl Encoder {
    pub fn new(config: EncoderConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EncoderConfig {
        &self.config
    }

    /// Number of samples `encode` produces for `mode`
    pub fn expected_len(&self, mode: &ModeSpec) -> usize {
        let total_ms = self.config.lead_in_ms() + mode.transmission_duration_ms();
        let end = total_ms * self.config.sample_rate as f64 / 1000.0;
        // samples n with n + 0.5 < end
        (end - 0.5).ceil().max(0.0) as usize
    }

    /// Encode `image` with `mode`
    ///
    /// # Errors
    /// * `InvalidImageDimensions` - If the image is not exactly the mode's resolution
    pub fn encode(&self, image: &RgbImage, mode: &ModeSpec) -> Result<AudioBuffer> {
        if image.width() != mode.width || image.height() != mode.height {
            return Err(SstvError::InvalidImageDimensions {
                mode: mode.name.to_string(),
                expected_width: mode.width,
                expected_height: mode.height,
                actual_width: image.width(),
                actual_height: image.height(),
            });
        }

        let mut writer = ToneWriter::new(
            self.config.sample_rate,
            self.config.amplitude,
            self.expected_len(mode),
        );

        if self.config.vis_header {
            for (ms, freq) in vis_tones(mode.vis_code) {
                writer.tone(ms, freq);
            }
        }

        let mut scan_freqs = vec![0.0; mode.width];
        for group in 0..mode.groups() {
            let first_row = group * mode.rows_per_group;
            for segment in mode.layout(group) {
                match *segment {
                    Segment::Sync { ms } => writer.tone(ms, SYNC_FREQ),
                    Segment::Porch { ms, freq } => writer.tone(ms, freq),
                    Segment::Scan {
                        ms,
                        component,
                        rows,
                    } => {
                        component_freqs(image, first_row, rows, component, &mut scan_freqs);
                        writer.scan(ms, &scan_freqs);
                    }
                }
            }
        }

        let buffer = writer.finish();
        info!(
            "Encoded {} ({}x{}) into {:.2}s of audio",
            mode.name,
            mode.width,
            mode.height,
            buffer.duration_secs()
        );
        Ok(buffer)
    }
}

/// Encode with default settings at `sample_rate`
pub fn encode(image: &RgbImage, mode: &ModeSpec, sample_rate: u32) -> Result<AudioBuffer> {
    Encoder::new(EncoderConfig {
        sample_rate,
        ..EncoderConfig::default()
    })
    .encode(image, mode)
}

/// Resize an arbitrary image to the mode's resolution (nearest neighbour)
pub fn resize_to_mode(image: &RgbImage, mode: &ModeSpec) -> RgbImage {
    if image.width() == mode.width && image.height() == mode.height {
        return image.clone();
    }
    debug!(
        "Resizing {}x{} to {}x{} for {}",
        image.width(),
        image.height(),
        mode.width,
        mode.height,
        mode.name
    );
    image.resize_nearest(mode.width, mode.height)
}

/// Per-pixel tone frequencies for one scan segment
///
/// Chroma spanning several rows is averaged over them.
fn component_freqs(
    image: &RgbImage,
    first_row: usize,
    rows: &[usize],
    component: Component,
    out: &mut [f64],
) {
    for (x, freq) in out.iter_mut().enumerate() {
        let sum: u32 = rows
            .iter()
            .map(|&r| {
                let rgb = image.pixel(x, first_row + r);
                let [y, cr, cb] = rgb_to_ycrcb(rgb);
                (match component {
                    Component::Red => rgb[0],
                    Component::Green => rgb[1],
                    Component::Blue => rgb[2],
                    Component::Luma => y,
                    Component::ChromaR => cr,
                    Component::ChromaB => cb,
                }) as u32
            })
            .sum();
        let value = (sum as f64 / rows.len() as f64).round() as u8;
        *freq = intensity_to_freq(value);
    }
}

/// Phase-continuous tone generator over real-valued segment boundaries
struct ToneWriter {
    samples: Vec<f32>,
    sample_rate: f64,
    amplitude: f64,
    phase: f64,
    /// End of the scheduled signal so far, in samples
    boundary: f64,
}

impl ToneWriter {
    fn new(sample_rate: u32, amplitude: f32, capacity: usize) -> Self {
        Self {
            samples: Vec::with_capacity(capacity),
            sample_rate: sample_rate as f64,
            amplitude: amplitude.clamp(0.0, 1.0) as f64,
            phase: 0.0,
            boundary: 0.0,
        }
    }

    fn ms_to_samples(&self, ms: f64) -> f64 {
        ms * self.sample_rate / 1000.0
    }

    /// Constant tone for `ms` milliseconds
    fn tone(&mut self, ms: f64, freq: f64) {
        let end = self.boundary + self.ms_to_samples(ms);
        while self.step_midpoint() < end {
            self.emit(freq);
        }
        self.boundary = end;
    }

    /// Pixel scan of `freqs.len()` equal-width pixels over `ms` milliseconds
    fn scan(&mut self, ms: f64, freqs: &[f64]) {
        let start = self.boundary;
        let span = self.ms_to_samples(ms);
        let end = start + span;
        let last = freqs.len().saturating_sub(1);
        while self.step_midpoint() < end {
            let t = self.step_midpoint();
            let pixel = ((t - start) / span * freqs.len() as f64).floor();
            let index = (pixel.max(0.0) as usize).min(last);
            self.emit(freqs[index]);
        }
        self.boundary = end;
    }

    /// Time, in samples, of the middle of the next phase step
    #[inline]
    fn step_midpoint(&self) -> f64 {
        self.samples.len() as f64 + 0.5
    }

    #[inline]
    fn emit(&mut self, freq: f64) {
        self.samples.push((self.phase.sin() * self.amplitude) as f32);
        self.phase = (self.phase + TAU * freq / self.sample_rate) % TAU;
    }

    fn finish(self) -> AudioBuffer {
        AudioBuffer::from_samples(self.samples, self.sample_rate as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sstv::modes::{MARTIN_M1, MODES, PD_90, ROBOT_36};

    #[test]
    fn test_rejects_wrong_dimensions() {
        let image = RgbImage::new(100, 100);
        match encode(&image, &MARTIN_M1, 44100) {
            Err(SstvError::InvalidImageDimensions {
                expected_width,
                actual_width,
                ..
            }) => {
                assert_eq!(expected_width, 320);
                assert_eq!(actual_width, 100);
            }
            other => panic!("Expected InvalidImageDimensions, got {:?}", other.err()),
        }
    }

    #[test]
    fn test_output_length_matches_duration() {
        for mode in MODES.iter() {
            let encoder = Encoder::default();
            let image = RgbImage::new(mode.width, mode.height);
            let buffer = encoder.encode(&image, mode).unwrap();
            let expected = mode.transmission_duration_ms() * 44100.0 / 1000.0;
            assert_eq!(buffer.len(), encoder.expected_len(mode));
            assert!((buffer.len() as f64 - expected).abs() <= 0.5, "{}", mode.name);
        }
    }

    #[test]
    fn test_length_rounds_to_nearest_sample() {
        let image = RgbImage::new(MARTIN_M1.width, MARTIN_M1.height);
        for rate in [44100, 48000, 22050] {
            let encoder = Encoder::new(EncoderConfig {
                sample_rate: rate,
                ..EncoderConfig::default()
            });
            let end = MARTIN_M1.transmission_duration_ms() * rate as f64 / 1000.0;
            let buffer = encoder.encode(&image, &MARTIN_M1).unwrap();
            assert_eq!(buffer.len(), end.round() as usize, "{} Hz", rate);
        }
    }

    #[test]
    fn test_first_sample_starts_at_zero_phase() {
        let image = RgbImage::filled(ROBOT_36.width, ROBOT_36.height, [200, 200, 200]);
        let buffer = encode(&image, &ROBOT_36, 44100).unwrap();
        assert_eq!(buffer.samples[0], 0.0);
        // first step runs at the 1200 Hz sync frequency
        let expected = (TAU * 1200.0 / 44100.0).sin() * 0.8;
        assert!((buffer.samples[1] as f64 - expected).abs() < 1e-6);
    }

    #[test]
    fn test_vis_header_adds_910ms() {
        let image = RgbImage::new(ROBOT_36.width, ROBOT_36.height);
        let plain = Encoder::default().encode(&image, &ROBOT_36).unwrap();
        let with_vis = Encoder::new(EncoderConfig {
            vis_header: true,
            ..EncoderConfig::default()
        })
        .encode(&image, &ROBOT_36)
        .unwrap();
        let extra = with_vis.len() as i64 - plain.len() as i64;
        assert!((extra - 40131).abs() <= 1, "extra samples {}", extra);
    }

    #[test]
    fn test_phase_continuity() {
        // Consecutive samples of a <=2300 Hz sine at 0.8 amplitude never jump
        // by more than 2*pi*2300/44100*0.8 ~= 0.27
        let image = RgbImage::filled(PD_90.width, PD_90.height, [255, 0, 128]);
        let buffer = encode(&image, &PD_90, 44100).unwrap();
        let max_step = buffer
            .samples
            .windows(2)
            .map(|w| (w[1] - w[0]).abs())
            .fold(0.0_f32, f32::max);
        assert!(max_step < 0.27, "max step {}", max_step);
    }

    #[test]
    fn test_deterministic() {
        let image = RgbImage::filled(320, 256, [10, 200, 30]);
        let a = encode(&image, &MARTIN_M1, 48000).unwrap();
        let b = encode(&image, &MARTIN_M1, 48000).unwrap();
        assert_eq!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn test_resize_to_mode() {
        let image = RgbImage::filled(64, 48, [1, 2, 3]);
        let resized = resize_to_mode(&image, &ROBOT_36);
        assert_eq!((resized.width(), resized.height()), (320, 240));
        assert_eq!(resized.pixel(319, 239), [1, 2, 3]);
    }
}
