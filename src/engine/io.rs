//! Audio file I/O for sstv-glitch
//!
//! WAV import/export for transmissions. Imports are mixed down to mono and
//! resampled to the requested processing rate; exports write mono WAV at the
//! buffer's own rate or a requested one.

use std::path::Path;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use log::debug;

use crate::engine::buffer::AudioBuffer;
use crate::error::{Result, SstvError};

/// Sample rate and depth of an exported WAV
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportFormat {
    /// Target sample rate; `None` keeps the buffer's rate
    pub sample_rate: Option<u32>,
    /// Bit depth: 16, 24, or 32 (default: 16)
    pub bit_depth: u16,
}

impl Default for ExportFormat {
    fn default() -> Self {
        ExportFormat {
            sample_rate: None,
            bit_depth: 16,
        }
    }
}

impl ExportFormat {
    /// Create a new export format with the given bit depth at the buffer's rate
    pub fn with_bit_depth(bit_depth: u16) -> Self {
        ExportFormat {
            sample_rate: None,
            bit_depth,
        }
    }

    /// Lossless 32-bit float at the buffer's rate
    pub fn float32() -> Self {
        Self::with_bit_depth(32)
    }
}

/// Import a WAV file as a mono buffer at `target_rate`
///
/// # Errors
/// * `FileNotFound` - If the file does not exist
/// * `InvalidAudio` - If hound cannot parse the file
/// * `UnsupportedFormat` - For bit depths hound cannot map to float
/// * `EmptyAudio` - If the file holds no samples
pub fn import_audio(path: &Path, target_rate: u32) -> Result<AudioBuffer> {
    if !path.exists() {
        return Err(SstvError::FileNotFound {
            path: path.display().to_string(),
            source: None,
        });
    }

    let reader = WavReader::open(path).map_err(|e| SstvError::InvalidAudio {
        reason: format!("{}: {}", path.display(), e),
        source: Some(Box::new(e)),
    })?;

    let spec = reader.spec();
    let channels = spec.channels.max(1) as usize;
    let interleaved = read_normalized(reader)?;
    if interleaved.is_empty() {
        return Err(SstvError::EmptyAudio);
    }

    let mono = mixdown(&interleaved, channels);
    let samples = if spec.sample_rate != target_rate {
        debug!(
            "Resampling {} from {} Hz to {} Hz",
            path.display(),
            spec.sample_rate,
            target_rate
        );
        resample_linear(&mono, target_rate as f64 / spec.sample_rate as f64)
    } else {
        mono
    };

    Ok(AudioBuffer::from_samples(samples, target_rate))
}

/// Write `buffer` as a mono WAV file, resampling if `format` asks for it
pub fn export_audio(buffer: &AudioBuffer, path: &Path, format: ExportFormat) -> Result<()> {
    let sample_rate = format.sample_rate.unwrap_or(buffer.sample_rate);
    let data = if sample_rate != buffer.sample_rate {
        resample_linear(
            &buffer.samples,
            sample_rate as f64 / buffer.sample_rate as f64,
        )
    } else {
        buffer.samples.clone()
    };

    let sample_format = match format.bit_depth {
        16 | 24 => SampleFormat::Int,
        32 => SampleFormat::Float,
        other => {
            return Err(SstvError::UnsupportedFormat {
                format: format!("{}-bit audio (only 16, 24, 32 supported)", other),
            })
        }
    };

    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: format.bit_depth,
        sample_format,
    };

    let mut writer = WavWriter::create(path, spec).map_err(wav_write_error)?;

    if sample_format == SampleFormat::Float {
        for sample in data {
            writer.write_sample(sample).map_err(wav_write_error)?;
        }
    } else {
        let peak = ((1i64 << (format.bit_depth - 1)) - 1) as f32;
        for sample in data {
            let value = (sample.clamp(-1.0, 1.0) * peak).round() as i32;
            if format.bit_depth == 16 {
                writer.write_sample(value as i16).map_err(wav_write_error)?;
            } else {
                writer.write_sample(value).map_err(wav_write_error)?;
            }
        }
    }

    writer.finalize().map_err(wav_write_error)?;
    Ok(())
}

fn wav_write_error(e: hound::Error) -> SstvError {
    match e {
        hound::Error::IoError(io) => SstvError::Io(io),
        other => SstvError::Io(std::io::Error::new(
            std::io::ErrorKind::Other,
            other.to_string(),
        )),
    }
}

/// Decode every sample to f32 in -1..1
fn read_normalized<R: std::io::Read>(mut reader: WavReader<R>) -> Result<Vec<f32>> {
    let spec = reader.spec();
    let invalid = |e: hound::Error| SstvError::InvalidAudio {
        reason: format!("Corrupt {}-bit sample data: {}", spec.bits_per_sample, e),
        source: Some(Box::new(e)),
    };

    if spec.sample_format == SampleFormat::Float {
        return reader.samples::<f32>().map(|s| s.map_err(invalid)).collect();
    }
    if !matches!(spec.bits_per_sample, 8 | 16 | 24 | 32) {
        return Err(SstvError::UnsupportedFormat {
            format: format!("{}-bit integer audio", spec.bits_per_sample),
        });
    }

    // hound widens every integer depth to i32 on request
    let full_scale = (1u64 << (spec.bits_per_sample - 1)) as f32;
    reader
        .samples::<i32>()
        .map(|s| s.map(|v| v as f32 / full_scale).map_err(invalid))
        .collect()
}

/// Average interleaved frames down to a single channel
fn mixdown(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels == 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

/// Linear interpolation resampling
///
/// `ratio` is target length over source length. Adequate for the 1-2.3 kHz
/// SSTV band at common audio rates.
pub fn resample_linear(samples: &[f32], ratio: f64) -> Vec<f32> {
    let Some(&last) = samples.last() else {
        return Vec::new();
    };
    if ratio <= 0.0 {
        return Vec::new();
    }

    let out_len = (samples.len() as f64 * ratio).round() as usize;
    (0..out_len)
        .map(|n| {
            let pos = n as f64 / ratio;
            let i = pos as usize;
            let t = (pos - i as f64) as f32;
            match (samples.get(i), samples.get(i + 1)) {
                (Some(&a), Some(&b)) => a + (b - a) * t,
                (Some(&a), None) => a,
                _ => last,
            }
        })
        .collect()
}

// ============================================================================
// Tests
// ============================================================================
