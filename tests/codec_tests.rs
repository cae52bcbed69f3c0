//! Codec Tests
//!
//! Encode images, decode the audio and compare.

use sstv_glitch::engine::AudioBuffer;
use sstv_glitch::sstv::modes::{MARTIN_M1, SCOTTIE_S1};
use sstv_glitch::sstv::{
    decode_buffer, decode_buffer_with, encode, Completion, DecoderConfig, Encoder, EncoderConfig,
    ModeId, RgbImage,
};
use test_case::test_case;

const RATE: u32 = 44100;

fn max_channel_diff(a: [u8; 3], b: [u8; 3]) -> i32 {
    (0..3)
        .map(|c| (a[c] as i32 - b[c] as i32).abs())
        .max()
        .unwrap_or(0)
}

// === Round Trips ===

#[test_case(44100 ; "44100 hz")]
#[test_case(48000 ; "48000 hz")]
fn test_martin_m1_gray_round_trip(rate: u32) {
    let image = RgbImage::filled(320, 256, [128, 128, 128]);
    let buffer = encode(&image, &MARTIN_M1, rate).unwrap();
    let (decoded, status) = decode_buffer(&buffer, &MARTIN_M1, DecoderConfig::default());

    assert!(status.is_complete());
    assert_eq!(status.rows_decoded, 256);
    assert_eq!(status.desync_events, 0);

    let mut total_error = 0i64;
    for y in 0..256 {
        for x in 0..320 {
            let diff = max_channel_diff(decoded.image().pixel(x, y), [128, 128, 128]);
            total_error += diff as i64;
            assert!(diff <= 4, "({}, {}) off by {} at {} Hz", x, y, diff, rate);
        }
    }
    let mean = total_error as f64 / (320.0 * 256.0);
    assert!(mean <= 2.0, "mean error {}", mean);
}

#[test_case(ModeId::MartinM1, 6 ; "martin m1")]
#[test_case(ModeId::MartinM2, 8 ; "martin m2")]
#[test_case(ModeId::ScottieS1, 6 ; "scottie s1")]
#[test_case(ModeId::ScottieS2, 8 ; "scottie s2")]
#[test_case(ModeId::Robot36, 12 ; "robot 36")]
#[test_case(ModeId::Pd90, 12 ; "pd 90")]
fn test_solid_color_round_trip(id: ModeId, tolerance: i32) {
    let mode = id.spec();
    let color = [200, 60, 30];
    let image = RgbImage::filled(mode.width, mode.height, color);
    let buffer = encode(&image, mode, RATE).unwrap();
    let (decoded, status) = decode_buffer(&buffer, mode, DecoderConfig::default());

    assert!(status.is_complete(), "{:?}", status);
    // Robot row 0 has no Cb scan before it
    for y in 1..mode.height {
        for x in 8..mode.width - 8 {
            let px = decoded.image().pixel(x, y);
            assert!(
                max_channel_diff(px, color) <= tolerance,
                "{} ({}, {}) decoded {:?}",
                mode.name,
                x,
                y,
                px
            );
        }
    }
}

#[test]
fn test_vis_header_round_trip() {
    let image = RgbImage::filled(320, 256, [40, 180, 220]);
    let config = EncoderConfig {
        sample_rate: RATE,
        vis_header: true,
        ..EncoderConfig::default()
    };
    let buffer = Encoder::new(config).encode(&image, &SCOTTIE_S1).unwrap();

    let decoder = DecoderConfig {
        vis_header: true,
        ..DecoderConfig::default()
    };
    let (decoded, status) = decode_buffer(&buffer, &SCOTTIE_S1, decoder);
    assert!(status.is_complete());
    for y in 0..256 {
        for x in 8..312 {
            let px = decoded.image().pixel(x, y);
            assert!(max_channel_diff(px, [40, 180, 220]) <= 6, "({}, {}) {:?}", x, y, px);
        }
    }
}

// === Partial Input ===

#[test]
fn test_truncated_martin_m1_is_partial() {
    let image = RgbImage::filled(320, 256, [128, 128, 128]);
    let mut buffer = encode(&image, &MARTIN_M1, RATE).unwrap();
    let keep = (buffer.len() as f64 * 0.9) as usize;
    buffer.samples.truncate(keep);

    let (decoded, status) = decode_buffer(&buffer, &MARTIN_M1, DecoderConfig::default());
    assert_eq!(status.completion, Completion::Partial);
    assert_eq!(status.rows_decoded, 230);
    assert_eq!(status.expected_rows, 256);
    for y in 230..256 {
        assert!(!decoded.is_row_written(y));
        assert!(decoded.image().row(y).iter().all(|&v| v == 0));
    }
}

#[test]
fn test_empty_buffer_decodes_nothing() {
    let buffer = AudioBuffer::from_samples(Vec::new(), RATE);
    let (decoded, status) = decode_buffer(&buffer, &MARTIN_M1, DecoderConfig::default());
    assert_eq!(status.rows_decoded, 0);
    assert_eq!(status.completion, Completion::Partial);
    assert_eq!(decoded.rows_written(), 0);
}

#[test]
fn test_indices_increase_across_groups() {
    let mode = ModeId::Pd90.spec();
    let image = RgbImage::filled(mode.width, mode.height, [10, 240, 120]);
    let buffer = encode(&image, mode, RATE).unwrap();

    let mut indices = Vec::new();
    let (_, status) =
        decode_buffer_with(&buffer, mode, DecoderConfig::default(), |row| indices.push(row.index));
    assert_eq!(status.rows_decoded, mode.height);
    assert_eq!(indices, (0..mode.height).collect::<Vec<_>>());
}
