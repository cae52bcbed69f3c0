//! Corruption Tests
//!
//! Effect chains and presets run over real SSTV transmissions.

use sstv_glitch::dsp::{presets, EffectChain, EffectContext, EffectKind, EffectSpec};
use sstv_glitch::engine::AudioBuffer;
use sstv_glitch::sstv::modes::{MARTIN_M1, ROBOT_36};
use sstv_glitch::sstv::{decode_buffer, encode, DecoderConfig, RgbImage};
use sstv_glitch::SstvError;

const RATE: u32 = 22050;

/// Robot 36 gradient at a low rate, for tests that only look at the audio
fn robot_transmission() -> AudioBuffer {
    let mut image = RgbImage::new(ROBOT_36.width, ROBOT_36.height);
    for y in 0..image.height() {
        for x in 0..image.width() {
            image.set_pixel(x, y, [(x * 255 / 319) as u8, (y % 256) as u8, 90]);
        }
    }
    encode(&image, &ROBOT_36, RATE).unwrap()
}

// === Line-Aligned Corruption ===

#[test]
fn test_full_scanline_corruption_changes_every_row() {
    let image = RgbImage::filled(320, 256, [128, 128, 128]);
    let clean_audio = encode(&image, &MARTIN_M1, 44100).unwrap();

    let chain = EffectChain::from_effects(vec![EffectSpec::new(EffectKind::ScanlineCorruption)
        .with_param("probability", 1.0)])
    .with_seed(1234);
    let corrupted_audio = chain.apply(&clean_audio, &EffectContext::for_mode(&MARTIN_M1, 0.0));
    assert_eq!(corrupted_audio.len(), clean_audio.len());

    let (clean, _) = decode_buffer(&clean_audio, &MARTIN_M1, DecoderConfig::default());
    let (corrupted, _) = decode_buffer(&corrupted_audio, &MARTIN_M1, DecoderConfig::default());

    for y in 0..256 {
        assert!(
            corrupted.image().row_difference(clean.image(), y) > 0,
            "row {} survived",
            y
        );
    }
}

// === Chain Invariants ===

#[test]
fn test_every_effect_preserves_length_and_range() {
    let clean = robot_transmission();
    let ctx = EffectContext::for_mode(&ROBOT_36, 0.0);

    for kind in EffectKind::ALL {
        let chain = EffectChain::from_effects(vec![EffectSpec::new(kind)]).with_seed(3);
        let output = chain.apply(&clean, &ctx);
        assert_eq!(output.len(), clean.len(), "{} changed the length", kind);
        assert_eq!(output.sample_rate, clean.sample_rate);
        assert!(
            output.samples.iter().all(|s| s.is_finite() && s.abs() <= 1.0),
            "{} left samples out of range",
            kind
        );
    }
}

#[test]
fn test_every_preset_preserves_length() {
    let clean = robot_transmission();
    let ctx = EffectContext::for_mode(&ROBOT_36, 0.0);

    for preset in presets::PRESETS {
        let chain = presets::by_name(preset.name).unwrap().with_seed(99);
        let mut output = clean.clone();
        let report = chain.process(&mut output, &ctx);
        assert_eq!(output.len(), clean.len(), "{}", preset.name);
        assert!(report.clamped.is_empty(), "{}: {:?}", preset.name, report.clamped);
        assert!(output.peak() <= 1.0);
    }
}

#[test]
fn test_seeded_chain_is_reproducible() {
    let clean = robot_transmission();
    let ctx = EffectContext::for_mode(&ROBOT_36, 0.0);
    let chain = presets::by_name("Total Chaos").unwrap().with_seed(42);

    let first = chain.apply(&clean, &ctx);
    let second = chain.apply(&clean, &ctx);
    assert_eq!(first.fingerprint(), second.fingerprint());

    let other = chain.clone().with_seed(43).apply(&clean, &ctx);
    assert_ne!(first.fingerprint(), other.fingerprint());
}

#[test]
fn test_reloaded_chain_reproduces_audio() {
    let clean = robot_transmission();
    let ctx = EffectContext::for_mode(&ROBOT_36, 0.0);
    let chain = presets::by_name("Signal Dropout").unwrap().with_seed(7);

    let json = chain.to_json().unwrap();
    let reloaded = EffectChain::from_json(&json).unwrap();
    assert_eq!(reloaded, chain);
    assert_eq!(
        reloaded.apply(&clean, &ctx).fingerprint(),
        chain.apply(&clean, &ctx).fingerprint()
    );
}

#[test]
fn test_out_of_range_parameter_runs_at_the_boundary() {
    let clean = robot_transmission();
    let ctx = EffectContext::for_mode(&ROBOT_36, 0.0);

    let mut over = EffectChain::new();
    over.add(EffectSpec::new(EffectKind::Delay).with_param("feedback", 5.0));
    let mut at_limit = EffectChain::new();
    at_limit.add(EffectSpec::new(EffectKind::Delay).with_param("feedback", 0.9));

    let mut output = clean.clone();
    let report = over.process(&mut output, &ctx);
    assert_eq!(output, at_limit.apply(&clean, &ctx));

    assert_eq!(report.clamped.len(), 1);
    match &report.clamped[0] {
        SstvError::InvalidEffectParameter {
            effect,
            param,
            value,
            clamped,
        } => {
            assert_eq!(effect, "delay");
            assert_eq!(param, "feedback");
            assert_eq!(*value, 5.0);
            assert_eq!(*clamped, 0.9);
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_disabled_effect_is_skipped() {
    let clean = robot_transmission();
    let ctx = EffectContext::for_mode(&ROBOT_36, 0.0);
    let chain = EffectChain::from_effects(vec![
        EffectSpec::new(EffectKind::Noise).with_enabled(false)
    ])
    .with_seed(1);

    let mut output = clean.clone();
    let report = chain.process(&mut output, &ctx);
    assert_eq!(report.applied, 0);
    assert_eq!(output, clean);
}
