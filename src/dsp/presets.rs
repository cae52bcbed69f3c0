//! Named corruption presets
//!
//! Three tiers: aesthetic (image still recognisable), moderate and extreme.
//! Every preset is an [`EffectChain`] in the recommended effect order.
//! Presets carry no seed; set one on the returned chain for reproducible
//! output.

use serde::Serialize;

use super::chain::EffectChain;
use super::effect::{EffectKind, EffectSpec, NoiseType};
use crate::error::{Result, SstvError};

/// How heavily a preset corrupts the picture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Clean,
    Aesthetic,
    Moderate,
    Extreme,
}

/// Catalog entry
#[derive(Debug, Clone, Copy, Serialize)]
pub struct PresetInfo {
    pub name: &'static str,
    pub tier: Tier,
}

pub const PRESETS: &[PresetInfo] = &[
    PresetInfo { name: "Clean", tier: Tier::Clean },
    PresetInfo { name: "Vintage VHS", tier: Tier::Aesthetic },
    PresetInfo { name: "Lo-Fi Aesthetic", tier: Tier::Aesthetic },
    PresetInfo { name: "Analog Warmth", tier: Tier::Aesthetic },
    PresetInfo { name: "Retro Broadcast", tier: Tier::Aesthetic },
    PresetInfo { name: "Film Grain", tier: Tier::Aesthetic },
    PresetInfo { name: "Pastel Dream", tier: Tier::Aesthetic },
    PresetInfo { name: "Subtle Glitch", tier: Tier::Aesthetic },
    PresetInfo { name: "Soft Corruption", tier: Tier::Aesthetic },
    PresetInfo { name: "VHS Tracking Error", tier: Tier::Moderate },
    PresetInfo { name: "Chromatic Aberration", tier: Tier::Moderate },
    PresetInfo { name: "Signal Dropout", tier: Tier::Moderate },
    PresetInfo { name: "Digital Meltdown", tier: Tier::Extreme },
    PresetInfo { name: "Scanline Hell", tier: Tier::Extreme },
    PresetInfo { name: "Total Chaos", tier: Tier::Extreme },
];

/// Preset names in catalog order
pub fn names() -> impl Iterator<Item = &'static str> {
    PRESETS.iter().map(|p| p.name)
}

fn normalize(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

fn phase(depth: f64, rate_hz: f64) -> EffectSpec {
    EffectSpec::new(EffectKind::PhaseModulation)
        .with_param("depth", depth)
        .with_param("rate_hz", rate_hz)
}

fn amp(depth: f64, rate_hz: f64) -> EffectSpec {
    EffectSpec::new(EffectKind::AmplitudeModulation)
        .with_param("depth", depth)
        .with_param("rate_hz", rate_hz)
}

fn wobble(amount: f64, rate_hz: f64) -> EffectSpec {
    EffectSpec::new(EffectKind::SyncWobble)
        .with_param("amount", amount)
        .with_param("rate_hz", rate_hz)
}

fn dropout(probability: f64, duration_ms: f64) -> EffectSpec {
    EffectSpec::new(EffectKind::SyncDropout)
        .with_param("probability", probability)
        .with_param("duration_ms", duration_ms)
}

fn scanline(probability: f64, intensity: f64) -> EffectSpec {
    EffectSpec::new(EffectKind::ScanlineCorruption)
        .with_param("probability", probability)
        .with_param("intensity", intensity)
}

fn noise(amount: f64, noise_type: NoiseType) -> EffectSpec {
    EffectSpec::new(EffectKind::Noise)
        .with_param("amount", amount)
        .with_param("noise_type", noise_type)
}

fn distortion(drive: f64, clip: f64) -> EffectSpec {
    EffectSpec::new(EffectKind::Distortion)
        .with_param("drive", drive)
        .with_param("clip", clip)
}

fn harmonic(amount: f64, harmonics: f64) -> EffectSpec {
    EffectSpec::new(EffectKind::HarmonicDistortion)
        .with_param("amount", amount)
        .with_param("harmonics", harmonics)
}

fn bitcrush(bits: f64, target_rate: f64) -> EffectSpec {
    EffectSpec::new(EffectKind::Bitcrush)
        .with_param("bits", bits)
        .with_param("target_rate", target_rate)
}

fn shift(shift_hz: f64) -> EffectSpec {
    EffectSpec::new(EffectKind::FrequencyShift).with_param("shift_hz", shift_hz)
}

fn echo(delay_ms: f64, feedback: f64, mix: f64) -> EffectSpec {
    EffectSpec::new(EffectKind::Delay)
        .with_param("delay_ms", delay_ms)
        .with_param("feedback", feedback)
        .with_param("mix", mix)
}

fn effects_for(key: &str) -> Option<Vec<EffectSpec>> {
    use NoiseType::*;

    let effects = match key {
        "clean" => vec![],
        "vintagevhs" => vec![
            noise(0.12, Crackle),
            wobble(0.18, 2.5),
            phase(0.15, 3.0),
            distortion(0.25, 0.7),
        ],
        "lofiaesthetic" => vec![
            bitcrush(6.0, 22050.0),
            noise(0.08, Pink),
            harmonic(0.2, 2.0),
        ],
        "analogwarmth" => vec![phase(0.1, 1.5), harmonic(0.15, 2.0), noise(0.05, Pink)],
        "retrobroadcast" => vec![wobble(0.12, 1.8), shift(45.0), noise(0.1, Gaussian)],
        "filmgrain" => vec![
            noise(0.18, Gaussian),
            harmonic(0.1, 1.0),
            bitcrush(7.0, 33075.0),
        ],
        "pasteldream" => vec![shift(80.0), phase(0.2, 5.0), harmonic(0.25, 2.0)],
        "subtleglitch" => vec![scanline(0.08, 0.35), phase(0.12, 6.0), noise(0.06, Crackle)],
        "softcorruption" => vec![wobble(0.22, 4.0), scanline(0.12, 0.45), harmonic(0.18, 2.0)],
        "vhstrackingerror" => vec![
            phase(0.4, 4.5),
            wobble(0.35, 3.5),
            noise(0.25, Crackle),
            distortion(0.35, 0.65),
        ],
        "chromaticaberration" => vec![
            phase(0.3, 12.0),
            shift(150.0),
            echo(3.0, 0.25, 0.4),
            harmonic(0.3, 2.0),
        ],
        "signaldropout" => vec![dropout(0.2, 8.0), scanline(0.18, 0.55), noise(0.3, Crackle)],
        "digitalmeltdown" => vec![
            bitcrush(2.0, 4400.0),
            harmonic(0.7, 4.0),
            scanline(0.35, 0.85),
            shift(-150.0),
        ],
        "scanlinehell" => vec![
            scanline(0.45, 0.95),
            wobble(0.8, 12.0),
            bitcrush(3.0, 6000.0),
            noise(0.55, White),
        ],
        "totalchaos" => vec![
            phase(0.85, 10.0),
            amp(0.7, 14.0),
            scanline(0.4, 0.9),
            noise(0.75, White),
            bitcrush(2.0, 3300.0),
            distortion(0.9, 0.35),
        ],
        _ => return None,
    };
    Some(effects)
}

/// Build the named preset; names match ignoring case, spaces and dashes
pub fn by_name(name: &str) -> Result<EffectChain> {
    let effects = effects_for(&normalize(name)).ok_or_else(|| SstvError::UnknownPreset {
        name: name.to_string(),
    })?;
    let mut chain = EffectChain::new();
    for effect in effects {
        chain.add(effect);
    }
    Ok(chain)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_catalog_entry_builds() {
        for name in names() {
            let chain = by_name(name).unwrap();
            for effect in chain.iter() {
                let (_, clamped) = effect.resolve();
                assert!(clamped.is_empty(), "{} clamps {:?}", name, clamped);
            }
        }
        assert_eq!(names().count(), 15);
    }

    #[test]
    fn test_clean_is_empty() {
        assert!(by_name("Clean").unwrap().is_empty());
    }

    #[test]
    fn test_lookup_is_forgiving() {
        assert_eq!(by_name("lo-fi aesthetic").unwrap(), by_name("Lo-Fi Aesthetic").unwrap());
        assert_eq!(by_name("TOTAL_CHAOS").unwrap().len(), 6);
    }

    #[test]
    fn test_unknown_preset() {
        assert!(matches!(by_name("Deep Fried"), Err(SstvError::UnknownPreset { .. })));
    }

    #[test]
    fn test_presets_follow_recommended_order() {
        for name in names() {
            let chain = by_name(name).unwrap();
            let priorities: Vec<_> = chain.iter().map(|e| e.kind.order_priority()).collect();
            assert!(priorities.windows(2).all(|w| w[0] <= w[1]), "{}", name);
        }
    }
}
