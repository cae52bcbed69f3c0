//! Effect catalog
//!
//! The corruption effects form a closed set. An [`EffectSpec`] names one
//! kind plus its raw parameters; [`EffectSpec::apply_in_place`] resolves the
//! parameters against the declared ranges and dispatches to the effect.
//!
//! Out-of-range values are clamped to the nearest boundary and reported as
//! `InvalidEffectParameter`, never returned as failures.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use log::warn;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use super::{distortion, frequency, modulation, noise, scanline, time};
use crate::engine::AudioBuffer;
use crate::error::{Result, SstvError};
use crate::sstv::modes::{ModeSpec, MARTIN_M1};

// ============================================================================
// Parameters
// ============================================================================

/// Declared range of one numeric parameter
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamSpec {
    pub name: &'static str,
    pub min: f64,
    pub max: f64,
    pub default: f64,
    /// Rounded to the nearest integer after clamping
    pub integer: bool,
    pub description: &'static str,
}

impl ParamSpec {
    const fn new(
        name: &'static str,
        min: f64,
        max: f64,
        default: f64,
        description: &'static str,
    ) -> Self {
        Self {
            name,
            min,
            max,
            default,
            integer: false,
            description,
        }
    }

    const fn int(
        name: &'static str,
        min: f64,
        max: f64,
        default: f64,
        description: &'static str,
    ) -> Self {
        Self {
            name,
            min,
            max,
            default,
            integer: true,
            description,
        }
    }

    /// Clamp `value` into the declared range
    pub fn clamp(&self, value: f64) -> f64 {
        let value = if value.is_nan() { self.default } else { value };
        let clamped = value.clamp(self.min, self.max);
        if self.integer {
            clamped.round()
        } else {
            clamped
        }
    }
}

/// Raw parameter value as written in a chain or preset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Number(f64),
    Text(String),
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        ParamValue::Number(value)
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Text(value.to_string())
    }
}

impl From<NoiseType> for ParamValue {
    fn from(value: NoiseType) -> Self {
        ParamValue::Text(value.to_string())
    }
}

/// Spectral shape of the noise effect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoiseType {
    #[default]
    White,
    Pink,
    Gaussian,
    Crackle,
}

impl fmt::Display for NoiseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NoiseType::White => "white",
            NoiseType::Pink => "pink",
            NoiseType::Gaussian => "gaussian",
            NoiseType::Crackle => "crackle",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for NoiseType {
    type Err = SstvError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "white" => Ok(NoiseType::White),
            "pink" => Ok(NoiseType::Pink),
            "gaussian" | "normal" => Ok(NoiseType::Gaussian),
            "crackle" | "vinyl" => Ok(NoiseType::Crackle),
            _ => Err(SstvError::InvalidEffectParameter {
                effect: "noise".into(),
                param: format!("noise_type={}", s),
                value: f64::NAN,
                clamped: f64::NAN,
            }),
        }
    }
}

/// Parameters after range resolution
#[derive(Debug, Clone, PartialEq)]
pub struct Params {
    values: BTreeMap<&'static str, f64>,
    noise_type: NoiseType,
}

impl Params {
    /// Resolved value of `name`; 0.0 for names the effect does not declare
    pub fn get(&self, name: &str) -> f64 {
        self.values.get(name).copied().unwrap_or(0.0)
    }

    pub fn noise_type(&self) -> NoiseType {
        self.noise_type
    }
}

// ============================================================================
// Effect kinds
// ============================================================================

/// Every corruption effect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectKind {
    PhaseModulation,
    AmplitudeModulation,
    SyncWobble,
    SyncDropout,
    ScanlineCorruption,
    Noise,
    Distortion,
    HarmonicDistortion,
    Bitcrush,
    FrequencyShift,
    Bandpass,
    Delay,
    TimeStretch,
}

const PHASE_MODULATION_PARAMS: &[ParamSpec] = &[
    ParamSpec::new("depth", 0.0, 1.0, 0.5, "Shift depth, up to 10 ms"),
    ParamSpec::new("rate_hz", 0.5, 20.0, 8.0, "LFO rate"),
];

const AMPLITUDE_MODULATION_PARAMS: &[ParamSpec] = &[
    ParamSpec::new("depth", 0.0, 1.0, 0.5, "Modulation depth"),
    ParamSpec::new("rate_hz", 1.0, 25.0, 12.0, "Base LFO rate"),
];

const SYNC_WOBBLE_PARAMS: &[ParamSpec] = &[
    ParamSpec::new("amount", 0.0, 1.0, 0.5, "Wobble intensity"),
    ParamSpec::new("rate_hz", 0.5, 20.0, 5.0, "Wobble rate"),
];

const SYNC_DROPOUT_PARAMS: &[ParamSpec] = &[
    ParamSpec::new("probability", 0.0, 1.0, 0.1, "Dropout likelihood"),
    ParamSpec::new("duration_ms", 1.0, 50.0, 5.0, "Length of each dropout"),
];

const SCANLINE_CORRUPTION_PARAMS: &[ParamSpec] = &[
    ParamSpec::new("probability", 0.0, 1.0, 0.15, "Chance each line is corrupted"),
    ParamSpec::new("intensity", 0.0, 1.0, 0.7, "Severity of each artifact"),
];

const NOISE_PARAMS: &[ParamSpec] = &[ParamSpec::new("amount", 0.0, 1.0, 0.2, "Noise level")];

const DISTORTION_PARAMS: &[ParamSpec] = &[
    ParamSpec::new("drive", 0.0, 1.0, 0.3, "Gain and wet amount"),
    ParamSpec::new("clip", 0.0, 1.0, 0.8, "Soft clip threshold"),
];

const HARMONIC_DISTORTION_PARAMS: &[ParamSpec] = &[
    ParamSpec::new("amount", 0.0, 1.0, 0.5, "Overtone level"),
    ParamSpec::int("harmonics", 1.0, 5.0, 3.0, "Number of overtones"),
];

const BITCRUSH_PARAMS: &[ParamSpec] = &[
    ParamSpec::int("bits", 1.0, 16.0, 8.0, "Bit depth"),
    ParamSpec::int("target_rate", 1000.0, 48000.0, 22050.0, "Hold rate in Hz"),
];

const FREQUENCY_SHIFT_PARAMS: &[ParamSpec] = &[ParamSpec::new(
    "shift_hz",
    -500.0,
    500.0,
    0.0,
    "Shift applied to every frequency",
)];

const BANDPASS_PARAMS: &[ParamSpec] = &[
    ParamSpec::new("low_hz", 100.0, 2000.0, 300.0, "High-pass corner"),
    ParamSpec::new("high_hz", 1000.0, 10000.0, 3000.0, "Low-pass corner"),
];

const DELAY_PARAMS: &[ParamSpec] = &[
    ParamSpec::new("delay_ms", 3.0, 500.0, 100.0, "Echo spacing"),
    ParamSpec::new("feedback", 0.0, 0.9, 0.4, "Gain per echo"),
    ParamSpec::new("mix", 0.0, 1.0, 0.5, "Wet/dry mix"),
];

const TIME_STRETCH_PARAMS: &[ParamSpec] = &[ParamSpec::new(
    "rate",
    0.5,
    2.5,
    1.0,
    "Playback rate; >1 compresses lines",
)];

impl EffectKind {
    /// Every kind in default chain order
    pub const ALL: [EffectKind; 13] = [
        EffectKind::PhaseModulation,
        EffectKind::AmplitudeModulation,
        EffectKind::SyncWobble,
        EffectKind::SyncDropout,
        EffectKind::ScanlineCorruption,
        EffectKind::Noise,
        EffectKind::Distortion,
        EffectKind::HarmonicDistortion,
        EffectKind::Bitcrush,
        EffectKind::FrequencyShift,
        EffectKind::Bandpass,
        EffectKind::Delay,
        EffectKind::TimeStretch,
    ];

    /// Identifier used in chains and on the command line
    pub fn name(self) -> &'static str {
        match self {
            EffectKind::PhaseModulation => "phase_modulation",
            EffectKind::AmplitudeModulation => "amplitude_modulation",
            EffectKind::SyncWobble => "sync_wobble",
            EffectKind::SyncDropout => "sync_dropout",
            EffectKind::ScanlineCorruption => "scanline_corruption",
            EffectKind::Noise => "noise",
            EffectKind::Distortion => "distortion",
            EffectKind::HarmonicDistortion => "harmonic_distortion",
            EffectKind::Bitcrush => "bitcrush",
            EffectKind::FrequencyShift => "frequency_shift",
            EffectKind::Bandpass => "bandpass",
            EffectKind::Delay => "delay",
            EffectKind::TimeStretch => "time_stretch",
        }
    }

    /// Human-readable name
    pub fn display_name(self) -> &'static str {
        match self {
            EffectKind::PhaseModulation => "Phase Modulation",
            EffectKind::AmplitudeModulation => "Amplitude Modulation",
            EffectKind::SyncWobble => "Sync Wobble",
            EffectKind::SyncDropout => "Sync Dropout",
            EffectKind::ScanlineCorruption => "Scanline Corruption",
            EffectKind::Noise => "Noise",
            EffectKind::Distortion => "Distortion",
            EffectKind::HarmonicDistortion => "Harmonic Distortion",
            EffectKind::Bitcrush => "Bitcrush",
            EffectKind::FrequencyShift => "Frequency Shift",
            EffectKind::Bandpass => "Bandpass",
            EffectKind::Delay => "Delay",
            EffectKind::TimeStretch => "Time Stretch",
        }
    }

    /// Declared numeric parameters
    pub fn params(self) -> &'static [ParamSpec] {
        match self {
            EffectKind::PhaseModulation => PHASE_MODULATION_PARAMS,
            EffectKind::AmplitudeModulation => AMPLITUDE_MODULATION_PARAMS,
            EffectKind::SyncWobble => SYNC_WOBBLE_PARAMS,
            EffectKind::SyncDropout => SYNC_DROPOUT_PARAMS,
            EffectKind::ScanlineCorruption => SCANLINE_CORRUPTION_PARAMS,
            EffectKind::Noise => NOISE_PARAMS,
            EffectKind::Distortion => DISTORTION_PARAMS,
            EffectKind::HarmonicDistortion => HARMONIC_DISTORTION_PARAMS,
            EffectKind::Bitcrush => BITCRUSH_PARAMS,
            EffectKind::FrequencyShift => FREQUENCY_SHIFT_PARAMS,
            EffectKind::Bandpass => BANDPASS_PARAMS,
            EffectKind::Delay => DELAY_PARAMS,
            EffectKind::TimeStretch => TIME_STRETCH_PARAMS,
        }
    }

    /// Look up a declared parameter
    pub fn param(self, name: &str) -> Option<&'static ParamSpec> {
        self.params().iter().find(|p| p.name == name)
    }

    /// Position in the default chain order (lower runs first)
    pub fn order_priority(self) -> usize {
        Self::ALL.iter().position(|&k| k == self).unwrap_or(Self::ALL.len())
    }
}

impl fmt::Display for EffectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for EffectKind {
    type Err = SstvError;

    /// Accepts canonical names with `-` or `_`, plus the short forms
    /// `phasemod`, `ampmod`, `syncwobble`, `syncdropout`, `scanline`,
    /// `harmonic`, `freqshift`, `timestretch`, `echo`.
    fn from_str(s: &str) -> Result<Self> {
        let key = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        let kind = match key.as_str() {
            "phasemod" => EffectKind::PhaseModulation,
            "ampmod" => EffectKind::AmplitudeModulation,
            "syncwobble" => EffectKind::SyncWobble,
            "syncdropout" => EffectKind::SyncDropout,
            "scanline" => EffectKind::ScanlineCorruption,
            "harmonic" => EffectKind::HarmonicDistortion,
            "freqshift" => EffectKind::FrequencyShift,
            "timestretch" => EffectKind::TimeStretch,
            "echo" => EffectKind::Delay,
            other => *Self::ALL
                .iter()
                .find(|k| k.name() == other)
                .ok_or_else(|| SstvError::UnknownEffect {
                    name: s.to_string(),
                })?,
        };
        Ok(kind)
    }
}

// ============================================================================
// Context
// ============================================================================

/// Transmission facts an effect may need
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EffectContext {
    /// Duration of one image line of the transmitted mode
    pub line_duration_ms: Option<f64>,
    /// Audio before the first line (VIS header)
    pub lead_in_ms: f64,
}

impl Default for EffectContext {
    fn default() -> Self {
        Self {
            line_duration_ms: None,
            lead_in_ms: 0.0,
        }
    }
}

impl EffectContext {
    /// Context for a transmission in `mode`
    pub fn for_mode(mode: &ModeSpec, lead_in_ms: f64) -> Self {
        Self {
            line_duration_ms: Some(mode.line_duration_ms()),
            lead_in_ms,
        }
    }

    /// Line duration, Martin M1 timing when unknown
    pub fn line_duration_ms(&self) -> f64 {
        self.line_duration_ms
            .unwrap_or_else(|| MARTIN_M1.line_duration_ms())
    }
}

/// Deterministic generator for `seed`, or an entropy-seeded one
pub fn rng_for(seed: Option<u64>) -> ChaCha8Rng {
    match seed {
        Some(seed) => ChaCha8Rng::seed_from_u64(seed),
        None => ChaCha8Rng::from_entropy(),
    }
}

// ============================================================================
// EffectSpec
// ============================================================================

fn enabled_default() -> bool {
    true
}

/// One configured effect
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectSpec {
    pub kind: EffectKind,
    #[serde(default = "enabled_default")]
    pub enabled: bool,
    #[serde(default)]
    pub params: BTreeMap<String, ParamValue>,
    /// Fixed seed for stochastic effects
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

/// What happened while applying an effect
#[derive(Debug, Default)]
pub struct EffectReport {
    /// Parameters that were clamped into range
    pub clamped: Vec<SstvError>,
    /// Non-finite samples replaced after the effect
    pub non_finite: usize,
}

impl EffectSpec {
    /// Effect with every parameter at its default
    pub fn new(kind: EffectKind) -> Self {
        Self {
            kind,
            enabled: true,
            params: BTreeMap::new(),
            seed: None,
        }
    }

    /// Builder: set a parameter
    pub fn with_param(mut self, name: &str, value: impl Into<ParamValue>) -> Self {
        self.params.insert(name.to_string(), value.into());
        self
    }

    /// Builder: fix the random seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Builder: enable or disable
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Resolve raw parameters against the declared ranges
    ///
    /// # Returns
    /// The resolved values and one `InvalidEffectParameter` per clamped value
    pub fn resolve(&self) -> (Params, Vec<SstvError>) {
        let mut clamped = Vec::new();
        let mut values = BTreeMap::new();

        for spec in self.kind.params() {
            let value = match self.params.get(spec.name) {
                Some(ParamValue::Number(raw)) => self.clamp_param(spec, *raw, &mut clamped),
                Some(ParamValue::Text(text)) => match text.trim().parse::<f64>() {
                    Ok(raw) => self.clamp_param(spec, raw, &mut clamped),
                    Err(_) => {
                        clamped.push(self.param_error(spec.name, f64::NAN, spec.default));
                        spec.default
                    }
                },
                None => spec.default,
            };
            values.insert(spec.name, value);
        }

        let mut noise_type = NoiseType::default();
        if self.kind == EffectKind::Noise {
            if let Some(raw) = self.params.get("noise_type") {
                let text = match raw {
                    ParamValue::Text(text) => text.clone(),
                    ParamValue::Number(n) => n.to_string(),
                };
                match text.parse() {
                    Ok(parsed) => noise_type = parsed,
                    Err(err) => clamped.push(err),
                }
            }
        }

        for name in self.params.keys() {
            let known = self.kind.param(name).is_some()
                || (self.kind == EffectKind::Noise && name == "noise_type");
            if !known {
                warn!("{}: ignoring undeclared parameter '{}'", self.kind, name);
            }
        }

        for err in &clamped {
            warn!("{}", err);
        }

        (Params { values, noise_type }, clamped)
    }

    /// Clamp `raw` into `spec`, reporting anything beyond integer rounding
    fn clamp_param(&self, spec: &ParamSpec, raw: f64, clamped: &mut Vec<SstvError>) -> f64 {
        let resolved = spec.clamp(raw);
        let rounded_only = spec.integer && (raw.round() - resolved).abs() < f64::EPSILON;
        if resolved != raw && !rounded_only {
            clamped.push(self.param_error(spec.name, raw, resolved));
        }
        resolved
    }

    fn param_error(&self, param: &str, value: f64, clamped: f64) -> SstvError {
        SstvError::InvalidEffectParameter {
            effect: self.kind.name().to_string(),
            param: param.to_string(),
            value,
            clamped,
        }
    }

    /// Apply to a copy of `buffer`
    ///
    /// Draws randomness from the effect's seed, or from OS entropy.
    pub fn apply(&self, buffer: &AudioBuffer, ctx: &EffectContext) -> AudioBuffer {
        let mut output = buffer.clone();
        let mut rng = rng_for(self.seed);
        self.apply_in_place(&mut output, ctx, &mut rng);
        output
    }

    /// Apply in place using `rng`
    ///
    /// Disabled effects leave the buffer untouched. The output is always
    /// sanitized and keeps the input length.
    pub fn apply_in_place(
        &self,
        buffer: &mut AudioBuffer,
        ctx: &EffectContext,
        rng: &mut ChaCha8Rng,
    ) -> EffectReport {
        let mut report = EffectReport::default();
        if !self.enabled || buffer.is_empty() {
            return report;
        }

        let (params, clamped) = self.resolve();
        report.clamped = clamped;
        let sample_rate = buffer.sample_rate;
        let samples = buffer.samples_mut();

        match self.kind {
            EffectKind::PhaseModulation => modulation::phase_modulation(
                samples,
                sample_rate,
                params.get("depth"),
                params.get("rate_hz"),
                rng,
            ),
            EffectKind::AmplitudeModulation => modulation::amplitude_modulation(
                samples,
                sample_rate,
                params.get("depth"),
                params.get("rate_hz"),
            ),
            EffectKind::HarmonicDistortion => modulation::harmonic_distortion(
                samples,
                sample_rate,
                params.get("amount"),
                params.get("harmonics") as usize,
            ),
            EffectKind::SyncWobble => scanline::sync_wobble(
                samples,
                sample_rate,
                params.get("amount"),
                params.get("rate_hz"),
                rng,
            ),
            EffectKind::SyncDropout => scanline::sync_dropout(
                samples,
                sample_rate,
                params.get("probability"),
                params.get("duration_ms"),
                rng,
            ),
            EffectKind::ScanlineCorruption => scanline::scanline_corruption(
                samples,
                sample_rate,
                params.get("probability"),
                params.get("intensity"),
                ctx,
                rng,
            ),
            EffectKind::Noise => noise::add_noise(
                samples,
                sample_rate,
                params.get("amount"),
                params.noise_type(),
                rng,
            ),
            EffectKind::Distortion => {
                distortion::distortion(samples, params.get("drive"), params.get("clip"))
            }
            EffectKind::Bitcrush => distortion::bitcrush(
                samples,
                sample_rate,
                params.get("bits") as u32,
                params.get("target_rate") as u32,
            ),
            EffectKind::FrequencyShift => {
                frequency::frequency_shift(samples, sample_rate, params.get("shift_hz"))
            }
            EffectKind::Bandpass => frequency::bandpass(
                samples,
                sample_rate,
                params.get("low_hz"),
                params.get("high_hz"),
            ),
            EffectKind::Delay => time::delay(
                samples,
                sample_rate,
                params.get("delay_ms"),
                params.get("feedback"),
                params.get("mix"),
            ),
            EffectKind::TimeStretch => time::time_stretch(buffer, params.get("rate")),
        }

        report.non_finite = buffer.sanitize();
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    fn tone(len: usize) -> AudioBuffer {
        let samples = (0..len)
            .map(|i| (i as f32 * 0.27).sin() * 0.8)
            .collect();
        AudioBuffer::from_samples(samples, 44100)
    }

    #[test_case("phase_modulation", EffectKind::PhaseModulation ; "canonical")]
    #[test_case("Sync-Wobble", EffectKind::SyncWobble ; "dashed")]
    #[test_case("scanline", EffectKind::ScanlineCorruption ; "short")]
    #[test_case("echo", EffectKind::Delay ; "alias")]
    fn test_kind_from_str(name: &str, expected: EffectKind) {
        assert_eq!(name.parse::<EffectKind>().unwrap(), expected);
    }

    #[test]
    fn test_unknown_effect() {
        assert!(matches!(
            "reverb".parse::<EffectKind>(),
            Err(SstvError::UnknownEffect { .. })
        ));
    }

    #[test]
    fn test_every_kind_declares_defaults_in_range() {
        for kind in EffectKind::ALL {
            for p in kind.params() {
                assert!(p.min <= p.default && p.default <= p.max, "{}.{}", kind, p.name);
            }
            assert_eq!(kind.name().parse::<EffectKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_resolve_clamps_and_reports() {
        let spec = EffectSpec::new(EffectKind::Delay)
            .with_param("feedback", 3.0)
            .with_param("mix", 0.25);
        let (params, clamped) = spec.resolve();
        assert_eq!(params.get("feedback"), 0.9);
        assert_eq!(params.get("mix"), 0.25);
        assert_eq!(params.get("delay_ms"), 100.0);
        assert_eq!(clamped.len(), 1);
        assert!(clamped[0].is_recoverable());
    }

    #[test]
    fn test_integer_params_round_without_report() {
        let spec = EffectSpec::new(EffectKind::Bitcrush).with_param("bits", 4.4);
        let (params, clamped) = spec.resolve();
        assert_eq!(params.get("bits"), 4.0);
        assert!(clamped.is_empty());
    }

    #[test]
    fn test_noise_type_parsing() {
        let spec = EffectSpec::new(EffectKind::Noise).with_param("noise_type", NoiseType::Pink);
        assert_eq!(spec.resolve().0.noise_type(), NoiseType::Pink);

        let bad = EffectSpec::new(EffectKind::Noise).with_param("noise_type", "purple");
        let (params, clamped) = bad.resolve();
        assert_eq!(params.noise_type(), NoiseType::White);
        assert_eq!(clamped.len(), 1);
    }

    #[test]
    fn test_out_of_range_matches_boundary() {
        let input = tone(20_000);
        let ctx = EffectContext::default();
        for kind in EffectKind::ALL {
            for p in kind.params() {
                let span = p.max.abs() * 10.0 + 1.0;
                for (outside, boundary) in [(p.max + span, p.max), (p.min - span, p.min)] {
                    let beyond = EffectSpec::new(kind).with_param(p.name, outside).with_seed(3);
                    let at = EffectSpec::new(kind).with_param(p.name, boundary).with_seed(3);
                    assert_eq!(
                        beyond.apply(&input, &ctx).fingerprint(),
                        at.apply(&input, &ctx).fingerprint(),
                        "{}.{} = {}",
                        kind,
                        p.name,
                        outside
                    );
                }
            }
        }
    }

    #[test]
    fn test_text_values_clamp_like_numbers() {
        let spec = EffectSpec::new(EffectKind::Delay)
            .with_param("feedback", "7.5")
            .with_param("mix", "lots");
        let (params, clamped) = spec.resolve();
        assert_eq!(params.get("feedback"), 0.9);
        assert_eq!(params.get("mix"), 0.5);
        assert_eq!(clamped.len(), 2);

        let rounded = EffectSpec::new(EffectKind::Bitcrush).with_param("bits", " 4.4 ");
        let (params, clamped) = rounded.resolve();
        assert_eq!(params.get("bits"), 4.0);
        assert!(clamped.is_empty());
    }

    #[test]
    fn test_every_effect_keeps_length_and_finite() {
        let input = tone(30_000);
        let ctx = EffectContext::default();
        for kind in EffectKind::ALL {
            let out = EffectSpec::new(kind).with_seed(11).apply(&input, &ctx);
            assert_eq!(out.len(), input.len(), "{}", kind);
            assert!(out.samples.iter().all(|s| s.is_finite()), "{}", kind);
        }
    }

    #[test]
    fn test_disabled_effect_is_identity() {
        let input = tone(1000);
        let out = EffectSpec::new(EffectKind::Distortion)
            .with_param("drive", 1.0)
            .with_enabled(false)
            .apply(&input, &EffectContext::default());
        assert_eq!(out, input);
    }

    #[test]
    fn test_seeded_effect_is_deterministic() {
        let input = tone(10_000);
        let spec = EffectSpec::new(EffectKind::Noise)
            .with_param("noise_type", NoiseType::Crackle)
            .with_seed(42);
        let ctx = EffectContext::default();
        assert_eq!(spec.apply(&input, &ctx), spec.apply(&input, &ctx));
    }

    #[test]
    fn test_spec_json_shape() {
        let spec = EffectSpec::new(EffectKind::Noise)
            .with_param("amount", 0.3)
            .with_param("noise_type", "pink");
        let json = serde_json::to_value(&spec).unwrap();
        assert_eq!(json["kind"], "noise");
        assert_eq!(json["params"]["noise_type"], "pink");
        let back: EffectSpec = serde_json::from_value(json).unwrap();
        assert_eq!(back, spec);
    }
}
