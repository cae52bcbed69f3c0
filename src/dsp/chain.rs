//! Effect chain
//!
//! Effects run in chain order (index 0 first):
//! `apply(buffer, [e1, e2, .., en]) = en(..e2(e1(buffer)))`.
//!
//! Recommended default order, used by [`EffectChain::add`]:
//! 1. Phase / amplitude modulation (base corruption)
//! 2. Sync wobble, sync dropout, scanline corruption
//! 3. Noise, distortion, harmonics, bitcrush
//! 4. Frequency shift, bandpass
//! 5. Delay, time stretch
//!
//! The buffer is processed in place, one effect after another. After the
//! last effect the buffer is peak-normalised to full scale if it exceeds it.

use log::{debug, info};
use serde::{Deserialize, Serialize};

use super::effect::{rng_for, EffectContext, EffectSpec};
use crate::engine::buffer::SAMPLE_LIMIT;
use crate::engine::AudioBuffer;
use crate::error::{Result, SstvError};

/// Outcome of running a chain
#[derive(Debug, Default)]
pub struct ChainReport {
    /// Enabled effects that ran
    pub applied: usize,
    /// Every parameter clamped along the way
    pub clamped: Vec<SstvError>,
    /// Non-finite samples replaced across all stages
    pub non_finite: usize,
    /// Gain of the final peak normalisation (1.0 when untouched)
    pub normalize_gain: f32,
}

/// Ordered list of effects with an optional chain-wide seed
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EffectChain {
    #[serde(default)]
    pub effects: Vec<EffectSpec>,
    /// Seeds every effect without its own seed as `seed ^ index`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl EffectChain {
    /// Create a new empty effect chain
    pub fn new() -> Self {
        Self::default()
    }

    /// Chain with effects in the given order
    pub fn from_effects(effects: Vec<EffectSpec>) -> Self {
        Self { effects, seed: None }
    }

    /// Builder: set the chain seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Add an effect at its recommended position
    pub fn add(&mut self, effect: EffectSpec) {
        let priority = effect.kind.order_priority();
        let position = self
            .effects
            .iter()
            .position(|e| e.kind.order_priority() > priority)
            .unwrap_or(self.effects.len());
        self.effects.insert(position, effect);
    }

    /// Add an effect at a specific index
    pub fn add_at(&mut self, effect: EffectSpec, index: usize) {
        let index = index.min(self.effects.len());
        self.effects.insert(index, effect);
    }

    /// Append an effect at the end
    pub fn push(&mut self, effect: EffectSpec) {
        self.effects.push(effect);
    }

    /// Remove the effect at `index`
    pub fn remove(&mut self, index: usize) -> Option<EffectSpec> {
        (index < self.effects.len()).then(|| self.effects.remove(index))
    }

    /// Move an effect to a new position
    pub fn move_effect(&mut self, from: usize, to: usize) -> bool {
        if from >= self.effects.len() {
            return false;
        }
        let effect = self.effects.remove(from);
        let to = to.min(self.effects.len());
        self.effects.insert(to, effect);
        true
    }

    pub fn len(&self) -> usize {
        self.effects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &EffectSpec> {
        self.effects.iter()
    }

    /// Number of enabled effects
    pub fn enabled_count(&self) -> usize {
        self.effects.iter().filter(|e| e.enabled).count()
    }

    /// Seed used for the effect at `index`, if deterministic
    pub fn effect_seed(&self, index: usize) -> Option<u64> {
        let effect = self.effects.get(index)?;
        effect.seed.or_else(|| self.seed.map(|s| s ^ index as u64))
    }

    /// Run the chain over `buffer` in place
    pub fn process(&self, buffer: &mut AudioBuffer, ctx: &EffectContext) -> ChainReport {
        let mut report = ChainReport {
            normalize_gain: 1.0,
            ..ChainReport::default()
        };

        for (index, effect) in self.effects.iter().enumerate() {
            if !effect.enabled {
                continue;
            }
            let mut rng = rng_for(self.effect_seed(index));
            let stage = effect.apply_in_place(buffer, ctx, &mut rng);
            debug!(
                "Applied {} ({} clamped, {} non-finite)",
                effect.kind,
                stage.clamped.len(),
                stage.non_finite
            );
            report.applied += 1;
            report.non_finite += stage.non_finite;
            report.clamped.extend(stage.clamped);
        }

        report.normalize_gain = buffer.normalize_peak(SAMPLE_LIMIT);
        if report.applied > 0 {
            info!(
                "Effect chain applied {} effects to {:.2}s (peak gain {:.3})",
                report.applied,
                buffer.duration_secs(),
                report.normalize_gain
            );
        }
        report
    }

    /// Run the chain over a copy of `buffer`
    pub fn apply(&self, buffer: &AudioBuffer, ctx: &EffectContext) -> AudioBuffer {
        let mut output = buffer.clone();
        self.process(&mut output, ctx);
        output
    }

    /// Serialize chain state to JSON
    pub fn to_json(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// Load a chain from JSON; either `{"effects": [..], "seed": ..}` or a
    /// bare array of effects
    pub fn from_json(json: &serde_json::Value) -> Result<Self> {
        if json.is_array() {
            let effects: Vec<EffectSpec> = serde_json::from_value(json.clone())?;
            return Ok(Self::from_effects(effects));
        }
        Ok(serde_json::from_value(json.clone())?)
    }

    /// Parse a chain from a JSON string
    pub fn from_json_str(text: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(text)?;
        Self::from_json(&value)
    }
}
