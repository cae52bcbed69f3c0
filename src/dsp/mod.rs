//! Corruption effects
//!
//! Signal-level effects applied to an encoded SSTV transmission before it
//! is decoded. Effects are configured as [`EffectSpec`]s and run through an
//! [`EffectChain`]; named chains live in [`presets`].

pub mod biquad;
mod chain;
mod distortion;
mod effect;
mod frequency;
pub mod hilbert;
mod modulation;
mod noise;
pub mod presets;
mod scanline;
mod time;

pub use chain::{ChainReport, EffectChain};
pub use effect::{
    rng_for, EffectContext, EffectKind, EffectReport, EffectSpec, NoiseType, ParamSpec,
    ParamValue, Params,
};
