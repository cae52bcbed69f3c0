//! sstv-glitch - SSTV glitch art engine
//!
//! Turns a still image into Slow-Scan Television audio, corrupts that audio
//! with a chain of deliberate distortions, and decodes it back into an image
//! so the damage becomes visible.
//!
//! # Architecture
//!
//! - [`sstv`]: mode catalog, encoder, FM demodulator and streaming decoder
//! - [`dsp`]: corruption effects, effect chains and presets
//! - [`transmission`]: clean and corrupted decodes side by side, the
//!   corrupted one paced to playback
//! - [`engine`]: audio buffer, WAV I/O and the playback transport

pub mod cli;
pub mod config;
pub mod dsp;
pub mod engine;
pub mod error;
pub mod output;
pub mod sstv;
pub mod transmission;

pub use config::AppConfig;
pub use error::{Result, SstvError};
