//! Audio Engine Module
//!
//! Core audio plumbing shared by every stage:
//! - Mono audio buffer with sanitizing and fingerprinting
//! - WAV file I/O
//! - Playback transport and the shared playback position

pub mod buffer;
pub mod io;
pub mod transport;

pub use buffer::{AudioBuffer, DEFAULT_SAMPLE_RATE};
pub use io::{export_audio, import_audio, ExportFormat};
pub use transport::{
    InstantPlayback, ManualPlayback, PlaybackPosition, PlaybackSink, SimulatedPlayback,
    TransportState,
};
