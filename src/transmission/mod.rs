//! Transmission sessions
//!
//! Runs the clean and the corrupted decode of one transmission side by side,
//! the corrupted one paced to audio playback.

pub mod controller;
pub mod pacing;

pub use controller::{
    SessionInfo, SessionState, Track, TransmissionController, TransmissionEvent,
    TransmissionHandle, TransmissionOutcome, TransmissionRequest, DEFAULT_CHUNK_SAMPLES,
};
pub use pacing::{GateResult, PacingGate};
