//! Playback transport for sstv-glitch
//!
//! Audio playback is an external sink: it consumes the corrupted buffer and
//! publishes how many samples it has played. The paced decoder only ever
//! reads that position; it never drives the clock.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, warn};

use crate::engine::buffer::AudioBuffer;
use crate::error::Result;

/// Transport states reported by a playback sink
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportState {
    /// Nothing is playing (default state)
    #[default]
    Stopped,
    /// Audio is actively playing
    Playing,
    /// The whole buffer has been played
    Finished,
}

impl TransportState {
    fn to_u8(self) -> u8 {
        match self {
            TransportState::Stopped => 0,
            TransportState::Playing => 1,
            TransportState::Finished => 2,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            1 => TransportState::Playing,
            2 => TransportState::Finished,
            _ => TransportState::Stopped,
        }
    }
}

impl fmt::Display for TransportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportState::Stopped => write!(f, "Stopped"),
            TransportState::Playing => write!(f, "Playing"),
            TransportState::Finished => write!(f, "Finished"),
        }
    }
}

// ============================================================================
// Playback position
// ============================================================================

/// Shared playback progress, in samples played
///
/// The only value shared across decode workers. Written by the sink that
/// owns it and read by the pacing gate.
///
/// # Example
/// ```
/// use sstv_glitch::engine::PlaybackPosition;
/// let position = PlaybackPosition::new();
/// let reader = position.clone();
/// position.set(4410);
/// assert_eq!(reader.samples_played(), 4410);
/// ```
#[derive(Debug, Clone, Default)]
pub struct PlaybackPosition {
    samples: Arc<AtomicU64>,
    state: Arc<AtomicU8>,
}

impl PlaybackPosition {
    /// Create a position at sample 0 in the `Stopped` state
    pub fn new() -> Self {
        Self::default()
    }

    /// Samples played so far
    pub fn samples_played(&self) -> u64 {
        self.samples.load(Ordering::Acquire)
    }

    /// Seconds played so far at `sample_rate`
    pub fn seconds_played(&self, sample_rate: u32) -> f64 {
        self.samples_played() as f64 / sample_rate.max(1) as f64
    }

    /// Publish a new position (sink side)
    pub fn set(&self, samples: u64) {
        self.samples.store(samples, Ordering::Release);
    }

    /// Current transport state
    pub fn state(&self) -> TransportState {
        TransportState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Publish a new transport state (sink side)
    pub fn set_state(&self, state: TransportState) {
        self.state.store(state.to_u8(), Ordering::Release);
    }
}

// ============================================================================
// Sinks
// ============================================================================

/// Consumer of the corrupted buffer that reports its progress
pub trait PlaybackSink: Send {
    /// Handle to the position this sink publishes
    fn position(&self) -> PlaybackPosition;

    /// Begin playing `buffer` from sample 0
    fn play(&mut self, buffer: Arc<AudioBuffer>) -> Result<()>;

    /// Stop playback; the position stays where it was
    fn stop(&mut self);
}

/// Sink that plays nothing and reports the whole buffer as played at once
#[derive(Debug, Default)]
pub struct InstantPlayback {
    position: PlaybackPosition,
}

impl InstantPlayback {
    /// Create a new instant sink
    pub fn new() -> Self {
        Self::default()
    }
}

impl PlaybackSink for InstantPlayback {
    fn position(&self) -> PlaybackPosition {
        self.position.clone()
    }

    fn play(&mut self, buffer: Arc<AudioBuffer>) -> Result<()> {
        self.position.set(buffer.len() as u64);
        self.position.set_state(TransportState::Finished);
        Ok(())
    }

    fn stop(&mut self) {
        self.position.set_state(TransportState::Stopped);
    }
}

/// Sink whose position is advanced by hand through [`PlaybackPosition::set`]
///
/// Used to drive the pacing gate deterministically, e.g. from a UI that owns
/// its own audio device.
#[derive(Debug, Default)]
pub struct ManualPlayback {
    position: PlaybackPosition,
}

impl ManualPlayback {
    /// Create a new manual sink at position 0
    pub fn new() -> Self {
        Self::default()
    }
}

impl PlaybackSink for ManualPlayback {
    fn position(&self) -> PlaybackPosition {
        self.position.clone()
    }

    fn play(&mut self, _buffer: Arc<AudioBuffer>) -> Result<()> {
        self.position.set(0);
        self.position.set_state(TransportState::Playing);
        Ok(())
    }

    fn stop(&mut self) {
        self.position.set_state(TransportState::Stopped);
    }
}

/// Sink that advances its position in wall-clock time on a background thread
///
/// `speed` scales real time: 1.0 is real-time playback, 4.0 plays four
/// seconds of audio per wall-clock second.
#[derive(Debug)]
pub struct SimulatedPlayback {
    position: PlaybackPosition,
    speed: f64,
    tick: Duration,
    stop_flag: Arc<AtomicBool>,
    worker: Option<thread::JoinHandle<()>>,
}

impl SimulatedPlayback {
    /// Create a simulated sink playing at `speed` × real time
    pub fn new(speed: f64) -> Self {
        let speed = if speed.is_finite() && speed > 0.0 {
            speed
        } else {
            warn!("Invalid playback speed {}, using real time", speed);
            1.0
        };
        Self {
            position: PlaybackPosition::new(),
            speed,
            tick: Duration::from_millis(5),
            stop_flag: Arc::new(AtomicBool::new(false)),
            worker: None,
        }
    }

    fn join_worker(&mut self) {
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }
    }
}

impl PlaybackSink for SimulatedPlayback {
    fn position(&self) -> PlaybackPosition {
        self.position.clone()
    }

    fn play(&mut self, buffer: Arc<AudioBuffer>) -> Result<()> {
        self.stop();
        self.stop_flag.store(false, Ordering::Release);

        let position = self.position.clone();
        let stop_flag = Arc::clone(&self.stop_flag);
        let speed = self.speed;
        let tick = self.tick;
        let total = buffer.len() as u64;
        let rate = buffer.sample_rate as f64;

        position.set(0);
        position.set_state(TransportState::Playing);
        debug!(
            "Simulated playback of {:.2}s at {}x",
            buffer.duration_secs(),
            speed
        );

        let handle = thread::Builder::new()
            .name("sstv-playback".into())
            .spawn(move || {
                let started = Instant::now();
                loop {
                    if stop_flag.load(Ordering::Acquire) {
                        position.set_state(TransportState::Stopped);
                        return;
                    }
                    let played = (started.elapsed().as_secs_f64() * rate * speed) as u64;
                    if played >= total {
                        position.set(total);
                        position.set_state(TransportState::Finished);
                        return;
                    }
                    position.set(played);
                    thread::sleep(tick);
                }
            })?;

        self.worker = Some(handle);
        Ok(())
    }

    fn stop(&mut self) {
        self.stop_flag.store(true, Ordering::Release);
        self.join_worker();
    }
}

impl Drop for SimulatedPlayback {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_state_is_stopped() {
        let position = PlaybackPosition::new();
        assert_eq!(position.state(), TransportState::Stopped);
        assert_eq!(position.samples_played(), 0);
    }

    #[test]
    fn test_state_display() {
        assert_eq!(TransportState::Playing.to_string(), "Playing");
        assert_eq!(TransportState::Finished.to_string(), "Finished");
    }

    #[test]
    fn test_position_clones_share_value() {
        let position = PlaybackPosition::new();
        let reader = position.clone();
        position.set(1234);
        position.set_state(TransportState::Playing);
        assert_eq!(reader.samples_played(), 1234);
        assert_eq!(reader.state(), TransportState::Playing);
        assert!((reader.seconds_played(1234) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_instant_playback_finishes_immediately() {
        let mut sink = InstantPlayback::new();
        let position = sink.position();
        sink.play(Arc::new(AudioBuffer::new(500, 44100))).unwrap();
        assert_eq!(position.samples_played(), 500);
        assert_eq!(position.state(), TransportState::Finished);
    }

    #[test]
    fn test_manual_playback_starts_at_zero() {
        let mut sink = ManualPlayback::new();
        let position = sink.position();
        position.set(99);
        sink.play(Arc::new(AudioBuffer::new(500, 44100))).unwrap();
        assert_eq!(position.samples_played(), 0);
        assert_eq!(position.state(), TransportState::Playing);
    }

    #[test]
    fn test_simulated_playback_reaches_end() {
        // 0.1s of audio at 10x plays in ~10ms
        let mut sink = SimulatedPlayback::new(10.0);
        let position = sink.position();
        sink.play(Arc::new(AudioBuffer::new(4410, 44100))).unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        while position.state() != TransportState::Finished && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(2));
        }
        assert_eq!(position.state(), TransportState::Finished);
        assert_eq!(position.samples_played(), 4410);
    }

    #[test]
    fn test_simulated_playback_stop_freezes_position() {
        let mut sink = SimulatedPlayback::new(1.0);
        let position = sink.position();
        sink.play(Arc::new(AudioBuffer::new(44100 * 60, 44100))).unwrap();
        thread::sleep(Duration::from_millis(20));
        sink.stop();
        let frozen = position.samples_played();
        thread::sleep(Duration::from_millis(20));
        assert_eq!(position.samples_played(), frozen);
        assert_eq!(position.state(), TransportState::Stopped);
        assert!(frozen < 44100 * 60);
    }
}
