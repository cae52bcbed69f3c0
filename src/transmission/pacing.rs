//! Playback pacing gate
//!
//! The corrupted decode may only consume audio the playback sink has already
//! played. The gate blocks in short sleeps until the shared position reaches
//! a target sample, checking the session's cancellation flag on every wait.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::engine::PlaybackPosition;

/// Default sleep between position checks
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Result of waiting on the gate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateResult {
    /// Playback reached the target; carries the samples played
    Ready(u64),
    /// The session was cancelled while waiting
    Cancelled,
}

/// Blocks a worker until playback catches up
#[derive(Debug, Clone)]
pub struct PacingGate {
    position: PlaybackPosition,
    cancel: Arc<AtomicBool>,
    poll_interval: Duration,
}

impl PacingGate {
    pub fn new(position: PlaybackPosition, cancel: Arc<AtomicBool>) -> Self {
        Self {
            position,
            cancel,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Builder: sleep between position checks
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Samples the sink reports as played
    pub fn available(&self) -> u64 {
        self.position.samples_played()
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Acquire)
    }

    /// Wait until at least `target` samples have played
    pub fn wait_for(&self, target: u64) -> GateResult {
        loop {
            if self.is_cancelled() {
                return GateResult::Cancelled;
            }
            let played = self.available();
            if played >= target {
                return GateResult::Ready(played);
            }
            thread::sleep(self.poll_interval);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn test_ready_when_already_played() {
        let position = PlaybackPosition::new();
        position.set(1000);
        let gate = PacingGate::new(position, Arc::new(AtomicBool::new(false)));
        assert_eq!(gate.wait_for(800), GateResult::Ready(1000));
    }

    #[test]
    fn test_waits_for_position() {
        let position = PlaybackPosition::new();
        let gate = PacingGate::new(position.clone(), Arc::new(AtomicBool::new(false)))
            .with_poll_interval(Duration::from_millis(1));

        let writer = thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            position.set(500);
        });
        let started = Instant::now();
        assert_eq!(gate.wait_for(500), GateResult::Ready(500));
        assert!(started.elapsed() >= Duration::from_millis(25));
        writer.join().unwrap();
    }

    #[test]
    fn test_cancel_releases_waiter() {
        let cancel = Arc::new(AtomicBool::new(false));
        let gate = PacingGate::new(PlaybackPosition::new(), Arc::clone(&cancel))
            .with_poll_interval(Duration::from_millis(1));

        let waiter = thread::spawn(move || gate.wait_for(u64::MAX));
        thread::sleep(Duration::from_millis(10));
        cancel.store(true, Ordering::Release);
        assert_eq!(waiter.join().unwrap(), GateResult::Cancelled);
    }
}
