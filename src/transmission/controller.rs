//! Dual-transmission controller
//!
//! One session encodes an image, runs the effect chain over a copy of the
//! audio and decodes both versions at once:
//!
//! ```text
//! Idle -> Encoding -> Corrupting -> Decoding(clean || corrupted) -> Complete
//!                                                                \-> Cancelled
//! ```
//!
//! The clean decode runs as fast as it can. The corrupted decode is paced
//! by the playback position, so its rows appear as their audio plays. Each
//! track has its own event channel, so events of one track stay in order.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use chrono::{DateTime, Utc};
use crossbeam::channel::{self, Receiver, RecvTimeoutError, Select, Sender};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::pacing::{GateResult, PacingGate, DEFAULT_POLL_INTERVAL};
use crate::dsp::{EffectChain, EffectContext};
use crate::engine::{AudioBuffer, PlaybackSink};
use crate::error::{Result, SstvError};
use crate::sstv::{
    DecodeStatus, DecodedImage, DecoderConfig, DecoderState, Encoder, EncoderConfig, ModeSpec,
    RgbImage, ScanlineEvent,
};

/// Samples handed to the decoder per step
pub const DEFAULT_CHUNK_SAMPLES: usize = 1024;

// ============================================================================
// Session state
// ============================================================================

/// Lifecycle of a transmission session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    Idle,
    Encoding,
    Corrupting,
    Decoding,
    Complete,
    Cancelled,
}

impl SessionState {
    /// Complete and Cancelled are final
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Complete | SessionState::Cancelled)
    }

    fn to_u8(self) -> u8 {
        match self {
            SessionState::Idle => 0,
            SessionState::Encoding => 1,
            SessionState::Corrupting => 2,
            SessionState::Decoding => 3,
            SessionState::Complete => 4,
            SessionState::Cancelled => 5,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            1 => SessionState::Encoding,
            2 => SessionState::Corrupting,
            3 => SessionState::Decoding,
            4 => SessionState::Complete,
            5 => SessionState::Cancelled,
            _ => SessionState::Idle,
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Idle => write!(f, "Idle"),
            SessionState::Encoding => write!(f, "Encoding"),
            SessionState::Corrupting => write!(f, "Corrupting"),
            SessionState::Decoding => write!(f, "Decoding"),
            SessionState::Complete => write!(f, "Complete"),
            SessionState::Cancelled => write!(f, "Cancelled"),
        }
    }
}

/// Session state shared between the handle, the controller and the workers
#[derive(Debug, Clone, Default)]
struct SharedState(Arc<AtomicU8>);

impl SharedState {
    fn get(&self) -> SessionState {
        SessionState::from_u8(self.0.load(Ordering::Acquire))
    }

    fn set(&self, state: SessionState) {
        self.0.store(state.to_u8(), Ordering::Release);
    }

    /// Move to `to` unless the session already ended
    fn finish_as(&self, to: SessionState) -> bool {
        self.0
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |v| {
                (!SessionState::from_u8(v).is_terminal()).then(|| to.to_u8())
            })
            .is_ok()
    }
}

/// Cancellation side of a session, kept by the controller
#[derive(Debug, Clone)]
struct SessionControl {
    id: Uuid,
    cancel: Arc<AtomicBool>,
    state: SharedState,
}

impl SessionControl {
    fn cancel(&self) -> bool {
        self.cancel.store(true, Ordering::Release);
        let changed = self.state.finish_as(SessionState::Cancelled);
        if changed {
            info!("Transmission {} cancelled", self.id);
        }
        changed
    }
}

// ============================================================================
// Events
// ============================================================================

/// Which decode produced an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Track {
    /// Decode of the unmodified audio
    Clean,
    /// Decode of the audio after the effect chain, paced to playback
    Corrupted,
}

impl fmt::Display for Track {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Track::Clean => write!(f, "clean"),
            Track::Corrupted => write!(f, "corrupted"),
        }
    }
}

/// Message from a decode worker
#[derive(Debug, Clone, PartialEq)]
pub enum TransmissionEvent {
    Scanline(ScanlineEvent),
    /// The track decoded all the audio it was given
    Finished(DecodeStatus),
    /// The worker observed cancellation and stopped
    Cancelled,
}

impl TransmissionEvent {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TransmissionEvent::Scanline(_))
    }
}

/// Identity of a session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionInfo {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    pub mode: String,
}

// ============================================================================
// Request
// ============================================================================

/// Everything a transmission needs
#[derive(Debug, Clone)]
pub struct TransmissionRequest {
    pub image: RgbImage,
    pub mode: &'static ModeSpec,
    pub chain: EffectChain,
    pub encoder: EncoderConfig,
    pub decoder: DecoderConfig,
}

impl TransmissionRequest {
    /// Request with an empty chain and default encoder/decoder settings
    pub fn new(image: RgbImage, mode: &'static ModeSpec) -> Self {
        Self {
            image,
            mode,
            chain: EffectChain::new(),
            encoder: EncoderConfig::default(),
            decoder: DecoderConfig::default(),
        }
    }

    pub fn with_chain(mut self, chain: EffectChain) -> Self {
        self.chain = chain;
        self
    }

    pub fn with_encoder(mut self, encoder: EncoderConfig) -> Self {
        self.encoder = encoder;
        self
    }

    pub fn with_decoder(mut self, decoder: DecoderConfig) -> Self {
        self.decoder = decoder;
        self
    }

    /// Decoder settings matching what the encoder transmits
    fn decoder_config(&self) -> DecoderConfig {
        DecoderConfig {
            sample_rate: self.encoder.sample_rate,
            vis_header: self.encoder.vis_header,
            ..self.decoder
        }
    }
}

// ============================================================================
// Controller
// ============================================================================

/// Starts transmission sessions; at most one is active at a time
#[derive(Debug)]
pub struct TransmissionController {
    active: Option<SessionControl>,
    chunk_samples: usize,
    poll_interval: Duration,
}

impl Default for TransmissionController {
    fn default() -> Self {
        Self::new()
    }
}

impl TransmissionController {
    pub fn new() -> Self {
        Self {
            active: None,
            chunk_samples: DEFAULT_CHUNK_SAMPLES,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Builder: samples handed to the decoder per step
    pub fn with_chunk_samples(mut self, chunk_samples: usize) -> Self {
        self.chunk_samples = chunk_samples.max(1);
        self
    }

    /// Builder: sleep of the pacing gate between position checks
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Id of the most recently started session
    pub fn active_session(&self) -> Option<Uuid> {
        self.active.as_ref().map(|s| s.id)
    }

    /// Cancel the active session, if it is still running
    pub fn cancel_active(&mut self) -> bool {
        self.active
            .take()
            .map(|session| session.cancel())
            .unwrap_or(false)
    }

    /// Encode, corrupt and start decoding `request`
    ///
    /// Any previous session is cancelled first. The corrupted audio is handed
    /// to `sink`, whose playback position paces the corrupted decode.
    ///
    /// # Errors
    /// * `InvalidImageDimensions` - If the image does not match the mode
    /// * `Io` - If a worker thread cannot be spawned
    pub fn start(
        &mut self,
        request: TransmissionRequest,
        sink: &mut dyn PlaybackSink,
    ) -> Result<TransmissionHandle> {
        self.cancel_active();

        let info = SessionInfo {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
            mode: request.mode.name.to_string(),
        };
        let cancel = Arc::new(AtomicBool::new(false));
        let state = SharedState::default();
        info!("Transmission {} started in {}", info.id, info.mode);

        state.set(SessionState::Encoding);
        let encoder = Encoder::new(request.encoder);
        let clean = encoder.encode(&request.image, request.mode)?;

        state.set(SessionState::Corrupting);
        let ctx = EffectContext::for_mode(request.mode, request.encoder.lead_in_ms());
        let mut corrupted = clean.clone();
        let report = request.chain.process(&mut corrupted, &ctx);
        if !report.clamped.is_empty() {
            warn!(
                "Transmission {}: {} effect parameters clamped",
                info.id,
                report.clamped.len()
            );
        }

        let clean = Arc::new(clean);
        let corrupted = Arc::new(corrupted);
        sink.play(Arc::clone(&corrupted))?;
        let position = sink.position();

        state.set(SessionState::Decoding);
        let decoder_config = request.decoder_config();
        let remaining = Arc::new(AtomicUsize::new(2));
        let (clean_tx, clean_rx) = channel::unbounded();
        let (corrupted_tx, corrupted_rx) = channel::unbounded();

        let base = Worker {
            track: Track::Clean,
            session: info.id,
            buffer: Arc::clone(&clean),
            decoder: DecoderState::new(request.mode, decoder_config),
            tx: clean_tx,
            cancel: Arc::clone(&cancel),
            gate: None,
            chunk_samples: self.chunk_samples,
            state: state.clone(),
            remaining: Arc::clone(&remaining),
        };
        let paced = Worker {
            track: Track::Corrupted,
            buffer: Arc::clone(&corrupted),
            decoder: DecoderState::new(request.mode, decoder_config),
            tx: corrupted_tx,
            gate: Some(
                PacingGate::new(position, Arc::clone(&cancel))
                    .with_poll_interval(self.poll_interval),
            ),
            ..base.clone()
        };

        let control = SessionControl {
            id: info.id,
            cancel: Arc::clone(&cancel),
            state: state.clone(),
        };
        let mut workers = Vec::with_capacity(2);
        for worker in [base, paced] {
            match worker.spawn() {
                Ok(handle) => workers.push(handle),
                Err(err) => {
                    control.cancel();
                    for handle in workers {
                        let _ = handle.join();
                    }
                    return Err(err);
                }
            }
        }
        self.active = Some(control.clone());

        Ok(TransmissionHandle {
            info,
            control,
            clean_rx,
            corrupted_rx,
            open: [true, true],
            workers,
            clean_audio: clean,
            corrupted_audio: corrupted,
            mode: request.mode,
        })
    }
}

// ============================================================================
// Worker
// ============================================================================

#[derive(Clone)]
struct Worker {
    track: Track,
    session: Uuid,
    buffer: Arc<AudioBuffer>,
    decoder: DecoderState,
    tx: Sender<TransmissionEvent>,
    cancel: Arc<AtomicBool>,
    /// Present on the paced track only
    gate: Option<PacingGate>,
    chunk_samples: usize,
    state: SharedState,
    remaining: Arc<AtomicUsize>,
}

impl Worker {
    fn spawn(self) -> Result<JoinHandle<()>> {
        let name = format!("sstv-{}", self.track);
        Ok(thread::Builder::new().name(name).spawn(move || self.run())?)
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Acquire)
    }

    fn run(mut self) {
        let total = self.buffer.len();
        let mut fed = 0;

        while fed < total {
            let end = (fed + self.chunk_samples).min(total);
            if let Some(gate) = &self.gate {
                if gate.wait_for(end as u64) == GateResult::Cancelled {
                    self.stop();
                    return;
                }
            }
            let events = self.decoder.feed(&self.buffer.samples[fed..end]);
            fed = end;
            if !self.emit(events) {
                return;
            }
        }

        let tail = self.decoder.finish();
        if !self.emit(tail) {
            return;
        }

        let status = self.decoder.status();
        debug!(
            "Transmission {} {} track finished: {}/{} rows",
            self.session, self.track, status.rows_decoded, status.expected_rows
        );
        // state settles before the terminal event is observable
        if self.remaining.fetch_sub(1, Ordering::AcqRel) == 1
            && self.state.finish_as(SessionState::Complete)
        {
            info!("Transmission {} complete", self.session);
        }
        let _ = self.tx.send(TransmissionEvent::Finished(status));
    }

    /// Send rows one by one; false once the worker must stop
    fn emit(&self, events: Vec<ScanlineEvent>) -> bool {
        for event in events {
            if self.is_cancelled() {
                self.stop();
                return false;
            }
            if self.tx.send(TransmissionEvent::Scanline(event)).is_err() {
                return false;
            }
        }
        if self.is_cancelled() {
            self.stop();
            return false;
        }
        true
    }

    fn stop(&self) {
        debug!("Transmission {} {} track stopped", self.session, self.track);
        let _ = self.tx.send(TransmissionEvent::Cancelled);
    }
}

// ============================================================================
// Handle
// ============================================================================

/// Final result of a session
#[derive(Debug)]
pub struct TransmissionOutcome {
    pub clean: DecodedImage,
    pub corrupted: DecodedImage,
    pub clean_status: Option<DecodeStatus>,
    pub corrupted_status: Option<DecodeStatus>,
    pub state: SessionState,
}

/// Consumer side of a running session
///
/// After cancellation no scanline events are delivered; receivers only
/// return the terminal `Cancelled` events still in flight.
#[derive(Debug)]
pub struct TransmissionHandle {
    info: SessionInfo,
    control: SessionControl,
    clean_rx: Receiver<TransmissionEvent>,
    corrupted_rx: Receiver<TransmissionEvent>,
    open: [bool; 2],
    workers: Vec<JoinHandle<()>>,
    clean_audio: Arc<AudioBuffer>,
    corrupted_audio: Arc<AudioBuffer>,
    mode: &'static ModeSpec,
}

fn slot(track: Track) -> usize {
    match track {
        Track::Clean => 0,
        Track::Corrupted => 1,
    }
}

impl TransmissionHandle {
    pub fn info(&self) -> &SessionInfo {
        &self.info
    }

    pub fn id(&self) -> Uuid {
        self.info.id
    }

    pub fn state(&self) -> SessionState {
        self.control.state.get()
    }

    pub fn is_cancelled(&self) -> bool {
        self.control.cancel.load(Ordering::Acquire)
    }

    pub fn mode(&self) -> &'static ModeSpec {
        self.mode
    }

    /// The encoded audio before corruption
    pub fn clean_audio(&self) -> &Arc<AudioBuffer> {
        &self.clean_audio
    }

    /// The audio handed to the playback sink
    pub fn corrupted_audio(&self) -> &Arc<AudioBuffer> {
        &self.corrupted_audio
    }

    fn receiver(&self, track: Track) -> &Receiver<TransmissionEvent> {
        match track {
            Track::Clean => &self.clean_rx,
            Track::Corrupted => &self.corrupted_rx,
        }
    }

    /// Drop scanlines that arrive after cancellation
    fn filter(&self, event: TransmissionEvent) -> Option<TransmissionEvent> {
        if self.is_cancelled() && !matches!(event, TransmissionEvent::Cancelled) {
            None
        } else {
            Some(event)
        }
    }

    /// Next event of `track` if one is waiting
    pub fn try_recv(&self, track: Track) -> Option<TransmissionEvent> {
        let rx = self.receiver(track);
        while let Ok(event) = rx.try_recv() {
            if let Some(event) = self.filter(event) {
                return Some(event);
            }
        }
        None
    }

    /// Block for the next event of `track`; `None` once the track ended
    pub fn recv(&self, track: Track) -> Option<TransmissionEvent> {
        let rx = self.receiver(track);
        while let Ok(event) = rx.recv() {
            if let Some(event) = self.filter(event) {
                return Some(event);
            }
        }
        None
    }

    /// Like [`recv`](Self::recv) with a timeout
    pub fn recv_timeout(&self, track: Track, timeout: Duration) -> Option<TransmissionEvent> {
        let rx = self.receiver(track);
        loop {
            match rx.recv_timeout(timeout) {
                Ok(event) => {
                    if let Some(event) = self.filter(event) {
                        return Some(event);
                    }
                }
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
                    return None
                }
            }
        }
    }

    /// Block for the next event of either track
    ///
    /// No order is promised between tracks. Returns `None` once both tracks
    /// have delivered their terminal event.
    pub fn next_event(&mut self) -> Option<(Track, TransmissionEvent)> {
        loop {
            let tracks: Vec<Track> = [Track::Clean, Track::Corrupted]
                .into_iter()
                .filter(|t| self.open[slot(*t)])
                .collect();
            if tracks.is_empty() {
                return None;
            }

            let (track, received) = {
                let mut select = Select::new();
                for track in &tracks {
                    select.recv(self.receiver(*track));
                }
                let operation = select.select();
                let track = tracks[operation.index()];
                (track, operation.recv(self.receiver(track)))
            };
            match received {
                Ok(event) => {
                    if event.is_terminal() {
                        self.open[slot(track)] = false;
                    }
                    if let Some(event) = self.filter(event) {
                        return Some((track, event));
                    }
                }
                Err(_) => self.open[slot(track)] = false,
            }
        }
    }

    /// Cancel the session and wait for both workers to stop
    ///
    /// Events still queued are discarded.
    pub fn cancel(&mut self) {
        self.control.cancel();
        self.join_workers();
        self.clean_rx.try_iter().for_each(drop);
        self.corrupted_rx.try_iter().for_each(drop);
        self.open = [false, false];
    }

    fn join_workers(&mut self) {
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                warn!("Transmission {} worker panicked", self.info.id);
            }
        }
    }

    /// Collect every remaining event into the two images
    pub fn wait(&mut self) -> TransmissionOutcome {
        let mut clean = DecodedImage::new(self.mode.width, self.mode.height);
        let mut corrupted = DecodedImage::new(self.mode.width, self.mode.height);
        let mut clean_status = None;
        let mut corrupted_status = None;

        while let Some((track, event)) = self.next_event() {
            match (track, event) {
                (Track::Clean, TransmissionEvent::Scanline(row)) => {
                    clean.apply(&row);
                }
                (Track::Corrupted, TransmissionEvent::Scanline(row)) => {
                    corrupted.apply(&row);
                }
                (Track::Clean, TransmissionEvent::Finished(status)) => clean_status = Some(status),
                (Track::Corrupted, TransmissionEvent::Finished(status)) => {
                    corrupted_status = Some(status)
                }
                (_, TransmissionEvent::Cancelled) => {}
            }
        }
        self.join_workers();

        TransmissionOutcome {
            clean,
            corrupted,
            clean_status,
            corrupted_status,
            state: self.state(),
        }
    }

    /// Error describing this session's cancellation
    pub fn cancelled_error(&self) -> SstvError {
        SstvError::SessionCancelled {
            session_id: self.info.id.to_string(),
        }
    }
}

impl Drop for TransmissionHandle {
    fn drop(&mut self) {
        if !self.workers.is_empty() {
            self.cancel();
        }
    }
}
