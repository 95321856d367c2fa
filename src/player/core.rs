//! Player core: one owned state object that all message handlers act on
//!
//! The core performs no I/O. Inbound frames are fed to
//! [`handle_wire`](PlayerCore::handle_wire), timers are driven through
//! [`next_deadline`](PlayerCore::next_deadline) and [`poll`](PlayerCore::poll),
//! and outbound messages are collected with
//! [`take_outbound`](PlayerCore::take_outbound). Every handler runs to
//! completion, so invariants hold between calls.

use std::collections::VecDeque;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::audio::{
    AudioSegment, DriftMonitor, InsertOutcome, JitterBuffer, JitterBufferStats, PlaybackId,
    PlaybackSink, StreamFormat,
};
use crate::clock::{ClockSync, LocalClock, TimeSyncInfo};
use crate::config::{ms_to_us, PlayerConfig};
use crate::error::{Error, Result};
use crate::protocol::{
    decode_inbound, AudioChunk, ClientHello, ClientMessage, Inbound, ServerMessage, WireMessage,
};
use crate::session::{Session, SessionState};
use crate::timer::earliest;

/// Resynchronization counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncInfo {
    pub resync_count: u64,
    pub drift_events: u64,
    pub samples: u64,
    pub timeouts: u64,
}

/// Aggregate player counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlayerStats {
    pub buffer: JitterBufferStats,
    /// Malformed frames and messages discarded
    pub protocol_errors: u64,
    /// Time replies that could not be used
    pub sync_errors: u64,
    /// Audio received with no active stream
    pub unformatted_chunks: u64,
}

/// Sans-IO Sendspin player
pub struct PlayerCore<S: PlaybackSink> {
    config: PlayerConfig,
    clock: Box<dyn LocalClock>,
    sync: ClockSync,
    buffer: JitterBuffer,
    drift: DriftMonitor,
    session: Session,
    sink: S,
    outbox: VecDeque<ClientMessage>,
    protocol_errors: u64,
    sync_errors: u64,
    unformatted_chunks: u64,
}

impl<S: PlaybackSink> PlayerCore<S> {
    pub fn new(config: PlayerConfig, clock: Box<dyn LocalClock>, sink: S) -> Self {
        Self {
            sync: ClockSync::new(config.clock.clone()),
            buffer: JitterBuffer::new(&config.buffer),
            drift: DriftMonitor::new(config.buffer.drift_threshold_us()),
            session: Session::new(&config.playback),
            config,
            clock,
            sink,
            outbox: VecDeque::new(),
            protocol_errors: 0,
            sync_errors: 0,
            unformatted_chunks: 0,
        }
    }

    pub fn now_us(&self) -> i64 {
        self.clock.now_us()
    }

    /// Timer instant matching a local deadline
    pub fn instant_at(&self, at_us: i64) -> Instant {
        self.clock.instant_at(at_us)
    }

    /// Transport is up: announce ourselves
    pub fn connect(&mut self) {
        if !self.session.connect() {
            return;
        }
        let client = &self.config.client;
        let hello = ClientHello::new(client.client_id.clone(), client.name.clone())
            .with_identity(client.identity.clone());
        info!("Connected, sending hello as {} ({})", client.name, client.client_id);
        self.outbox.push_back(ClientMessage::Hello(hello));
        self.sink.set_gain(self.session.volume(), self.session.muted());
    }

    /// Transport is gone: cancel timers and unstarted playback
    pub fn disconnect(&mut self) {
        if !self.session.is_connected() {
            return;
        }
        let now = self.now_us();
        self.sync.stop();
        self.buffer.reset(now, &mut self.drift, &mut self.sink);
        self.session.disconnect();
        self.outbox.clear();
        info!("Disconnected");
    }

    /// Process one inbound transport frame. Failures are logged and counted.
    pub fn handle_wire(&mut self, message: WireMessage) {
        if !self.session.is_connected() {
            debug!("Ignoring frame while disconnected");
            return;
        }

        let result = decode_inbound(message)
            .map_err(Error::from)
            .and_then(|inbound| self.dispatch(inbound));

        match result {
            Ok(()) => {}
            Err(Error::Protocol(e)) => {
                self.protocol_errors += 1;
                warn!("Discarding frame: {}", e);
            }
            Err(Error::Sync(e)) => {
                self.sync_errors += 1;
                debug!("Time reply unused: {}", e);
            }
            Err(e) => warn!("Frame handling failed: {}", e),
        }
    }

    fn dispatch(&mut self, inbound: Inbound) -> Result<()> {
        match inbound {
            Inbound::Control(message) => self.handle_control(message),
            Inbound::Audio(chunk) => self.handle_audio(chunk),
        }
    }

    fn handle_control(&mut self, message: ServerMessage) -> Result<()> {
        let now = self.now_us();
        debug!("<- {}", message.kind());

        match message {
            ServerMessage::Hello(hello) => {
                if self.session.complete_handshake() {
                    if let Some(name) = hello.name {
                        info!("Server: {}", name);
                    }
                    if let Some(request) = self.sync.start(now) {
                        self.outbox.push_back(ClientMessage::Time(request));
                    }
                }
            }
            ServerMessage::Time(reply) => {
                self.sync.complete_exchange(&reply, now)?;
                if self.session.mark_synced() {
                    self.push_state_report();
                }
                if self.buffer.pending_len() > 0 && self.buffer.next_deadline().is_none() {
                    // Segments held while unsynced get their pass now
                    self.flush(now);
                }
            }
            ServerMessage::Command(command) => {
                if let Some(command) = command.player {
                    self.session.apply_command(command);
                    self.sink.set_gain(self.session.volume(), self.session.muted());
                    self.push_state_report();
                }
            }
            ServerMessage::StreamStart(start) => {
                if let Some(format) = start.player {
                    if self.session.format().is_some() {
                        // Format change mid-stream: old audio no longer applies
                        self.buffer.reset(now, &mut self.drift, &mut self.sink);
                    }
                    self.session.start_stream(format);
                }
            }
            ServerMessage::StreamEnd(roles) => {
                if roles.includes_player() {
                    self.buffer.reset(now, &mut self.drift, &mut self.sink);
                    self.session.end_stream();
                    self.push_state_report();
                }
            }
            ServerMessage::StreamClear(roles) => {
                if roles.includes_player() {
                    self.buffer.clear(now, &mut self.drift, &mut self.sink);
                }
            }
        }
        Ok(())
    }

    fn handle_audio(&mut self, chunk: AudioChunk) -> Result<()> {
        if self.session.format().is_none() {
            self.unformatted_chunks += 1;
            debug!("Dropping chunk {}us: no active stream", chunk.server_time_us);
            return Ok(());
        }

        let now = self.now_us();
        let outcome = self
            .buffer
            .insert(AudioSegment::from(chunk), now, &self.sync)?;
        if let InsertOutcome::DroppedLate { lateness_us } = outcome {
            debug!("Stale segment dropped ({}us late)", lateness_us);
        }
        Ok(())
    }

    /// Earliest time [`poll`](Self::poll) has work to do
    pub fn next_deadline(&self) -> Option<i64> {
        if !self.session.is_connected() {
            return None;
        }
        earliest(self.buffer.next_deadline(), self.sync.next_deadline())
    }

    /// Run whatever timers are due
    pub fn poll(&mut self) {
        if !self.session.is_connected() {
            return;
        }
        let now = self.now_us();
        if self.buffer.is_flush_due(now) {
            self.flush(now);
        }
        self.poll_sync(now);
    }

    fn flush(&mut self, now: i64) {
        let report = self.buffer.flush(
            now,
            &mut self.sync,
            &mut self.drift,
            self.session.format(),
            &mut self.sink,
        );
        if report.scheduled > 0 || report.dropped_late > 0 {
            debug!(
                "Scheduling pass: {} scheduled, {} late, {} failed",
                report.scheduled, report.dropped_late, report.failed
            );
        }
        if report.drift_events > 0 {
            // Resync exchange goes out right away
            self.poll_sync(now);
        }
    }

    fn poll_sync(&mut self, now: i64) {
        if !self.session.handshake_complete() {
            return;
        }
        if let Some(request) = self.sync.poll(now) {
            self.outbox.push_back(ClientMessage::Time(request));
        }
    }

    fn push_state_report(&mut self) {
        if !self.session.is_connected() {
            return;
        }
        let report = self.session.report(self.sync.is_synced());
        self.outbox.push_back(ClientMessage::State(report));
    }

    /// Set output volume (0-100); reported to the server
    pub fn set_volume(&mut self, volume: u8) {
        if self.session.set_volume(volume) {
            self.sink.set_gain(self.session.volume(), self.session.muted());
            self.push_state_report();
        }
    }

    /// Set mute; reported to the server
    pub fn set_muted(&mut self, muted: bool) {
        if self.session.set_muted(muted) {
            self.sink.set_gain(self.session.volume(), self.session.muted());
            self.push_state_report();
        }
    }

    /// Change the jitter buffer delay for future segments
    pub fn set_sync_delay(&mut self, delay_ms: u64) {
        self.buffer
            .set_sync_delay(ms_to_us(delay_ms), &mut self.drift);
    }

    /// Sink completion callback
    pub fn on_playback_finished(&mut self, id: PlaybackId) {
        self.buffer.on_playback_finished(id);
    }

    /// Drain queued outbound messages
    pub fn take_outbound(&mut self) -> Vec<ClientMessage> {
        self.outbox.drain(..).collect()
    }

    pub fn has_outbound(&self) -> bool {
        !self.outbox.is_empty()
    }

    pub fn is_connected(&self) -> bool {
        self.session.is_connected()
    }

    pub fn is_playing(&self) -> bool {
        self.session.is_playing()
    }

    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    pub fn current_format(&self) -> Option<StreamFormat> {
        self.session.format().cloned()
    }

    pub fn volume(&self) -> u8 {
        self.session.volume()
    }

    pub fn muted(&self) -> bool {
        self.session.muted()
    }

    pub fn time_sync_info(&self) -> TimeSyncInfo {
        self.sync.info()
    }

    pub fn sync_info(&self) -> SyncInfo {
        SyncInfo {
            resync_count: self.sync.resync_count(),
            drift_events: self.drift.events(),
            samples: self.sync.samples(),
            timeouts: self.sync.timeouts(),
        }
    }

    pub fn stats(&self) -> PlayerStats {
        PlayerStats {
            buffer: self.buffer.stats(),
            protocol_errors: self.protocol_errors,
            sync_errors: self.sync_errors,
            unformatted_chunks: self.unformatted_chunks,
        }
    }

    /// Convert a sender timestamp with the current estimate
    pub fn sender_to_local(&self, sender_us: i64) -> i64 {
        self.sync.sender_to_local(sender_us)
    }

    pub fn sync_delay_us(&self) -> i64 {
        self.buffer.sync_delay_us()
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }
}
