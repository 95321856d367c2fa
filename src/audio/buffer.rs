//! Timestamp-ordered jitter buffer and playback scheduler
//!
//! Segments arrive out of order, late, or twice. They are held in a map keyed
//! by sender timestamp and committed to the sink in ascending order by a
//! debounced scheduling pass. Each committed segment gets an absolute local
//! start time that never overlaps the one before it.

use bytes::Bytes;
use std::collections::{BTreeMap, VecDeque};
use tracing::{debug, warn};

use crate::audio::drift::{DriftCheck, DriftMonitor};
use crate::audio::format::StreamFormat;
use crate::audio::sink::PlaybackSink;
use crate::clock::ClockSync;
use crate::config::BufferConfig;
use crate::error::ProtocolError;
use crate::protocol::AudioChunk;
use crate::timer::Deadline;

/// Audio segment awaiting scheduling
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioSegment {
    /// Sender-clock timestamp in microseconds
    pub server_time_us: i64,
    pub payload: Bytes,
}

impl AudioSegment {
    pub fn new(server_time_us: i64, payload: impl Into<Bytes>) -> Self {
        Self {
            server_time_us,
            payload: payload.into(),
        }
    }
}

impl From<AudioChunk> for AudioSegment {
    fn from(chunk: AudioChunk) -> Self {
        Self {
            server_time_us: chunk.server_time_us,
            payload: chunk.payload,
        }
    }
}

/// Identifier handed to the sink for cancellation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlaybackId(pub u64);

/// A segment committed to the sink
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledPlayback {
    pub id: PlaybackId,
    pub segment: AudioSegment,
    /// Absolute local start time in microseconds
    pub local_start_us: i64,
    pub duration_us: i64,
}

impl ScheduledPlayback {
    pub fn local_end_us(&self) -> i64 {
        self.local_start_us.saturating_add(self.duration_us)
    }

    pub fn has_started(&self, now_us: i64) -> bool {
        self.local_start_us <= now_us
    }
}

/// What happened to an inserted segment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// Held for the next scheduling pass
    Queued,
    /// Its play window already passed
    DroppedLate { lateness_us: i64 },
    /// Same timestamp already pending or scheduled
    Duplicate,
}

/// Result of one scheduling pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushReport {
    pub scheduled: usize,
    pub dropped_late: usize,
    /// Decode or sink failures
    pub failed: usize,
    /// Discarded because no stream format is set
    pub discarded: usize,
    pub drift_events: usize,
    /// Still pending because the clock is not synced yet
    pub held: usize,
}

/// Jitter buffer
pub struct JitterBuffer {
    /// Delay applied to converted start times
    sync_delay_us: i64,
    /// Delay to switch to at the next break in contiguous playback
    requested_delay_us: i64,
    debounce_us: i64,
    pending: BTreeMap<i64, AudioSegment>,
    /// Committed entries that have not finished, in start order
    scheduled: VecDeque<ScheduledPlayback>,
    last_scheduled_server_us: Option<i64>,
    /// Earliest start allowed for new segments
    floor_us: i64,
    debounce: Deadline,
    next_id: u64,
    stats: JitterBufferStats,
}

impl JitterBuffer {
    pub fn new(config: &BufferConfig) -> Self {
        Self {
            sync_delay_us: config.sync_delay_us(),
            requested_delay_us: config.sync_delay_us(),
            debounce_us: config.debounce_us(),
            pending: BTreeMap::new(),
            scheduled: VecDeque::new(),
            last_scheduled_server_us: None,
            floor_us: i64::MIN,
            debounce: Deadline::idle(),
            next_id: 0,
            stats: JitterBufferStats::default(),
        }
    }

    /// Delay currently applied to start times
    pub fn sync_delay_us(&self) -> i64 {
        self.sync_delay_us
    }

    /// Change the sync delay.
    ///
    /// Already scheduled entries keep their times. A longer delay applies to
    /// the next segment, leaving a silent gap. A shorter one would overlap
    /// audio already queued, so it waits until contiguous playback breaks
    /// (clear, stream end, or underrun).
    pub fn set_sync_delay(&mut self, delay_us: i64, drift: &mut DriftMonitor) {
        self.requested_delay_us = delay_us;
        if delay_us >= self.sync_delay_us || self.scheduled.is_empty() {
            if let Some(end) = drift.previous_end_us() {
                self.floor_us = self.floor_us.max(end);
            }
            drift.reset();
            self.sync_delay_us = delay_us;
        }
        debug!(
            "Sync delay set to {}us (effective {}us)",
            delay_us, self.sync_delay_us
        );
    }

    /// Insert an arriving segment
    pub fn insert(
        &mut self,
        segment: AudioSegment,
        now_us: i64,
        sync: &ClockSync,
    ) -> Result<InsertOutcome, ProtocolError> {
        let ts = segment.server_time_us;
        if segment.payload.is_empty() {
            return Err(ProtocolError::EmptyPayload(ts));
        }
        self.stats.received += 1;

        if let Some(last) = self.last_scheduled_server_us {
            if ts == last {
                self.stats.duplicates += 1;
                return Ok(InsertOutcome::Duplicate);
            }
            if ts < last {
                // Its successor is already committed; playing it now would reorder
                self.stats.late += 1;
                debug!("Dropping segment {}us: arrived after {}us was scheduled", ts, last);
                return Ok(InsertOutcome::DroppedLate { lateness_us: 0 });
            }
        }

        if self.pending.contains_key(&ts) {
            self.stats.duplicates += 1;
            return Ok(InsertOutcome::Duplicate);
        }

        if sync.is_synced() {
            let candidate = self.candidate_start(ts, sync);
            if candidate <= now_us {
                let lateness_us = now_us.saturating_sub(candidate);
                self.stats.late += 1;
                debug!("Dropping late segment {}us ({}us past its start)", ts, lateness_us);
                return Ok(InsertOutcome::DroppedLate { lateness_us });
            }
        }

        self.pending.insert(ts, segment);
        self.debounce.arm_if_idle(now_us.saturating_add(self.debounce_us));
        Ok(InsertOutcome::Queued)
    }

    /// When the pending scheduling pass is due
    pub fn next_deadline(&self) -> Option<i64> {
        self.debounce.at()
    }

    pub fn is_flush_due(&self, now_us: i64) -> bool {
        self.debounce.is_due(now_us)
    }

    /// Commit pending segments to the sink in timestamp order
    pub fn flush(
        &mut self,
        now_us: i64,
        sync: &mut ClockSync,
        drift: &mut DriftMonitor,
        format: Option<&StreamFormat>,
        sink: &mut dyn PlaybackSink,
    ) -> FlushReport {
        let mut report = FlushReport::default();
        self.debounce.disarm();
        self.prune_finished(now_us);

        let format = match format {
            Some(format) => format,
            None => {
                report.discarded = self.pending.len();
                if report.discarded > 0 {
                    debug!("Discarding {} segments: no stream format", report.discarded);
                }
                self.pending.clear();
                return report;
            }
        };

        if !sync.is_synced() {
            report.held = self.pending.len();
            return report;
        }

        while let Some((ts, segment)) = self.pending.pop_first() {
            let mut candidate = self.candidate_start(ts, sync);
            if candidate <= now_us {
                self.stats.late += 1;
                report.dropped_late += 1;
                debug!("Dropping late segment {}us at scheduling", ts);
                continue;
            }

            let duration_us = match sink.decode(format, &segment.payload) {
                Ok(duration) => duration,
                Err(e) => {
                    warn!("Cannot decode segment {}us: {}", ts, e);
                    self.stats.failed += 1;
                    report.failed += 1;
                    continue;
                }
            };

            let start = match drift.check(ts, now_us) {
                DriftCheck::Unanchored => {
                    if self.requested_delay_us != self.sync_delay_us {
                        self.sync_delay_us = self.requested_delay_us;
                        candidate = self.candidate_start(ts, sync);
                    }
                    candidate
                }
                DriftCheck::Contiguous { slot_us, .. } => slot_us,
                DriftCheck::Drift { slot_us, .. } => {
                    sync.request_resync(now_us);
                    report.drift_events += 1;
                    candidate.max(slot_us)
                }
            }
            .max(self.floor_us);

            if start <= now_us {
                // Only reachable if the delay was lowered below the debounce lag
                self.stats.late += 1;
                report.dropped_late += 1;
                continue;
            }

            let playback = ScheduledPlayback {
                id: PlaybackId(self.next_id),
                segment,
                local_start_us: start,
                duration_us,
            };
            self.next_id += 1;

            match sink.schedule(&playback) {
                Ok(()) => {
                    drift.record(&playback);
                    self.last_scheduled_server_us = Some(ts);
                    self.scheduled.push_back(playback);
                    self.stats.scheduled += 1;
                    report.scheduled += 1;
                }
                Err(e) => {
                    warn!("Sink rejected segment {}us: {}", ts, e);
                    self.stats.failed += 1;
                    report.failed += 1;
                }
            }
        }

        report
    }

    /// Flush for `stream/clear`: cancel what has not started, keep what is
    /// audible, and accept new segments immediately
    pub fn clear(&mut self, now_us: i64, drift: &mut DriftMonitor, sink: &mut dyn PlaybackSink) {
        self.pending.clear();
        self.debounce.disarm();
        self.prune_finished(now_us);

        let mut cancelled = 0;
        self.scheduled.retain(|playback| {
            if playback.has_started(now_us) {
                true
            } else {
                sink.cancel(playback.id);
                cancelled += 1;
                false
            }
        });
        self.stats.cancelled += cancelled;

        self.floor_us = self
            .scheduled
            .iter()
            .map(ScheduledPlayback::local_end_us)
            .max()
            .unwrap_or(i64::MIN);
        self.last_scheduled_server_us = None;
        self.sync_delay_us = self.requested_delay_us;
        drift.reset();

        debug!(
            "Buffer cleared: {} cancelled, {} still playing",
            cancelled,
            self.scheduled.len()
        );
    }

    /// Clear and forget still-playing entries, for stream end and disconnect
    pub fn reset(&mut self, now_us: i64, drift: &mut DriftMonitor, sink: &mut dyn PlaybackSink) {
        self.clear(now_us, drift, sink);
        self.scheduled.clear();
        self.floor_us = i64::MIN;
    }

    /// Sink completion callback
    pub fn on_playback_finished(&mut self, id: PlaybackId) {
        self.scheduled.retain(|playback| playback.id != id);
    }

    /// Committed entries that have not finished
    pub fn scheduled(&self) -> impl Iterator<Item = &ScheduledPlayback> {
        self.scheduled.iter()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn stats(&self) -> JitterBufferStats {
        JitterBufferStats {
            pending: self.pending.len(),
            in_flight: self.scheduled.len(),
            ..self.stats
        }
    }

    fn candidate_start(&self, server_time_us: i64, sync: &ClockSync) -> i64 {
        sync.sender_to_local(server_time_us)
            .saturating_add(self.sync_delay_us)
    }

    fn prune_finished(&mut self, now_us: i64) {
        while let Some(front) = self.scheduled.front() {
            if front.local_end_us() > now_us {
                break;
            }
            self.scheduled.pop_front();
        }
    }
}

/// Jitter buffer statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JitterBufferStats {
    pub received: u64,
    pub scheduled: u64,
    pub late: u64,
    pub duplicates: u64,
    pub failed: u64,
    pub cancelled: u64,
    pub pending: usize,
    pub in_flight: usize,
}

impl JitterBufferStats {
    pub fn late_rate(&self) -> f32 {
        if self.received == 0 {
            0.0
        } else {
            self.late as f32 / self.received as f32
        }
    }
}
