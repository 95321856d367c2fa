//! Round-trip clock offset estimation
//!
//! One `client/time` exchange is in flight at a time. Completed exchanges
//! yield a [`ClockSample`]; the first sample sets the offset, later ones are
//! blended in, and a drift-triggered resync makes the next sample replace the
//! estimate outright. Once synced the estimate is only ever refined.

use tracing::{debug, info};

use crate::clock::sample::ClockSample;
use crate::config::ClockConfig;
use crate::error::SyncError;
use crate::protocol::{ClientTime, ServerTime};
use crate::timer::{earliest, Deadline};

/// Estimated relation between local and sender clocks
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SyncState {
    /// Sender clock minus local clock
    pub offset_us: f64,
    pub synced: bool,
    pub resync_count: u64,
    /// Local time the last sample was absorbed
    pub last_sample_time: Option<i64>,
}

/// Read-only view exposed to callers
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TimeSyncInfo {
    pub offset_us: f64,
    pub synced: bool,
    pub round_trip_us: i64,
}

/// Outcome of absorbing a sample
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyncUpdate {
    /// This sample made the clock synced
    pub first: bool,
    /// The sample replaced the estimate because of a resync request
    pub authoritative: bool,
    pub offset_us: f64,
    pub round_trip_us: i64,
}

#[derive(Debug, Clone, Copy)]
struct PendingExchange {
    client_transmitted: i64,
}

/// Clock synchronizer
#[derive(Debug)]
pub struct ClockSync {
    config: ClockConfig,
    state: SyncState,
    round_trip_us: i64,
    samples: u64,
    timeouts: u64,
    pending: Option<PendingExchange>,
    hard_resync: bool,
    next_exchange: Deadline,
}

impl ClockSync {
    pub fn new(config: ClockConfig) -> Self {
        Self {
            config,
            state: SyncState::default(),
            round_trip_us: 0,
            samples: 0,
            timeouts: 0,
            pending: None,
            hard_resync: false,
            next_exchange: Deadline::idle(),
        }
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    pub fn info(&self) -> TimeSyncInfo {
        TimeSyncInfo {
            offset_us: self.state.offset_us,
            synced: self.state.synced,
            round_trip_us: self.round_trip_us,
        }
    }

    pub fn is_synced(&self) -> bool {
        self.state.synced
    }

    pub fn resync_count(&self) -> u64 {
        self.state.resync_count
    }

    /// Samples absorbed so far
    pub fn samples(&self) -> u64 {
        self.samples
    }

    /// Exchanges abandoned without a reply
    pub fn timeouts(&self) -> u64 {
        self.timeouts
    }

    pub fn has_pending_exchange(&self) -> bool {
        self.pending.is_some()
    }

    /// Convert a sender timestamp to local time. Saturates at the ends of
    /// the timeline.
    pub fn sender_to_local(&self, sender_us: i64) -> i64 {
        sender_us.saturating_sub(self.offset_whole_us())
    }

    /// Convert a local timestamp to sender time
    pub fn local_to_sender(&self, local_us: i64) -> i64 {
        local_us.saturating_add(self.offset_whole_us())
    }

    fn offset_whole_us(&self) -> i64 {
        // Float to int casts saturate
        self.state.offset_us.round() as i64
    }

    /// Start the exchange cycle, returning the first request
    pub fn start(&mut self, now: i64) -> Option<ClientTime> {
        self.next_exchange.arm(now);
        self.poll(now)
    }

    /// Stop exchanging and forget the in-flight request. The estimate is kept.
    pub fn stop(&mut self) {
        self.pending = None;
        self.next_exchange.disarm();
    }

    /// Next time [`poll`](Self::poll) has work to do
    pub fn next_deadline(&self) -> Option<i64> {
        let timeout = self
            .pending
            .map(|p| p.client_transmitted.saturating_add(self.config.reply_timeout_us()));
        earliest(self.next_exchange.at(), timeout)
    }

    /// Drive timers: abandon an expired exchange and start a due one
    pub fn poll(&mut self, now: i64) -> Option<ClientTime> {
        if let Some(pending) = self.pending {
            let waited_us = now.saturating_sub(pending.client_transmitted);
            if waited_us < self.config.reply_timeout_us() {
                return None;
            }
            let err = SyncError::Timeout {
                client_transmitted: pending.client_transmitted,
                waited_us,
            };
            debug!("{}, retrying", err);
            self.timeouts += 1;
            self.pending = None;
            self.next_exchange.arm(now);
        }

        if !self.next_exchange.is_due(now) {
            return None;
        }
        self.begin_exchange(now)
    }

    /// Begin a round trip now unless one is already in flight
    pub fn begin_exchange(&mut self, now: i64) -> Option<ClientTime> {
        if self.pending.is_some() {
            return None;
        }
        self.next_exchange.disarm();
        self.pending = Some(PendingExchange {
            client_transmitted: now,
        });
        Some(ClientTime {
            client_transmitted: now,
        })
    }

    /// Complete the in-flight exchange with the server's reply
    pub fn complete_exchange(
        &mut self,
        reply: &ServerTime,
        now: i64,
    ) -> Result<SyncUpdate, SyncError> {
        match self.pending {
            Some(p) if p.client_transmitted == reply.client_transmitted => {}
            _ => return Err(SyncError::UnmatchedReply(reply.client_transmitted)),
        }
        self.pending = None;

        let sample = ClockSample {
            client_transmitted: reply.client_transmitted,
            server_received: reply.server_received,
            server_transmitted: reply.server_transmitted,
            client_received: now,
        };
        let result = self.absorb(sample, now);
        self.schedule_next(now);
        result
    }

    /// Mark the next sample authoritative and exchange as soon as possible
    pub fn request_resync(&mut self, now: i64) {
        self.state.resync_count += 1;
        self.hard_resync = true;
        if self.pending.is_none() {
            self.next_exchange.arm(now);
        }
        info!(
            "Clock resync requested (count {})",
            self.state.resync_count
        );
    }

    fn absorb(&mut self, sample: ClockSample, now: i64) -> Result<SyncUpdate, SyncError> {
        let round_trip_us = match sample.round_trip_us() {
            Some(rtt) if rtt >= 0 => rtt,
            _ => return Err(SyncError::InvalidSample(sample)),
        };

        let measured = sample.offset_us();
        let first = !self.state.synced;
        let authoritative = self.hard_resync && !first;

        if first || authoritative {
            self.state.offset_us = measured;
        } else {
            let w = self.config.blend_weight;
            self.state.offset_us = (1.0 - w) * self.state.offset_us + w * measured;
        }

        self.hard_resync = false;
        self.state.synced = true;
        self.state.last_sample_time = Some(now);
        self.round_trip_us = round_trip_us;
        self.samples += 1;

        if first {
            info!(
                "Clock synced: offset {:.0}us, round trip {}us",
                self.state.offset_us, round_trip_us
            );
        } else {
            debug!(
                "Clock sample: measured {:.0}us, estimate {:.0}us, round trip {}us{}",
                measured,
                self.state.offset_us,
                round_trip_us,
                if authoritative { " (resync)" } else { "" }
            );
        }

        Ok(SyncUpdate {
            first,
            authoritative,
            offset_us: self.state.offset_us,
            round_trip_us,
        })
    }

    fn schedule_next(&mut self, now: i64) {
        let interval = if self.samples < self.config.burst_samples as u64 {
            self.config.burst_interval_us()
        } else {
            self.config.sync_interval_us()
        };
        // A resync requested while this exchange was in flight goes out now
        let at = if self.hard_resync {
            now
        } else {
            now.saturating_add(interval)
        };
        self.next_exchange.arm(at);
    }
}
