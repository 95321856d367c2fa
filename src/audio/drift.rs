//! Drift detection from inter-segment spacing
//!
//! Consecutive segments are expected to butt up against each other: the slot
//! a segment actually gets is the end of its predecessor. The gap the sender
//! intended is the timestamp delta minus the predecessor's duration; when that
//! differs from the contiguous slot by more than the threshold, the stream and
//! the local schedule no longer agree.
//!
//! The expected gap only depends on sender timestamps, so a predecessor that
//! was pushed back (by the floor after a clear, or a drift event) does not make
//! its successors read as drift.

use tracing::warn;

use crate::audio::buffer::ScheduledPlayback;

/// Where the previously scheduled segment sits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Placed {
    server_time_us: i64,
    local_start_us: i64,
    duration_us: i64,
}

impl Placed {
    fn local_end_us(&self) -> i64 {
        self.local_start_us.saturating_add(self.duration_us)
    }

    /// Gap the sender timestamps put between this segment and one at `server_time_us`
    fn expected_gap_us(&self, server_time_us: i64) -> i64 {
        server_time_us
            .saturating_sub(self.server_time_us)
            .saturating_sub(self.duration_us)
    }
}

/// Verdict for the next segment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriftCheck {
    /// No live predecessor: nothing scheduled yet, or it already finished
    Unanchored,
    /// Within tolerance; play right after the predecessor
    Contiguous { slot_us: i64, gap_us: i64 },
    /// Spacing error beyond the threshold
    Drift {
        slot_us: i64,
        expected_gap_us: i64,
        actual_gap_us: i64,
    },
}

/// Compares timestamp-implied spacing with contiguous playback
#[derive(Debug)]
pub struct DriftMonitor {
    threshold_us: i64,
    previous: Option<Placed>,
    events: u64,
}

impl DriftMonitor {
    pub fn new(threshold_us: i64) -> Self {
        Self {
            threshold_us,
            previous: None,
            events: 0,
        }
    }

    /// Drift events detected so far
    pub fn events(&self) -> u64 {
        self.events
    }

    /// End of the previously scheduled segment
    pub fn previous_end_us(&self) -> Option<i64> {
        self.previous.map(|p| p.local_end_us())
    }

    /// Check the segment at `server_time_us` against its predecessor
    pub fn check(&mut self, server_time_us: i64, now_us: i64) -> DriftCheck {
        let prev = match self.previous {
            Some(prev) if prev.local_end_us() > now_us => prev,
            _ => return DriftCheck::Unanchored,
        };

        let slot_us = prev.local_end_us();
        let expected_gap_us = prev.expected_gap_us(server_time_us);
        let actual_gap_us: i64 = 0;

        if actual_gap_us.saturating_sub(expected_gap_us).saturating_abs() > self.threshold_us {
            self.events += 1;
            warn!(
                "Drift at server time {}us: timestamps imply {}us gap after {}us, playback is contiguous",
                server_time_us, expected_gap_us, prev.server_time_us
            );
            DriftCheck::Drift {
                slot_us,
                expected_gap_us,
                actual_gap_us,
            }
        } else {
            DriftCheck::Contiguous {
                slot_us,
                gap_us: expected_gap_us,
            }
        }
    }

    /// Remember a segment committed to the sink
    pub fn record(&mut self, playback: &ScheduledPlayback) {
        self.previous = Some(Placed {
            server_time_us: playback.segment.server_time_us,
            local_start_us: playback.local_start_us,
            duration_us: playback.duration_us,
        });
    }

    /// Forget history, e.g. after a buffer clear
    pub fn reset(&mut self) {
        self.previous = None;
    }
}
