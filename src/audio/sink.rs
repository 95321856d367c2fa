//! Playback sink contract
//!
//! The sink is the rendering backend's side of the scheduler: it receives
//! immutable playback instructions with absolute local start times and may be
//! asked to cancel any that have not started yet.

use tracing::{debug, info};

use crate::audio::buffer::{PlaybackId, ScheduledPlayback};
use crate::audio::format::{Codec, StreamFormat};
use crate::error::SinkError;

/// Rendering backend adapter
pub trait PlaybackSink: Send {
    /// Queue a segment to start at `playback.local_start_us`
    fn schedule(&mut self, playback: &ScheduledPlayback) -> Result<(), SinkError>;

    /// Cancel a queued segment that has not started
    fn cancel(&mut self, id: PlaybackId);

    /// Apply output volume (0-100) and mute
    fn set_gain(&mut self, _volume: u8, _muted: bool) {}

    /// Duration of a payload in microseconds.
    ///
    /// The default understands raw PCM only; sinks with real decoders
    /// override this for compressed codecs.
    fn decode(&mut self, format: &StreamFormat, payload: &[u8]) -> Result<i64, SinkError> {
        pcm_duration(format, payload)
    }
}

/// Duration of a raw PCM payload
pub fn pcm_duration(format: &StreamFormat, payload: &[u8]) -> Result<i64, SinkError> {
    if format.codec != Codec::Pcm {
        return Err(SinkError::UnsupportedCodec(format.codec.to_string()));
    }
    match format.pcm_duration_us(payload.len()) {
        Some(duration) if duration > 0 => Ok(duration),
        _ => Err(SinkError::InvalidPayload(format!(
            "{} bytes is not a whole number of {} frames",
            payload.len(),
            format
        ))),
    }
}

/// Sink that only logs what it is asked to do
#[derive(Debug, Default)]
pub struct TracingSink {
    scheduled: u64,
    cancelled: u64,
}

impl TracingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scheduled(&self) -> u64 {
        self.scheduled
    }

    pub fn cancelled(&self) -> u64 {
        self.cancelled
    }
}

impl PlaybackSink for TracingSink {
    fn schedule(&mut self, playback: &ScheduledPlayback) -> Result<(), SinkError> {
        self.scheduled += 1;
        debug!(
            "play #{} server={}us local={}us dur={}us ({} bytes)",
            playback.id.0,
            playback.segment.server_time_us,
            playback.local_start_us,
            playback.duration_us,
            playback.segment.payload.len()
        );
        Ok(())
    }

    fn cancel(&mut self, id: PlaybackId) {
        self.cancelled += 1;
        debug!("cancel #{}", id.0);
    }

    fn set_gain(&mut self, volume: u8, muted: bool) {
        info!("Output gain: volume {} muted {}", volume, muted);
    }
}
