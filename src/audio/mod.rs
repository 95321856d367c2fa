//! Audio scheduling: jitter buffer, drift monitoring and the sink contract

pub mod buffer;
pub mod drift;
pub mod format;
pub mod sink;

pub use buffer::{
    AudioSegment, FlushReport, InsertOutcome, JitterBuffer, JitterBufferStats, PlaybackId,
    ScheduledPlayback,
};
pub use drift::{DriftCheck, DriftMonitor};
pub use format::{Codec, StreamFormat};
pub use sink::{PlaybackSink, TracingSink};
