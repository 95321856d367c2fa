//! Stream format description announced by `stream/start`

use serde::{Deserialize, Serialize};
use std::fmt;

/// Audio codec carried in player audio chunks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Codec {
    /// Uncompressed interleaved little-endian PCM
    Pcm,
    Opus,
    Flac,
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Codec::Pcm => "pcm",
            Codec::Opus => "opus",
            Codec::Flac => "flac",
        };
        f.write_str(name)
    }
}

/// Format of the active stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamFormat {
    pub codec: Codec,
    pub sample_rate: u32,
    pub channels: u16,
    pub bit_depth: u16,
    /// Base64 codec header for compressed codecs, passed to the sink untouched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub codec_header: Option<String>,
}

impl StreamFormat {
    /// Raw PCM format
    pub fn pcm(sample_rate: u32, channels: u16, bit_depth: u16) -> Self {
        Self {
            codec: Codec::Pcm,
            sample_rate,
            channels,
            bit_depth,
            codec_header: None,
        }
    }

    /// Bytes per interleaved frame (all channels)
    pub fn bytes_per_frame(&self) -> usize {
        self.channels as usize * (self.bit_depth as usize).div_ceil(8)
    }

    /// Duration in microseconds of a PCM payload of `len` bytes.
    ///
    /// Returns `None` if the format is degenerate or the payload does not hold
    /// a whole number of frames.
    pub fn pcm_duration_us(&self, len: usize) -> Option<i64> {
        let frame = self.bytes_per_frame();
        if frame == 0 || self.sample_rate == 0 || len % frame != 0 {
            return None;
        }
        let frames = (len / frame) as i64;
        Some(frames * 1_000_000 / self.sample_rate as i64)
    }

    /// Number of PCM bytes covering `duration_us`
    pub fn pcm_len_for(&self, duration_us: i64) -> usize {
        let frames = duration_us * self.sample_rate as i64 / 1_000_000;
        frames.max(0) as usize * self.bytes_per_frame()
    }
}

impl fmt::Display for StreamFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}Hz {}ch {}bit",
            self.codec, self.sample_rate, self.channels, self.bit_depth
        )
    }
}
