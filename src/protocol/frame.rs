//! Binary audio frame format
//!
//! ```text
//! ┌──────────┬──────────────────────────────┬──────────────────┐
//! │ kind: u8 │ server time: i64 big-endian  │ payload ...      │
//! │   (4)    │   (microseconds, 8 bytes)    │                  │
//! └──────────┴──────────────────────────────┴──────────────────┘
//! ```

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::ProtocolError;

/// Frame kind byte for player audio chunks
pub const PLAYER_AUDIO_KIND: u8 = 4;

/// Kind byte plus timestamp
pub const HEADER_LEN: usize = 9;

/// One binary audio chunk as it came off the wire
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioChunk {
    /// Sender-clock timestamp in microseconds
    pub server_time_us: i64,
    pub payload: Bytes,
}

impl AudioChunk {
    pub fn new(server_time_us: i64, payload: impl Into<Bytes>) -> Self {
        Self {
            server_time_us,
            payload: payload.into(),
        }
    }

    /// Parse a binary frame. The payload shares the input allocation.
    pub fn decode(mut data: Bytes) -> Result<Self, ProtocolError> {
        if data.len() < HEADER_LEN {
            return Err(ProtocolError::FrameTooShort(data.len()));
        }

        let kind = data.get_u8();
        if kind != PLAYER_AUDIO_KIND {
            return Err(ProtocolError::UnknownFrameKind(kind));
        }

        let server_time_us = data.get_i64();
        Ok(Self {
            server_time_us,
            payload: data,
        })
    }

    /// Serialize into the wire layout
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(HEADER_LEN + self.payload.len());
        buf.put_u8(PLAYER_AUDIO_KIND);
        buf.put_i64(self.server_time_us);
        buf.extend_from_slice(&self.payload);
        buf.freeze()
    }

    /// Encoded length
    pub fn wire_len(&self) -> usize {
        HEADER_LEN + self.payload.len()
    }
}
