//! Error types for the Sendspin player

use thiserror::Error;

use crate::clock::ClockSample;

/// Main error type for the player
#[derive(Error, Debug)]
pub enum Error {
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Clock sync error: {0}")]
    Sync(#[from] SyncError),

    #[error("Playback sink error: {0}")]
    Sink(#[from] SinkError),

    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Malformed or unexpected wire data. The offending frame is discarded.
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Binary frame too short: {0} bytes")]
    FrameTooShort(usize),

    #[error("Unknown binary frame kind: {0}")]
    UnknownFrameKind(u8),

    #[error("Empty audio payload at server time {0}")]
    EmptyPayload(i64),

    #[error("Malformed control message: {0}")]
    MalformedMessage(String),

    #[error("Failed to encode message: {0}")]
    Encode(String),
}

/// Clock synchronization failures. None of these are fatal.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("No time reply for exchange {client_transmitted} after {waited_us}us")]
    Timeout {
        client_transmitted: i64,
        waited_us: i64,
    },

    #[error("Time reply for {0} does not match an in-flight exchange")]
    UnmatchedReply(i64),

    #[error("Invalid time sample: {0:?}")]
    InvalidSample(ClockSample),
}

/// Playback sink errors
#[derive(Error, Debug)]
pub enum SinkError {
    #[error("Unsupported codec: {0}")]
    UnsupportedCodec(String),

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("Failed to schedule playback: {0}")]
    ScheduleFailed(String),
}

/// Transport errors
#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("Connection closed")]
    Closed,
}

/// Result type alias for the player
pub type Result<T> = std::result::Result<T, Error>;
