//! # Sendspin Player
//!
//! Client-side clock synchronization and playback scheduling for the
//! Sendspin protocol.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────────┐
//! │                              SENDSPIN SERVER                                 │
//! │      Control: {type, payload} JSON      Audio: [4|server time|payload]       │
//! └──────────────────────────────────────┬──────────────────────────────────────┘
//!                                        │ WebSocket (network::websocket)
//!                                        ▼
//! ┌─────────────────────────────────────────────────────────────────────────────┐
//! │                       Player task (player::driver)                          │
//! │   select! { inbound frame | handle wake-up | next deadline }                 │
//! │                                        │                                     │
//! │  ┌─────────────────────────────────────▼─────────────────────────────────┐  │
//! │  │                      PlayerCore (player::core)                        │  │
//! │  │                                                                       │  │
//! │  │  ┌──────────────┐   ┌──────────────┐   ┌───────────────────────────┐  │  │
//! │  │  │   Protocol   │──▶│   Session    │   │      Clock Sync           │  │  │
//! │  │  │    Codec     │   │ State Machine│   │  client/time ⇄ server/time│  │  │
//! │  │  └──────┬───────┘   └──────────────┘   └─────────────┬─────────────┘  │  │
//! │  │         │ audio chunks                  offset       │  ▲ resync      │  │
//! │  │         ▼                                            ▼  │             │  │
//! │  │  ┌───────────────────────────────────────────────────────┴──────────┐  │  │
//! │  │  │   Jitter Buffer (audio::buffer)  ◀──▶  Drift Monitor (audio::drift)│ │  │
//! │  │  │   reorder ▸ debounce ▸ convert to local time ▸ contiguous start   │  │  │
//! │  │  └──────────────────────────────┬────────────────────────────────────┘  │  │
//! │  └─────────────────────────────────┼─────────────────────────────────────┘  │
//! │                                    ▼                                        │
//! │                 PlaybackSink (audio::sink): schedule / cancel               │
//! └─────────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod audio;
pub mod clock;
pub mod config;
pub mod error;
pub mod network;
pub mod player;
pub mod protocol;
pub mod session;
pub mod timer;

pub use error::{Error, Result};
pub use player::{Player, PlayerCore, PlayerHandle};

/// Application-wide constants
pub mod constants {
    /// Default delay added to every converted start time, in milliseconds
    pub const DEFAULT_SYNC_DELAY_MS: u64 = 200;

    /// Default arrival coalescing window, in milliseconds
    pub const DEFAULT_DEBOUNCE_MS: u64 = 25;

    /// Default spacing error that triggers a clock resync, in milliseconds
    pub const DEFAULT_DRIFT_THRESHOLD_MS: u64 = 20;

    /// Default weight of a new clock sample in the running estimate
    pub const DEFAULT_BLEND_WEIGHT: f64 = 0.2;

    /// Default server address
    pub const DEFAULT_SERVER_URL: &str = "ws://127.0.0.1:8927/sendspin";

    /// Sendspin protocol version announced in `client/hello`
    pub const PROTOCOL_VERSION: u32 = 1;
}
