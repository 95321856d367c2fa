//! Session lifecycle, output state and stream format

use serde::Serialize;
use std::fmt;
use tracing::{debug, info, warn};

use crate::audio::format::StreamFormat;
use crate::config::PlaybackConfig;
use crate::protocol::{ClientState, PlayerCommand, PlayerStateReport, PlayerSyncState};

/// Connection and stream lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Disconnected,
    /// Transport up, hello sent
    Connected,
    /// First clock sample of this connection completed
    Synchronized,
    /// A stream format is active
    Streaming,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Disconnected => "disconnected",
            SessionState::Connected => "connected",
            SessionState::Synchronized => "synchronized",
            SessionState::Streaming => "streaming",
        };
        f.write_str(name)
    }
}

/// Single mutable session record for one player
#[derive(Debug, Clone)]
pub struct Session {
    state: SessionState,
    handshake_complete: bool,
    synced_this_connection: bool,
    format: Option<StreamFormat>,
    playing: bool,
    volume: u8,
    muted: bool,
}

impl Session {
    pub fn new(playback: &PlaybackConfig) -> Self {
        Self {
            state: SessionState::Disconnected,
            handshake_complete: false,
            synced_this_connection: false,
            format: None,
            playing: false,
            volume: playback.volume.min(100),
            muted: playback.muted,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state != SessionState::Disconnected
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn handshake_complete(&self) -> bool {
        self.handshake_complete
    }

    pub fn format(&self) -> Option<&StreamFormat> {
        self.format.as_ref()
    }

    pub fn volume(&self) -> u8 {
        self.volume
    }

    pub fn muted(&self) -> bool {
        self.muted
    }

    /// Transport established. Returns false if already connected.
    pub fn connect(&mut self) -> bool {
        if self.is_connected() {
            return false;
        }
        self.transition(SessionState::Connected);
        true
    }

    /// `server/hello` received. Returns false for a repeated hello.
    pub fn complete_handshake(&mut self) -> bool {
        if !self.is_connected() || self.handshake_complete {
            return false;
        }
        self.handshake_complete = true;
        info!("Handshake complete");
        true
    }

    /// A clock sample completed on this connection. Returns true for the
    /// first one.
    pub fn mark_synced(&mut self) -> bool {
        if self.synced_this_connection || !self.is_connected() {
            return false;
        }
        self.synced_this_connection = true;
        if self.state == SessionState::Connected {
            self.transition(SessionState::Synchronized);
        }
        true
    }

    /// `stream/start`. Returns false when not connected.
    pub fn start_stream(&mut self, format: StreamFormat) -> bool {
        if !self.is_connected() {
            warn!("Ignoring stream start while disconnected");
            return false;
        }
        info!("Stream started: {}", format);
        self.format = Some(format);
        self.playing = true;
        self.transition(SessionState::Streaming);
        true
    }

    /// `stream/end`: format and playing flag reset
    pub fn end_stream(&mut self) {
        self.format = None;
        self.playing = false;
        if self.state == SessionState::Streaming {
            let next = if self.synced_this_connection {
                SessionState::Synchronized
            } else {
                SessionState::Connected
            };
            self.transition(next);
        }
        info!("Stream ended");
    }

    /// Set volume, clamped to 0-100. Returns true if it changed.
    pub fn set_volume(&mut self, volume: u8) -> bool {
        let volume = volume.min(100);
        let changed = self.volume != volume;
        self.volume = volume;
        changed
    }

    /// Returns true if it changed
    pub fn set_muted(&mut self, muted: bool) -> bool {
        let changed = self.muted != muted;
        self.muted = muted;
        changed
    }

    /// Apply a `server/command` for the player role
    pub fn apply_command(&mut self, command: PlayerCommand) {
        match command {
            PlayerCommand::Volume { volume } => {
                self.set_volume(volume);
            }
            PlayerCommand::Mute { mute } => {
                self.set_muted(mute);
            }
        }
        debug!("Command applied: volume {} muted {}", self.volume, self.muted);
    }

    /// Back to disconnected. Output settings survive.
    pub fn disconnect(&mut self) {
        self.format = None;
        self.playing = false;
        self.handshake_complete = false;
        self.synced_this_connection = false;
        self.transition(SessionState::Disconnected);
    }

    /// `client/state` payload describing this player
    pub fn report(&self, clock_synced: bool) -> ClientState {
        ClientState {
            player: PlayerStateReport {
                state: if clock_synced {
                    PlayerSyncState::Synchronized
                } else {
                    PlayerSyncState::Error
                },
                volume: self.volume,
                muted: self.muted,
            },
        }
    }

    fn transition(&mut self, next: SessionState) {
        if self.state != next {
            debug!("Session {} -> {}", self.state, next);
            self.state = next;
        }
    }
}
