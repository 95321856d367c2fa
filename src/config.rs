//! Player configuration
//!
//! Loaded from TOML. Every timing policy the player applies (offset smoothing,
//! drift threshold, jitter buffer delay) lives here rather than in code.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

use crate::constants::{
    DEFAULT_BLEND_WEIGHT, DEFAULT_DEBOUNCE_MS, DEFAULT_DRIFT_THRESHOLD_MS, DEFAULT_SERVER_URL,
    DEFAULT_SYNC_DELAY_MS,
};
use crate::error::{Error, Result};

/// Complete player configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    pub client: ClientConfig,
    pub clock: ClockConfig,
    pub buffer: BufferConfig,
    pub playback: PlaybackConfig,
}

/// Identity announced in `client/hello`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub client_id: String,
    pub name: String,
    /// WebSocket endpoint of the server
    pub server_url: String,
    /// Extra hello fields (auth tokens etc.), forwarded as-is
    pub identity: Map<String, Value>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            client_id: uuid::Uuid::new_v4().to_string(),
            name: "Sendspin Player".to_string(),
            server_url: DEFAULT_SERVER_URL.to_string(),
            identity: Map::new(),
        }
    }
}

/// Clock synchronization policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClockConfig {
    /// Weight of a new sample when blending into the offset estimate
    pub blend_weight: f64,
    /// Time to wait for `server/time` before abandoning an exchange
    pub reply_timeout_ms: u64,
    /// Steady-state spacing between exchanges
    pub sync_interval_ms: u64,
    /// Samples collected quickly after connecting
    pub burst_samples: u32,
    /// Spacing between exchanges during the initial burst
    pub burst_interval_ms: u64,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            blend_weight: DEFAULT_BLEND_WEIGHT,
            reply_timeout_ms: 2_000,
            sync_interval_ms: 5_000,
            burst_samples: 5,
            burst_interval_ms: 100,
        }
    }
}

impl ClockConfig {
    pub fn reply_timeout_us(&self) -> i64 {
        ms_to_us(self.reply_timeout_ms)
    }

    pub fn sync_interval_us(&self) -> i64 {
        ms_to_us(self.sync_interval_ms)
    }

    pub fn burst_interval_us(&self) -> i64 {
        ms_to_us(self.burst_interval_ms)
    }
}

/// Jitter buffer and drift policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BufferConfig {
    /// Fixed delay added to every converted start time
    pub sync_delay_ms: u64,
    /// Window for coalescing arrivals into one scheduling pass
    pub debounce_ms: u64,
    /// Spacing error that counts as clock drift
    pub drift_threshold_ms: u64,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            sync_delay_ms: DEFAULT_SYNC_DELAY_MS,
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            drift_threshold_ms: DEFAULT_DRIFT_THRESHOLD_MS,
        }
    }
}

impl BufferConfig {
    pub fn sync_delay_us(&self) -> i64 {
        ms_to_us(self.sync_delay_ms)
    }

    pub fn debounce_us(&self) -> i64 {
        ms_to_us(self.debounce_ms)
    }

    pub fn drift_threshold_us(&self) -> i64 {
        ms_to_us(self.drift_threshold_ms)
    }
}

/// Initial output state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    pub volume: u8,
    pub muted: bool,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            volume: 100,
            muted: false,
        }
    }
}

impl PlayerConfig {
    /// Load from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path` if it exists, defaults otherwise
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            tracing::debug!("No config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Write as TOML, creating parent directories
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Platform config location, e.g. `~/.config/sendspin-player/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "sendspin-player")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Reject values the player cannot run with
    pub fn validate(&self) -> Result<()> {
        let weight = self.clock.blend_weight;
        if !(weight > 0.0 && weight <= 1.0) {
            return Err(Error::Config(format!(
                "clock.blend_weight must be in (0, 1], got {}",
                weight
            )));
        }
        if self.clock.reply_timeout_ms == 0 || self.clock.sync_interval_ms == 0 {
            return Err(Error::Config(
                "clock timings must be non-zero".to_string(),
            ));
        }
        if self.buffer.drift_threshold_ms == 0 {
            return Err(Error::Config(
                "buffer.drift_threshold_ms must be non-zero".to_string(),
            ));
        }
        if self.playback.volume > 100 {
            return Err(Error::Config(format!(
                "playback.volume must be 0-100, got {}",
                self.playback.volume
            )));
        }
        if self.client.client_id.is_empty() {
            return Err(Error::Config("client.client_id is empty".to_string()));
        }
        Ok(())
    }
}

/// Milliseconds to signed microseconds, saturating
pub(crate) fn ms_to_us(ms: u64) -> i64 {
    i64::try_from(ms).unwrap_or(i64::MAX).saturating_mul(1_000)
}
