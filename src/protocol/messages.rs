//! Control message definitions
//!
//! Every control message travels as JSON text shaped
//! `{"type": "<namespace>/<name>", "payload": {...}}`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::audio::format::StreamFormat;
use crate::constants::PROTOCOL_VERSION;

/// Role name this client plays in a session
pub const PLAYER_ROLE: &str = "player";

/// Messages sent by the client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum ClientMessage {
    #[serde(rename = "client/hello")]
    Hello(ClientHello),
    #[serde(rename = "client/time")]
    Time(ClientTime),
    #[serde(rename = "client/state")]
    State(ClientState),
}

/// Messages sent by the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum ServerMessage {
    #[serde(rename = "server/hello")]
    Hello(ServerHello),
    #[serde(rename = "server/time")]
    Time(ServerTime),
    #[serde(rename = "server/command")]
    Command(ServerCommand),
    #[serde(rename = "stream/start")]
    StreamStart(StreamStart),
    #[serde(rename = "stream/end")]
    StreamEnd(StreamRoles),
    #[serde(rename = "stream/clear")]
    StreamClear(StreamRoles),
}

impl ServerMessage {
    /// Wire type name, for logging
    pub fn kind(&self) -> &'static str {
        match self {
            ServerMessage::Hello(_) => "server/hello",
            ServerMessage::Time(_) => "server/time",
            ServerMessage::Command(_) => "server/command",
            ServerMessage::StreamStart(_) => "stream/start",
            ServerMessage::StreamEnd(_) => "stream/end",
            ServerMessage::StreamClear(_) => "stream/clear",
        }
    }
}

/// Handshake sent right after the transport is established
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientHello {
    pub client_id: String,
    pub name: String,
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default = "default_roles")]
    pub supported_roles: Vec<String>,
    /// Authentication and identity fields, forwarded untouched
    #[serde(flatten)]
    pub identity: Map<String, Value>,
}

const HELLO_FIELDS: &[&str] = &["client_id", "name", "version", "supported_roles"];

fn default_version() -> u32 {
    PROTOCOL_VERSION
}

fn default_roles() -> Vec<String> {
    vec![PLAYER_ROLE.to_string()]
}

impl ClientHello {
    pub fn new(client_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            name: name.into(),
            version: default_version(),
            supported_roles: default_roles(),
            identity: Map::new(),
        }
    }

    /// Attach pass-through identity fields. Keys the hello already carries
    /// are dropped.
    pub fn with_identity(mut self, mut identity: Map<String, Value>) -> Self {
        for key in HELLO_FIELDS {
            if identity.remove(*key).is_some() {
                tracing::warn!("Ignoring identity field '{}': set by the player", key);
            }
        }
        self.identity = identity;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerHello {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u32>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Start of a round-trip time exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientTime {
    pub client_transmitted: i64,
}

/// Server reply to `client/time`, echoing the client timestamp
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerTime {
    pub client_transmitted: i64,
    pub server_received: i64,
    pub server_transmitted: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerCommand {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player: Option<PlayerCommand>,
}

/// Commands addressed to the player role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "lowercase")]
pub enum PlayerCommand {
    Volume { volume: u8 },
    Mute { mute: bool },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamStart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player: Option<StreamFormat>,
}

/// Payload of `stream/end` and `stream/clear`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamRoles {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roles: Option<Vec<String>>,
}

impl StreamRoles {
    /// An absent or empty role list addresses every role
    pub fn includes_player(&self) -> bool {
        match &self.roles {
            None => true,
            Some(roles) if roles.is_empty() => true,
            Some(roles) => roles.iter().any(|r| r == PLAYER_ROLE),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientState {
    pub player: PlayerStateReport,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerStateReport {
    pub state: PlayerSyncState,
    pub volume: u8,
    pub muted: bool,
}

/// Reported player condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayerSyncState {
    Synchronized,
    Error,
}
