//! Sendspin wire protocol
//!
//! Two shapes share one connection: JSON control messages in text frames and
//! timestamped audio chunks in binary frames.

pub mod frame;
pub mod messages;

use bytes::Bytes;

use crate::error::ProtocolError;

pub use frame::{AudioChunk, PLAYER_AUDIO_KIND};
pub use messages::{
    ClientHello, ClientMessage, ClientState, ClientTime, PlayerCommand, PlayerStateReport,
    PlayerSyncState, ServerCommand, ServerHello, ServerMessage, ServerTime, StreamRoles,
    StreamStart,
};

/// A single transport frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireMessage {
    Text(String),
    Binary(Bytes),
}

/// Decoded inbound traffic
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Control(ServerMessage),
    Audio(AudioChunk),
}

/// Decode a frame received from the server
pub fn decode_inbound(message: WireMessage) -> Result<Inbound, ProtocolError> {
    match message {
        WireMessage::Text(text) => serde_json::from_str(&text)
            .map(Inbound::Control)
            .map_err(|e| ProtocolError::MalformedMessage(e.to_string())),
        WireMessage::Binary(data) => AudioChunk::decode(data).map(Inbound::Audio),
    }
}

/// Encode a message for sending to the server
pub fn encode_outbound(message: &ClientMessage) -> Result<WireMessage, ProtocolError> {
    serde_json::to_string(message)
        .map(WireMessage::Text)
        .map_err(|e| ProtocolError::Encode(e.to_string()))
}

/// Encode a server message. Used by test servers and tooling.
pub fn encode_server(message: &ServerMessage) -> Result<WireMessage, ProtocolError> {
    serde_json::to_string(message)
        .map(WireMessage::Text)
        .map_err(|e| ProtocolError::Encode(e.to_string()))
}

/// Decode a frame sent by a client. Used by test servers and tooling.
pub fn decode_client(message: &WireMessage) -> Result<ClientMessage, ProtocolError> {
    match message {
        WireMessage::Text(text) => serde_json::from_str(text)
            .map_err(|e| ProtocolError::MalformedMessage(e.to_string())),
        WireMessage::Binary(data) => Err(ProtocolError::MalformedMessage(format!(
            "unexpected {} byte binary frame from client",
            data.len()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_control() {
        let inbound = decode_inbound(WireMessage::Text(
            r#"{"type":"server/time","payload":{"client_transmitted":1,"server_received":2,"server_transmitted":3}}"#
                .into(),
        ))
        .unwrap();
        assert_eq!(
            inbound,
            Inbound::Control(ServerMessage::Time(ServerTime {
                client_transmitted: 1,
                server_received: 2,
                server_transmitted: 3,
            }))
        );
    }

    #[test]
    fn test_decode_unknown_type() {
        let err = decode_inbound(WireMessage::Text(r#"{"type":"server/bogus","payload":{}}"#.into()))
            .unwrap_err();
        assert!(matches!(err, ProtocolError::MalformedMessage(_)));
    }

    #[test]
    fn test_decode_garbage_text() {
        let err = decode_inbound(WireMessage::Text("not json".into())).unwrap_err();
        assert!(matches!(err, ProtocolError::MalformedMessage(_)));
    }

    #[test]
    fn test_decode_audio() {
        let chunk = AudioChunk::new(1_000, vec![0u8; 16]);
        let inbound = decode_inbound(WireMessage::Binary(chunk.encode())).unwrap();
        assert_eq!(inbound, Inbound::Audio(chunk));
    }

    #[test]
    fn test_client_round_trip_through_server_decoder() {
        let wire = encode_outbound(&ClientMessage::Time(ClientTime {
            client_transmitted: 42,
        }))
        .unwrap();
        assert_eq!(
            decode_client(&wire).unwrap(),
            ClientMessage::Time(ClientTime {
                client_transmitted: 42
            })
        );
    }
}
