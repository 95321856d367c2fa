//! Shared helpers: an in-memory Sendspin server and a recording sink

#![allow(dead_code)]

use std::time::Duration;

use sendspin_player::{
    audio::{PlaybackId, PlaybackSink, ScheduledPlayback, StreamFormat},
    error::SinkError,
    network::{Connection, RemoteEnd},
    protocol::{
        decode_client, encode_server, AudioChunk, ClientMessage, PlayerStateReport, ServerHello,
        ServerMessage, ServerTime, StreamRoles, StreamStart, WireMessage,
    },
};

/// Sender clock minus local clock used by the mock server
pub const OFFSET_US: i64 = 1_000_000;

/// Duration of every test segment
pub const SEGMENT_US: i64 = 100_000;

#[derive(Debug, Default)]
pub struct RecordingSink {
    pub scheduled: Vec<ScheduledPlayback>,
    pub cancelled: Vec<PlaybackId>,
    pub gains: Vec<(u8, bool)>,
}

impl PlaybackSink for RecordingSink {
    fn schedule(&mut self, playback: &ScheduledPlayback) -> Result<(), SinkError> {
        self.scheduled.push(playback.clone());
        Ok(())
    }

    fn cancel(&mut self, id: PlaybackId) {
        self.cancelled.push(id);
    }

    fn set_gain(&mut self, volume: u8, muted: bool) {
        self.gains.push((volume, muted));
    }
}

/// 10 kHz mono 8-bit: one byte per 100us
pub fn test_format() -> StreamFormat {
    StreamFormat::pcm(10_000, 1, 8)
}

pub struct MockServer {
    remote: RemoteEnd,
    /// `client/time` requests seen while waiting for other messages
    pub time_requests: Vec<i64>,
}

impl MockServer {
    pub fn pair() -> (Connection, MockServer) {
        let (connection, remote) = Connection::pair(256);
        (
            connection,
            MockServer {
                remote,
                time_requests: Vec::new(),
            },
        )
    }

    pub async fn send(&self, message: ServerMessage) {
        let frame = encode_server(&message).expect("encode");
        assert!(self.remote.send(frame).await, "player hung up");
    }

    pub async fn send_audio(&self, server_time_us: i64) {
        let payload = vec![0u8; test_format().pcm_len_for(SEGMENT_US)];
        let frame = WireMessage::Binary(AudioChunk::new(server_time_us, payload).encode());
        assert!(self.remote.send(frame).await, "player hung up");
    }

    pub async fn send_raw(&self, frame: WireMessage) {
        assert!(self.remote.send(frame).await, "player hung up");
    }

    pub async fn close(&self) {
        self.remote.close().await;
    }

    /// Next client message, `None` once the player released the transport
    pub async fn recv(&mut self) -> Option<ClientMessage> {
        let frame = tokio::time::timeout(Duration::from_secs(30), self.remote.recv())
            .await
            .expect("timed out waiting for the player")?;
        Some(decode_client(&frame).expect("client sent a malformed frame"))
    }

    /// Skip time requests until a `client/state` arrives
    pub async fn expect_state(&mut self) -> PlayerStateReport {
        loop {
            match self.recv().await.expect("transport closed") {
                ClientMessage::State(state) => return state.player,
                ClientMessage::Time(request) => self.time_requests.push(request.client_transmitted),
                other => panic!("unexpected {:?}", other),
            }
        }
    }

    /// Next `client/time` request
    pub async fn expect_time(&mut self) -> i64 {
        loop {
            match self.recv().await.expect("transport closed") {
                ClientMessage::Time(request) => return request.client_transmitted,
                ClientMessage::State(_) => {}
                other => panic!("unexpected {:?}", other),
            }
        }
    }

    /// Answer a time request with zero latency and [`OFFSET_US`]
    pub async fn answer_time(&self, client_transmitted: i64) {
        self.send(ServerMessage::Time(ServerTime {
            client_transmitted,
            server_received: client_transmitted + OFFSET_US,
            server_transmitted: client_transmitted + OFFSET_US,
        }))
        .await;
    }

    /// Hello exchange plus the first clock sample. Returns the state report
    /// the player sends once synced.
    pub async fn handshake(&mut self) -> PlayerStateReport {
        match self.recv().await.expect("transport closed") {
            ClientMessage::Hello(hello) => assert_eq!(hello.supported_roles, vec!["player"]),
            other => panic!("expected hello, got {:?}", other),
        }
        self.send(ServerMessage::Hello(ServerHello::default())).await;
        let request = self.expect_time().await;
        self.answer_time(request).await;
        self.expect_state().await
    }

    pub async fn start_stream(&self) {
        self.send(ServerMessage::StreamStart(StreamStart {
            player: Some(test_format()),
        }))
        .await;
    }

    pub async fn end_stream(&self) {
        self.send(ServerMessage::StreamEnd(StreamRoles::default()))
            .await;
    }

    pub async fn clear_stream(&self) {
        self.send(ServerMessage::StreamClear(StreamRoles {
            roles: Some(vec!["player".to_string()]),
        }))
        .await;
    }
}

/// Let the player task catch up with (paused) time
pub async fn settle(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}
