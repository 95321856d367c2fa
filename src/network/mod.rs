//! Transport boundary
//!
//! The player never owns a socket. It talks to a [`Connection`]: a stream of
//! inbound [`TransportEvent`]s and a sink for outbound [`WireMessage`]s.
//! Connection establishment and reconnection policy live outside the player.

#[cfg(feature = "websocket")]
pub mod websocket;

use tokio::sync::mpsc;

use crate::error::NetworkError;
use crate::protocol::WireMessage;

/// Default channel depth for each direction
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Something the transport delivered
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Message(WireMessage),
    /// The remote side went away; no further messages follow
    Closed,
}

/// Player side of an established transport
#[derive(Debug)]
pub struct Connection {
    pub inbound: mpsc::Receiver<TransportEvent>,
    pub outbound: mpsc::Sender<WireMessage>,
}

/// Server side of an in-memory connection
#[derive(Debug)]
pub struct RemoteEnd {
    pub inbound: mpsc::Receiver<WireMessage>,
    pub outbound: mpsc::Sender<TransportEvent>,
}

impl RemoteEnd {
    /// Deliver a frame to the player
    pub async fn send(&self, message: WireMessage) -> bool {
        self.outbound
            .send(TransportEvent::Message(message))
            .await
            .is_ok()
    }

    /// Next frame sent by the player, `None` once the player hung up
    pub async fn recv(&mut self) -> Option<WireMessage> {
        self.inbound.recv().await
    }

    /// Tell the player the transport closed
    pub async fn close(&self) {
        let _ = self.outbound.send(TransportEvent::Closed).await;
    }
}

impl Connection {
    /// Hand a frame to the transport
    pub async fn send(&self, message: WireMessage) -> Result<(), NetworkError> {
        self.outbound
            .send(message)
            .await
            .map_err(|_| NetworkError::Closed)
    }

    /// In-memory connection, for tests and embedding over custom transports
    pub fn pair(capacity: usize) -> (Connection, RemoteEnd) {
        let (event_tx, event_rx) = mpsc::channel(capacity);
        let (wire_tx, wire_rx) = mpsc::channel(capacity);
        (
            Connection {
                inbound: event_rx,
                outbound: wire_tx,
            },
            RemoteEnd {
                inbound: wire_rx,
                outbound: event_tx,
            },
        )
    }
}
