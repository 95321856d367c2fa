//! WebSocket transport
//!
//! Connects to a Sendspin server and bridges the socket onto a
//! [`Connection`] with one reader and one writer task.

use futures_util::{
    stream::{SplitSink, SplitStream},
    SinkExt, StreamExt,
};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

use super::{Connection, TransportEvent, DEFAULT_CHANNEL_CAPACITY};
use crate::error::NetworkError;
use crate::protocol::WireMessage;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Open a WebSocket to `url` and return the player side of it
pub async fn connect(url: &str) -> Result<Connection, NetworkError> {
    info!("Connecting to {}", url);

    let (ws_stream, _) = connect_async(url)
        .await
        .map_err(|e| NetworkError::ConnectionFailed(format!("{}: {}", url, e)))?;

    info!("Connected to {}", url);

    let (write, read) = ws_stream.split();
    let (event_tx, event_rx) = mpsc::channel(DEFAULT_CHANNEL_CAPACITY);
    let (wire_tx, wire_rx) = mpsc::channel(DEFAULT_CHANNEL_CAPACITY);

    tokio::spawn(writer_task(write, wire_rx));
    tokio::spawn(reader_task(read, event_tx));

    Ok(Connection {
        inbound: event_rx,
        outbound: wire_tx,
    })
}

/// Forward outbound frames to the socket until the player drops its sender
async fn writer_task(mut write: SplitSink<WsStream, Message>, mut rx: mpsc::Receiver<WireMessage>) {
    while let Some(message) = rx.recv().await {
        let frame = match message {
            WireMessage::Text(text) => Message::Text(text),
            WireMessage::Binary(data) => Message::Binary(data.to_vec()),
        };
        if let Err(e) = write.send(frame).await {
            error!("{}", NetworkError::SendFailed(e.to_string()));
            break;
        }
    }

    let _ = write.close().await;
    debug!("Writer task terminated");
}

/// Forward socket frames to the player, ending with [`TransportEvent::Closed`]
async fn reader_task(mut read: SplitStream<WsStream>, tx: mpsc::Sender<TransportEvent>) {
    while let Some(result) = read.next().await {
        let message = match result {
            Ok(Message::Text(text)) => WireMessage::Text(text),
            Ok(Message::Binary(data)) => WireMessage::Binary(data.into()),
            Ok(Message::Close(frame)) => {
                info!("WebSocket closed by server: {:?}", frame);
                break;
            }
            Ok(_) => continue,
            Err(e) => {
                warn!("WebSocket error: {}", e);
                break;
            }
        };

        if tx.send(TransportEvent::Message(message)).await.is_err() {
            // Player is gone
            debug!("Reader task terminated");
            return;
        }
    }

    let _ = tx.send(TransportEvent::Closed).await;
    debug!("Reader task terminated");
}
