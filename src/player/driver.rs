//! Async driver for [`PlayerCore`]
//!
//! One task owns the transport and feeds the core one event at a time:
//! inbound frames, handle wake-ups and the core's own deadlines. The core
//! lives behind a mutex shared with [`PlayerHandle`]; the lock is only ever
//! taken for synchronous work and never held across an `.await`.

use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::core::{PlayerCore, PlayerStats, SyncInfo};
use crate::audio::{PlaybackId, PlaybackSink, StreamFormat};
use crate::clock::{LocalClock, MonotonicClock, TimeSyncInfo};
use crate::config::PlayerConfig;
use crate::error::NetworkError;
use crate::network::{Connection, TransportEvent};
use crate::protocol::encode_outbound;
use crate::session::SessionState;

/// Entry point for running a player over a connection
pub struct Player;

impl Player {
    /// Start a player on an established connection. The hello goes out
    /// immediately.
    pub fn spawn<S>(config: PlayerConfig, connection: Connection, sink: S) -> PlayerHandle<S>
    where
        S: PlaybackSink + 'static,
    {
        Self::spawn_with_clock(config, connection, sink, Box::new(MonotonicClock::new()))
    }

    /// Like [`spawn`](Self::spawn) with a custom local clock
    pub fn spawn_with_clock<S>(
        config: PlayerConfig,
        connection: Connection,
        sink: S,
        clock: Box<dyn LocalClock>,
    ) -> PlayerHandle<S>
    where
        S: PlaybackSink + 'static,
    {
        let core = Arc::new(Mutex::new(PlayerCore::new(config, clock, sink)));
        core.lock().connect();

        let wake = Arc::new(Notify::new());
        let shutdown = Arc::new(Notify::new());
        let task = tokio::spawn(run(core.clone(), connection, wake.clone(), shutdown.clone()));

        PlayerHandle {
            core,
            wake,
            shutdown,
            task,
        }
    }
}

async fn run<S: PlaybackSink>(
    core: Arc<Mutex<PlayerCore<S>>>,
    mut connection: Connection,
    wake: Arc<Notify>,
    shutdown: Arc<Notify>,
) {
    debug!("Player task started");

    loop {
        if let Err(e) = send_outbound(&core, &connection).await {
            info!("Transport outbound: {}", e);
            break;
        }

        let deadline = {
            let core = core.lock();
            core.next_deadline().map(|at| core.instant_at(at))
        };
        let timer = async move {
            match deadline {
                Some(at) => tokio::time::sleep_until(at).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;

            _ = shutdown.notified() => {
                debug!("Player task shutting down");
                break;
            }
            event = connection.inbound.recv() => match event {
                Some(TransportEvent::Message(message)) => {
                    core.lock().handle_wire(message);
                }
                Some(TransportEvent::Closed) | None => {
                    info!("Transport closed");
                    break;
                }
            },
            _ = wake.notified() => {}
            _ = timer => {
                core.lock().poll();
            }
        }
    }

    core.lock().disconnect();
    debug!("Player task terminated");
}

/// Drain the core's outbox onto the transport. Fails once the transport
/// stopped accepting frames.
async fn send_outbound<S: PlaybackSink>(
    core: &Mutex<PlayerCore<S>>,
    connection: &Connection,
) -> Result<(), NetworkError> {
    let messages = core.lock().take_outbound();
    for message in messages {
        let frame = match encode_outbound(&message) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Dropping outbound message: {}", e);
                continue;
            }
        };
        connection.send(frame).await?;
    }
    Ok(())
}

/// Client surface of a running player
///
/// Setters apply to the core immediately, so their effect is observable as
/// soon as they return; the resulting `client/state` report is sent by the
/// player task.
pub struct PlayerHandle<S: PlaybackSink> {
    core: Arc<Mutex<PlayerCore<S>>>,
    wake: Arc<Notify>,
    shutdown: Arc<Notify>,
    task: JoinHandle<()>,
}

impl<S: PlaybackSink> PlayerHandle<S> {
    /// Stop the player: cancels timers and unstarted playback and releases
    /// the transport
    pub fn disconnect(&self) {
        self.core.lock().disconnect();
        self.shutdown.notify_one();
    }

    /// Wait for the player task to finish
    pub async fn join(self) {
        if let Err(e) = self.task.await {
            warn!("Player task failed: {}", e);
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    pub fn set_volume(&self, volume: u8) {
        self.core.lock().set_volume(volume);
        self.wake.notify_one();
    }

    pub fn set_muted(&self, muted: bool) {
        self.core.lock().set_muted(muted);
        self.wake.notify_one();
    }

    pub fn set_sync_delay(&self, delay_ms: u64) {
        self.core.lock().set_sync_delay(delay_ms);
    }

    /// Forward a sink completion
    pub fn on_playback_finished(&self, id: PlaybackId) {
        self.core.lock().on_playback_finished(id);
    }

    pub fn is_connected(&self) -> bool {
        self.core.lock().is_connected()
    }

    pub fn is_playing(&self) -> bool {
        self.core.lock().is_playing()
    }

    pub fn state(&self) -> SessionState {
        self.core.lock().state()
    }

    pub fn current_format(&self) -> Option<StreamFormat> {
        self.core.lock().current_format()
    }

    pub fn volume(&self) -> u8 {
        self.core.lock().volume()
    }

    pub fn muted(&self) -> bool {
        self.core.lock().muted()
    }

    pub fn time_sync_info(&self) -> TimeSyncInfo {
        self.core.lock().time_sync_info()
    }

    pub fn sync_info(&self) -> SyncInfo {
        self.core.lock().sync_info()
    }

    pub fn stats(&self) -> PlayerStats {
        self.core.lock().stats()
    }

    pub fn sync_delay_us(&self) -> i64 {
        self.core.lock().sync_delay_us()
    }

    /// Run `f` against the sink under the player lock
    pub fn with_sink<R>(&self, f: impl FnOnce(&S) -> R) -> R {
        f(self.core.lock().sink())
    }
}
