//! Sendspin Player Application
//!
//! Joins a Sendspin server as a player and logs the playback schedule it
//! would hand to an audio backend.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sendspin_player::{
    audio::TracingSink,
    config::PlayerConfig,
    network::websocket,
    Player,
};

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(name = "sendspin-player")]
#[command(about = "Synchronized Sendspin audio player")]
#[command(version)]
struct Args {
    /// Config file (defaults to the platform config directory)
    #[arg(short, long, env = "SENDSPIN_CONFIG")]
    config: Option<PathBuf>,

    /// Server WebSocket URL
    #[arg(short, long, env = "SENDSPIN_URL")]
    url: Option<String>,

    /// Player name announced to the server
    #[arg(short, long)]
    name: Option<String>,

    /// Jitter buffer delay in milliseconds
    #[arg(long)]
    sync_delay: Option<u64>,

    /// Initial volume (0-100)
    #[arg(long)]
    volume: Option<u8>,

    /// Write the effective config back to the config file
    #[arg(long)]
    save_config: bool,

    /// Seconds between stats reports
    #[arg(long, default_value = "5")]
    stats_interval: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    tracing::info!("Starting Sendspin Player");

    // Load config, then apply overrides
    let config_path = args.config.clone().or_else(PlayerConfig::default_path);
    let mut config = match &config_path {
        Some(path) => PlayerConfig::load_or_default(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => PlayerConfig::default(),
    };

    if let Some(url) = args.url {
        config.client.server_url = url;
    }
    if let Some(name) = args.name {
        config.client.name = name;
    }
    if let Some(delay) = args.sync_delay {
        config.buffer.sync_delay_ms = delay;
    }
    if let Some(volume) = args.volume {
        config.playback.volume = volume;
    }
    config.validate().context("Invalid configuration")?;

    if args.save_config {
        if let Some(path) = &config_path {
            config.save(path)?;
            tracing::info!("Config saved to {}", path.display());
        }
    }

    tracing::info!(
        "Player '{}' ({}), sync delay {}ms",
        config.client.name,
        config.client.client_id,
        config.buffer.sync_delay_ms
    );

    let connection = websocket::connect(&config.client.server_url)
        .await
        .with_context(|| format!("Failed to connect to {}", config.client.server_url))?;

    let player = Player::spawn(config, connection, TracingSink::new());

    let mut stats_timer = tokio::time::interval(Duration::from_secs(args.stats_interval.max(1)));
    stats_timer.tick().await;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutting down");
                player.disconnect();
                break;
            }
            _ = stats_timer.tick() => {
                if player.is_finished() {
                    tracing::info!("Connection ended");
                    break;
                }

                let sync = player.time_sync_info();
                let info = player.sync_info();
                let stats = player.stats();
                tracing::info!(
                    "State {}: offset {:.0}us (rtt {}us, synced {}), {} resyncs, {} drift events",
                    player.state(),
                    sync.offset_us,
                    sync.round_trip_us,
                    sync.synced,
                    info.resync_count,
                    info.drift_events
                );
                tracing::info!(
                    "Buffer: {} received, {} scheduled, {} late ({:.1}%), {} duplicates, {} in flight, {} protocol errors",
                    stats.buffer.received,
                    stats.buffer.scheduled,
                    stats.buffer.late,
                    stats.buffer.late_rate() * 100.0,
                    stats.buffer.duplicates,
                    stats.buffer.in_flight,
                    stats.protocol_errors
                );
            }
        }
    }

    let scheduled = player.with_sink(|sink| sink.scheduled());
    player.join().await;
    tracing::info!("Done, {} segments scheduled", scheduled);

    Ok(())
}
