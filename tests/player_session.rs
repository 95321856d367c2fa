//! End-to-end player sessions against an in-memory server, on paused time

mod common;

use common::{settle, MockServer, RecordingSink, OFFSET_US, SEGMENT_US};
use sendspin_player::{
    audio::PlaybackId,
    config::PlayerConfig,
    protocol::{PlayerCommand, PlayerSyncState, ServerCommand, ServerMessage, WireMessage},
    session::SessionState,
    Player, PlayerHandle,
};

fn spawn() -> (PlayerHandle<RecordingSink>, MockServer) {
    let (connection, server) = MockServer::pair();
    let player = Player::spawn(PlayerConfig::default(), connection, RecordingSink::default());
    (player, server)
}

fn starts(player: &PlayerHandle<RecordingSink>) -> Vec<i64> {
    player.with_sink(|sink| sink.scheduled.iter().map(|p| p.local_start_us).collect())
}

#[tokio::test(start_paused = true)]
async fn test_handshake_and_sync() {
    let (player, mut server) = spawn();

    let report = server.handshake().await;
    assert_eq!(report.state, PlayerSyncState::Synchronized);
    assert_eq!(report.volume, 100);

    let info = player.time_sync_info();
    assert!(info.synced);
    assert!((info.offset_us - OFFSET_US as f64).abs() < 1_000.0);
    assert_eq!(player.state(), SessionState::Synchronized);
    assert!(player.is_connected());
    assert!(!player.is_playing());
}

#[tokio::test(start_paused = true)]
async fn test_out_of_order_arrival_scheduled_in_order() {
    let (player, mut server) = spawn();
    server.handshake().await;
    server.start_stream().await;

    // Delivered as [2, 0, 1], 10ms apart
    server.send_audio(OFFSET_US + 2 * SEGMENT_US).await;
    settle(10).await;
    server.send_audio(OFFSET_US).await;
    settle(10).await;
    server.send_audio(OFFSET_US + SEGMENT_US).await;
    settle(30).await;

    let starts = starts(&player);
    assert_eq!(starts.len(), 3);
    for pair in starts.windows(2) {
        assert!(pair[0] < pair[1]);
        assert!((pair[1] - pair[0] - SEGMENT_US).abs() <= 10_000);
    }
    let order: Vec<i64> = player.with_sink(|sink| {
        sink.scheduled
            .iter()
            .map(|p| p.segment.server_time_us - OFFSET_US)
            .collect()
    });
    assert_eq!(order, vec![0, SEGMENT_US, 2 * SEGMENT_US]);
}

#[tokio::test(start_paused = true)]
async fn test_late_segment_dropped() {
    let (player, mut server) = spawn();
    server.handshake().await;
    server.start_stream().await;

    // Its local start (now 0 + sync delay) passes while we wait
    settle(250).await;
    server.send_audio(OFFSET_US).await;
    settle(30).await;

    assert!(starts(&player).is_empty());
    assert_eq!(player.stats().buffer.late, 1);
}

#[tokio::test(start_paused = true)]
async fn test_timestamp_gap_requests_resync() {
    let (player, mut server) = spawn();
    server.handshake().await;
    server.start_stream().await;

    server.send_audio(OFFSET_US).await;
    settle(30).await;
    server.send_audio(OFFSET_US + SEGMENT_US + 200_000).await;
    settle(30).await;

    let info = player.sync_info();
    assert!(info.resync_count >= 1);
    assert_eq!(info.drift_events, 1);
    assert_eq!(starts(&player).len(), 2);

    // The resync exchange is answered and replaces the estimate
    let request = server.expect_time().await;
    server.answer_time(request).await;
    settle(1).await;
    assert_eq!(player.sync_info().samples, 2);
    assert!(player.time_sync_info().synced);
}

#[tokio::test(start_paused = true)]
async fn test_stream_clear_cancels_unstarted_only() {
    let (player, mut server) = spawn();
    server.handshake().await;
    server.start_stream().await;

    for i in 0..3 {
        server.send_audio(OFFSET_US + i * SEGMENT_US).await;
    }
    settle(30).await;
    assert_eq!(starts(&player).len(), 3);

    // First segment starts at 200ms
    settle(220).await;
    server.clear_stream().await;
    settle(1).await;

    let cancelled = player.with_sink(|sink| sink.cancelled.clone());
    assert_eq!(cancelled, vec![PlaybackId(1), PlaybackId(2)]);
    assert_eq!(player.state(), SessionState::Streaming);

    server.send_audio(OFFSET_US + 5 * SEGMENT_US).await;
    settle(30).await;
    let starts = starts(&player);
    assert_eq!(starts.len(), 4);
    assert!(starts[3] >= starts[0] + SEGMENT_US);
}

#[tokio::test(start_paused = true)]
async fn test_stream_end_reports_synchronized() {
    let (player, mut server) = spawn();
    server.handshake().await;
    server.start_stream().await;
    settle(1).await;
    assert!(player.is_playing());
    assert!(player.current_format().is_some());

    server.end_stream().await;
    let report = server.expect_state().await;

    assert_eq!(report.state, PlayerSyncState::Synchronized);
    assert!(player.current_format().is_none());
    assert!(!player.is_playing());
    assert_eq!(player.state(), SessionState::Synchronized);
}

#[tokio::test(start_paused = true)]
async fn test_volume_and_mute_reported() {
    let (player, mut server) = spawn();
    server.handshake().await;

    player.set_volume(30);
    assert_eq!(player.volume(), 30);
    let report = server.expect_state().await;
    assert_eq!(report.volume, 30);

    server
        .send(ServerMessage::Command(ServerCommand {
            player: Some(PlayerCommand::Mute { mute: true }),
        }))
        .await;
    let report = server.expect_state().await;
    assert!(report.muted);
    assert!(player.muted());
    assert_eq!(
        player.with_sink(|sink| sink.gains.last().copied()),
        Some((30, true))
    );
}

#[tokio::test(start_paused = true)]
async fn test_malformed_frames_do_not_end_session() {
    let (player, mut server) = spawn();
    server.handshake().await;

    server.send_raw(WireMessage::Text("{\"type\":".into())).await;
    server
        .send_raw(WireMessage::Binary(vec![4u8, 0, 0].into()))
        .await;
    settle(1).await;

    assert_eq!(player.stats().protocol_errors, 2);
    assert!(player.is_connected());
}

#[tokio::test(start_paused = true)]
async fn test_sync_delay_applies_to_new_segments() {
    let (player, mut server) = spawn();
    server.handshake().await;
    server.start_stream().await;

    player.set_sync_delay(400);
    assert_eq!(player.sync_delay_us(), 400_000);

    server.send_audio(OFFSET_US).await;
    settle(30).await;
    let starts = starts(&player);
    assert_eq!(starts.len(), 1);
    assert!((starts[0] - 400_000).abs() <= 1_000);
}

#[tokio::test(start_paused = true)]
async fn test_transport_close_cancels_pending_playback() {
    let (player, mut server) = spawn();
    server.handshake().await;
    server.start_stream().await;

    for i in 0..3 {
        server.send_audio(OFFSET_US + i * SEGMENT_US).await;
    }
    settle(30).await;

    server.close().await;
    settle(1).await;

    assert!(!player.is_connected());
    assert_eq!(player.state(), SessionState::Disconnected);
    assert_eq!(player.with_sink(|sink| sink.cancelled.len()), 3);
    // The estimate survives for the next connection
    assert!(player.time_sync_info().synced);
    player.join().await;
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_releases_transport() {
    let (player, mut server) = spawn();
    server.handshake().await;

    player.disconnect();
    assert!(!player.is_connected());
    player.join().await;

    while server.recv().await.is_some() {}
}
