//! Connection supervisor behaviour against a scripted serial link.

mod common;

use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use btsms_bridge::bluetooth::SPP_UUID;
use btsms_bridge::config::AlertConfig;
use btsms_bridge::error::ConnectError;
use btsms_bridge::platform::{Location, PermissionConfig};
use btsms_bridge::{
    AlertDispatcher, DisconnectReason, LinkState, StatusPublisher, Supervisor, SupervisorConfig,
    SupervisorHandle,
};

use common::{wait_until, MockLink, MockStore, MockTransport, RecordingSink, SlowLocation};

const CONNECTING: &str = "Bluetooth status: trying to connect...";
const CONNECTED: &str = "Bluetooth status: connected";
const DELAY: Duration = Duration::from_secs(5);

struct Harness {
    sink: Arc<RecordingSink>,
    transport: Arc<MockTransport>,
    handle: SupervisorHandle,
}

fn start(link: Arc<MockLink>, permissions: PermissionConfig) -> Harness {
    let permissions = Arc::new(permissions);
    let sink = Arc::new(RecordingSink::default());
    let transport = Arc::new(MockTransport::default());
    let store = MockStore::new("+15550100");

    let location = Arc::new(SlowLocation {
        delay: Duration::from_millis(100),
        location: Some(Location {
            latitude: 37.5665,
            longitude: 126.978,
        }),
    });

    let dispatcher = AlertDispatcher::new(
        &store,
        permissions.clone(),
        transport.clone(),
        location,
        &AlertConfig::default(),
    );
    let publisher = StatusPublisher::new(sink.clone(), permissions.clone());

    let config = SupervisorConfig {
        peer_name: "HC-06".to_string(),
        service_id: SPP_UUID,
        read_buffer_size: 1024,
        reconnect_delay: DELAY,
    };

    let handle = Supervisor::new(link, dispatcher, publisher, permissions, config).start();

    Harness {
        sink,
        transport,
        handle,
    }
}

async fn wait_connected(handle: &SupervisorHandle) {
    assert!(wait_until(Duration::from_secs(30), || handle.state() == LinkState::Connected).await);
}

#[tokio::test(start_paused = true)]
async fn test_failed_attempts_are_spaced_by_reconnect_delay() {
    let link = MockLink::with_open_delay(Duration::from_secs(1));
    let h = start(link.clone(), PermissionConfig::default());

    assert!(wait_until(Duration::from_secs(120), || link.open_count() >= 4).await);

    let times = link.open_times();
    for pair in times.windows(2) {
        assert!(pair[1] - pair[0] >= DELAY);
    }
    assert_eq!(link.max_in_flight(), 1);

    h.handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_connect_failures_publish_disconnected() {
    let link = MockLink::new();
    link.push_failure(ConnectError::ConnectFailed("page timeout".to_string()));
    let h = start(link.clone(), PermissionConfig::default());

    assert!(
        wait_until(Duration::from_secs(2), || matches!(
            h.handle.state(),
            LinkState::Disconnected(DisconnectReason::ConnectFailed(_))
        ))
        .await
    );
    assert!(h.sink.bodies().iter().all(|b| b == CONNECTING));

    h.handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_disabled_adapter_waits_for_manual_reconnect() {
    let link = MockLink::new();
    link.set_adapter(false);
    let h = start(link.clone(), PermissionConfig::default());

    tokio::time::sleep(Duration::from_secs(60)).await;

    assert_eq!(link.open_count(), 0);
    assert_eq!(h.sink.bodies(), vec![CONNECTING.to_string()]);
    assert_eq!(
        h.handle.state(),
        LinkState::Disconnected(DisconnectReason::AdapterDisabled)
    );

    link.set_adapter(true);
    let _peer = link.push_stream();
    h.handle.reconnect();

    wait_connected(&h.handle).await;
    assert_eq!(link.open_count(), 1);

    h.handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_missing_serial_capability_does_not_attempt() {
    let link = MockLink::new();
    let permissions = PermissionConfig {
        serial_connect: false,
        ..Default::default()
    };
    let h = start(link.clone(), permissions);

    tokio::time::sleep(Duration::from_secs(30)).await;

    assert_eq!(link.open_count(), 0);
    assert_eq!(
        h.handle.state(),
        LinkState::Disconnected(DisconnectReason::PermissionDenied)
    );

    h.handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_peer_not_found_waits_for_reconnect() {
    let link = MockLink::new();
    link.push_failure(ConnectError::PeerNotFound("HC-06".to_string()));
    let h = start(link.clone(), PermissionConfig::default());

    tokio::time::sleep(Duration::from_secs(60)).await;

    assert_eq!(link.open_count(), 1);
    assert_eq!(
        h.handle.state(),
        LinkState::Disconnected(DisconnectReason::PeerNotFound)
    );

    let _peer = link.push_stream();
    h.handle.reconnect();
    wait_connected(&h.handle).await;

    h.handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_connect_publishes_notification_sequence() {
    let link = MockLink::new();
    let _peer = link.push_stream();
    let h = start(link.clone(), PermissionConfig::default());

    wait_connected(&h.handle).await;

    assert_eq!(
        h.sink.bodies(),
        vec![CONNECTING.to_string(), CONNECTED.to_string()]
    );

    h.handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_notifications_skipped_without_capability() {
    let link = MockLink::new();
    let _peer = link.push_stream();
    let permissions = PermissionConfig {
        post_notification: false,
        ..Default::default()
    };
    let h = start(link.clone(), permissions);

    wait_connected(&h.handle).await;
    assert!(h.sink.bodies().is_empty());

    h.handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_only_exact_trigger_dispatches() {
    let link = MockLink::new();
    let peer = link.push_stream();
    let h = start(link.clone(), PermissionConfig::default());

    wait_connected(&h.handle).await;

    peer.send("0");
    peer.send("1\r\n");
    peer.send("xyz");

    assert!(wait_until(Duration::from_secs(5), || h.transport.send_count() >= 1).await);
    tokio::time::sleep(Duration::from_secs(5)).await;

    let sent = h.transport.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, "+15550100");
    assert!(sent[0].1.concat().contains("https://maps.google.com/?q=37.5665,126.978"));
    assert_eq!(h.handle.state(), LinkState::Connected);

    h.handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_read_continues_while_dispatch_runs() {
    let link = MockLink::new();
    let peer = link.push_stream();
    let h = start(link.clone(), PermissionConfig::default());

    wait_connected(&h.handle).await;

    // Two triggers back to back: each dispatch waits on the location
    // lookup, so the second is only seen if reading carries on.
    peer.send("1");
    peer.send("1");

    assert!(wait_until(Duration::from_secs(5), || h.transport.send_count() == 2).await);

    h.handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_read_error_reconnects_after_delay() {
    let link = MockLink::new();
    let peer = link.push_stream();
    let h = start(link.clone(), PermissionConfig::default());

    wait_connected(&h.handle).await;

    let failed_at = Instant::now();
    peer.fail("connection reset");

    assert!(
        wait_until(Duration::from_secs(2), || matches!(
            h.handle.state(),
            LinkState::Disconnected(DisconnectReason::ReadError(_))
        ))
        .await
    );
    assert!(peer.is_closed());
    assert_eq!(h.sink.bodies().last().map(String::as_str), Some(CONNECTING));

    assert!(wait_until(Duration::from_secs(30), || link.open_count() == 2).await);
    assert!(link.open_times()[1] - failed_at >= DELAY);

    h.handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_panicking_read_reconnects_after_delay() {
    let link = MockLink::new();
    let peer = link.push_stream();
    let h = start(link.clone(), PermissionConfig::default());

    wait_connected(&h.handle).await;

    let crashed_at = Instant::now();
    peer.crash();

    assert!(
        wait_until(Duration::from_secs(2), || matches!(
            h.handle.state(),
            LinkState::Disconnected(DisconnectReason::ReadError(_))
        ))
        .await
    );
    assert_eq!(h.sink.bodies().last().map(String::as_str), Some(CONNECTING));

    assert!(wait_until(Duration::from_secs(30), || link.open_count() == 2).await);
    assert!(link.open_times()[1] - crashed_at >= DELAY);

    h.handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_remote_close_reconnects() {
    let link = MockLink::new();
    let first = link.push_stream();
    let _second = link.push_stream();
    let h = start(link.clone(), PermissionConfig::default());

    wait_connected(&h.handle).await;
    first.hang_up();

    assert!(wait_until(Duration::from_secs(30), || link.open_count() == 2).await);
    wait_connected(&h.handle).await;
    assert!(first.is_closed());

    h.handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_reconnect_ignored_while_connected() {
    let link = MockLink::new();
    let _peer = link.push_stream();
    let h = start(link.clone(), PermissionConfig::default());

    wait_connected(&h.handle).await;

    h.handle.reconnect();
    h.handle.reconnect();
    tokio::time::sleep(Duration::from_secs(30)).await;

    assert_eq!(link.open_count(), 1);
    assert_eq!(h.handle.state(), LinkState::Connected);

    h.handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_reconnect_ignored_during_attempt() {
    let link = MockLink::with_open_delay(Duration::from_secs(3));
    let h = start(link.clone(), PermissionConfig::default());

    assert!(wait_until(Duration::from_secs(1), || link.open_count() == 1).await);
    h.handle.reconnect();

    assert!(wait_until(Duration::from_secs(60), || link.open_count() >= 3).await);
    assert_eq!(link.max_in_flight(), 1);

    // The request did not cut the retry delay short.
    let times = link.open_times();
    assert!(times[1] - times[0] >= Duration::from_secs(3) + DELAY);

    h.handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_cancels_pending_retry() {
    let link = MockLink::new();
    let h = start(link.clone(), PermissionConfig::default());

    assert!(wait_until(Duration::from_secs(1), || link.open_count() == 1).await);

    let started = Instant::now();
    h.handle.shutdown().await;
    assert!(started.elapsed() < DELAY);

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(link.open_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_while_connected_closes_stream() {
    let link = MockLink::new();
    let peer = link.push_stream();
    let h = start(link.clone(), PermissionConfig::default());

    wait_connected(&h.handle).await;
    h.handle.shutdown().await;

    assert!(peer.is_closed());
    assert_eq!(h.sink.bodies().last().map(String::as_str), Some(CONNECTING));
    assert_eq!(link.open_count(), 1);
}
