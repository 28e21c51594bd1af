mod common;

use common::*;
use std::sync::Arc;
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};
use wlink::core::config::EngineConfig;
use wlink::core::types::{ScanEvent, ScanKind, WifiInfo};
use wlink::scan::memory::ConnectionCommand;
use wlink::scan::ScanMode;
use wlink::{
    MemoryConnectionManager, MemoryProfileStore, MemoryScanIssuer, ServiceHandle,
    WifiConnectivityService,
};

struct Harness {
    store: MemoryProfileStore,
    scanner: MemoryScanIssuer,
    connections: MemoryConnectionManager,
    handle: ServiceHandle,
}

fn start_service() -> Harness {
    init_logger();
    let store = MemoryProfileStore::new();
    let scanner = MemoryScanIssuer::new();
    let connections = MemoryConnectionManager::new();
    let handle = WifiConnectivityService::start(
        EngineConfig::default(),
        Arc::new(store.clone()),
        Arc::new(scanner.clone()),
        Arc::new(connections.clone()),
    )
    .expect("default config is valid");
    Harness {
        store,
        scanner,
        connections,
        handle,
    }
}

#[tokio::test(start_paused = true)]
async fn test_disconnected_scan_leads_to_connect() {
    let h = start_service();
    let home = h.store.add_profile(psk_profile("Home"));

    assert_ok!(h.handle.connection_changed(WifiInfo::disconnected()));
    let status = h.handle.status().await.unwrap();
    assert_eq!(status.scan.mode, ScanMode::PeriodicScan);
    assert_eq!(h.scanner.single_requests().len(), 1);

    let now = tokio::time::Instant::now().into_std();
    assert_ok!(h.handle.report_scan(ScanEvent::results(
        ScanKind::Single,
        vec![psk_record(bssid(1, 1), "Home", -55, 2412, now)],
        true,
    )));
    let status = h.handle.status().await.unwrap();
    assert_eq!(status.metrics.connection_attempts, 1);
    assert_eq!(
        h.connections.commands(),
        vec![ConnectionCommand::Connect(home, bssid(1, 1))]
    );

    h.handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_periodic_timer_drives_next_scan() {
    let h = start_service();
    assert_ok!(h.handle.connection_changed(WifiInfo::disconnected()));
    h.handle.status().await.unwrap();
    assert_eq!(h.scanner.single_requests().len(), 1);

    tokio::time::sleep(Duration::from_secs(21)).await;
    let status = h.handle.status().await.unwrap();
    assert_eq!(h.scanner.single_requests().len(), 2);
    assert_eq!(status.scan.periodic_interval_secs, 80);

    h.handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_scan_issue_failures_retry_then_give_up() {
    let h = start_service();
    h.scanner.set_failure(true);
    assert_ok!(h.handle.connection_changed(WifiInfo::disconnected()));

    // 5 次重试，每次间隔 2 秒，都在第一个周期定时器之前
    tokio::time::sleep(Duration::from_secs(15)).await;
    let status = h.handle.status().await.unwrap();

    assert_eq!(h.scanner.single_requests().len(), 6);
    assert_eq!(status.metrics.single_scans_started, 6);
    assert_eq!(status.metrics.single_scan_failures, 6);
    assert_eq!(status.metrics.scan_retries_exhausted, 1);
    assert_eq!(h.handle.error_count(301), 6);
    assert_eq!(status.errors_total, 6);
    assert_eq!(status.top_errors, vec![(301, 6)]);

    h.handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_screen_off_switches_to_pno_and_back() {
    let h = start_service();
    let home = h.store.add_profile(psk_profile("Home"));

    assert_ok!(h
        .handle
        .connection_changed(WifiInfo::connected(home, bssid(2, 1), -50, 2412)));
    assert_ok!(h.handle.screen_changed(false));
    let status = h.handle.status().await.unwrap();
    assert_eq!(status.scan.mode, ScanMode::ConnectedPno);
    assert!(status.scan.pno_active);
    assert_eq!(h.scanner.pno_requests().len(), 1);

    assert_ok!(h.handle.screen_changed(true));
    let status = h.handle.status().await.unwrap();
    assert_eq!(status.scan.mode, ScanMode::PeriodicScan);
    assert_eq!(h.scanner.pno_stop_count(), 1);

    h.handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_connect_failure_is_recorded() {
    let h = start_service();
    h.store.add_profile(psk_profile("Home"));
    h.connections.set_failure(true);

    assert_ok!(h.handle.connection_changed(WifiInfo::disconnected()));
    let now = tokio::time::Instant::now().into_std();
    assert_ok!(h.handle.report_scan(ScanEvent::results(
        ScanKind::Single,
        vec![psk_record(bssid(3, 1), "Home", -55, 2412, now)],
        true,
    )));
    h.handle.status().await.unwrap();

    assert_eq!(h.connections.commands().len(), 1);
    assert_eq!(h.handle.error_count(601), 1);

    h.handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_handle_fails_after_shutdown() {
    let h = start_service();
    h.handle.shutdown().await;

    let err = assert_err!(h.handle.screen_changed(false));
    assert_eq!(err.code().to_string(), "WL-0104");
    assert!(h.handle.status().await.is_err());
}

#[tokio::test]
async fn test_invalid_config_is_rejected() {
    let mut config = EngineConfig::default();
    config.scoring.rssi_slope = 0;

    let result = WifiConnectivityService::start(
        config,
        Arc::new(MemoryProfileStore::new()),
        Arc::new(MemoryScanIssuer::new()),
        Arc::new(MemoryConnectionManager::new()),
    );
    let err = result.err().expect("config rejected");
    assert_eq!(err.code().to_string(), "WL-0202");
}

#[tokio::test(start_paused = true)]
async fn test_prometheus_export_reflects_activity() {
    let h = start_service();
    assert_ok!(h.handle.connection_changed(WifiInfo::disconnected()));
    h.handle.status().await.unwrap();

    let text = h.handle.export_prometheus();
    assert!(text.contains("wlink_scans_started_total{kind=\"Single\"} 1"));
    assert_eq!(h.handle.metrics().single_scans_started, 1);

    h.handle.shutdown().await;
}
