use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use wlink::core::config::EngineConfig;
use wlink::core::types::{Bssid, NetworkProfile, ScanEvent, ScanKind, ScanRecord, SecurityType, WifiInfo};
use wlink::scan::memory::ConnectionCommand;
use wlink::{MemoryConnectionManager, MemoryProfileStore, MemoryScanIssuer, WifiConnectivityService};

fn record(bssid: &str, ssid: &str, level: i32, frequency: u32, caps: &str) -> ScanRecord {
    ScanRecord {
        bssid: bssid.to_string(),
        ssid: ssid.to_string(),
        level,
        frequency,
        capabilities: caps.to_string(),
        seen_at: tokio::time::Instant::now().into_std(),
        external_score: None,
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // 1. 配置：缩短重新选网间隔，其余取默认值
    let config = EngineConfig::from_json_str(
        r#"{ "selection": { "minReselectionIntervalSecs": 1 }, "schedule": { "periodicIntervalMinSecs": 5 } }"#,
    )
    .context("demo configuration")?;

    // 2. 保存两个网络
    let store = MemoryProfileStore::new();
    let home = store.add_profile(NetworkProfile::new("Home", SecurityType::Psk));
    let cafe = store.add_profile(NetworkProfile::new("Cafe", SecurityType::Open));
    println!("Saved profiles: Home={} Cafe={}", home, cafe);

    // 3. 启动服务
    let scanner = MemoryScanIssuer::new();
    let connections = MemoryConnectionManager::new();
    let service = WifiConnectivityService::start(
        config,
        Arc::new(store.clone()),
        Arc::new(scanner.clone()),
        Arc::new(connections.clone()),
    )?;

    // 4. 断开状态下亮屏，调度器立即发起单次扫描
    service.connection_changed(WifiInfo::disconnected())?;
    service.status().await?;
    println!("Scan requests so far: {}", scanner.single_requests().len());

    // 5. 上报扫描结果：安全的 5G 网络胜过信号更强的开放 2.4G 网络
    service.report_scan(ScanEvent::results(
        ScanKind::Single,
        vec![
            record("02:00:00:00:01:01", "Home", -60, 5180, "[WPA2-PSK-CCMP][ESS]"),
            record("02:00:00:00:02:01", "Cafe", -55, 2412, "[ESS]"),
        ],
        true,
    ))?;
    service.status().await?;
    for command in connections.commands() {
        match command {
            ConnectionCommand::Connect(profile, bssid) => println!("Connect {} via {}", profile, bssid),
            ConnectionCommand::Roam(profile, bssid) => println!("Roam {} to {}", profile, bssid),
        }
    }

    // 6. 连上后信号变差，同一网络内出现更好的接入点，触发漫游
    let current: Bssid = "02:00:00:00:01:01".parse().map_err(anyhow::Error::msg)?;
    service.connection_changed(WifiInfo::connected(home, current, -80, 5180))?;
    sleep(Duration::from_millis(1100)).await;
    service.report_scan(ScanEvent::results(
        ScanKind::Single,
        vec![
            record("02:00:00:00:01:01", "Home", -80, 5180, "[WPA2-PSK-CCMP][ESS]"),
            record("02:00:00:00:01:02", "Home", -50, 5240, "[WPA2-PSK-CCMP][ESS]"),
        ],
        true,
    ))?;

    // 7. 熄屏后切换到 PNO
    service.screen_changed(false)?;
    let status = service.status().await?;
    println!("Commands issued: {:?}", connections.commands());
    println!("Status: {}", serde_json::to_string_pretty(&status)?);
    println!("{}", service.export_prometheus());

    service.shutdown().await;
    Ok(())
}
