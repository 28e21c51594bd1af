#![allow(dead_code)]
//! Common test utilities and helpers
//!
//! Shared builders for profiles, observations and scan records, plus a
//! ready-made orchestrator wired to an in-memory store.

use std::sync::Arc;
use std::time::{Duration, Instant};

use wlink::core::config::EngineConfig;
use wlink::core::metrics::SelectionMetrics;
use wlink::core::types::{
    AccessPointObservation, Bssid, NetworkProfile, ProfileId, ScanRecord, SecurityType,
};
use wlink::scan::orchestrator::{Action, ScanOrchestrator};
use wlink::selection::selector::NetworkSelector;
use wlink::MemoryProfileStore;

pub const PSK_CAPS: &str = "[WPA2-PSK-CCMP][ESS]";
pub const EAP_CAPS: &str = "[WPA2-EAP-CCMP][ESS]";
pub const OPEN_CAPS: &str = "[ESS]";

/// Initialise env_logger once; repeated calls are ignored
pub fn init_logger() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug"))
        .is_test(true)
        .try_init();
}

// ==================== Test Data Generators ====================

/// BSSID `02:00:00:00:<a>:<b>`
pub fn bssid(a: u8, b: u8) -> Bssid {
    Bssid([0x02, 0, 0, 0, a, b])
}

pub fn psk_profile(ssid: &str) -> NetworkProfile {
    NetworkProfile::new(ssid, SecurityType::Psk)
}

pub fn open_profile(ssid: &str) -> NetworkProfile {
    NetworkProfile::new(ssid, SecurityType::Open)
}

pub fn eap_profile(ssid: &str) -> NetworkProfile {
    NetworkProfile::new(ssid, SecurityType::Eap)
}

pub fn psk_observation(
    bssid: Bssid,
    ssid: &str,
    level: i32,
    frequency: u32,
    now: Instant,
) -> AccessPointObservation {
    AccessPointObservation::new(bssid, ssid, level, frequency, now).with_capabilities(PSK_CAPS)
}

pub fn open_observation(
    bssid: Bssid,
    ssid: &str,
    level: i32,
    frequency: u32,
    now: Instant,
) -> AccessPointObservation {
    AccessPointObservation::new(bssid, ssid, level, frequency, now).with_capabilities(OPEN_CAPS)
}

pub fn psk_record(bssid: Bssid, ssid: &str, level: i32, frequency: u32, now: Instant) -> ScanRecord {
    ScanRecord {
        bssid: bssid.to_string(),
        ssid: ssid.to_string(),
        level,
        frequency,
        capabilities: PSK_CAPS.to_string(),
        seen_at: now,
        external_score: None,
    }
}

// ==================== Fixtures ====================

pub fn new_selector(store: &MemoryProfileStore) -> NetworkSelector {
    let config = EngineConfig::default();
    NetworkSelector::new(
        Arc::new(store.clone()),
        config.scoring,
        config.selection,
        Arc::new(SelectionMetrics::new()),
    )
}

pub struct OrchestratorFixture {
    pub store: MemoryProfileStore,
    pub metrics: Arc<SelectionMetrics>,
    pub orchestrator: ScanOrchestrator,
    pub start: Instant,
}

impl OrchestratorFixture {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        init_logger();
        let store = MemoryProfileStore::new();
        let metrics = Arc::new(SelectionMetrics::new());
        let selector = NetworkSelector::new(
            Arc::new(store.clone()),
            config.scoring.clone(),
            config.selection.clone(),
            metrics.clone(),
        );
        let orchestrator = ScanOrchestrator::new(selector, &config, metrics.clone());
        Self {
            store,
            metrics,
            orchestrator,
            start: Instant::now(),
        }
    }

    pub fn at(&self, secs: u64) -> Instant {
        self.start + Duration::from_secs(secs)
    }

    pub fn add(&self, profile: NetworkProfile) -> ProfileId {
        self.store.add_profile(profile)
    }
}

// ==================== Assertion Helpers ====================

pub fn single_scans(actions: &[Action]) -> usize {
    actions
        .iter()
        .filter(|a| matches!(a, Action::StartSingleScan(_)))
        .count()
}

pub fn connects(actions: &[Action]) -> Vec<(ProfileId, Bssid)> {
    actions
        .iter()
        .filter_map(|a| match a {
            Action::Connect { profile, bssid } => Some((*profile, *bssid)),
            _ => None,
        })
        .collect()
}

pub fn roams(actions: &[Action]) -> Vec<(ProfileId, Bssid)> {
    actions
        .iter()
        .filter_map(|a| match a {
            Action::Roam { profile, bssid } => Some((*profile, *bssid)),
            _ => None,
        })
        .collect()
}

/// 找到某类定时器最后一次布置的序号与延迟
pub fn armed(actions: &[Action], kind: wlink::scan::TimerKind) -> Option<(u64, Duration)> {
    actions.iter().rev().find_map(|a| match a {
        Action::ArmTimer {
            kind: k,
            serial,
            delay,
        } if *k == kind => Some((*serial, *delay)),
        _ => None,
    })
}
