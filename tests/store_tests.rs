mod common;

use common::*;
use std::time::{Duration, Instant};
use wlink::core::traits::ProfileStore;
use wlink::core::types::{
    CandidateUpdate, DisableReason, EnableState, SelectionUpdate, WifiInfo,
};
use wlink::selection::cache::ObservationCache;
use wlink::selection::linking::update_links;
use wlink::MemoryProfileStore;

#[test]
fn test_store_assigns_sequential_ids() {
    let store = MemoryProfileStore::new();
    let a = store.add_profile(psk_profile("A"));
    let b = store.add_profile(psk_profile("B"));
    assert_ne!(a, b);
    assert_eq!(store.len(), 2);
    assert_eq!(
        store.saved_profiles().iter().map(|p| p.id).collect::<Vec<_>>(),
        vec![a, b]
    );
}

#[test]
fn test_disable_counters_reach_threshold() {
    let store = MemoryProfileStore::new();
    let id = store.add_profile(psk_profile("Home"));
    let now = Instant::now();

    for _ in 0..4 {
        assert!(!store.update_selection_status(
            id,
            SelectionUpdate::Disable(DisableReason::AuthenticationFailure),
            now
        ));
    }
    assert!(store.profile(id).unwrap().is_enabled());

    assert!(store.update_selection_status(
        id,
        SelectionUpdate::Disable(DisableReason::AuthenticationFailure),
        now
    ));
    let profile = store.profile(id).unwrap();
    assert!(profile.status.enable_state.is_temporarily_disabled());
    assert_eq!(
        profile.status.enable_state.disable_reason(),
        Some(DisableReason::AuthenticationFailure)
    );
    assert!(store.enabled_profiles().is_empty());

    assert!(store.update_selection_status(id, SelectionUpdate::Enable, now));
    let profile = store.profile(id).unwrap();
    assert!(profile.is_enabled());
    assert!(profile.status.disable_counters.is_empty());
}

#[test]
fn test_permanent_disable_is_sticky() {
    let store = MemoryProfileStore::new();
    let id = store.add_profile(psk_profile("Home"));
    let now = Instant::now();

    assert!(store.update_selection_status(id, SelectionUpdate::Disable(DisableReason::ByUser), now));
    assert!(matches!(
        store.profile(id).unwrap().status.enable_state,
        EnableState::PermanentlyDisabled { reason: DisableReason::ByUser, .. }
    ));
    assert!(!store.update_selection_status(
        id,
        SelectionUpdate::Disable(DisableReason::BadLink),
        now + Duration::from_secs(1)
    ));
}

#[test]
fn test_unknown_profile_updates_are_ignored() {
    let store = MemoryProfileStore::new();
    let ghost = wlink::core::types::ProfileId(42);
    assert!(!store.update_selection_status(ghost, SelectionUpdate::Enable, Instant::now()));
    store.update_candidate(ghost, CandidateUpdate::Seen);
    assert!(store.profile(ghost).is_none());
}

#[test]
fn test_links_are_symmetric_and_cleaned_on_remove() {
    let store = MemoryProfileStore::new();
    let a = store.add_profile(psk_profile("A"));
    let b = store.add_profile(psk_profile("B"));
    let now = Instant::now();

    store.link_profiles(a, b);
    store.link_profiles(a, a);
    assert!(store.profile(a).unwrap().is_linked(b));
    assert!(store.profile(b).unwrap().is_linked(a));
    assert!(!store.profile(a).unwrap().is_linked(a));

    store.record_connect_choice(b, a, now);
    store.remove_profile(a);
    let b_profile = store.profile(b).unwrap();
    assert!(b_profile.linked.is_empty());
    assert!(b_profile.status.connect_choice.is_none());
}

#[test]
fn test_ephemeral_profiles_are_reused_and_remembered() {
    let store = MemoryProfileStore::new();
    let now = Instant::now();
    let obs = open_observation(bssid(1, 1), "Cafe", -60, 2412, now);

    let first = store.create_ephemeral_profile(&obs).unwrap();
    let second = store
        .create_ephemeral_profile(&open_observation(bssid(1, 2), "Cafe", -70, 2437, now))
        .unwrap();
    assert_eq!(first, second);
    assert!(store.profile(first).unwrap().use_external_scores);

    store.remove_profile(first);
    assert!(store.was_ephemeral_deleted("Cafe"));

    let nameless = open_observation(bssid(1, 3), "", -60, 2412, now);
    let err = store.create_ephemeral_profile(&nameless).unwrap_err();
    assert_eq!(err.code().to_string(), "WL-0502");
}

#[test]
fn test_linking_by_shared_gateway() {
    let store = MemoryProfileStore::new();
    let a = store.add_profile(psk_profile("Home-2G"));
    let b = store.add_profile(psk_profile("Home-5G"));
    let c = store.add_profile(psk_profile("Neighbour"));
    store.set_default_gateway(a, bssid(9, 9));
    store.set_default_gateway(b, bssid(9, 9));
    store.set_default_gateway(c, bssid(8, 8));

    let cache = ObservationCache::default();
    assert_eq!(update_links(&store, &cache, a, 6), 1);
    assert!(store.profile(b).unwrap().is_linked(a));
    assert!(!store.profile(c).unwrap().is_linked(a));
    assert!(store.profile(a).unwrap().has_ever_connected);

    // 网关变化后解除关联
    store.set_default_gateway(b, bssid(7, 7));
    assert_eq!(update_links(&store, &cache, a, 6), 1);
    assert!(!store.profile(a).unwrap().is_linked(b));
}

#[test]
fn test_linking_by_bssid_prefix() {
    let store = MemoryProfileStore::new();
    let a = store.add_profile(psk_profile("Home-2G"));
    let b = store.add_profile(psk_profile("Home-5G"));
    let open = store.add_profile(open_profile("Guest"));
    let now = Instant::now();

    let mut cache = ObservationCache::default();
    // 同一台设备的两个射频，只有最后一个字节不同
    cache.record(a, psk_observation(bssid(3, 0x10), "Home-2G", -50, 2412, now));
    cache.record(b, psk_observation(bssid(3, 0x11), "Home-5G", -50, 5180, now));
    cache.record(open, open_observation(bssid(3, 0x12), "Guest", -50, 2412, now));

    assert_eq!(update_links(&store, &cache, a, 6), 1);
    assert!(store.profile(a).unwrap().is_linked(b));
    assert!(!store.profile(a).unwrap().is_linked(open));

    // 接入点太多的网络不参与前缀关联
    assert_eq!(update_links(&store, &cache, a, 0), 1);
    assert!(!store.profile(a).unwrap().is_linked(b));
}

#[test]
fn test_cache_carries_history_and_trims() {
    let mut cache = ObservationCache::new(4, 2);
    let profile = wlink::core::types::ProfileId(1);
    let t0 = Instant::now();

    cache.record(profile, psk_observation(bssid(4, 1), "Home", -50, 2412, t0));
    cache.note_association_rejection(&bssid(4, 1));
    let later = t0 + Duration::from_secs(10);
    let refreshed = cache.record(profile, psk_observation(bssid(4, 1), "Home", -55, 2412, later));
    assert_eq!(refreshed.history.association_rejections, 1);
    assert_eq!(refreshed.first_seen, t0);
    assert_eq!(refreshed.last_seen, later);

    for i in 2..=5u8 {
        let at = t0 + Duration::from_secs(10 + u64::from(i));
        cache.record(profile, psk_observation(bssid(4, i), "Home", -60, 5180, at));
    }
    // 超过 4 条时只留最近的 2 条
    assert_eq!(cache.bssids(profile), vec![bssid(4, 4), bssid(4, 5)]);
}

#[test]
fn test_connection_records_gateway_through_orchestrator() {
    let mut f = OrchestratorFixture::new();
    let home = f.add(psk_profile("Home"));
    let mut info = WifiInfo::connected(home, bssid(5, 1), -50, 2412);
    info.gateway = Some(bssid(5, 254));
    f.orchestrator.on_wifi_state(info, f.at(0));

    let profile = f.store.profile(home).unwrap();
    assert_eq!(profile.default_gateway, Some(bssid(5, 254)));
    assert!(profile.has_ever_connected);
}
