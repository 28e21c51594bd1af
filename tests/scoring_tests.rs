mod common;

use common::*;
use std::time::Instant;
use wlink::core::config::ScoringConfig;
use wlink::core::types::{NetworkProfile, ProfileId, SecurityType};
use wlink::selection::scoring::{Scorer, ScoringContext};

fn with_id(mut profile: NetworkProfile, id: u32) -> NetworkProfile {
    profile.id = ProfileId(id);
    profile
}

#[test]
fn test_score_monotonic_in_rssi_until_saturation() {
    let scorer = Scorer::default();
    let now = Instant::now();
    let ctx = ScoringContext::idle(now);
    let profile = with_id(psk_profile("Home"), 1);

    for (frequency, saturation) in [(2412, -60), (5180, -57)] {
        let mut previous = i32::MIN;
        for level in -100..=-20 {
            let score = scorer.score(
                &psk_observation(bssid(1, 1), "Home", level, frequency, now),
                &profile,
                &ctx,
            );
            assert!(score >= previous, "score dropped at {} dBm", level);
            if level > saturation {
                assert_eq!(score, previous, "score grew above saturation at {} dBm", level);
            }
            previous = score;
        }
    }
}

#[test]
fn test_current_network_and_same_bssid_bonuses() {
    let scorer = Scorer::default();
    let now = Instant::now();
    let mut home = with_id(psk_profile("Home"), 1);
    let mut office = with_id(psk_profile("Office"), 2);
    let stranger = with_id(psk_profile("Elsewhere"), 3);
    home.linked.insert(office.id);
    office.linked.insert(home.id);

    let obs = psk_observation(bssid(2, 1), "Home", -60, 2412, now);
    let ctx = ScoringContext {
        current_profile: Some(&home),
        current_bssid: Some(bssid(2, 1)),
        last_user_selection: None,
        now,
    };

    let b = scorer.breakdown(&obs, &home, &ctx);
    assert_eq!(b.current_network, 16);
    assert_eq!(b.same_bssid, 24);
    assert_eq!(b.total(), 180 + 16 + 24);

    // 关联网络同样算作当前网络
    let linked = scorer.breakdown(&obs, &office, &ctx);
    assert_eq!(linked.current_network, 16);

    let other = scorer.breakdown(
        &psk_observation(bssid(2, 9), "Elsewhere", -60, 2412, now),
        &stranger,
        &ctx,
    );
    assert_eq!(other.current_network, 0);
    assert_eq!(other.same_bssid, 0);
}

#[test]
fn test_security_bonus_levels() {
    let scorer = Scorer::default();
    let now = Instant::now();
    let ctx = ScoringContext::idle(now);
    let obs = open_observation(bssid(3, 1), "Net", -60, 2412, now);

    let open = with_id(open_profile("Net"), 1);
    let psk = with_id(psk_profile("Net"), 2);
    let eap = with_id(eap_profile("Net"), 3);
    let mut passpoint = with_id(NetworkProfile::new("Net", SecurityType::Psk), 4);
    passpoint.passpoint = true;

    assert_eq!(scorer.breakdown(&obs, &open, &ctx).security, 0);
    assert_eq!(scorer.breakdown(&obs, &psk, &ctx).security, 80);
    assert_eq!(scorer.breakdown(&obs, &eap, &ctx).security, 100);
    assert_eq!(scorer.breakdown(&obs, &passpoint, &ctx).security, 100);
}

#[test]
fn test_custom_config_changes_weights() {
    let config = ScoringConfig {
        band_bonus_5ghz: 100,
        ..ScoringConfig::default()
    };
    let scorer = Scorer::new(config);
    let now = Instant::now();
    let profile = with_id(open_profile("Net"), 1);

    let score = scorer.score(
        &open_observation(bssid(4, 1), "Net", -57, 5180, now),
        &profile,
        &ScoringContext::idle(now),
    );
    assert_eq!(score, (85 - 57) * 4 + 100);
}

#[test]
fn test_unknown_band_uses_24ghz_thresholds() {
    let scorer = Scorer::default();
    let now = Instant::now();
    let profile = with_id(open_profile("Net"), 1);

    // 60 GHz 之类的频率不属于任何已知频段
    let score = scorer.score(
        &open_observation(bssid(5, 1), "Net", -40, 60480, now),
        &profile,
        &ScoringContext::idle(now),
    );
    assert_eq!(score, 100);
}
