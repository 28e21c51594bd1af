use crate::core::config::{ScoringConfig, SelectionConfig};
use crate::core::metrics::SelectionMetrics;
use crate::core::traits::ProfileStore;
use crate::core::types::{
    AccessPointObservation, BandPreference, Bssid, CandidateKind, CandidateUpdate, EnableState,
    NetworkProfile, ProfileId, SecurityType, Selection, SelectionUpdate, WifiInfo,
};
use crate::selection::blacklist::BlacklistTracker;
use crate::selection::cache::ObservationCache;
use crate::selection::linking;
use crate::selection::scoring::{Scorer, ScoringContext};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

/// 一轮选网的输入状态
#[derive(Debug, Clone)]
pub struct SelectionContext {
    pub force_reselect: bool,
    pub allow_untrusted: bool,
    pub link_debouncing: bool,
    pub connected: bool,
    pub disconnected: bool,
    pub supplicant_transient: bool,
    pub current_profile: Option<ProfileId>,
    pub current_bssid: Option<Bssid>,
    pub current_rssi: i32,
    pub current_frequency: u32,
    pub now: Instant,
}

impl SelectionContext {
    pub fn disconnected(now: Instant) -> Self {
        Self {
            force_reselect: false,
            allow_untrusted: false,
            link_debouncing: false,
            connected: false,
            disconnected: true,
            supplicant_transient: false,
            current_profile: None,
            current_bssid: None,
            current_rssi: 0,
            current_frequency: 0,
            now,
        }
    }

    pub fn from_wifi_info(info: &WifiInfo, allow_untrusted: bool, now: Instant) -> Self {
        Self {
            force_reselect: false,
            allow_untrusted,
            link_debouncing: info.link_debouncing,
            connected: info.is_connected(),
            disconnected: info.is_disconnected(),
            supplicant_transient: info.supplicant_transient,
            current_profile: info.profile_id,
            current_bssid: info.bssid,
            current_rssi: info.rssi,
            current_frequency: info.frequency,
            now,
        }
    }
}

#[derive(Debug, Clone)]
struct Pick {
    profile: Option<ProfileId>,
    observation: AccessPointObservation,
    score: i32,
}

impl Pick {
    /// 分数高者胜，分数相同取信号强者
    fn beats(&self, other: &Option<Pick>) -> bool {
        match other {
            None => true,
            Some(o) => {
                self.score > o.score
                    || (self.score == o.score && self.observation.level > o.observation.level)
            }
        }
    }
}

/// 选网器
///
/// 持有扫描结果缓存和 BSSID 黑名单，网络配置的修改全部经由 [`ProfileStore`]。
pub struct NetworkSelector {
    store: Arc<dyn ProfileStore>,
    scorer: Scorer,
    blacklist: BlacklistTracker,
    cache: ObservationCache,
    config: SelectionConfig,
    band_preference: BandPreference,
    metrics: Arc<SelectionMetrics>,
    last_selection_at: Option<Instant>,
    last_user_selection: Option<(ProfileId, Instant)>,
    last_selected: Option<(ProfileId, Bssid)>,
}

impl NetworkSelector {
    pub fn new(
        store: Arc<dyn ProfileStore>,
        scoring: ScoringConfig,
        config: SelectionConfig,
        metrics: Arc<SelectionMetrics>,
    ) -> Self {
        Self {
            store,
            scorer: Scorer::new(scoring),
            blacklist: BlacklistTracker::new(config.blacklist_threshold, config.blacklist_expiry()),
            cache: ObservationCache::new(config.cache_max_entries, config.cache_trim_to),
            config,
            band_preference: BandPreference::Auto,
            metrics,
            last_selection_at: None,
            last_user_selection: None,
            last_selected: None,
        }
    }

    pub fn store(&self) -> &Arc<dyn ProfileStore> {
        &self.store
    }

    pub fn scorer(&self) -> &Scorer {
        &self.scorer
    }

    pub fn blacklist(&self) -> &BlacklistTracker {
        &self.blacklist
    }

    pub fn cache(&self) -> &ObservationCache {
        &self.cache
    }

    pub fn band_preference(&self) -> BandPreference {
        self.band_preference
    }

    pub fn set_band_preference(&mut self, preference: BandPreference) {
        self.band_preference = preference;
    }

    pub fn set_auto_join_when_associated(&mut self, enabled: bool) {
        self.config.auto_join_when_associated = enabled;
    }

    pub fn last_user_selection(&self) -> Option<(ProfileId, Instant)> {
        self.last_user_selection
    }

    pub fn last_selected(&self) -> Option<(ProfileId, Bssid)> {
        self.last_selected
    }

    /// 当前网络最近看到的信道
    pub fn recent_frequencies(&self, profile: ProfileId, now: Instant) -> Vec<u32> {
        self.cache
            .frequencies(profile, now, self.config.channel_max_age())
    }

    /// 当前连接是否足够好，好到无需重新选网
    fn is_current_qualified(&self, ctx: &SelectionContext) -> bool {
        let Some(current) = ctx.current_profile.and_then(|id| self.store.profile(id)) else {
            log::debug!("Current network unknown to the store, selection needed");
            return false;
        };
        let band = crate::core::types::Band::from_frequency(ctx.current_frequency);

        if !self.band_preference.accepts(band) {
            log::debug!("Current network is on {} against the band preference", band);
            return false;
        }
        if current.ephemeral {
            log::debug!("Current network is ephemeral, selection needed");
            return false;
        }
        if current.is_open() {
            log::debug!("Current network is open, selection needed");
            return false;
        }
        if ctx.current_rssi < self.scorer.config().qualified_rssi(band) {
            log::debug!(
                "Current network RSSI {} below qualified threshold on {}",
                ctx.current_rssi,
                band
            );
            return false;
        }
        true
    }

    fn needs_selection(&self, observations: &[AccessPointObservation], ctx: &SelectionContext) -> bool {
        if observations.is_empty() {
            log::debug!("Empty scan result, skipping selection");
            return false;
        }
        if ctx.link_debouncing {
            log::debug!("Link is debouncing, skipping selection");
            return false;
        }
        if ctx.connected {
            if !self.config.auto_join_when_associated {
                log::debug!("Auto-join while associated is disabled");
                return false;
            }
            if let Some(last) = self.last_selection_at {
                if ctx.now.saturating_duration_since(last) < self.config.min_reselection_interval() {
                    log::debug!("Too soon since the last selection");
                    return false;
                }
            }
            if self.is_current_qualified(ctx) {
                log::debug!("Current network is qualified, skipping selection");
                return false;
            }
            true
        } else if ctx.disconnected {
            true
        } else {
            log::debug!("Supplicant is in a transient state, skipping selection");
            false
        }
    }

    /// 临时禁用到期的网络重新启用，清空上一轮的候选状态
    fn prepare_pass(&mut self, now: Instant) {
        for profile in self.store.saved_profiles() {
            if let EnableState::TemporarilyDisabled { reason, since } = profile.status.enable_state {
                let expired = reason
                    .timeout()
                    .map(|t| now.saturating_duration_since(since) >= t)
                    .unwrap_or(false);
                if expired {
                    log::info!("Re-enabling profile {} after {:?} timeout", profile.id, reason);
                    self.store
                        .update_selection_status(profile.id, SelectionUpdate::Enable, now);
                }
            }
            self.store.update_candidate(profile.id, CandidateUpdate::Reset);
        }
        let swept = self.blacklist.sweep(now);
        if swept > 0 {
            log::debug!("Blacklist sweep released {} BSSIDs", swept);
        }
    }

    /// 选出最佳候选；不需要或无法切换时返回 `None`
    pub fn select_best(
        &mut self,
        observations: &[AccessPointObservation],
        ctx: &SelectionContext,
    ) -> Option<Selection> {
        self.metrics.record_pass();
        if !ctx.force_reselect && !self.needs_selection(observations, ctx) {
            return None;
        }
        let now = ctx.now;
        self.prepare_pass(now);

        let saved = self.store.saved_profiles();
        let current = ctx.current_profile.and_then(|id| self.store.profile(id));
        let scoring_ctx = ScoringContext {
            current_profile: current.as_ref(),
            current_bssid: ctx.current_bssid,
            last_user_selection: self.last_user_selection,
            now,
        };

        let mut best_saved: Option<Pick> = None;
        let mut best_external: Option<Pick> = None;
        let mut best_untrusted: Option<Pick> = None;
        let mut per_profile: BTreeMap<ProfileId, Pick> = BTreeMap::new();
        let mut recorded: Vec<(ProfileId, AccessPointObservation)> = Vec::new();

        for raw in observations {
            if raw.ssid.is_empty() {
                self.metrics.record_empty_ssid();
                continue;
            }
            if self.blacklist.is_suspended(&raw.bssid, now)
                || self.store.is_blacklisted_by_security_layer(&raw.bssid)
            {
                log::debug!("Skipping blacklisted {} ({})", raw.ssid, raw.bssid);
                self.metrics.record_blacklisted();
                continue;
            }
            if raw.level < self.scorer.config().minimum_rssi(raw.band()) {
                self.metrics.record_low_rssi();
                continue;
            }

            let mut matches: Vec<&NetworkProfile> = saved.iter().filter(|p| p.matches(raw)).collect();
            if raw.security() != SecurityType::Eap {
                matches.truncate(1);
            }

            let mut observation = raw.clone();
            for profile in &matches {
                observation = self.cache.record(profile.id, raw.clone());
                recorded.push((profile.id, observation.clone()));
            }

            let untrusted = matches.is_empty() || (matches.len() == 1 && matches[0].ephemeral);
            if untrusted {
                if ctx.allow_untrusted && !self.store.was_ephemeral_deleted(&observation.ssid) {
                    if let Some(external) = observation.external_score {
                        let pick = Pick {
                            profile: matches.first().map(|p| p.id),
                            observation: observation.clone(),
                            score: external,
                        };
                        if pick.beats(&best_untrusted) {
                            best_untrusted = Some(pick);
                        }
                    }
                }
                continue;
            }

            for profile in matches {
                if !profile.is_enabled() {
                    continue;
                }
                if let Some(lock) = profile.bssid_lock {
                    if lock != observation.bssid {
                        continue;
                    }
                }

                if profile.use_external_scores {
                    if let Some(external) = observation.external_score {
                        let pick = Pick {
                            profile: Some(profile.id),
                            observation: observation.clone(),
                            score: external,
                        };
                        if pick.beats(&best_external) {
                            best_external = Some(pick);
                        }
                    }
                    continue;
                }

                let breakdown = self.scorer.breakdown(&observation, profile, &scoring_ctx);
                log::debug!(
                    "{} ({}) level={} for {}: {}",
                    observation.ssid,
                    observation.bssid,
                    observation.level,
                    profile.id,
                    breakdown
                );
                let pick = Pick {
                    profile: Some(profile.id),
                    observation: observation.clone(),
                    score: breakdown.total(),
                };
                let previous = per_profile.get(&profile.id).cloned();
                if pick.beats(&previous) {
                    per_profile.insert(profile.id, pick.clone());
                }
                if pick.beats(&best_saved) {
                    best_saved = Some(pick);
                }
            }
        }

        for (id, _) in &recorded {
            self.store.update_candidate(*id, CandidateUpdate::Seen);
        }
        for (id, pick) in &per_profile {
            self.store.update_candidate(
                *id,
                CandidateUpdate::Candidate {
                    observation: pick.observation.clone(),
                    score: pick.score,
                },
            );
        }

        let (pick, kind) = if let Some(pick) = best_saved {
            (self.follow_connect_choice(pick), CandidateKind::Saved)
        } else if let Some(pick) = best_external {
            (pick, CandidateKind::ExternallyScored)
        } else if let Some(mut pick) = best_untrusted {
            if pick.profile.is_none() {
                match self.store.create_ephemeral_profile(&pick.observation) {
                    Ok(id) => pick.profile = Some(id),
                    Err(e) => {
                        log::warn!("{}", e.to_log_string());
                        return None;
                    }
                }
            }
            (pick, CandidateKind::Untrusted)
        } else {
            log::debug!("No candidate in {} observations", observations.len());
            return None;
        };

        let id = pick.profile?;
        let Some(profile) = self.store.profile(id) else {
            let err = crate::core::error::WlinkError::selection_profile_vanished(id.0, file!());
            log::warn!("{}", err.to_log_string());
            return None;
        };

        self.last_selection_at = Some(now);
        self.last_selected = Some((id, pick.observation.bssid));
        self.metrics.record_selection(kind);
        log::info!(
            "Selected {} '{}' via {} score={} ({:?})",
            id,
            profile.ssid,
            pick.observation.bssid,
            pick.score,
            kind
        );
        Some(Selection {
            profile,
            observation: pick.observation,
            score: pick.score,
            kind,
        })
    }

    /// 沿着用户的连接偏好链走，目标需存在、已启用、本轮有候选
    fn follow_connect_choice(&self, winner: Pick) -> Pick {
        let Some(start) = winner.profile else {
            return winner;
        };
        let mut visited = HashSet::from([start]);
        let mut chosen = winner;
        let mut cursor = self.store.profile(start);

        while let Some(choice) = cursor.as_ref().and_then(|p| p.status.connect_choice) {
            if !visited.insert(choice.profile) {
                log::warn!("Connect choice cycle through {}", choice.profile);
                break;
            }
            let Some(target) = self.store.profile(choice.profile) else {
                log::warn!("Connect choice {} has no saved profile", choice.profile);
                break;
            };
            if !target.is_enabled() {
                break;
            }
            let Some(candidate) = target.status.candidate.clone() else {
                break;
            };
            log::info!(
                "Connect choice overrides {:?} with {}",
                chosen.profile,
                target.id
            );
            chosen = Pick {
                profile: Some(target.id),
                score: target.status.candidate_score.unwrap_or(chosen.score),
                observation: candidate,
            };
            cursor = Some(target);
        }
        chosen
    }

    /// 用户手动选择了 `profile`
    pub fn on_user_selection(&mut self, profile: ProfileId, now: Instant) {
        self.store
            .update_selection_status(profile, SelectionUpdate::Enable, now);
        self.store.clear_connect_choice(profile);
        for other in self.store.saved_profiles() {
            if other.id == profile || !other.status.seen_in_last_selection {
                continue;
            }
            if other.status.connect_choice.map(|c| c.profile) != Some(profile) {
                self.store.record_connect_choice(other.id, profile, now);
            }
        }
        self.last_user_selection = Some((profile, now));
        log::info!("User selected {}", profile);
    }

    /// 返回该 BSSID 是否因此被暂停
    pub fn note_association_rejection(&mut self, bssid: Bssid, now: Instant) -> bool {
        self.cache.note_association_rejection(&bssid);
        self.note_blacklist_rejection(bssid, now)
    }

    pub fn note_authentication_failure(&mut self, bssid: Bssid, now: Instant) -> bool {
        self.cache.note_authentication_failure(&bssid);
        self.note_blacklist_rejection(bssid, now)
    }

    /// `enable = false` 计一次拒绝，`true` 解除
    pub fn track_bssid(&mut self, bssid: Bssid, enable: bool, now: Instant) -> bool {
        if enable {
            self.blacklist.enable(&bssid);
            self.cache.note_blacklisted(&bssid, None);
            false
        } else {
            self.note_blacklist_rejection(bssid, now)
        }
    }

    fn note_blacklist_rejection(&mut self, bssid: Bssid, now: Instant) -> bool {
        let suspended = self.blacklist.note_rejection(bssid, now);
        if suspended {
            self.cache.note_blacklisted(&bssid, Some(now));
        }
        suspended
    }

    /// 连接建立：清除该 BSSID 的黑名单，记录网关并重新计算关联网络
    pub fn on_connected(&mut self, profile: ProfileId, bssid: Option<Bssid>, gateway: Option<Bssid>) {
        if let Some(bssid) = bssid {
            self.blacklist.enable(&bssid);
        }
        if let Some(gateway) = gateway {
            self.store.set_default_gateway(profile, gateway);
        }
        let changes = linking::update_links(
            self.store.as_ref(),
            &self.cache,
            profile,
            self.config.link_max_cached_bssids,
        );
        if changes > 0 {
            log::debug!("{} link changes for {}", changes, profile);
        }
    }

    pub fn forget_all(&mut self) {
        self.store.forget_all();
        self.blacklist.clear();
        self.cache.clear();
        self.last_selection_at = None;
        self.last_user_selection = None;
        self.last_selected = None;
    }
}
