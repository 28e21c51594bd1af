use crate::core::error::{Result, WlinkError};
use crate::core::traits::ProfileStore;
use crate::core::types::{
    AccessPointObservation, Bssid, CandidateUpdate, EnableState, NetworkProfile, ProfileId,
    SelectionUpdate,
};
use crate::utils::dashmap::{clear_dashmap, modify_entry, sorted_values_where};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// 进程内的网络配置存储，不做持久化
#[derive(Clone)]
pub struct MemoryProfileStore {
    profiles: Arc<DashMap<ProfileId, NetworkProfile>>,
    next_id: Arc<AtomicU32>,
    deleted_ephemerals: Arc<Mutex<BTreeSet<String>>>,
    security_blacklist: Arc<Mutex<BTreeSet<Bssid>>>,
}

impl MemoryProfileStore {
    pub fn new() -> Self {
        Self {
            profiles: Arc::new(DashMap::new()),
            next_id: Arc::new(AtomicU32::new(1)),
            deleted_ephemerals: Arc::new(Mutex::new(BTreeSet::new())),
            security_blacklist: Arc::new(Mutex::new(BTreeSet::new())),
        }
    }

    /// 保存网络并分配 ID，传入的 `id` 字段会被忽略
    pub fn add_profile(&self, mut profile: NetworkProfile) -> ProfileId {
        let id = ProfileId(self.next_id.fetch_add(1, Ordering::Relaxed));
        profile.id = id;
        profile.linked.clear();
        self.profiles.insert(id, profile);
        log::debug!("MemoryProfileStore: added profile {}", id);
        id
    }

    /// 删除网络；临时网络的 SSID 会被记住，之后不再自动加回
    pub fn remove_profile(&self, id: ProfileId) -> Option<NetworkProfile> {
        let (_, removed) = self.profiles.remove(&id)?;
        for other in removed.linked.iter() {
            modify_entry(&self.profiles, other, |p| {
                p.linked.remove(&id);
            });
        }
        for mut entry in self.profiles.iter_mut() {
            let p = entry.value_mut();
            if p.status.connect_choice.map(|c| c.profile) == Some(id) {
                p.status.connect_choice = None;
            }
        }
        if removed.ephemeral {
            self.deleted_ephemerals.lock().insert(removed.ssid.clone());
        }
        Some(removed)
    }

    /// 更新网络的联网验证结果
    pub fn set_internet_status(&self, id: ProfileId, no_internet_reports: u32, validated: bool) {
        modify_entry(&self.profiles, &id, |p| {
            p.no_internet_reports = no_internet_reports;
            p.validated_internet = validated;
        });
    }

    pub fn blacklist_by_security_layer(&self, bssid: Bssid) {
        self.security_blacklist.lock().insert(bssid);
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

impl Default for MemoryProfileStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ProfileStore for MemoryProfileStore {
    fn enabled_profiles(&self) -> Vec<NetworkProfile> {
        sorted_values_where(&self.profiles, |p| p.is_enabled())
    }

    fn saved_profiles(&self) -> Vec<NetworkProfile> {
        sorted_values_where(&self.profiles, |_| true)
    }

    fn profile(&self, id: ProfileId) -> Option<NetworkProfile> {
        self.profiles.get(&id).map(|p| p.clone())
    }

    fn update_selection_status(&self, id: ProfileId, update: SelectionUpdate, now: Instant) -> bool {
        modify_entry(&self.profiles, &id, |p| {
            let status = &mut p.status;
            match update {
                SelectionUpdate::Enable => {
                    let changed = !status.enable_state.is_enabled();
                    status.enable_state = EnableState::Enabled;
                    status.disable_counters.clear();
                    changed
                }
                SelectionUpdate::Disable(reason) => {
                    if matches!(status.enable_state, EnableState::PermanentlyDisabled { .. }) {
                        return false;
                    }
                    let counter = status.disable_counters.entry(reason).or_insert(0);
                    *counter += 1;
                    if *counter < reason.threshold() {
                        return false;
                    }
                    status.enable_state = if reason.is_permanent() {
                        EnableState::PermanentlyDisabled { reason, since: now }
                    } else {
                        EnableState::TemporarilyDisabled { reason, since: now }
                    };
                    log::info!("Profile {} ({}) disabled: {:?}", id, p.ssid, reason);
                    true
                }
            }
        })
        .unwrap_or(false)
    }

    fn record_connect_choice(&self, id: ProfileId, chosen: ProfileId, at: Instant) {
        modify_entry(&self.profiles, &id, |p| {
            p.status.connect_choice = Some(crate::core::types::ConnectChoice { profile: chosen, at });
        });
    }

    fn clear_connect_choice(&self, id: ProfileId) {
        modify_entry(&self.profiles, &id, |p| {
            p.status.connect_choice = None;
        });
    }

    fn update_candidate(&self, id: ProfileId, update: CandidateUpdate) {
        modify_entry(&self.profiles, &id, |p| match update {
            CandidateUpdate::Reset => {
                p.status.candidate = None;
                p.status.candidate_score = None;
                p.status.seen_in_last_selection = false;
            }
            CandidateUpdate::Seen => {
                p.status.seen_in_last_selection = true;
            }
            CandidateUpdate::Candidate { observation, score } => {
                p.status.candidate = Some(observation);
                p.status.candidate_score = Some(score);
            }
        });
    }

    fn is_blacklisted_by_security_layer(&self, bssid: &Bssid) -> bool {
        self.security_blacklist.lock().contains(bssid)
    }

    fn was_ephemeral_deleted(&self, ssid: &str) -> bool {
        self.deleted_ephemerals.lock().contains(ssid)
    }

    fn create_ephemeral_profile(&self, observation: &AccessPointObservation) -> Result<ProfileId> {
        if observation.ssid.is_empty() {
            return Err(WlinkError::ephemeral_creation_failed(
                observation.bssid.to_string(),
                "observation has no SSID".to_string(),
                file!(),
            ));
        }
        let security = observation.security();
        let existing = self
            .profiles
            .iter()
            .find(|e| e.ephemeral && e.ssid == observation.ssid && e.security == security)
            .map(|e| *e.key());
        if let Some(id) = existing {
            return Ok(id);
        }

        let mut profile = NetworkProfile::new(observation.ssid.clone(), security);
        profile.ephemeral = true;
        profile.use_external_scores = true;
        let id = self.add_profile(profile);
        log::info!(
            "Created ephemeral profile {} for untrusted network '{}'",
            id,
            observation.ssid
        );
        Ok(id)
    }

    fn link_profiles(&self, a: ProfileId, b: ProfileId) {
        if a == b || !self.profiles.contains_key(&a) || !self.profiles.contains_key(&b) {
            return;
        }
        modify_entry(&self.profiles, &a, |p| p.linked.insert(b));
        modify_entry(&self.profiles, &b, |p| p.linked.insert(a));
    }

    fn unlink_profiles(&self, a: ProfileId, b: ProfileId) {
        modify_entry(&self.profiles, &a, |p| p.linked.remove(&b));
        modify_entry(&self.profiles, &b, |p| p.linked.remove(&a));
    }

    fn set_default_gateway(&self, id: ProfileId, gateway: Bssid) {
        modify_entry(&self.profiles, &id, |p| {
            p.default_gateway = Some(gateway);
            p.has_ever_connected = true;
        });
    }

    fn forget_all(&self) {
        let removed = clear_dashmap(&self.profiles);
        self.deleted_ephemerals.lock().clear();
        self.security_blacklist.lock().clear();
        log::info!("MemoryProfileStore: forgot {} profiles", removed.len());
    }
}
