use crate::core::types::{AccessPointObservation, Bssid, ProfileId};
use std::collections::{BTreeSet, HashMap};
use std::time::{Duration, Instant};

/// 每个网络最近看到的接入点
///
/// 同一 BSSID 的历史（拒绝次数、认证失败、拉黑时间）会带到新的观测上。
/// 条目超过 `max_entries` 时只保留最近看到的 `trim_to` 条。
#[derive(Debug, Clone)]
pub struct ObservationCache {
    per_profile: HashMap<ProfileId, HashMap<Bssid, AccessPointObservation>>,
    max_entries: usize,
    trim_to: usize,
}

impl ObservationCache {
    pub fn new(max_entries: usize, trim_to: usize) -> Self {
        Self {
            per_profile: HashMap::new(),
            max_entries: max_entries.max(1),
            trim_to: trim_to.clamp(1, max_entries.max(1)),
        }
    }

    /// 写入观测并返回带历史的版本
    pub fn record(
        &mut self,
        profile: ProfileId,
        mut observation: AccessPointObservation,
    ) -> AccessPointObservation {
        let entries = self.per_profile.entry(profile).or_default();
        if let Some(previous) = entries.get(&observation.bssid) {
            observation.history = previous.history;
            observation.first_seen = previous.first_seen.min(observation.first_seen);
        }
        entries.insert(observation.bssid, observation.clone());

        if entries.len() > self.max_entries {
            let mut by_age: Vec<(Instant, Bssid)> =
                entries.values().map(|o| (o.last_seen, o.bssid)).collect();
            // 最新的在前
            by_age.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
            for (_, bssid) in by_age.into_iter().skip(self.trim_to) {
                entries.remove(&bssid);
            }
            log::debug!(
                "Observation cache for {} trimmed to {} entries",
                profile,
                entries.len()
            );
        }
        observation
    }

    pub fn get(&self, profile: ProfileId, bssid: &Bssid) -> Option<&AccessPointObservation> {
        self.per_profile.get(&profile)?.get(bssid)
    }

    pub fn bssids(&self, profile: ProfileId) -> Vec<Bssid> {
        let mut out: Vec<Bssid> = self
            .per_profile
            .get(&profile)
            .map(|m| m.keys().copied().collect())
            .unwrap_or_default();
        out.sort();
        out
    }

    pub fn len(&self, profile: ProfileId) -> usize {
        self.per_profile.get(&profile).map(|m| m.len()).unwrap_or(0)
    }

    /// 最近 `max_age` 内看到过的信道，用于部分扫描
    pub fn frequencies(&self, profile: ProfileId, now: Instant, max_age: Duration) -> Vec<u32> {
        let Some(entries) = self.per_profile.get(&profile) else {
            return Vec::new();
        };
        entries
            .values()
            .filter(|o| now.saturating_duration_since(o.last_seen) <= max_age)
            .map(|o| o.frequency)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn note_association_rejection(&mut self, bssid: &Bssid) {
        self.update_history(bssid, |o| o.history.association_rejections += 1);
    }

    pub fn note_authentication_failure(&mut self, bssid: &Bssid) {
        self.update_history(bssid, |o| o.history.auth_failures += 1);
    }

    pub fn note_blacklisted(&mut self, bssid: &Bssid, at: Option<Instant>) {
        self.update_history(bssid, |o| o.history.blacklisted_at = at);
    }

    fn update_history<F>(&mut self, bssid: &Bssid, mut f: F)
    where
        F: FnMut(&mut AccessPointObservation),
    {
        for entries in self.per_profile.values_mut() {
            if let Some(o) = entries.get_mut(bssid) {
                f(o);
            }
        }
    }

    pub fn remove_profile(&mut self, profile: ProfileId) {
        self.per_profile.remove(&profile);
    }

    pub fn clear(&mut self) {
        self.per_profile.clear();
    }
}

impl Default for ObservationCache {
    fn default() -> Self {
        Self::new(192, 128)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obs(last: u8, frequency: u32, seen_at: Instant) -> AccessPointObservation {
        AccessPointObservation::new(Bssid([0, 1, 2, 3, 4, last]), "office", -60, frequency, seen_at)
    }

    #[test]
    fn test_history_carried_forward() {
        let mut cache = ObservationCache::default();
        let start = Instant::now();
        let id = ProfileId(1);

        cache.record(id, obs(1, 2412, start));
        cache.note_association_rejection(&Bssid([0, 1, 2, 3, 4, 1]));
        cache.note_authentication_failure(&Bssid([0, 1, 2, 3, 4, 1]));

        let later = start + Duration::from_secs(30);
        let fresh = cache.record(id, obs(1, 2412, later));
        assert_eq!(fresh.history.association_rejections, 1);
        assert_eq!(fresh.history.auth_failures, 1);
        assert_eq!(fresh.first_seen, start);
        assert_eq!(fresh.last_seen, later);
    }

    #[test]
    fn test_trims_to_most_recent() {
        let mut cache = ObservationCache::new(4, 2);
        let start = Instant::now();
        let id = ProfileId(7);
        for i in 0..5u8 {
            cache.record(id, obs(i, 2412, start + Duration::from_secs(i as u64)));
        }

        assert_eq!(cache.len(id), 2);
        assert_eq!(
            cache.bssids(id),
            vec![Bssid([0, 1, 2, 3, 4, 3]), Bssid([0, 1, 2, 3, 4, 4])]
        );
    }

    #[test]
    fn test_frequencies_respect_age() {
        let mut cache = ObservationCache::default();
        let start = Instant::now();
        let id = ProfileId(2);
        cache.record(id, obs(1, 5180, start));
        cache.record(id, obs(2, 2437, start + Duration::from_secs(3000)));
        cache.record(id, obs(3, 2437, start + Duration::from_secs(3100)));

        let now = start + Duration::from_secs(3700);
        assert_eq!(cache.frequencies(id, now, Duration::from_secs(3600)), vec![2437]);
        assert_eq!(
            cache.frequencies(id, now, Duration::from_secs(7200)),
            vec![2437, 5180]
        );
        assert!(cache.frequencies(ProfileId(99), now, Duration::from_secs(60)).is_empty());
    }
}
