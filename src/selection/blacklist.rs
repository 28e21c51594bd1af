use crate::core::types::Bssid;
use std::collections::HashMap;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryState {
    Flagged(u32),
    Suspended { since: Instant },
}

/// 按 BSSID 记录关联失败，连续失败达到阈值后暂停使用该接入点
///
/// `Unlisted -> Flagged(n) -> Suspended(since)`，暂停在 `expiry` 后失效。
#[derive(Debug, Clone)]
pub struct BlacklistTracker {
    entries: HashMap<Bssid, EntryState>,
    threshold: u32,
    expiry: Duration,
}

impl BlacklistTracker {
    pub fn new(threshold: u32, expiry: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            threshold: threshold.max(1),
            expiry,
        }
    }

    /// 记录一次拒绝；返回本次调用是否使其进入暂停状态
    pub fn note_rejection(&mut self, bssid: Bssid, now: Instant) -> bool {
        let threshold = self.threshold;
        let expiry = self.expiry;
        let state = self.entries.entry(bssid).or_insert(EntryState::Flagged(0));
        let count = match *state {
            // 暂停已过期但还没 sweep，从头计数
            EntryState::Suspended { since } if now.saturating_duration_since(since) >= expiry => 1,
            EntryState::Suspended { .. } => return false,
            EntryState::Flagged(count) => count + 1,
        };
        if count >= threshold {
            *state = EntryState::Suspended { since: now };
            log::info!("BSSID {} suspended after {} rejections", bssid, count);
            true
        } else {
            *state = EntryState::Flagged(count);
            false
        }
    }

    /// 不依赖 `sweep`，过期的暂停直接视为无效
    pub fn is_suspended(&self, bssid: &Bssid, now: Instant) -> bool {
        match self.entries.get(bssid) {
            Some(EntryState::Suspended { since }) => {
                now.saturating_duration_since(*since) < self.expiry
            }
            _ => false,
        }
    }

    pub fn rejection_count(&self, bssid: &Bssid) -> u32 {
        match self.entries.get(bssid) {
            Some(EntryState::Flagged(count)) => *count,
            Some(EntryState::Suspended { .. }) => self.threshold,
            None => 0,
        }
    }

    pub fn suspended_since(&self, bssid: &Bssid) -> Option<Instant> {
        match self.entries.get(bssid) {
            Some(EntryState::Suspended { since }) => Some(*since),
            _ => None,
        }
    }

    /// 删除已过期的暂停条目；返回删除的数量
    pub fn sweep(&mut self, now: Instant) -> usize {
        let expiry = self.expiry;
        let before = self.entries.len();
        self.entries.retain(|bssid, state| match state {
            EntryState::Suspended { since } if now.saturating_duration_since(*since) >= expiry => {
                log::debug!("BSSID {} suspension expired", bssid);
                false
            }
            _ => true,
        });
        before - self.entries.len()
    }

    /// 手动恢复（例如连接成功或用户重新启用）
    pub fn enable(&mut self, bssid: &Bssid) {
        self.entries.remove(bssid);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for BlacklistTracker {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(5 * 60))
    }
}
