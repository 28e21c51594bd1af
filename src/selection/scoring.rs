use crate::core::config::ScoringConfig;
use crate::core::types::{AccessPointObservation, Band, Bssid, NetworkProfile, ProfileId};
use std::time::Instant;

/// 打分时需要的当前连接信息
#[derive(Debug, Clone, Copy)]
pub struct ScoringContext<'a> {
    pub current_profile: Option<&'a NetworkProfile>,
    pub current_bssid: Option<Bssid>,
    /// 用户最近一次手动选择的网络及时间
    pub last_user_selection: Option<(ProfileId, Instant)>,
    pub now: Instant,
}

impl<'a> ScoringContext<'a> {
    pub fn idle(now: Instant) -> Self {
        Self {
            current_profile: None,
            current_bssid: None,
            last_user_selection: None,
            now,
        }
    }
}

/// 各项得分，便于调试日志
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScoreBreakdown {
    pub rssi: i32,
    pub band: i32,
    pub last_selection: i32,
    pub current_network: i32,
    pub same_bssid: i32,
    pub security: i32,
    pub no_internet: i32,
}

impl ScoreBreakdown {
    pub fn total(&self) -> i32 {
        self.rssi + self.band + self.last_selection + self.current_network + self.same_bssid
            + self.security
            - self.no_internet
    }
}

impl std::fmt::Display for ScoreBreakdown {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "rssi={} band={} last_selection={} current={} same_bssid={} security={} no_internet=-{} total={}",
            self.rssi,
            self.band,
            self.last_selection,
            self.current_network,
            self.same_bssid,
            self.security,
            self.no_internet,
            self.total()
        )
    }
}

/// 接入点打分器，纯计算，无副作用
#[derive(Debug, Clone, Default)]
pub struct Scorer {
    config: ScoringConfig,
}

impl Scorer {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Higher is better. Ties are left to the caller.
    pub fn score(
        &self,
        observation: &AccessPointObservation,
        profile: &NetworkProfile,
        context: &ScoringContext<'_>,
    ) -> i32 {
        self.breakdown(observation, profile, context).total()
    }

    pub fn breakdown(
        &self,
        observation: &AccessPointObservation,
        profile: &NetworkProfile,
        context: &ScoringContext<'_>,
    ) -> ScoreBreakdown {
        let c = &self.config;
        let band = observation.band();
        let mut b = ScoreBreakdown::default();

        // 1. 信号强度，超过饱和值不再加分
        let rssi = observation.level.min(c.saturation_rssi(band));
        b.rssi = (rssi + c.rssi_offset) * c.rssi_slope;

        // 2. 5G 加分
        if band == Band::Band5Ghz {
            b.band = c.band_bonus_5ghz;
        }

        // 3. 用户最近选择，按整分钟衰减
        if let Some((chosen, at)) = context.last_user_selection {
            if chosen == profile.id {
                let elapsed = context.now.saturating_duration_since(at);
                if !elapsed.is_zero() {
                    let minutes = i32::try_from(elapsed.as_secs() / 60).unwrap_or(i32::MAX);
                    b.last_selection = c.last_selection_bonus.saturating_sub(minutes).max(0);
                }
            }
        }

        // 4. 当前网络（或与之关联的网络）
        if let Some(current) = context.current_profile {
            if current.id == profile.id || current.is_linked(profile.id) || profile.is_linked(current.id) {
                b.current_network = c.current_network_bonus;
            }
        }

        // 5. 同一 BSSID
        if context.current_bssid == Some(observation.bssid) {
            b.same_bssid = c.same_bssid_bonus;
        }

        // 6. 安全类型
        b.security = if profile.is_enterprise() {
            c.passpoint_bonus
        } else if !profile.is_open() {
            c.secure_bonus
        } else {
            0
        };

        // 7. 报告过无法上网且从未验证成功
        if profile.no_internet_reports > 0 && !profile.validated_internet {
            b.no_internet = c.no_internet_penalty;
        }

        b
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::SecurityType;
    use std::time::Duration;

    fn observation(level: i32, frequency: u32) -> AccessPointObservation {
        AccessPointObservation::new(Bssid([2, 0, 0, 0, 0, 1]), "home", level, frequency, Instant::now())
    }

    fn profile(security: SecurityType) -> NetworkProfile {
        let mut p = NetworkProfile::new("home", security);
        p.id = ProfileId(1);
        p
    }

    #[test]
    fn test_rssi_saturates_per_band() {
        let scorer = Scorer::default();
        let ctx = ScoringContext::idle(Instant::now());
        let open = profile(SecurityType::Open);

        assert_eq!(scorer.score(&observation(-60, 2437), &open, &ctx), 100);
        assert_eq!(scorer.score(&observation(-40, 2437), &open, &ctx), 100);
        // -57 on 5 GHz: (−57+85)*4 + 40
        assert_eq!(scorer.score(&observation(-30, 5180), &open, &ctx), 152);
    }

    #[test]
    fn test_last_selection_decays_by_minute() {
        let scorer = Scorer::default();
        let start = Instant::now();
        let p = profile(SecurityType::Open);
        let obs = observation(-70, 2437);

        let at = |offset: Duration| ScoringContext {
            last_user_selection: Some((p.id, start)),
            ..ScoringContext::idle(start + offset)
        };

        let base = scorer.score(&obs, &p, &ScoringContext::idle(start));
        assert_eq!(scorer.score(&obs, &p, &at(Duration::ZERO)), base);
        assert_eq!(scorer.score(&obs, &p, &at(Duration::from_secs(59))), base + 480);
        assert_eq!(scorer.score(&obs, &p, &at(Duration::from_secs(150))), base + 478);
        assert_eq!(scorer.score(&obs, &p, &at(Duration::from_secs(9 * 3600))), base);
    }

    #[test]
    fn test_no_internet_penalty_needs_unvalidated_reports() {
        let scorer = Scorer::default();
        let ctx = ScoringContext::idle(Instant::now());
        let mut p = profile(SecurityType::Psk);
        let obs = observation(-60, 2437);

        assert_eq!(scorer.score(&obs, &p, &ctx), 180);
        p.no_internet_reports = 1;
        assert_eq!(scorer.score(&obs, &p, &ctx), 180 - 280);
        p.validated_internet = true;
        assert_eq!(scorer.score(&obs, &p, &ctx), 180);
    }

    #[test]
    fn test_breakdown_display() {
        let scorer = Scorer::default();
        let ctx = ScoringContext::idle(Instant::now());
        let b = scorer.breakdown(&observation(-60, 5180), &profile(SecurityType::Eap), &ctx);
        assert_eq!(b.security, 100);
        assert!(b.to_string().ends_with("total=240"));
    }
}
