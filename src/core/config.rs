//! 引擎配置
//!
//! 所有阈值都可以通过 JSON 覆盖，缺省字段取默认值。

use crate::core::error::{Result, WlinkError};
use crate::core::types::Band;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 打分参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScoringConfig {
    pub saturation_rssi_24: i32,
    pub saturation_rssi_5: i32,
    pub minimum_rssi_24: i32,
    pub minimum_rssi_5: i32,
    pub qualified_rssi_24: i32,
    pub qualified_rssi_5: i32,
    #[serde(rename = "bandBonus5GHz")]
    pub band_bonus_5ghz: i32,
    pub current_network_bonus: i32,
    pub same_bssid_bonus: i32,
    /// 每分钟衰减 1 分
    pub last_selection_bonus: i32,
    pub secure_bonus: i32,
    pub passpoint_bonus: i32,
    pub no_internet_penalty: i32,
    pub rssi_slope: i32,
    pub rssi_offset: i32,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        let mut config = Self {
            saturation_rssi_24: -60,
            saturation_rssi_5: -57,
            minimum_rssi_24: -85,
            minimum_rssi_5: -82,
            qualified_rssi_24: -73,
            qualified_rssi_5: -70,
            band_bonus_5ghz: 40,
            current_network_bonus: 16,
            same_bssid_bonus: 24,
            last_selection_bonus: 480,
            secure_bonus: 80,
            passpoint_bonus: 100,
            no_internet_penalty: 0,
            rssi_slope: 4,
            rssi_offset: 85,
        };
        config.no_internet_penalty = config.derived_no_internet_penalty();
        config
    }
}

impl ScoringConfig {
    /// 最好的 2.4G 网络能拿到的非用户选择加分总和，默认 280
    pub fn derived_no_internet_penalty(&self) -> i32 {
        (self.saturation_rssi_24 + self.rssi_offset) * self.rssi_slope
            + self.band_bonus_5ghz
            + self.current_network_bonus
            + self.same_bssid_bonus
            + self.secure_bonus.max(self.passpoint_bonus)
    }

    /// 未知频段按 2.4G 处理
    pub fn saturation_rssi(&self, band: Band) -> i32 {
        match band {
            Band::Band5Ghz => self.saturation_rssi_5,
            _ => self.saturation_rssi_24,
        }
    }

    pub fn minimum_rssi(&self, band: Band) -> i32 {
        match band {
            Band::Band5Ghz => self.minimum_rssi_5,
            _ => self.minimum_rssi_24,
        }
    }

    pub fn qualified_rssi(&self, band: Band) -> i32 {
        match band {
            Band::Band5Ghz => self.qualified_rssi_5,
            _ => self.qualified_rssi_24,
        }
    }
}

/// 选网参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SelectionConfig {
    pub min_reselection_interval_secs: u64,
    pub blacklist_threshold: u32,
    pub blacklist_expiry_secs: u64,
    pub cache_max_entries: usize,
    pub cache_trim_to: usize,
    pub channel_max_age_secs: u64,
    /// 两个 PSK 网络都只有少量 BSSID 时才尝试按前缀关联
    pub link_max_cached_bssids: usize,
    pub auto_join_when_associated: bool,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            min_reselection_interval_secs: 10,
            blacklist_threshold: 3,
            blacklist_expiry_secs: 5 * 60,
            cache_max_entries: 192,
            cache_trim_to: 128,
            channel_max_age_secs: 60 * 60,
            link_max_cached_bssids: 6,
            auto_join_when_associated: true,
        }
    }
}

impl SelectionConfig {
    pub fn min_reselection_interval(&self) -> Duration {
        Duration::from_secs(self.min_reselection_interval_secs)
    }

    pub fn blacklist_expiry(&self) -> Duration {
        Duration::from_secs(self.blacklist_expiry_secs)
    }

    pub fn channel_max_age(&self) -> Duration {
        Duration::from_secs(self.channel_max_age_secs)
    }
}

/// 扫描调度参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScheduleConfig {
    pub periodic_interval_min_secs: u64,
    pub periodic_interval_max_secs: u64,
    pub restart_delay_ms: u64,
    pub max_scan_restarts: u32,
    pub watchdog_interval_secs: u64,
    pub pno_backoff_min_secs: u64,
    pub pno_backoff_max_secs: u64,
    pub connected_pno_interval_secs: u64,
    pub disconnected_pno_interval_secs: u64,
    pub tx_packet_threshold: f64,
    pub rx_packet_threshold: f64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            periodic_interval_min_secs: 20,
            periodic_interval_max_secs: 160,
            restart_delay_ms: 2_000,
            max_scan_restarts: 5,
            watchdog_interval_secs: 20 * 60,
            pno_backoff_min_secs: 20,
            pno_backoff_max_secs: 80,
            connected_pno_interval_secs: 160,
            disconnected_pno_interval_secs: 20,
            tx_packet_threshold: 8.0,
            rx_packet_threshold: 16.0,
        }
    }
}

impl ScheduleConfig {
    pub fn periodic_interval_min(&self) -> Duration {
        Duration::from_secs(self.periodic_interval_min_secs)
    }

    pub fn periodic_interval_max(&self) -> Duration {
        Duration::from_secs(self.periodic_interval_max_secs)
    }

    pub fn restart_delay(&self) -> Duration {
        Duration::from_millis(self.restart_delay_ms)
    }

    pub fn watchdog_interval(&self) -> Duration {
        Duration::from_secs(self.watchdog_interval_secs)
    }

    pub fn pno_backoff_min(&self) -> Duration {
        Duration::from_secs(self.pno_backoff_min_secs)
    }

    pub fn pno_backoff_max(&self) -> Duration {
        Duration::from_secs(self.pno_backoff_max_secs)
    }

    pub fn connected_pno_interval(&self) -> Duration {
        Duration::from_secs(self.connected_pno_interval_secs)
    }

    pub fn disconnected_pno_interval(&self) -> Duration {
        Duration::from_secs(self.disconnected_pno_interval_secs)
    }
}

/// 亮屏以外的连接尝试限流
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RateLimitConfig {
    pub window_secs: u64,
    pub max_attempts: usize,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window_secs: 4 * 60,
            max_attempts: 6,
        }
    }
}

impl RateLimitConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    pub scoring: ScoringConfig,
    pub selection: SelectionConfig,
    pub schedule: ScheduleConfig,
    pub rate_limit: RateLimitConfig,
}

impl EngineConfig {
    /// 解析 JSON 并校验
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: EngineConfig = serde_json::from_str(json)
            .map_err(|e| WlinkError::config_parse_failed(e.to_string(), file!()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        let s = &self.scoring;
        if s.minimum_rssi_24 >= s.qualified_rssi_24 {
            return Err(invalid(
                "scoring.minimumRssi24",
                "must be below qualifiedRssi24",
            ));
        }
        if s.minimum_rssi_5 >= s.qualified_rssi_5 {
            return Err(invalid("scoring.minimumRssi5", "must be below qualifiedRssi5"));
        }
        if s.rssi_slope <= 0 {
            return Err(invalid("scoring.rssiSlope", "must be positive"));
        }

        let sel = &self.selection;
        if sel.blacklist_threshold == 0 {
            return Err(invalid("selection.blacklistThreshold", "must be non-zero"));
        }
        if sel.cache_trim_to == 0 || sel.cache_trim_to > sel.cache_max_entries {
            return Err(invalid(
                "selection.cacheTrimTo",
                "must be non-zero and not above cacheMaxEntries",
            ));
        }

        let sch = &self.schedule;
        if sch.periodic_interval_min_secs == 0 {
            return Err(invalid("schedule.periodicIntervalMinSecs", "must be non-zero"));
        }
        if sch.periodic_interval_min_secs > sch.periodic_interval_max_secs {
            return Err(invalid(
                "schedule.periodicIntervalMinSecs",
                "must not exceed periodicIntervalMaxSecs",
            ));
        }
        if sch.pno_backoff_min_secs == 0 || sch.pno_backoff_min_secs > sch.pno_backoff_max_secs {
            return Err(invalid(
                "schedule.pnoBackoffMinSecs",
                "must be non-zero and not above pnoBackoffMaxSecs",
            ));
        }
        if sch.restart_delay_ms == 0
            || sch.watchdog_interval_secs == 0
            || sch.connected_pno_interval_secs == 0
            || sch.disconnected_pno_interval_secs == 0
        {
            return Err(invalid("schedule", "intervals must be non-zero"));
        }

        if self.rate_limit.window_secs == 0 || self.rate_limit.max_attempts == 0 {
            return Err(invalid("rateLimit", "window and maxAttempts must be non-zero"));
        }
        Ok(())
    }
}

fn invalid(field: &str, reason: &str) -> WlinkError {
    WlinkError::config_invalid(field, reason, file!())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_penalty_matches_formula() {
        let config = ScoringConfig::default();
        assert_eq!(config.no_internet_penalty, 280);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let json = r#"{ "scoring": { "bandBonus5GHz": 60, "secureBonus": 30 }, "rateLimit": { "maxAttempts": 3 } }"#;
        let config = EngineConfig::from_json_str(json).unwrap();
        assert_eq!(config.scoring.band_bonus_5ghz, 60);
        assert_eq!(config.scoring.secure_bonus, 30);
        assert_eq!(config.scoring.saturation_rssi_5, -57);
        assert_eq!(config.rate_limit.max_attempts, 3);
        assert_eq!(config.rate_limit.window_secs, 240);
        assert_eq!(config.schedule.max_scan_restarts, 5);
    }

    #[test]
    fn test_rejects_inverted_thresholds() {
        let json = r#"{ "scoring": { "minimumRssi24": -60, "qualifiedRssi24": -70 } }"#;
        let err = EngineConfig::from_json_str(json).unwrap_err();
        assert_eq!(err.code.0, 202);
    }

    #[test]
    fn test_rejects_malformed_json() {
        let err = EngineConfig::from_json_str("{ not json").unwrap_err();
        assert_eq!(err.code.0, 201);
    }

    #[test]
    fn test_json_round_trip_uses_camel_case() {
        let text = EngineConfig::default().to_json_string().unwrap();
        assert!(text.contains("\"bandBonus5GHz\""));
        assert!(text.contains("\"rateLimit\""));
    }
}
