//! 连接命令错误 (06xx)

use crate::core::error::{ErrorCategory, ErrorCode, RetrySuggestion, WlinkError};

impl WlinkError {
    /// 连接失败 (0601)
    #[inline]
    pub fn connect_failed<S: Into<String>>(
        profile_id: u32,
        bssid: S,
        reason: S,
        location: &'static str,
    ) -> Self {
        let bssid_str = bssid.into();
        let reason_str = reason.into();
        Self::new_internal(
            ErrorCode(601),
            ErrorCategory::Connection,
            "连接失败".to_string(),
            &format!(
                "Connect to profile #{} via {} failed: {}",
                profile_id, bssid_str, reason_str
            ),
            location,
        )
        .with_profile_id(profile_id)
        .with_bssid(bssid_str)
        .with_retry_suggestion(RetrySuggestion::Retryable {
            max_attempts: 6,
            base_delay_ms: 20_000,
        })
    }

    /// 漫游失败 (0602)
    #[inline]
    pub fn roam_failed<S: Into<String>>(
        profile_id: u32,
        bssid: S,
        reason: S,
        location: &'static str,
    ) -> Self {
        let bssid_str = bssid.into();
        let reason_str = reason.into();
        Self::new_internal(
            ErrorCode(602),
            ErrorCategory::Connection,
            "漫游失败".to_string(),
            &format!(
                "Roam within profile #{} to {} failed: {}",
                profile_id, bssid_str, reason_str
            ),
            location,
        )
        .with_profile_id(profile_id)
        .with_bssid(bssid_str)
    }
}
