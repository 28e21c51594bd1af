//! 网络配置存储与选网一致性错误 (04xx / 05xx)

use crate::core::error::{ErrorCategory, ErrorCode, ImpactScope, WlinkError};

impl WlinkError {
    /// 选中的网络配置已不存在 (0401)
    ///
    /// 选网过程中存储被并发修改
    #[inline]
    pub fn selection_profile_vanished(profile_id: u32, location: &'static str) -> Self {
        Self::new_internal(
            ErrorCode(401),
            ErrorCategory::Selection,
            "选中的网络已被删除".to_string(),
            &format!("Profile #{} disappeared while selecting", profile_id),
            location,
        )
        .with_profile_id(profile_id)
        .with_impact_scope(ImpactScope::Operation)
    }

    /// 扫描记录格式错误 (0402)
    #[inline]
    pub fn malformed_observation<S: Into<String>>(
        bssid: S,
        reason: S,
        location: &'static str,
    ) -> Self {
        let bssid_str = bssid.into();
        let reason_str = reason.into();
        Self::new_internal(
            ErrorCode(402),
            ErrorCategory::Selection,
            "扫描记录格式错误".to_string(),
            &format!("Malformed scan record '{}': {}", bssid_str, reason_str),
            location,
        )
        .with_bssid(bssid_str)
    }

    /// 网络配置不存在 (0501)
    #[inline]
    pub fn profile_not_found(profile_id: u32, location: &'static str) -> Self {
        Self::new_internal(
            ErrorCode(501),
            ErrorCategory::Store,
            "网络配置不存在".to_string(),
            &format!("Profile #{} not found", profile_id),
            location,
        )
        .with_profile_id(profile_id)
    }

    /// 无法创建临时网络配置 (0502)
    #[inline]
    pub fn ephemeral_creation_failed<S: Into<String>>(
        ssid: S,
        reason: S,
        location: &'static str,
    ) -> Self {
        let ssid_str = ssid.into();
        let reason_str = reason.into();
        Self::new_internal(
            ErrorCode(502),
            ErrorCategory::Store,
            "无法创建临时网络".to_string(),
            &format!(
                "Failed to create ephemeral profile for '{}': {}",
                ssid_str, reason_str
            ),
            location,
        )
    }
}
