//! 扫描相关错误 (03xx)

use crate::core::error::{ErrorCategory, ErrorCode, RetrySuggestion, WlinkError};

impl WlinkError {
    /// 扫描发起失败 (0301)
    ///
    /// 扫描器拒绝请求或返回失败。调度器会按固定延迟有限次重试。
    #[inline]
    pub fn scan_start_failed<S: Into<String>>(kind: S, reason: S, location: &'static str) -> Self {
        let kind_str = kind.into();
        let reason_str = reason.into();
        Self::new_internal(
            ErrorCode(301),
            ErrorCategory::Scan,
            "扫描发起失败".to_string(),
            &format!("Failed to start {} scan: {}", kind_str, reason_str),
            location,
        )
        .with_retry_suggestion(RetrySuggestion::Retryable {
            max_attempts: 5,
            base_delay_ms: 2000,
        })
    }

    /// 停止后台扫描失败 (0302)
    #[inline]
    pub fn pno_stop_failed<S: Into<String>>(reason: S, location: &'static str) -> Self {
        Self::new_internal(
            ErrorCode(302),
            ErrorCategory::Scan,
            "停止后台扫描失败".to_string(),
            &format!("Failed to stop PNO scan: {}", reason.into()),
            location,
        )
    }

    /// 重试次数耗尽 (0303)
    #[inline]
    pub fn scan_retry_exhausted<S: Into<String>>(
        kind: S,
        attempts: u32,
        location: &'static str,
    ) -> Self {
        Self::new_internal(
            ErrorCode(303),
            ErrorCategory::Scan,
            "扫描重试次数耗尽".to_string(),
            &format!(
                "Giving up on {} scan after {} consecutive retries",
                kind.into(),
                attempts
            ),
            location,
        )
        .with_retry_suggestion(RetrySuggestion::NoRetry)
    }
}
