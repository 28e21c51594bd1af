//! 配置错误 (02xx)

use crate::core::error::{ErrorCategory, ErrorCode, RetrySuggestion, WlinkError};

impl WlinkError {
    /// 配置解析失败 (0201)
    #[inline]
    pub fn config_parse_failed<S: Into<String>>(reason: S, location: &'static str) -> Self {
        Self::new_internal(
            ErrorCode(201),
            ErrorCategory::Config,
            "配置解析失败".to_string(),
            &format!("Failed to parse engine configuration: {}", reason.into()),
            location,
        )
        .with_retry_suggestion(RetrySuggestion::ManualIntervention)
    }

    /// 配置值无效 (0202)
    #[inline]
    pub fn config_invalid<S: Into<String>>(field: S, reason: S, location: &'static str) -> Self {
        let field_str = field.into();
        let reason_str = reason.into();
        Self::new_internal(
            ErrorCode(202),
            ErrorCategory::Config,
            "配置值无效".to_string(),
            &format!("Invalid configuration value '{}': {}", field_str, reason_str),
            location,
        )
        .with_retry_suggestion(RetrySuggestion::ManualIntervention)
    }
}
