//! 错误类型定义模块
//!
//! 提供结构化错误码、错误分类、上下文追踪、链式错误、重试建议和错误统计。
//!
//! # 错误码格式
//!
//! 错误码采用 `WL-XXYY` 格式：
//! - `XX`: 模块分类 (01=系统, 02=配置, 03=扫描, 04=选网, 05=存储, 06=连接)
//! - `YY`: 具体错误序号
//!
//! # 示例
//!
//! ```rust
//! use wlink::core::error::{WlinkError, Result};
//!
//! fn example() -> Result<()> {
//!     Err(WlinkError::profile_not_found(7, file!()))
//! }
//! ```

pub mod common_errors;
pub mod config_errors;
pub mod connection_errors;
pub mod scan_errors;
pub mod store_errors;

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// 错误码类型
///
/// # Example
/// ```
/// use wlink::core::error::ErrorCode;
///
/// let code = ErrorCode(301);
/// assert_eq!(format!("{}", code), "WL-0301");
/// assert_eq!("WL-0301".parse::<ErrorCode>(), Ok(code));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ErrorCode(pub u16);

impl std::str::FromStr for ErrorCode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let digits = s.strip_prefix("WL-").unwrap_or(s);
        let value = digits.parse::<u16>().map_err(|e| e.to_string())?;
        if value < 10000 {
            Ok(Self(value))
        } else {
            Err("Error code must be less than 10000".to_string())
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WL-{:04}", self.0)
    }
}

/// 错误分类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCategory {
    /// 通用系统错误 (01xx)，包括 IO、序列化、服务通道关闭
    System,

    /// 配置错误 (02xx)
    Config,

    /// 扫描发起与调度错误 (03xx)
    Scan,

    /// 选网过程中的不一致 (04xx)
    Selection,

    /// 网络配置存储错误 (05xx)
    Store,

    /// 连接与漫游命令错误 (06xx)
    Connection,
}

impl ErrorCategory {
    pub fn name(&self) -> &'static str {
        match self {
            Self::System => "System",
            Self::Config => "Config",
            Self::Scan => "Scan",
            Self::Selection => "Selection",
            Self::Store => "Store",
            Self::Connection => "Connection",
        }
    }

}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// 重试建议 - 指导调用者如何处理错误
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum RetrySuggestion {
    /// 错误是确定性的，重试不会改变结果
    #[default]
    NoRetry,

    /// 暂时性错误，建议延迟后重试
    Retryable {
        /// 最大重试次数
        max_attempts: u32,
        /// 基础延迟时间（毫秒）
        base_delay_ms: u64,
    },

    /// 需要用户干预，例如重新输入凭据
    ManualIntervention,

    /// 致命错误，不应重试
    Fatal,
}

/// 影响范围
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImpactScope {
    /// 仅影响当前操作
    Operation,
    /// 影响某个网络配置
    Profile,
    /// 影响整个连接服务
    Service,
}

/// 错误的详细上下文信息
#[derive(Debug, Clone, Serialize)]
pub struct ErrorContext {
    /// 发生错误的位置
    pub location: &'static str,

    /// 相关的接入点
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bssid: Option<String>,

    /// 相关的网络配置
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_id: Option<u32>,

    /// 原始错误消息（使用 Box 减少内存占用）
    pub original_message: Box<str>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug_info: Option<Box<serde_json::Value>>,

    pub timestamp: chrono::DateTime<chrono::Utc>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_suggestion: Option<RetrySuggestion>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub impact_scope: Option<ImpactScope>,
}

impl ErrorContext {
    #[inline]
    pub fn new(location: &'static str, original_message: String) -> Self {
        Self {
            location,
            bssid: None,
            profile_id: None,
            original_message: original_message.into_boxed_str(),
            debug_info: None,
            timestamp: chrono::Utc::now(),
            retry_suggestion: None,
            impact_scope: None,
        }
    }
}

/// crate 统一错误类型
///
/// ```
/// use wlink::core::error::{WlinkError, ErrorCategory};
///
/// let err = WlinkError::scan_start_failed("single", "radio busy", file!());
/// assert_eq!(err.category(), ErrorCategory::Scan);
/// assert!(err.is_retryable());
/// ```
#[derive(Error, Debug, Clone, Serialize)]
#[error("{message}")]
pub struct WlinkError {
    pub code: ErrorCode,

    pub category: ErrorCategory,

    /// 面向用户的简短消息
    pub message: String,

    /// 错误上下文（使用 Box 减少内存占用）
    pub context: Box<ErrorContext>,

    /// 链式错误
    pub source: Option<Box<WlinkError>>,
}

impl WlinkError {
    /// 创建新错误（内部方法）
    pub(crate) fn new_internal(
        code: ErrorCode,
        category: ErrorCategory,
        message: String,
        technical_details: &str,
        location: &'static str,
    ) -> Self {
        Self {
            code,
            category,
            message,
            context: Box::new(ErrorContext::new(location, technical_details.to_string())),
            source: None,
        }
    }

    // ============ 便利方法 ============

    #[inline]
    pub fn with_bssid<S: ToString>(mut self, bssid: S) -> Self {
        self.context.bssid = Some(bssid.to_string());
        self
    }

    #[inline]
    pub fn with_profile_id(mut self, profile_id: u32) -> Self {
        self.context.profile_id = Some(profile_id);
        self
    }

    #[inline]
    pub fn with_debug_info(mut self, info: serde_json::Value) -> Self {
        self.context.debug_info = Some(Box::new(info));
        self
    }

    #[inline]
    pub fn with_retry_suggestion(mut self, suggestion: RetrySuggestion) -> Self {
        self.context.retry_suggestion = Some(suggestion);
        self
    }

    #[inline]
    pub fn with_impact_scope(mut self, scope: ImpactScope) -> Self {
        self.context.impact_scope = Some(scope);
        self
    }

    #[inline]
    pub fn with_source(mut self, source: WlinkError) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    #[inline]
    pub fn code(&self) -> ErrorCode {
        self.code
    }

    #[inline]
    pub fn category(&self) -> ErrorCategory {
        self.category
    }

    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// 技术细节
    #[inline]
    pub fn original_message(&self) -> &str {
        &self.context.original_message
    }

    #[inline]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.context.retry_suggestion,
            Some(RetrySuggestion::Retryable { .. })
        )
    }

    /// 生成适合日志系统的格式化字符串
    pub fn to_log_string(&self) -> String {
        let mut result = format!(
            "[{}] {} | Category: {} | Location: {} | Detail: {} | At: {}",
            self.code,
            self.message,
            self.category,
            self.context.location,
            self.context.original_message,
            self.context.timestamp.format("%H:%M:%S%.3f")
        );

        if let Some(ref bssid) = self.context.bssid {
            result.push_str(&format!(" | BSSID: {}", bssid));
        }
        if let Some(profile_id) = self.context.profile_id {
            result.push_str(&format!(" | Profile: #{}", profile_id));
        }
        if let Some(ref suggestion) = self.context.retry_suggestion {
            result.push_str(&format!(" | Retry: {:?}", suggestion));
        }

        result
    }
}

impl From<serde_json::Error> for WlinkError {
    #[inline]
    fn from(error: serde_json::Error) -> Self {
        Self::new_internal(
            ErrorCode(103),
            ErrorCategory::System,
            "JSON序列化失败".to_string(),
            &format!("JSON error: {}", error),
            file!(),
        )
    }
}

pub type Result<T> = std::result::Result<T, WlinkError>;

/// 错误统计信息
#[derive(Debug, Default, Serialize)]
pub struct ErrorStatistics {
    counts: std::collections::HashMap<u16, u64>,
}

impl ErrorStatistics {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, error: &WlinkError) {
        *self.counts.entry(error.code.0).or_insert(0) += 1;
    }

    #[inline]
    pub fn total_count(&self) -> u64 {
        self.counts.values().sum()
    }

    /// 按出现频率降序返回前 N 个错误码，次数相同按错误码升序
    pub fn get_most_common(&self, n: usize) -> Vec<(u16, u64)> {
        let mut errors: Vec<_> = self.counts.iter().collect();
        errors.sort_by(|a, b| b.1.cmp(a.1).then(a.0.cmp(b.0)));
        errors
            .into_iter()
            .take(n)
            .map(|(&code, &count)| (code, count))
            .collect()
    }

    #[inline]
    pub fn get_count(&self, code: u16) -> u64 {
        *self.counts.get(&code).unwrap_or(&0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_format() {
        assert_eq!(ErrorCode(7).to_string(), "WL-0007");
        assert_eq!("WL-0302".parse::<ErrorCode>().unwrap(), ErrorCode(302));
        assert_eq!("502".parse::<ErrorCode>().unwrap(), ErrorCode(502));
        assert!("12345".parse::<ErrorCode>().is_err());
    }

    #[test]
    fn test_source_chain() {
        let root = WlinkError::scan_start_failed("pno", "firmware timeout", file!());
        let err = WlinkError::scan_retry_exhausted("pno", 5, file!()).with_source(root);
        assert_eq!(err.code, ErrorCode(303));
        assert_eq!(err.source.as_ref().map(|e| e.code), Some(ErrorCode(301)));
        assert!(err.to_log_string().contains("WL-0303"));
    }

    #[test]
    fn test_log_string_has_context() {
        let err = WlinkError::connect_failed(3, "aa:bb:cc:dd:ee:ff", "rejected", file!());
        let line = err.to_log_string();
        assert!(line.contains("WL-0601"));
        assert!(line.contains("BSSID: aa:bb:cc:dd:ee:ff"));
        assert!(line.contains("Profile: #3"));
    }

    #[test]
    fn test_statistics() {
        let mut stats = ErrorStatistics::new();
        stats.record(&WlinkError::profile_not_found(1, file!()));
        stats.record(&WlinkError::profile_not_found(2, file!()));
        stats.record(&WlinkError::scan_start_failed("single", "busy", file!()));

        assert_eq!(stats.total_count(), 3);
        assert_eq!(stats.get_count(501), 2);
        assert_eq!(stats.get_count(604), 0);
        assert_eq!(stats.get_most_common(1), vec![(501, 2)]);
        assert_eq!(stats.get_most_common(5), vec![(501, 2), (301, 1)]);
    }
}
