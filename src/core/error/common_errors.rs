//! 通用系统错误 (01xx)

use crate::core::error::{ErrorCategory, ErrorCode, ImpactScope, WlinkError};

impl WlinkError {
    /// 服务已停止 (0104)
    ///
    /// 事件循环已退出，无法再投递事件
    #[inline]
    pub fn service_stopped<S: Into<String>>(operation: S, location: &'static str) -> Self {
        Self::new_internal(
            ErrorCode(104),
            ErrorCategory::System,
            "连接服务已停止".to_string(),
            &format!(
                "Cannot perform '{}': the connectivity event loop has exited",
                operation.into()
            ),
            location,
        )
        .with_impact_scope(ImpactScope::Service)
    }
}
