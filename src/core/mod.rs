//! Core module - 核心功能模块
//!
//! 提供错误处理、配置、指标收集、类型定义和 trait 接口
//!
//! # 模块结构
//!
//! - [`config`] - 引擎配置与校验
//! - [`error`] - 结构化错误类型
//! - [`metrics`] - 选网与扫描计数器
//! - [`traits`] - 外部协作方接口
//! - [`types`] - 核心数据类型

pub mod config;
pub mod error;
pub mod metrics;
pub mod traits;
pub mod types;

// 重新导出常用类型，便于使用
pub use config::EngineConfig;
pub use error::{
    ErrorCategory, ErrorCode, ErrorContext, ErrorStatistics, ImpactScope, Result, RetrySuggestion,
    WlinkError,
};
