//! 选网模块
//!
//! - [`scoring`] - 接入点打分
//! - [`blacklist`] - BSSID 黑名单
//! - [`cache`] - 每个网络的扫描结果缓存
//! - [`linking`] - 关联网络发现
//! - [`selector`] - 单轮选网

pub mod blacklist;
pub mod cache;
pub mod linking;
pub mod scoring;
pub mod selector;

pub use blacklist::BlacklistTracker;
pub use cache::ObservationCache;
pub use scoring::{ScoreBreakdown, Scorer, ScoringContext};
pub use selector::{NetworkSelector, SelectionContext};
