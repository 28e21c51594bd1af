use crate::core::error::Result;
use crate::core::types::{
    AccessPointObservation, Bssid, CandidateUpdate, NetworkProfile, PnoRequest, ProfileId,
    ScanRequest, SelectionUpdate,
};
use async_trait::async_trait;
use std::time::Instant;

/// 已保存网络配置的存储
///
/// 选网逻辑只通过这里修改网络配置。方法都是同步的，实现需要自行保证线程安全。
pub trait ProfileStore: Send + Sync {
    /// 当前处于启用状态的网络
    fn enabled_profiles(&self) -> Vec<NetworkProfile>;

    /// 全部已保存网络（包括被禁用的）
    fn saved_profiles(&self) -> Vec<NetworkProfile>;

    fn profile(&self, id: ProfileId) -> Option<NetworkProfile>;

    /// 启用网络，或为某个禁用原因计数；返回状态是否发生变化
    fn update_selection_status(&self, id: ProfileId, update: SelectionUpdate, now: Instant) -> bool;

    /// 在 `id` 上记录用户更倾向于 `chosen`
    fn record_connect_choice(&self, id: ProfileId, chosen: ProfileId, at: Instant);

    fn clear_connect_choice(&self, id: ProfileId);

    /// 修改每轮选网的临时字段（候选 AP、分数、是否被看到）
    fn update_candidate(&self, id: ProfileId, update: CandidateUpdate);

    /// 由安全层（例如 EAP 认证模块）拉黑的接入点
    fn is_blacklisted_by_security_layer(&self, bssid: &Bssid) -> bool;

    /// 用户删除过的临时网络不会被自动加回
    fn was_ephemeral_deleted(&self, ssid: &str) -> bool;

    /// 为不受信任的候选创建临时网络配置
    fn create_ephemeral_profile(&self, observation: &AccessPointObservation) -> Result<ProfileId>;

    /// 对称关联
    fn link_profiles(&self, a: ProfileId, b: ProfileId);

    fn unlink_profiles(&self, a: ProfileId, b: ProfileId);

    fn set_default_gateway(&self, id: ProfileId, gateway: Bssid);

    fn forget_all(&self);
}

/// 扫描器，结果通过 `ScanEvent` 异步回送
#[async_trait]
pub trait ScanIssuer: Send + Sync {
    async fn start_scan(&self, request: ScanRequest) -> Result<()>;

    async fn start_pno_scan(&self, request: PnoRequest) -> Result<()>;

    async fn stop_pno_scan(&self) -> Result<()>;
}

/// 连接管理器
#[async_trait]
pub trait ConnectionManager: Send + Sync {
    /// 连接到新网络
    async fn connect(&self, profile: ProfileId, bssid: Bssid) -> Result<()>;

    /// 在同一（或关联）网络内切换接入点
    async fn roam(&self, profile: ProfileId, bssid: Bssid) -> Result<()>;
}
