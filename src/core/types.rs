use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::time::{Duration, Instant};

// --- 基础 ID 定义 ---

/// 已保存网络配置的稳定标识，由 ProfileStore 分配
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProfileId(pub u32);

impl fmt::Display for ProfileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// 接入点的物理标识 (BSSID)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Bssid(pub [u8; 6]);

impl Bssid {
    /// 前 5 个字节相同即视为同一设备的不同射频
    pub fn shares_prefix_with(&self, other: &Bssid) -> bool {
        self.0[..5] == other.0[..5]
    }

    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }
}

impl fmt::Display for Bssid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let o = &self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            o[0], o[1], o[2], o[3], o[4], o[5]
        )
    }
}

impl std::str::FromStr for Bssid {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let mut octets = [0u8; 6];
        let mut parts = s.trim().split(':');
        for octet in octets.iter_mut() {
            let part = parts
                .next()
                .ok_or_else(|| format!("BSSID '{}' has fewer than 6 octets", s))?;
            if part.len() != 2 {
                return Err(format!("BSSID '{}' has a malformed octet '{}'", s, part));
            }
            *octet = u8::from_str_radix(part, 16)
                .map_err(|e| format!("BSSID '{}' is not hexadecimal: {}", s, e))?;
        }
        if parts.next().is_some() {
            return Err(format!("BSSID '{}' has more than 6 octets", s));
        }
        Ok(Self(octets))
    }
}

// --- 枚举定义 ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Band {
    Band24Ghz,
    Band5Ghz,
    Unknown,
}

impl Band {
    pub fn from_frequency(mhz: u32) -> Self {
        match mhz {
            2400..=2500 => Band::Band24Ghz,
            4900..=5900 => Band::Band5Ghz,
            _ => Band::Unknown,
        }
    }
}

impl fmt::Display for Band {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Band::Band24Ghz => write!(f, "2.4 GHz"),
            Band::Band5Ghz => write!(f, "5 GHz"),
            Band::Unknown => write!(f, "Unknown"),
        }
    }
}

/// 用户的频段偏好
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BandPreference {
    #[default]
    Auto,
    Only24Ghz,
    Only5Ghz,
}

impl BandPreference {
    pub fn accepts(&self, band: Band) -> bool {
        match self {
            BandPreference::Auto => true,
            BandPreference::Only24Ghz => band != Band::Band5Ghz,
            BandPreference::Only5Ghz => band != Band::Band24Ghz,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SecurityType {
    Open,
    Wep,
    Psk,
    Eap,
}

impl SecurityType {
    /// 从扫描结果的能力字符串解析，例如 `[WPA2-PSK-CCMP][ESS]`
    pub fn from_capabilities(capabilities: &str) -> Self {
        if capabilities.contains("EAP") {
            SecurityType::Eap
        } else if capabilities.contains("PSK") || capabilities.contains("SAE") {
            SecurityType::Psk
        } else if capabilities.contains("WEP") {
            SecurityType::Wep
        } else {
            SecurityType::Open
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DisableReason {
    BadLink,
    AssociationRejection,
    AuthenticationFailure,
    DhcpFailure,
    DnsFailure,
    NoInternet,
    AuthenticationNoCredentials,
    ByWifiManager,
    ByUser,
}

impl DisableReason {
    /// 达到该次数后禁用网络
    pub fn threshold(&self) -> u32 {
        match self {
            DisableReason::AssociationRejection
            | DisableReason::AuthenticationFailure
            | DisableReason::DhcpFailure
            | DisableReason::DnsFailure => 5,
            _ => 1,
        }
    }

    /// 临时禁用的恢复时间；`None` 表示永久禁用
    pub fn timeout(&self) -> Option<Duration> {
        match self {
            DisableReason::BadLink
            | DisableReason::AssociationRejection
            | DisableReason::AuthenticationFailure
            | DisableReason::DhcpFailure
            | DisableReason::DnsFailure => Some(Duration::from_secs(5 * 60)),
            DisableReason::NoInternet
            | DisableReason::AuthenticationNoCredentials
            | DisableReason::ByWifiManager
            | DisableReason::ByUser => None,
        }
    }

    pub fn is_permanent(&self) -> bool {
        self.timeout().is_none()
    }
}

/// 网络的启用状态。禁用原因与时间戳总是成对出现。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnableState {
    #[default]
    Enabled,
    TemporarilyDisabled { reason: DisableReason, since: Instant },
    PermanentlyDisabled { reason: DisableReason, since: Instant },
}

impl EnableState {
    pub fn is_enabled(&self) -> bool {
        matches!(self, EnableState::Enabled)
    }

    pub fn is_temporarily_disabled(&self) -> bool {
        matches!(self, EnableState::TemporarilyDisabled { .. })
    }

    pub fn disable_reason(&self) -> Option<DisableReason> {
        match self {
            EnableState::Enabled => None,
            EnableState::TemporarilyDisabled { reason, .. }
            | EnableState::PermanentlyDisabled { reason, .. } => Some(*reason),
        }
    }
}

/// ProfileStore::update_selection_status 的输入
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionUpdate {
    Enable,
    Disable(DisableReason),
}

/// ProfileStore::update_candidate 的输入，只修改每轮选择的临时字段
#[derive(Debug, Clone)]
pub enum CandidateUpdate {
    Reset,
    Seen,
    Candidate {
        observation: AccessPointObservation,
        score: i32,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectChoice {
    pub profile: ProfileId,
    pub at: Instant,
}

#[derive(Debug, Clone, Default)]
pub struct SelectionStatus {
    pub enable_state: EnableState,
    pub disable_counters: BTreeMap<DisableReason, u32>,
    pub candidate: Option<AccessPointObservation>,
    pub candidate_score: Option<i32>,
    pub connect_choice: Option<ConnectChoice>,
    pub seen_in_last_selection: bool,
}

// --- 结构体定义 ---

#[derive(Debug, Clone)]
pub struct NetworkProfile {
    pub id: ProfileId,
    pub ssid: String,
    pub security: SecurityType,
    pub passpoint: bool,
    pub hidden: bool,
    pub bssid_lock: Option<Bssid>,
    pub status: SelectionStatus,
    pub linked: BTreeSet<ProfileId>,
    pub default_gateway: Option<Bssid>,
    pub ephemeral: bool,
    pub metered_hint: bool,
    pub use_external_scores: bool,
    pub no_internet_reports: u32,
    pub validated_internet: bool,
    pub has_ever_connected: bool,
}

impl NetworkProfile {
    pub fn new(ssid: impl Into<String>, security: SecurityType) -> Self {
        Self {
            id: ProfileId(0),
            ssid: ssid.into(),
            security,
            passpoint: false,
            hidden: false,
            bssid_lock: None,
            status: SelectionStatus::default(),
            linked: BTreeSet::new(),
            default_gateway: None,
            ephemeral: false,
            metered_hint: false,
            use_external_scores: false,
            no_internet_reports: 0,
            validated_internet: false,
            has_ever_connected: false,
        }
    }

    pub fn is_open(&self) -> bool {
        self.security == SecurityType::Open
    }

    /// 企业级 (EAP) 或 Passpoint 凭据
    pub fn is_enterprise(&self) -> bool {
        self.passpoint || self.security == SecurityType::Eap
    }

    pub fn is_enabled(&self) -> bool {
        self.status.enable_state.is_enabled()
    }

    pub fn is_linked(&self, other: ProfileId) -> bool {
        self.linked.contains(&other)
    }

    pub fn matches(&self, observation: &AccessPointObservation) -> bool {
        self.ssid == observation.ssid && self.security == observation.security()
    }
}

/// 从同一 BSSID 的旧观测继承下来的历史信息
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ObservationHistory {
    pub association_rejections: u32,
    pub auth_failures: u32,
    pub blacklisted_at: Option<Instant>,
}

/// 扫描器上报的原始记录，BSSID 尚未解析
#[derive(Debug, Clone)]
pub struct ScanRecord {
    pub bssid: String,
    pub ssid: String,
    pub level: i32,
    pub frequency: u32,
    pub capabilities: String,
    pub seen_at: Instant,
    pub external_score: Option<i32>,
}

#[derive(Debug, Clone)]
pub struct AccessPointObservation {
    pub bssid: Bssid,
    pub ssid: String,
    pub level: i32,
    pub frequency: u32,
    pub capabilities: String,
    pub first_seen: Instant,
    pub last_seen: Instant,
    pub external_score: Option<i32>,
    pub history: ObservationHistory,
}

impl AccessPointObservation {
    pub fn new(bssid: Bssid, ssid: impl Into<String>, level: i32, frequency: u32, seen_at: Instant) -> Self {
        Self {
            bssid,
            ssid: ssid.into(),
            level,
            frequency,
            capabilities: "[ESS]".to_string(),
            first_seen: seen_at,
            last_seen: seen_at,
            external_score: None,
            history: ObservationHistory::default(),
        }
    }

    pub fn with_capabilities(mut self, capabilities: impl Into<String>) -> Self {
        self.capabilities = capabilities.into();
        self
    }

    pub fn with_external_score(mut self, score: i32) -> Self {
        self.external_score = Some(score);
        self
    }

    pub fn band(&self) -> Band {
        Band::from_frequency(self.frequency)
    }

    pub fn security(&self) -> SecurityType {
        SecurityType::from_capabilities(&self.capabilities)
    }
}

impl TryFrom<ScanRecord> for AccessPointObservation {
    type Error = String;

    fn try_from(record: ScanRecord) -> std::result::Result<Self, Self::Error> {
        let bssid: Bssid = record.bssid.parse()?;
        Ok(Self {
            bssid,
            ssid: record.ssid,
            level: record.level,
            frequency: record.frequency,
            capabilities: record.capabilities,
            first_seen: record.seen_at,
            last_seen: record.seen_at,
            external_score: record.external_score,
            history: ObservationHistory::default(),
        })
    }
}

// --- 连接状态 ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum WifiState {
    #[default]
    Unknown,
    Connected,
    Disconnected,
    Transitioning,
}

/// 当前关联的接入点信息，由连接管理层上报
#[derive(Debug, Clone, Default)]
pub struct WifiInfo {
    pub state: WifiState,
    pub profile_id: Option<ProfileId>,
    pub bssid: Option<Bssid>,
    pub rssi: i32,
    pub frequency: u32,
    pub gateway: Option<Bssid>,
    pub tx_packets_per_sec: f64,
    pub rx_packets_per_sec: f64,
    pub supplicant_connecting: bool,
    pub link_debouncing: bool,
    pub supplicant_transient: bool,
}

impl WifiInfo {
    pub fn disconnected() -> Self {
        Self {
            state: WifiState::Disconnected,
            ..Default::default()
        }
    }

    pub fn connected(profile_id: ProfileId, bssid: Bssid, rssi: i32, frequency: u32) -> Self {
        Self {
            state: WifiState::Connected,
            profile_id: Some(profile_id),
            bssid: Some(bssid),
            rssi,
            frequency,
            ..Default::default()
        }
    }

    pub fn is_connected(&self) -> bool {
        self.state == WifiState::Connected
    }

    pub fn is_disconnected(&self) -> bool {
        self.state == WifiState::Disconnected
    }
}

// --- 扫描请求与结果 ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BandSelector {
    All,
    Band24Ghz,
    Band5Ghz,
    Channels(Vec<u32>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportingMode {
    FullResults,
    Aggregate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanRequest {
    pub band: BandSelector,
    pub hidden_ssids: Vec<String>,
    pub reporting: ReportingMode,
}

impl ScanRequest {
    pub fn is_full_band(&self) -> bool {
        !matches!(self.band, BandSelector::Channels(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PnoMode {
    Connected,
    Disconnected,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PnoNetwork {
    pub ssid: String,
    pub security: SecurityType,
    pub hidden: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PnoRequest {
    pub mode: PnoMode,
    pub band: BandSelector,
    pub networks: Vec<PnoNetwork>,
    pub interval: Duration,
    pub min_rssi_24: i32,
    pub min_rssi_5: i32,
    pub reporting: ReportingMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScanKind {
    Single,
    Pno,
}

#[derive(Debug, Clone, Default)]
pub struct ScanResults {
    pub records: Vec<ScanRecord>,
    pub all_channels_scanned: bool,
}

/// 扫描器回调统一成一个带标签的结果
#[derive(Debug, Clone)]
pub enum ScanOutcome {
    Success(ScanResults),
    Failure(String),
    PartialResult(ScanRecord),
}

#[derive(Debug, Clone)]
pub struct ScanEvent {
    pub kind: ScanKind,
    pub outcome: ScanOutcome,
}

impl ScanEvent {
    pub fn results(kind: ScanKind, records: Vec<ScanRecord>, all_channels_scanned: bool) -> Self {
        Self {
            kind,
            outcome: ScanOutcome::Success(ScanResults {
                records,
                all_channels_scanned,
            }),
        }
    }

    pub fn failure(kind: ScanKind, reason: impl Into<String>) -> Self {
        Self {
            kind,
            outcome: ScanOutcome::Failure(reason.into()),
        }
    }

    pub fn partial(kind: ScanKind, record: ScanRecord) -> Self {
        Self {
            kind,
            outcome: ScanOutcome::PartialResult(record),
        }
    }
}

// --- 选择结果 ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CandidateKind {
    Saved,
    ExternallyScored,
    Untrusted,
}

#[derive(Debug, Clone)]
pub struct Selection {
    pub profile: NetworkProfile,
    pub observation: AccessPointObservation,
    pub score: i32,
    pub kind: CandidateKind,
}
