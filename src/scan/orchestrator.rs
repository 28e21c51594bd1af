//! 扫描调度与连接门控
//!
//! 调度器本身不做 I/O：每个入口返回一组 [`Action`]，由事件循环执行。
//! 时间由调用方传入，测试可以精确控制。

use crate::core::config::{EngineConfig, ScheduleConfig};
use crate::core::error::WlinkError;
use crate::core::metrics::SelectionMetrics;
use crate::core::types::{
    AccessPointObservation, BandPreference, BandSelector, Bssid, PnoMode, PnoNetwork, PnoRequest,
    ProfileId, ReportingMode, ScanEvent, ScanKind, ScanOutcome, ScanRecord, ScanRequest,
    Selection, WifiInfo, WifiState,
};
use crate::scan::limiter::ConnectionAttemptLimiter;
use crate::scan::timer::{TimerFired, TimerKind, TimerSerials};
use crate::selection::selector::{NetworkSelector, SelectionContext};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ScanMode {
    Stopped,
    PeriodicScan,
    DisconnectedPno,
    ConnectedPno,
}

/// 决定扫描模式的全部输入
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeInputs {
    pub radio_enabled: bool,
    pub feature_enabled: bool,
    pub screen_on: bool,
    pub wifi_state: WifiState,
}

impl Default for ModeInputs {
    fn default() -> Self {
        Self {
            radio_enabled: true,
            feature_enabled: true,
            screen_on: true,
            wifi_state: WifiState::Unknown,
        }
    }
}

/// 模式转移表
pub fn resolve_mode(inputs: &ModeInputs) -> ScanMode {
    match (
        inputs.radio_enabled && inputs.feature_enabled,
        inputs.wifi_state,
        inputs.screen_on,
    ) {
        (false, _, _) => ScanMode::Stopped,
        (true, WifiState::Unknown | WifiState::Transitioning, _) => ScanMode::Stopped,
        (true, WifiState::Connected | WifiState::Disconnected, true) => ScanMode::PeriodicScan,
        (true, WifiState::Connected, false) => ScanMode::ConnectedPno,
        (true, WifiState::Disconnected, false) => ScanMode::DisconnectedPno,
    }
}

/// 调度器请求事件循环执行的动作
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    StartSingleScan(ScanRequest),
    StartPnoScan(PnoRequest),
    StopPnoScan,
    ArmTimer {
        kind: TimerKind,
        serial: u64,
        delay: Duration,
    },
    CancelTimer(TimerKind),
    Connect {
        profile: ProfileId,
        bssid: Bssid,
    },
    Roam {
        profile: ProfileId,
        bssid: Bssid,
    },
}

/// 调度器状态快照
#[derive(Debug, Clone, Serialize)]
pub struct OrchestratorStatus {
    pub mode: ScanMode,
    pub periodic_interval_secs: u64,
    pub pno_backoff_secs: u64,
    pub single_scan_restarts: u32,
    pub connectivity_scan_restarts: u32,
    pub pno_active: bool,
    pub wait_for_full_band: bool,
    pub armed_timers: Vec<String>,
    pub last_attempt_bssid: Option<String>,
    pub recent_attempts: usize,
    pub blacklisted_bssids: usize,
}

pub struct ScanOrchestrator {
    selector: NetworkSelector,
    limiter: ConnectionAttemptLimiter,
    schedule: ScheduleConfig,
    metrics: Arc<SelectionMetrics>,

    mode: ScanMode,
    inputs: ModeInputs,
    wifi_info: WifiInfo,
    allow_untrusted: bool,

    periodic_interval: Duration,
    pno_backoff: Duration,
    single_restarts: u32,
    pno_restarts: u32,
    last_periodic_scan: Option<Instant>,
    last_single_full_band: bool,
    last_attempt_bssid: Option<Bssid>,
    wait_for_full_band: bool,
    pno_active: bool,
    partial_results: HashMap<ScanKind, Vec<ScanRecord>>,

    serials: TimerSerials,
    pending: Vec<Action>,
}

impl ScanOrchestrator {
    pub fn new(
        selector: NetworkSelector,
        config: &EngineConfig,
        metrics: Arc<SelectionMetrics>,
    ) -> Self {
        let schedule = config.schedule.clone();
        Self {
            selector,
            limiter: ConnectionAttemptLimiter::new(
                config.rate_limit.window(),
                config.rate_limit.max_attempts,
            ),
            periodic_interval: schedule.periodic_interval_min(),
            pno_backoff: schedule.pno_backoff_min(),
            schedule,
            metrics,
            mode: ScanMode::Stopped,
            inputs: ModeInputs::default(),
            wifi_info: WifiInfo::default(),
            allow_untrusted: false,
            single_restarts: 0,
            pno_restarts: 0,
            last_periodic_scan: None,
            last_single_full_band: true,
            last_attempt_bssid: None,
            wait_for_full_band: false,
            pno_active: false,
            partial_results: HashMap::new(),
            serials: TimerSerials::new(),
            pending: Vec::new(),
        }
    }

    // ============ 访问器 ============

    pub fn mode(&self) -> ScanMode {
        self.mode
    }

    pub fn inputs(&self) -> ModeInputs {
        self.inputs
    }

    pub fn selector(&self) -> &NetworkSelector {
        &self.selector
    }

    pub fn selector_mut(&mut self) -> &mut NetworkSelector {
        &mut self.selector
    }

    pub fn is_timer_armed(&self, kind: TimerKind) -> bool {
        self.serials.is_armed(kind)
    }

    pub fn periodic_interval(&self) -> Duration {
        self.periodic_interval
    }

    pub fn pno_backoff(&self) -> Duration {
        self.pno_backoff
    }

    pub fn status(&self) -> OrchestratorStatus {
        OrchestratorStatus {
            mode: self.mode,
            periodic_interval_secs: self.periodic_interval.as_secs(),
            pno_backoff_secs: self.pno_backoff.as_secs(),
            single_scan_restarts: self.single_restarts,
            connectivity_scan_restarts: self.pno_restarts,
            pno_active: self.pno_active,
            wait_for_full_band: self.wait_for_full_band,
            armed_timers: TimerKind::ALL
                .iter()
                .filter(|k| self.serials.is_armed(**k))
                .map(|k| format!("{:?}", k))
                .collect(),
            last_attempt_bssid: self.last_attempt_bssid.map(|b| b.to_string()),
            recent_attempts: self.limiter.len(),
            blacklisted_bssids: self.selector.blacklist().len(),
        }
    }

    // ============ 外部事件 ============

    /// 按当前输入进入初始模式
    pub fn start(&mut self, now: Instant) -> Vec<Action> {
        self.reevaluate(now, true, true);
        self.take_actions()
    }

    pub fn set_screen(&mut self, on: bool, now: Instant) -> Vec<Action> {
        self.inputs.screen_on = on;
        log::info!("Screen {}", if on { "on" } else { "off" });
        self.reevaluate(now, on, true);
        self.take_actions()
    }

    pub fn set_radio_enabled(&mut self, enabled: bool, now: Instant) -> Vec<Action> {
        self.inputs.radio_enabled = enabled;
        self.on_enablement_changed(enabled, now);
        self.take_actions()
    }

    pub fn set_feature_enabled(&mut self, enabled: bool, now: Instant) -> Vec<Action> {
        self.inputs.feature_enabled = enabled;
        self.on_enablement_changed(enabled, now);
        self.take_actions()
    }

    /// 只有连接状态或关联网络变化才重新选择模式；
    /// 仅信号、流量变化的更新只记录下来
    pub fn on_wifi_state(&mut self, info: WifiInfo, now: Instant) -> Vec<Action> {
        let previous_state = self.wifi_info.state;
        let previous_profile = self.wifi_info.profile_id;
        let changed = info.state != previous_state
            || (info.state == WifiState::Connected && info.profile_id != previous_profile);
        self.inputs.wifi_state = info.state;
        self.wifi_info = info;
        if !changed {
            return self.take_actions();
        }

        match self.wifi_info.state {
            WifiState::Disconnected => {
                self.last_attempt_bssid = None;
                self.arm(TimerKind::Watchdog, self.schedule.watchdog_interval());
            }
            WifiState::Connected => {
                self.cancel(TimerKind::Watchdog);
                if let Some(profile) = self.wifi_info.profile_id {
                    self.selector.on_connected(
                        profile,
                        self.wifi_info.bssid,
                        self.wifi_info.gateway,
                    );
                }
            }
            WifiState::Unknown | WifiState::Transitioning => {}
        }

        self.reevaluate(now, false, true);
        self.take_actions()
    }

    pub fn set_untrusted_allowed(&mut self, allowed: bool, now: Instant) -> Vec<Action> {
        if self.allow_untrusted != allowed {
            self.allow_untrusted = allowed;
            log::info!("Untrusted connections {}", if allowed { "allowed" } else { "disallowed" });
            self.reevaluate(now, true, true);
        }
        self.take_actions()
    }

    pub fn set_band_preference(&mut self, preference: BandPreference, now: Instant) -> Vec<Action> {
        if self.selector.band_preference() != preference {
            self.selector.set_band_preference(preference);
            log::info!("Band preference set to {:?}", preference);
            self.reevaluate(now, true, true);
        }
        self.take_actions()
    }

    pub fn set_auto_join_when_associated(&mut self, enabled: bool) {
        self.selector.set_auto_join_when_associated(enabled);
    }

    /// `enable = false` 计一次拒绝；如果因此拉黑，立即重新扫描
    pub fn track_bssid(&mut self, bssid: Bssid, enable: bool, now: Instant) -> Vec<Action> {
        if self.selector.track_bssid(bssid, enable, now) {
            log::info!("{} blacklisted, restarting connectivity scan", bssid);
            self.reevaluate(now, true, true);
        }
        self.take_actions()
    }

    pub fn note_association_rejection(&mut self, bssid: Bssid, now: Instant) -> Vec<Action> {
        if self.selector.note_association_rejection(bssid, now) {
            self.reevaluate(now, true, true);
        }
        self.take_actions()
    }

    pub fn note_authentication_failure(&mut self, bssid: Bssid, now: Instant) -> Vec<Action> {
        if self.selector.note_authentication_failure(bssid, now) {
            self.reevaluate(now, true, true);
        }
        self.take_actions()
    }

    pub fn on_user_selection(&mut self, profile: ProfileId, now: Instant) -> Vec<Action> {
        if self.selector.store().profile(profile).is_none() {
            let err = WlinkError::profile_not_found(profile.0, file!());
            log::warn!("{}", err.to_log_string());
            return Vec::new();
        }
        self.selector.on_user_selection(profile, now);
        self.limiter.clear();
        self.take_actions()
    }

    /// 全频段单次扫描；在全频段结果到达前忽略部分扫描结果
    pub fn force_connectivity_scan(&mut self, now: Instant) -> Vec<Action> {
        if self.scanning_allowed() {
            self.wait_for_full_band = true;
            self.start_single_scan(true, now);
        }
        self.take_actions()
    }

    pub fn forget_all(&mut self) -> Vec<Action> {
        self.selector.forget_all();
        self.limiter.clear();
        self.last_attempt_bssid = None;
        self.partial_results.clear();
        self.take_actions()
    }

    pub fn on_scan_event(&mut self, event: ScanEvent, now: Instant) -> Vec<Action> {
        match event.outcome {
            ScanOutcome::PartialResult(record) => {
                self.partial_results.entry(event.kind).or_default().push(record);
            }
            ScanOutcome::Failure(reason) => {
                self.partial_results.remove(&event.kind);
                self.on_scan_failure(event.kind, reason);
            }
            ScanOutcome::Success(results) => {
                let mut records = self.partial_results.remove(&event.kind).unwrap_or_default();
                records.retain(|p| !results.records.iter().any(|r| r.bssid == p.bssid));
                records.extend(results.records);

                match event.kind {
                    ScanKind::Single => {
                        self.single_restarts = 0;
                        if self.wait_for_full_band && !results.all_channels_scanned {
                            log::debug!("Dropping partial-band results while waiting for a full-band scan");
                        } else {
                            self.wait_for_full_band = false;
                            self.handle_results(records, now);
                        }
                    }
                    ScanKind::Pno => {
                        self.pno_restarts = 0;
                        if self.handle_results(records, now) {
                            self.pno_backoff = self.schedule.pno_backoff_min();
                        } else if self.is_pno_mode() {
                            log::debug!(
                                "PNO found no usable candidate, rescheduling in {:?}",
                                self.pno_backoff
                            );
                            self.arm(TimerKind::RestartConnectivityScan, self.pno_backoff);
                            self.pno_backoff =
                                (self.pno_backoff * 2).min(self.schedule.pno_backoff_max());
                        }
                    }
                }
            }
        }
        self.take_actions()
    }

    pub fn on_timer(&mut self, fired: TimerFired, now: Instant) -> Vec<Action> {
        if !self.serials.take_if_current(fired) {
            log::debug!("Ignoring stale timer {:?}#{}", fired.kind, fired.serial);
            return Vec::new();
        }
        match fired.kind {
            TimerKind::PeriodicScan => {
                if self.mode == ScanMode::PeriodicScan {
                    self.start_periodic_single_scan(now);
                }
            }
            TimerKind::RestartSingleScan => {
                if self.scanning_allowed() {
                    self.start_single_scan(self.last_single_full_band, now);
                }
            }
            TimerKind::RestartConnectivityScan => {
                self.reevaluate(now, false, false);
            }
            TimerKind::Watchdog => {
                if self.wifi_info.is_disconnected() && self.scanning_allowed() {
                    log::info!("Watchdog fired while disconnected, scanning");
                    self.arm(TimerKind::Watchdog, self.schedule.watchdog_interval());
                    self.start_single_scan(true, now);
                }
            }
        }
        self.take_actions()
    }

    // ============ 内部逻辑 ============

    fn take_actions(&mut self) -> Vec<Action> {
        std::mem::take(&mut self.pending)
    }

    fn emit(&mut self, action: Action) {
        self.pending.push(action);
    }

    fn arm(&mut self, kind: TimerKind, delay: Duration) {
        let serial = self.serials.arm(kind);
        self.emit(Action::ArmTimer {
            kind,
            serial,
            delay,
        });
    }

    fn cancel(&mut self, kind: TimerKind) {
        if self.serials.disarm(kind) {
            self.emit(Action::CancelTimer(kind));
        }
    }

    fn scanning_allowed(&self) -> bool {
        self.inputs.radio_enabled && self.inputs.feature_enabled
    }

    fn is_pno_mode(&self) -> bool {
        matches!(self.mode, ScanMode::ConnectedPno | ScanMode::DisconnectedPno)
    }

    fn on_enablement_changed(&mut self, enabled: bool, now: Instant) {
        if enabled {
            self.reevaluate(now, true, true);
            return;
        }
        log::info!("Connectivity scanning disabled, stopping");
        self.exit_mode();
        for kind in TimerKind::ALL {
            self.cancel(kind);
        }
        self.last_periodic_scan = None;
        self.last_attempt_bssid = None;
        self.wait_for_full_band = false;
        self.partial_results.clear();
        self.mode = ScanMode::Stopped;
    }

    fn exit_mode(&mut self) {
        match self.mode {
            ScanMode::PeriodicScan => self.cancel(TimerKind::PeriodicScan),
            ScanMode::ConnectedPno | ScanMode::DisconnectedPno => {
                if self.pno_active {
                    self.pno_active = false;
                    self.emit(Action::StopPnoScan);
                }
            }
            ScanMode::Stopped => {}
        }
    }

    /// 退出旧模式再按转移表进入新模式
    fn reevaluate(&mut self, now: Instant, immediately: bool, reset_restarts: bool) {
        let target = resolve_mode(&self.inputs);
        self.exit_mode();
        if reset_restarts {
            self.single_restarts = 0;
            self.pno_restarts = 0;
        }
        if target != self.mode {
            log::info!("Scan mode {:?} -> {:?}", self.mode, target);
            self.pno_backoff = self.schedule.pno_backoff_min();
        }
        self.mode = target;

        match target {
            ScanMode::Stopped => {}
            ScanMode::PeriodicScan => self.start_periodic_scan(immediately, now),
            ScanMode::ConnectedPno => self.start_pno_scan(PnoMode::Connected),
            ScanMode::DisconnectedPno => self.start_pno_scan(PnoMode::Disconnected),
        }
    }

    fn start_periodic_scan(&mut self, immediately: bool, now: Instant) {
        if immediately {
            self.last_periodic_scan = None;
        }
        self.periodic_interval = self.schedule.periodic_interval_min();
        self.start_periodic_single_scan(now);
    }

    fn start_periodic_single_scan(&mut self, now: Instant) {
        let min_interval = self.schedule.periodic_interval_min();
        if let Some(last) = self.last_periodic_scan {
            let since = now.saturating_duration_since(last);
            if since < min_interval {
                // 距上次扫描不足最小间隔，推迟到间隔结束
                self.arm(TimerKind::PeriodicScan, min_interval - since);
                return;
            }
        }

        let heavy_traffic = self.wifi_info.is_connected()
            && (self.wifi_info.tx_packets_per_sec > self.schedule.tx_packet_threshold
                || self.wifi_info.rx_packets_per_sec > self.schedule.rx_packet_threshold);
        if heavy_traffic {
            log::debug!("Heavy traffic, using a partial scan");
        }

        self.last_periodic_scan = Some(now);
        self.start_single_scan(!heavy_traffic, now);
        self.arm(TimerKind::PeriodicScan, self.periodic_interval);
        self.periodic_interval = (self.periodic_interval * 2).min(self.schedule.periodic_interval_max());
    }

    fn band_selector(&self) -> BandSelector {
        match self.selector.band_preference() {
            BandPreference::Auto => BandSelector::All,
            BandPreference::Only24Ghz => BandSelector::Band24Ghz,
            BandPreference::Only5Ghz => BandSelector::Band5Ghz,
        }
    }

    fn hidden_ssids(&self) -> Vec<String> {
        self.selector
            .store()
            .enabled_profiles()
            .into_iter()
            .filter(|p| p.hidden)
            .map(|p| p.ssid)
            .collect()
    }

    fn start_single_scan(&mut self, full_band: bool, now: Instant) {
        self.last_single_full_band = full_band;

        let mut band = self.band_selector();
        if !full_band {
            let channels = self.partial_scan_channels(now);
            if channels.is_empty() {
                log::debug!("No recent channels for the current network, falling back to full band");
            } else {
                band = BandSelector::Channels(channels);
            }
        }

        let request = ScanRequest {
            band,
            hidden_ssids: self.hidden_ssids(),
            reporting: ReportingMode::FullResults,
        };
        log::debug!("Starting single scan: {:?}", request.band);
        self.emit(Action::StartSingleScan(request));
    }

    fn partial_scan_channels(&self, now: Instant) -> Vec<u32> {
        let Some(profile) = self.wifi_info.profile_id else {
            return Vec::new();
        };
        let mut channels = self.selector.recent_frequencies(profile, now);
        let current = self.wifi_info.frequency;
        if current != 0 && !channels.contains(&current) {
            channels.push(current);
            channels.sort_unstable();
        }
        channels
    }

    fn start_pno_scan(&mut self, mode: PnoMode) {
        let networks: Vec<PnoNetwork> = self
            .selector
            .store()
            .enabled_profiles()
            .into_iter()
            .filter(|p| !p.ephemeral)
            .map(|p| PnoNetwork {
                ssid: p.ssid,
                security: p.security,
                hidden: p.hidden,
            })
            .collect();
        if networks.is_empty() {
            log::debug!("No saved networks, not starting {:?} PNO", mode);
            return;
        }

        let scoring = self.selector.scorer().config();
        let request = PnoRequest {
            mode,
            band: self.band_selector(),
            networks,
            interval: match mode {
                PnoMode::Connected => self.schedule.connected_pno_interval(),
                PnoMode::Disconnected => self.schedule.disconnected_pno_interval(),
            },
            min_rssi_24: scoring.minimum_rssi_24,
            min_rssi_5: scoring.minimum_rssi_5,
            reporting: ReportingMode::Aggregate,
        };
        log::debug!("Starting {:?} PNO with {} networks", mode, request.networks.len());
        self.pno_active = true;
        self.emit(Action::StartPnoScan(request));
    }

    fn on_scan_failure(&mut self, kind: ScanKind, reason: String) {
        self.metrics.record_scan_failure(kind);
        let max = self.schedule.max_scan_restarts;
        let delay = self.schedule.restart_delay();
        let (counter, timer) = match kind {
            ScanKind::Single => (&mut self.single_restarts, TimerKind::RestartSingleScan),
            ScanKind::Pno => {
                self.pno_active = false;
                (&mut self.pno_restarts, TimerKind::RestartConnectivityScan)
            }
        };

        if *counter < max {
            *counter += 1;
            log::warn!(
                "{:?} scan failed ({}), retry {}/{} in {:?}",
                kind,
                reason,
                counter,
                max,
                delay
            );
            self.arm(timer, delay);
        } else {
            let kind_name = format!("{:?}", kind).to_lowercase();
            let err = WlinkError::scan_retry_exhausted(kind_name.clone(), max, file!())
                .with_debug_info(serde_json::json!({
                    "restartDelayMs": delay.as_millis() as u64,
                    "mode": format!("{:?}", self.mode),
                }))
                .with_source(WlinkError::scan_start_failed(kind_name, reason, file!()));
            log::warn!("{}", err.to_log_string());
            self.metrics.record_retries_exhausted();
        }
    }

    /// 选网并通过连接门控；返回是否找到候选
    fn handle_results(&mut self, records: Vec<ScanRecord>, now: Instant) -> bool {
        let mut observations = Vec::with_capacity(records.len());
        for record in records {
            let bssid_text = record.bssid.clone();
            match AccessPointObservation::try_from(record) {
                Ok(observation) => observations.push(observation),
                Err(reason) => {
                    self.metrics.record_malformed();
                    let err = WlinkError::malformed_observation(bssid_text, reason, file!());
                    log::debug!("{}", err.to_log_string());
                }
            }
        }

        let ctx = SelectionContext::from_wifi_info(&self.wifi_info, self.allow_untrusted, now);
        match self.selector.select_best(&observations, &ctx) {
            Some(selection) => {
                self.connect_to(selection, now);
                true
            }
            None => false,
        }
    }

    fn connect_to(&mut self, selection: Selection, now: Instant) {
        let target = selection.observation.bssid;
        let candidate = &selection.profile;
        let associating = self.wifi_info.is_connected() || self.wifi_info.supplicant_connecting;

        if associating
            && (self.last_attempt_bssid == Some(target) || self.wifi_info.bssid == Some(target))
        {
            log::debug!("Already connected or connecting to {}, skipping", target);
            return;
        }

        if !self.inputs.screen_on && self.limiter.should_skip(now) {
            log::info!("Too many connection attempts with the screen off, skipping {}", target);
            self.metrics.record_rate_limited();
            return;
        }
        self.limiter.record(now);
        self.last_attempt_bssid = Some(target);

        let current = self
            .wifi_info
            .profile_id
            .and_then(|id| self.selector.store().profile(id));
        let roam = current
            .map(|c| c.id == candidate.id || c.is_linked(candidate.id))
            .unwrap_or(false);

        if roam {
            log::info!("Roaming to {} within {}", target, candidate.id);
            self.metrics.record_roam();
            self.emit(Action::Roam {
                profile: candidate.id,
                bssid: target,
            });
        } else {
            log::info!("Connecting to '{}' ({}) via {}", candidate.ssid, candidate.id, target);
            self.metrics.record_connect();
            self.emit(Action::Connect {
                profile: candidate.id,
                bssid: target,
            });
        }
    }
}
