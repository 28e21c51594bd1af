pub mod core;
pub mod scan;
pub mod selection;
pub mod storage;
pub mod utils;

use crate::core::config::EngineConfig;
use crate::core::error::{ErrorStatistics, Result, WlinkError};
use crate::core::metrics::{MetricsReport, SelectionMetrics};
use crate::core::traits::{ConnectionManager, ProfileStore, ScanIssuer};
use crate::core::types::{BandPreference, Bssid, ProfileId, ScanEvent, ScanKind, WifiInfo};
use crate::scan::orchestrator::{Action, OrchestratorStatus, ScanOrchestrator};
use crate::scan::timer::{TimerFired, TimerWheel};
use crate::selection::selector::NetworkSelector;

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

/// 事件循环的输入
#[derive(Debug)]
pub enum ServiceEvent {
    Screen(bool),
    Connection(WifiInfo),
    Radio(bool),
    Feature(bool),
    UntrustedAllowed(bool),
    BandPreference(BandPreference),
    AutoJoinWhenAssociated(bool),
    Scan(ScanEvent),
    UserSelected(ProfileId),
    TrackBssid { bssid: Bssid, enable: bool },
    AssociationRejected(Bssid),
    AuthenticationFailed(Bssid),
    ForceScan,
    ForgetAll,
    Status(oneshot::Sender<ServiceStatus>),
    Shutdown,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct ServiceStatus {
    pub scan: OrchestratorStatus,
    pub metrics: MetricsReport,
    pub errors_total: u64,
    /// 出现最多的错误码及次数
    pub top_errors: Vec<(u16, u64)>,
}

const TOP_ERRORS: usize = 3;

/// 事件循环使用的时钟；暂停的 tokio 时钟在测试中同样生效
fn now() -> Instant {
    tokio::time::Instant::now().into_std()
}

/// 选网与扫描调度服务
///
/// 所有输入（状态变化、扫描结果、定时器）都被串行化到同一个 tokio 任务上处理。
pub struct WifiConnectivityService;

impl WifiConnectivityService {
    /// 启动事件循环，必须在 tokio 运行时内调用
    pub fn start(
        config: EngineConfig,
        store: Arc<dyn ProfileStore>,
        scanner: Arc<dyn ScanIssuer>,
        connections: Arc<dyn ConnectionManager>,
    ) -> Result<ServiceHandle> {
        config.validate()?;

        let metrics = Arc::new(SelectionMetrics::new());
        let errors = Arc::new(Mutex::new(ErrorStatistics::new()));
        let selector = NetworkSelector::new(
            store,
            config.scoring.clone(),
            config.selection.clone(),
            metrics.clone(),
        );
        let orchestrator = ScanOrchestrator::new(selector, &config, metrics.clone());

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (timer_tx, timer_rx) = mpsc::unbounded_channel();

        let service_loop = ServiceLoop {
            orchestrator,
            scanner,
            connections,
            timers: TimerWheel::new(timer_tx),
            metrics: metrics.clone(),
            errors: errors.clone(),
        };
        let task = tokio::spawn(service_loop.run(events_rx, timer_rx));
        log::info!("Wifi connectivity service started");

        Ok(ServiceHandle {
            tx: events_tx,
            metrics,
            errors,
            task: Arc::new(Mutex::new(Some(task))),
        })
    }
}

/// 服务句柄，可以克隆；所有句柄都释放后事件循环自行退出
#[derive(Clone)]
pub struct ServiceHandle {
    tx: mpsc::UnboundedSender<ServiceEvent>,
    metrics: Arc<SelectionMetrics>,
    errors: Arc<Mutex<ErrorStatistics>>,
    task: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl ServiceHandle {
    pub fn send(&self, event: ServiceEvent) -> Result<()> {
        self.tx
            .send(event)
            .map_err(|_| WlinkError::service_stopped("send event", file!()))
    }

    pub fn screen_changed(&self, on: bool) -> Result<()> {
        self.send(ServiceEvent::Screen(on))
    }

    pub fn connection_changed(&self, info: WifiInfo) -> Result<()> {
        self.send(ServiceEvent::Connection(info))
    }

    pub fn radio_changed(&self, enabled: bool) -> Result<()> {
        self.send(ServiceEvent::Radio(enabled))
    }

    pub fn feature_changed(&self, enabled: bool) -> Result<()> {
        self.send(ServiceEvent::Feature(enabled))
    }

    pub fn set_untrusted_allowed(&self, allowed: bool) -> Result<()> {
        self.send(ServiceEvent::UntrustedAllowed(allowed))
    }

    pub fn set_band_preference(&self, preference: BandPreference) -> Result<()> {
        self.send(ServiceEvent::BandPreference(preference))
    }

    pub fn set_auto_join_when_associated(&self, enabled: bool) -> Result<()> {
        self.send(ServiceEvent::AutoJoinWhenAssociated(enabled))
    }

    pub fn report_scan(&self, event: ScanEvent) -> Result<()> {
        self.send(ServiceEvent::Scan(event))
    }

    pub fn user_selected(&self, profile: ProfileId) -> Result<()> {
        self.send(ServiceEvent::UserSelected(profile))
    }

    pub fn track_bssid(&self, bssid: Bssid, enable: bool) -> Result<()> {
        self.send(ServiceEvent::TrackBssid { bssid, enable })
    }

    pub fn association_rejected(&self, bssid: Bssid) -> Result<()> {
        self.send(ServiceEvent::AssociationRejected(bssid))
    }

    pub fn authentication_failed(&self, bssid: Bssid) -> Result<()> {
        self.send(ServiceEvent::AuthenticationFailed(bssid))
    }

    pub fn force_scan(&self) -> Result<()> {
        self.send(ServiceEvent::ForceScan)
    }

    pub fn forget_all(&self) -> Result<()> {
        self.send(ServiceEvent::ForgetAll)
    }

    /// 排在之前所有事件之后返回，可用来等待事件处理完毕
    pub async fn status(&self) -> Result<ServiceStatus> {
        let (tx, rx) = oneshot::channel();
        self.send(ServiceEvent::Status(tx))?;
        rx.await
            .map_err(|_| WlinkError::service_stopped("status", file!()))
    }

    pub fn metrics(&self) -> MetricsReport {
        self.metrics.get_report()
    }

    pub fn export_prometheus(&self) -> String {
        self.metrics.export_prometheus()
    }

    pub fn error_count(&self, code: u16) -> u64 {
        self.errors.lock().get_count(code)
    }

    pub fn errors_total(&self) -> u64 {
        self.errors.lock().total_count()
    }

    pub async fn shutdown(&self) {
        let _ = self.tx.send(ServiceEvent::Shutdown);
        let task = self.task.lock().take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                log::error!("Connectivity event loop ended abnormally: {}", e);
            }
        }
    }
}

struct ServiceLoop {
    orchestrator: ScanOrchestrator,
    scanner: Arc<dyn ScanIssuer>,
    connections: Arc<dyn ConnectionManager>,
    timers: TimerWheel,
    metrics: Arc<SelectionMetrics>,
    errors: Arc<Mutex<ErrorStatistics>>,
}

impl ServiceLoop {
    async fn run(
        mut self,
        mut events: mpsc::UnboundedReceiver<ServiceEvent>,
        mut timers: mpsc::UnboundedReceiver<TimerFired>,
    ) {
        let actions = self.orchestrator.start(now());
        self.execute(actions).await;

        loop {
            tokio::select! {
                event = events.recv() => match event {
                    None | Some(ServiceEvent::Shutdown) => break,
                    Some(event) => self.handle(event).await,
                },
                Some(fired) = timers.recv() => {
                    let actions = self.orchestrator.on_timer(fired, now());
                    self.execute(actions).await;
                }
            }
        }

        self.timers.cancel_all();
        log::info!("Wifi connectivity service stopped");
    }

    async fn handle(&mut self, event: ServiceEvent) {
        let at = now();
        let o = &mut self.orchestrator;
        let actions = match event {
            ServiceEvent::Screen(on) => o.set_screen(on, at),
            ServiceEvent::Connection(info) => o.on_wifi_state(info, at),
            ServiceEvent::Radio(enabled) => o.set_radio_enabled(enabled, at),
            ServiceEvent::Feature(enabled) => o.set_feature_enabled(enabled, at),
            ServiceEvent::UntrustedAllowed(allowed) => o.set_untrusted_allowed(allowed, at),
            ServiceEvent::BandPreference(preference) => o.set_band_preference(preference, at),
            ServiceEvent::AutoJoinWhenAssociated(enabled) => {
                o.set_auto_join_when_associated(enabled);
                Vec::new()
            }
            ServiceEvent::Scan(scan) => o.on_scan_event(scan, at),
            ServiceEvent::UserSelected(profile) => o.on_user_selection(profile, at),
            ServiceEvent::TrackBssid { bssid, enable } => o.track_bssid(bssid, enable, at),
            ServiceEvent::AssociationRejected(bssid) => o.note_association_rejection(bssid, at),
            ServiceEvent::AuthenticationFailed(bssid) => o.note_authentication_failure(bssid, at),
            ServiceEvent::ForceScan => o.force_connectivity_scan(at),
            ServiceEvent::ForgetAll => o.forget_all(),
            ServiceEvent::Status(reply) => {
                let (errors_total, top_errors) = {
                    let errors = self.errors.lock();
                    (errors.total_count(), errors.get_most_common(TOP_ERRORS))
                };
                let status = ServiceStatus {
                    scan: o.status(),
                    metrics: self.metrics.get_report(),
                    errors_total,
                    top_errors,
                };
                let _ = reply.send(status);
                Vec::new()
            }
            ServiceEvent::Shutdown => Vec::new(),
        };
        self.execute(actions).await;
    }

    fn record_error(&self, error: &WlinkError) {
        if error.is_retryable() {
            log::warn!("{}", error.to_log_string());
        } else {
            log::error!("{}", error.to_log_string());
        }
        self.errors.lock().record(error);
    }

    /// 执行动作；扫描发起失败作为扫描失败事件回送给调度器
    async fn execute(&mut self, actions: Vec<Action>) {
        let mut queue: VecDeque<Action> = actions.into();
        while let Some(action) = queue.pop_front() {
            match action {
                Action::StartSingleScan(request) => {
                    self.metrics.record_scan_started(ScanKind::Single);
                    if let Err(e) = self.scanner.start_scan(request).await {
                        self.record_error(&e);
                        let event = ScanEvent::failure(ScanKind::Single, e.original_message());
                        queue.extend(self.orchestrator.on_scan_event(event, now()));
                    }
                }
                Action::StartPnoScan(request) => {
                    self.metrics.record_scan_started(ScanKind::Pno);
                    if let Err(e) = self.scanner.start_pno_scan(request).await {
                        self.record_error(&e);
                        let event = ScanEvent::failure(ScanKind::Pno, e.original_message());
                        queue.extend(self.orchestrator.on_scan_event(event, now()));
                    }
                }
                Action::StopPnoScan => {
                    if let Err(e) = self.scanner.stop_pno_scan().await {
                        let err = WlinkError::pno_stop_failed(e.original_message(), file!())
                            .with_source(e);
                        self.record_error(&err);
                    }
                }
                Action::ArmTimer {
                    kind,
                    serial,
                    delay,
                } => self.timers.arm(kind, serial, delay),
                Action::CancelTimer(kind) => self.timers.cancel(kind),
                Action::Connect { profile, bssid } => {
                    if let Err(e) = self.connections.connect(profile, bssid).await {
                        self.record_error(&e);
                    }
                }
                Action::Roam { profile, bssid } => {
                    if let Err(e) = self.connections.roam(profile, bssid).await {
                        self.record_error(&e);
                    }
                }
            }
        }
    }
}

pub use crate::core::error;
pub use crate::core::types;
pub use crate::scan::memory::{MemoryConnectionManager, MemoryScanIssuer};
pub use crate::storage::memory_store::MemoryProfileStore;
