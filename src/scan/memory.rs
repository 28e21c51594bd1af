use crate::core::error::{Result, WlinkError};
use crate::core::traits::{ConnectionManager, ScanIssuer};
use crate::core::types::{Bssid, PnoRequest, ProfileId, ScanRequest};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;

/// A recording scanner for tests and demonstrations.
/// Requests are stored; results are fed back by the caller as `ScanEvent`s.
#[derive(Clone, Default)]
pub struct MemoryScanIssuer {
    single_requests: Arc<Mutex<Vec<ScanRequest>>>,
    pno_requests: Arc<Mutex<Vec<PnoRequest>>>,
    pno_stops: Arc<Mutex<usize>>,
    should_fail: Arc<Mutex<bool>>,
}

impl MemoryScanIssuer {
    pub fn new() -> Self {
        Self::default()
    }

    /// 之后的扫描请求全部失败
    pub fn set_failure(&self, fail: bool) {
        *self.should_fail.lock() = fail;
    }

    pub fn single_requests(&self) -> Vec<ScanRequest> {
        self.single_requests.lock().clone()
    }

    pub fn pno_requests(&self) -> Vec<PnoRequest> {
        self.pno_requests.lock().clone()
    }

    pub fn pno_stop_count(&self) -> usize {
        *self.pno_stops.lock()
    }

    pub fn clear(&self) {
        self.single_requests.lock().clear();
        self.pno_requests.lock().clear();
        *self.pno_stops.lock() = 0;
    }
}

#[async_trait]
impl ScanIssuer for MemoryScanIssuer {
    async fn start_scan(&self, request: ScanRequest) -> Result<()> {
        self.single_requests.lock().push(request);
        if *self.should_fail.lock() {
            return Err(WlinkError::scan_start_failed("single", "simulated failure", file!()));
        }
        Ok(())
    }

    async fn start_pno_scan(&self, request: PnoRequest) -> Result<()> {
        self.pno_requests.lock().push(request);
        if *self.should_fail.lock() {
            return Err(WlinkError::scan_start_failed("pno", "simulated failure", file!()));
        }
        Ok(())
    }

    async fn stop_pno_scan(&self) -> Result<()> {
        *self.pno_stops.lock() += 1;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionCommand {
    Connect(ProfileId, Bssid),
    Roam(ProfileId, Bssid),
}

/// A recording connection manager for tests and demonstrations.
#[derive(Clone, Default)]
pub struct MemoryConnectionManager {
    commands: Arc<Mutex<Vec<ConnectionCommand>>>,
    should_fail: Arc<Mutex<bool>>,
}

impl MemoryConnectionManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failure(&self, fail: bool) {
        *self.should_fail.lock() = fail;
    }

    pub fn commands(&self) -> Vec<ConnectionCommand> {
        self.commands.lock().clone()
    }

    pub fn clear(&self) {
        self.commands.lock().clear();
    }
}

#[async_trait]
impl ConnectionManager for MemoryConnectionManager {
    async fn connect(&self, profile: ProfileId, bssid: Bssid) -> Result<()> {
        self.commands
            .lock()
            .push(ConnectionCommand::Connect(profile, bssid));
        if *self.should_fail.lock() {
            return Err(WlinkError::connect_failed(
                profile.0,
                bssid.to_string(),
                "simulated failure".to_string(),
                file!(),
            ));
        }
        log::info!("[MemoryConnectionManager] connect {} via {}", profile, bssid);
        Ok(())
    }

    async fn roam(&self, profile: ProfileId, bssid: Bssid) -> Result<()> {
        self.commands.lock().push(ConnectionCommand::Roam(profile, bssid));
        if *self.should_fail.lock() {
            return Err(WlinkError::roam_failed(
                profile.0,
                bssid.to_string(),
                "simulated failure".to_string(),
                file!(),
            ));
        }
        log::info!("[MemoryConnectionManager] roam {} to {}", profile, bssid);
        Ok(())
    }
}
