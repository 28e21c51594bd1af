use crate::core::types::{CandidateKind, ScanKind};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// 选网与扫描调度的计数器
pub struct SelectionMetrics {
    selection_passes: AtomicU64,
    selections_made: AtomicU64,

    // 被过滤掉的观测
    rejected_empty_ssid: AtomicU64,
    rejected_blacklisted: AtomicU64,
    rejected_low_rssi: AtomicU64,
    rejected_malformed: AtomicU64,

    connection_attempts: AtomicU64,
    roam_attempts: AtomicU64,
    rate_limited_attempts: AtomicU64,
    scan_retries_exhausted: AtomicU64,

    // 按扫描类型统计
    scans_started: DashMap<ScanKind, AtomicU64>,
    scan_failures: DashMap<ScanKind, AtomicU64>,

    // 按候选类型统计
    selections_by_kind: DashMap<CandidateKind, AtomicU64>,

    start_time: Instant,
}

impl Default for SelectionMetrics {
    fn default() -> Self {
        Self {
            selection_passes: AtomicU64::new(0),
            selections_made: AtomicU64::new(0),
            rejected_empty_ssid: AtomicU64::new(0),
            rejected_blacklisted: AtomicU64::new(0),
            rejected_low_rssi: AtomicU64::new(0),
            rejected_malformed: AtomicU64::new(0),
            connection_attempts: AtomicU64::new(0),
            roam_attempts: AtomicU64::new(0),
            rate_limited_attempts: AtomicU64::new(0),
            scan_retries_exhausted: AtomicU64::new(0),
            scans_started: DashMap::new(),
            scan_failures: DashMap::new(),
            selections_by_kind: DashMap::new(),
            start_time: Instant::now(),
        }
    }
}

impl SelectionMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_pass(&self) {
        self.selection_passes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_selection(&self, kind: CandidateKind) {
        self.selections_made.fetch_add(1, Ordering::Relaxed);
        self.selections_by_kind
            .entry(kind)
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_empty_ssid(&self) {
        self.rejected_empty_ssid.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_blacklisted(&self) {
        self.rejected_blacklisted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_low_rssi(&self) {
        self.rejected_low_rssi.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_malformed(&self) {
        self.rejected_malformed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_connect(&self) {
        self.connection_attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_roam(&self) {
        self.roam_attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rate_limited(&self) {
        self.rate_limited_attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_retries_exhausted(&self) {
        self.scan_retries_exhausted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_scan_started(&self, kind: ScanKind) {
        self.scans_started
            .entry(kind)
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_scan_failure(&self, kind: ScanKind) {
        self.scan_failures
            .entry(kind)
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_report(&self) -> MetricsReport {
        let load = |map: &DashMap<ScanKind, AtomicU64>, kind: ScanKind| {
            map.get(&kind)
                .map(|v| v.load(Ordering::Relaxed))
                .unwrap_or(0)
        };
        MetricsReport {
            uptime_secs: self.start_time.elapsed().as_secs(),
            selection_passes: self.selection_passes.load(Ordering::Relaxed),
            selections_made: self.selections_made.load(Ordering::Relaxed),
            rejected_empty_ssid: self.rejected_empty_ssid.load(Ordering::Relaxed),
            rejected_blacklisted: self.rejected_blacklisted.load(Ordering::Relaxed),
            rejected_low_rssi: self.rejected_low_rssi.load(Ordering::Relaxed),
            rejected_malformed: self.rejected_malformed.load(Ordering::Relaxed),
            connection_attempts: self.connection_attempts.load(Ordering::Relaxed),
            roam_attempts: self.roam_attempts.load(Ordering::Relaxed),
            rate_limited_attempts: self.rate_limited_attempts.load(Ordering::Relaxed),
            scan_retries_exhausted: self.scan_retries_exhausted.load(Ordering::Relaxed),
            single_scans_started: load(&self.scans_started, ScanKind::Single),
            pno_scans_started: load(&self.scans_started, ScanKind::Pno),
            single_scan_failures: load(&self.scan_failures, ScanKind::Single),
            pno_scan_failures: load(&self.scan_failures, ScanKind::Pno),
        }
    }

    /// 导出为 Prometheus 格式
    pub fn export_prometheus(&self) -> String {
        let report = self.get_report();
        let mut out = String::new();
        let mut counter = |name: &str, help: &str, value: u64| {
            out.push_str(&format!("# HELP wlink_{} {}\n", name, help));
            out.push_str(&format!("# TYPE wlink_{} counter\n", name));
            out.push_str(&format!("wlink_{} {}\n", name, value));
        };
        counter(
            "selection_passes_total",
            "Total number of network selection passes",
            report.selection_passes,
        );
        counter(
            "selections_total",
            "Total number of passes that produced a candidate",
            report.selections_made,
        );
        counter(
            "connection_attempts_total",
            "Total number of connect commands issued",
            report.connection_attempts,
        );
        counter(
            "roam_attempts_total",
            "Total number of roam commands issued",
            report.roam_attempts,
        );
        counter(
            "rate_limited_attempts_total",
            "Connection attempts skipped by the screen-off limiter",
            report.rate_limited_attempts,
        );

        out.push_str("# HELP wlink_rejected_observations_total Observations dropped before scoring\n");
        out.push_str("# TYPE wlink_rejected_observations_total counter\n");
        for (reason, value) in [
            ("empty_ssid", report.rejected_empty_ssid),
            ("blacklisted", report.rejected_blacklisted),
            ("low_rssi", report.rejected_low_rssi),
            ("malformed", report.rejected_malformed),
        ] {
            out.push_str(&format!(
                "wlink_rejected_observations_total{{reason=\"{}\"}} {}\n",
                reason, value
            ));
        }

        for entry in self.scans_started.iter() {
            out.push_str(&format!(
                "wlink_scans_started_total{{kind=\"{:?}\"}} {}\n",
                entry.key(),
                entry.value().load(Ordering::Relaxed)
            ));
        }
        for entry in self.scan_failures.iter() {
            out.push_str(&format!(
                "wlink_scan_failures_total{{kind=\"{:?}\"}} {}\n",
                entry.key(),
                entry.value().load(Ordering::Relaxed)
            ));
        }
        for entry in self.selections_by_kind.iter() {
            out.push_str(&format!(
                "wlink_selections_by_kind_total{{kind=\"{:?}\"}} {}\n",
                entry.key(),
                entry.value().load(Ordering::Relaxed)
            ));
        }
        out
    }

    /// 清零所有计数器
    pub fn clear(&self) {
        for counter in [
            &self.selection_passes,
            &self.selections_made,
            &self.rejected_empty_ssid,
            &self.rejected_blacklisted,
            &self.rejected_low_rssi,
            &self.rejected_malformed,
            &self.connection_attempts,
            &self.roam_attempts,
            &self.rate_limited_attempts,
            &self.scan_retries_exhausted,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
        crate::utils::dashmap::clear_dashmap(&self.scans_started);
        crate::utils::dashmap::clear_dashmap(&self.scan_failures);
        crate::utils::dashmap::clear_dashmap(&self.selections_by_kind);

        log::debug!("SelectionMetrics: cleared all counters");
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct MetricsReport {
    pub uptime_secs: u64,
    pub selection_passes: u64,
    pub selections_made: u64,
    pub rejected_empty_ssid: u64,
    pub rejected_blacklisted: u64,
    pub rejected_low_rssi: u64,
    pub rejected_malformed: u64,
    pub connection_attempts: u64,
    pub roam_attempts: u64,
    pub rate_limited_attempts: u64,
    pub scan_retries_exhausted: u64,
    pub single_scans_started: u64,
    pub pno_scans_started: u64,
    pub single_scan_failures: u64,
    pub pno_scan_failures: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_and_clear() {
        let metrics = SelectionMetrics::new();
        metrics.record_pass();
        metrics.record_selection(CandidateKind::Saved);
        metrics.record_low_rssi();
        metrics.record_scan_started(ScanKind::Single);
        metrics.record_scan_failure(ScanKind::Pno);

        let report = metrics.get_report();
        assert_eq!(report.selection_passes, 1);
        assert_eq!(report.selections_made, 1);
        assert_eq!(report.rejected_low_rssi, 1);
        assert_eq!(report.single_scans_started, 1);
        assert_eq!(report.pno_scan_failures, 1);

        let text = metrics.export_prometheus();
        assert!(text.contains("wlink_selection_passes_total 1"));
        assert!(text.contains("wlink_rejected_observations_total{reason=\"low_rssi\"} 1"));
        assert!(text.contains("wlink_scans_started_total{kind=\"Single\"} 1"));

        metrics.clear();
        let report = metrics.get_report();
        assert_eq!(report.selection_passes, 0);
        assert_eq!(report.single_scans_started, 0);
    }
}
