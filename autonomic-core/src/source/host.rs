//! Local machine readings via sysinfo
//!
//! Reports `cpuUsage` and `memoryUsage` only; there is no request path to
//! time, so `latencyMs` is left out of the snapshot.

use async_trait::async_trait;
use parking_lot::Mutex;
use sysinfo::System;
use tracing::{debug, info};

use super::{MetricWriter, MetricsSource};
use crate::anomaly::{CPU_USAGE, MEMORY_USAGE};
use crate::error::SourceError;
use crate::snapshot::MetricsSnapshot;

pub struct HostMetricsSource {
    sys: Mutex<System>,
}

impl HostMetricsSource {
    pub fn new() -> Self {
        let mut sys = System::new();
        // CPU usage is a delta between refreshes; prime the first one
        sys.refresh_cpu_usage();
        sys.refresh_memory();
        Self {
            sys: Mutex::new(sys),
        }
    }
}

impl Default for HostMetricsSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MetricsSource for HostMetricsSource {
    async fn sample(&self) -> Result<MetricsSnapshot, SourceError> {
        let mut sys = self.sys.lock();
        sys.refresh_cpu_usage();
        sys.refresh_memory();

        let total = sys.total_memory();
        if total == 0 {
            return Err(SourceError::Unavailable(
                "host reports no physical memory".to_string(),
            ));
        }

        let cpu_usage = f64::from(sys.global_cpu_info().cpu_usage());
        let memory_usage = sys.used_memory() as f64 / total as f64 * 100.0;
        debug!("Collected host metrics - CPU: {:.1}%, Memory: {:.1}%", cpu_usage, memory_usage);

        Ok(MetricsSnapshot::from_pairs([
            (CPU_USAGE, cpu_usage),
            (MEMORY_USAGE, memory_usage),
        ]))
    }
}

impl MetricWriter for HostMetricsSource {
    /// Host readings cannot be forced; the next sample shows whether the
    /// remediation worked.
    fn reset_metric(&self, metric: &str, value: f64) -> Result<(), SourceError> {
        info!(
            "Host metric '{}' not overridable (requested {}); awaiting next sample",
            metric, value
        );
        Ok(())
    }
}
