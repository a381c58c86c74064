//! Synthetic metrics with scoped fault injection

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::BTreeSet;
use tracing::{info, warn};

use super::{MetricWriter, MetricsSource};
use crate::anomaly::{AnomalyKind, CPU_USAGE, LATENCY_MS, MEMORY_USAGE};
use crate::error::SourceError;
use crate::snapshot::MetricsSnapshot;

const NORMAL_CPU: f64 = 20.0;
const NORMAL_MEMORY: f64 = 30.0;
const NORMAL_LATENCY_MS: f64 = 100.0;

#[derive(Debug)]
struct SimulatedState {
    cpu_usage: f64,
    memory_usage: f64,
    latency_ms: f64,
    active_faults: BTreeSet<AnomalyKind>,
}

impl SimulatedState {
    fn slot(&mut self, kind: AnomalyKind) -> &mut f64 {
        match kind {
            AnomalyKind::HighCpu => &mut self.cpu_usage,
            AnomalyKind::HighMemory => &mut self.memory_usage,
            AnomalyKind::SlowResponse => &mut self.latency_ms,
        }
    }
}

/// Simulated service readings.
///
/// Fault flags live here, owned by the source, so tests and the host can
/// inject a spike without any process-wide switches.
#[derive(Debug)]
pub struct SimulatedMetricsSource {
    state: Mutex<SimulatedState>,
}

impl SimulatedMetricsSource {
    /// Baseline readings, no active fault
    pub fn new() -> Self {
        Self::with_readings(NORMAL_CPU, NORMAL_MEMORY, NORMAL_LATENCY_MS)
    }

    pub fn with_readings(cpu_usage: f64, memory_usage: f64, latency_ms: f64) -> Self {
        Self {
            state: Mutex::new(SimulatedState {
                cpu_usage,
                memory_usage,
                latency_ms,
                active_faults: BTreeSet::new(),
            }),
        }
    }

    /// Value a fault of `kind` drives its metric to
    pub fn fault_value(kind: AnomalyKind) -> f64 {
        match kind {
            AnomalyKind::HighCpu => 95.0,
            AnomalyKind::HighMemory => 85.0,
            AnomalyKind::SlowResponse => 5000.0,
        }
    }

    /// Start a simulated fault. Returns false if it was already active.
    pub fn inject_fault(&self, kind: AnomalyKind) -> bool {
        let mut state = self.state.lock();
        if !state.active_faults.insert(kind) {
            return false;
        }
        *state.slot(kind) = Self::fault_value(kind);
        warn!("Simulating {} fault ({} = {})", kind, kind.metric(), Self::fault_value(kind));
        true
    }

    /// Whether a fault of `kind` is being simulated
    pub fn is_fault_active(&self, kind: AnomalyKind) -> bool {
        self.state.lock().active_faults.contains(&kind)
    }

    /// Active faults, in kind order
    pub fn active_faults(&self) -> Vec<AnomalyKind> {
        self.state.lock().active_faults.iter().copied().collect()
    }

    /// Readings as they stand; `sample` returns the same
    pub fn current(&self) -> MetricsSnapshot {
        let state = self.state.lock();
        MetricsSnapshot::from_pairs([
            (CPU_USAGE, state.cpu_usage),
            (MEMORY_USAGE, state.memory_usage),
            (LATENCY_MS, state.latency_ms),
        ])
    }
}

impl Default for SimulatedMetricsSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MetricsSource for SimulatedMetricsSource {
    async fn sample(&self) -> Result<MetricsSnapshot, SourceError> {
        Ok(self.current())
    }
}

impl MetricWriter for SimulatedMetricsSource {
    /// Overwrites the reading and ends any fault driving that metric
    fn reset_metric(&self, metric: &str, value: f64) -> Result<(), SourceError> {
        let kind = AnomalyKind::from_metric(metric)
            .ok_or_else(|| SourceError::UnknownMetric(metric.to_string()))?;

        let mut state = self.state.lock();
        *state.slot(kind) = value;
        if state.active_faults.remove(&kind) {
            info!("Cleared simulated {} fault", kind);
        }
        info!("Reset simulated metric '{}' to {}", metric, value);
        Ok(())
    }
}
