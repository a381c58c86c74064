//! Built-in remediation actions
//!
//! Each one resolves its symptom by writing a healthy reading back through
//! the metrics source. Real infrastructure changes (pool resizing, cache
//! eviction, scaling) would replace the write-back.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

use super::RemediationAction;
use crate::anomaly::{AnomalyKind, CPU_USAGE, LATENCY_MS, MEMORY_USAGE};
use crate::error::RemediationError;
use crate::source::MetricWriter;

pub struct CpuOptimizationAction {
    writer: Arc<dyn MetricWriter>,
}

impl CpuOptimizationAction {
    pub const NORMALIZED_CPU: f64 = 25.0;

    pub fn new(writer: Arc<dyn MetricWriter>) -> Self {
        Self { writer }
    }
}

#[async_trait]
impl RemediationAction for CpuOptimizationAction {
    fn kind(&self) -> AnomalyKind {
        AnomalyKind::HighCpu
    }

    fn name(&self) -> &str {
        "CPU Optimization Action"
    }

    async fn remediate(&self) -> Result<(), RemediationError> {
        info!("CPU_OPTIMIZATION_ACTION: optimizing CPU-intensive operations");
        self.writer.reset_metric(CPU_USAGE, Self::NORMALIZED_CPU)?;
        info!("CPU_OPTIMIZATION_ACTION: complete, CPU usage should normalize");
        Ok(())
    }
}

pub struct MemoryCleanupAction {
    writer: Arc<dyn MetricWriter>,
}

impl MemoryCleanupAction {
    pub const NORMALIZED_MEMORY: f64 = 35.0;

    pub fn new(writer: Arc<dyn MetricWriter>) -> Self {
        Self { writer }
    }
}

#[async_trait]
impl RemediationAction for MemoryCleanupAction {
    fn kind(&self) -> AnomalyKind {
        AnomalyKind::HighMemory
    }

    fn name(&self) -> &str {
        "Memory Cleanup Action"
    }

    async fn remediate(&self) -> Result<(), RemediationError> {
        info!("MEMORY_CLEANUP_ACTION: clearing problematic caches");
        self.writer.reset_metric(MEMORY_USAGE, Self::NORMALIZED_MEMORY)?;
        info!("MEMORY_CLEANUP_ACTION: complete, memory usage should normalize");
        Ok(())
    }
}

pub struct LatencyOptimizationAction {
    writer: Arc<dyn MetricWriter>,
}

impl LatencyOptimizationAction {
    pub const NORMALIZED_LATENCY_MS: f64 = 150.0;

    pub fn new(writer: Arc<dyn MetricWriter>) -> Self {
        Self { writer }
    }
}

#[async_trait]
impl RemediationAction for LatencyOptimizationAction {
    fn kind(&self) -> AnomalyKind {
        AnomalyKind::SlowResponse
    }

    fn name(&self) -> &str {
        "Latency Optimization Action"
    }

    async fn remediate(&self) -> Result<(), RemediationError> {
        info!("LATENCY_OPTIMIZATION_ACTION: refreshing slow dependencies and connection pools");
        self.writer.reset_metric(LATENCY_MS, Self::NORMALIZED_LATENCY_MS)?;
        info!("LATENCY_OPTIMIZATION_ACTION: complete, response times should normalize");
        Ok(())
    }
}

/// One action per [`AnomalyKind`], all writing through `writer`
pub fn default_actions(writer: Arc<dyn MetricWriter>) -> Vec<Arc<dyn RemediationAction>> {
    vec![
        Arc::new(CpuOptimizationAction::new(writer.clone())),
        Arc::new(MemoryCleanupAction::new(writer.clone())),
        Arc::new(LatencyOptimizationAction::new(writer)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SimulatedMetricsSource;

    #[test]
    fn test_default_actions_cover_every_kind() {
        let source = Arc::new(SimulatedMetricsSource::new());
        let kinds: Vec<_> = default_actions(source).iter().map(|a| a.kind()).collect();
        assert_eq!(kinds, AnomalyKind::ALL.to_vec());
    }

    #[tokio::test]
    async fn test_remediation_is_idempotent() {
        let source = Arc::new(SimulatedMetricsSource::new());
        source.inject_fault(AnomalyKind::HighMemory);
        let action = MemoryCleanupAction::new(source.clone());

        action.remediate().await.unwrap();
        let once = source.current().get(MEMORY_USAGE);
        action.remediate().await.unwrap();

        assert_eq!(source.current().get(MEMORY_USAGE), once);
        assert_eq!(once, Some(MemoryCleanupAction::NORMALIZED_MEMORY));
        assert!(!source.is_fault_active(AnomalyKind::HighMemory));
    }

    #[tokio::test]
    async fn test_write_back_failure_surfaces() {
        struct Broken;
        impl MetricWriter for Broken {
            fn reset_metric(&self, metric: &str, _value: f64) -> Result<(), crate::SourceError> {
                Err(crate::SourceError::Unavailable(metric.to_string()))
            }
        }

        let action = LatencyOptimizationAction::new(Arc::new(Broken));
        assert!(matches!(
            action.remediate().await,
            Err(RemediationError::WriteBack(_))
        ));
    }
}
