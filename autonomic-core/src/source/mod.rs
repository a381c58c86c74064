//! Metrics source collaborators
//!
//! The loop pulls one [`MetricsSnapshot`] per tick from a [`MetricsSource`];
//! remediation actions push corrected readings back through a
//! [`MetricWriter`]. Two implementations ship with the core:
//! - [`SimulatedMetricsSource`]: synthetic readings with fault injection
//! - [`HostMetricsSource`]: CPU and memory of the local machine (sysinfo)

mod host;
mod simulated;

pub use host::HostMetricsSource;
pub use simulated::SimulatedMetricsSource;

use async_trait::async_trait;

use crate::error::SourceError;
use crate::snapshot::MetricsSnapshot;

/// Produces one snapshot per tick. An error skips the tick.
#[async_trait]
pub trait MetricsSource: Send + Sync {
    async fn sample(&self) -> Result<MetricsSnapshot, SourceError>;
}

/// Write-back channel used by remediation actions
pub trait MetricWriter: Send + Sync {
    fn reset_metric(&self, metric: &str, value: f64) -> Result<(), SourceError>;
}
