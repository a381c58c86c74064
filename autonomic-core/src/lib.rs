//! Autonomic Core - self-healing control loop
//!
//! Periodically samples service health metrics, confirms sustained anomalies
//! through a hysteresis policy and dispatches the matching remediation:
//! - [`MetricsSnapshot`]: immutable readings captured once per tick
//! - [`AnomalyDetector`]: threshold policies + consecutive-breach tracking
//! - [`ActionRegistry`] / [`HealingCoordinator`]: failure-isolated dispatch
//! - [`MonitorLoop`]: fixed-period scheduler with an explicit stop channel
//!
//! How metrics are obtained and how operators are notified stays outside the
//! core: both are collaborators ([`MetricsSource`], [`ReportSink`]).
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use autonomic_core::{default_actions, MonitorLoop, SimulatedMetricsSource};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let source = Arc::new(SimulatedMetricsSource::new());
//! let mut builder = MonitorLoop::builder(source.clone());
//! for action in default_actions(source.clone()) {
//!     builder = builder.register(action);
//! }
//! let handle = builder.build()?.start(Duration::from_secs(5));
//! println!("latest: {:?}", handle.latest_snapshot());
//! let _monitor = handle.stop().await?;
//! # Ok(())
//! # }
//! ```

pub mod anomaly;
pub mod config;
pub mod detection;
pub mod error;
pub mod healing;
pub mod monitor;
pub mod report;
pub mod snapshot;
pub mod source;

pub use anomaly::{AnomalyKind, ConfirmedAnomaly};
pub use config::{DetectionConfig, MonitorConfig};
pub use detection::{AnomalyDetector, AnomalyPolicy, HysteresisTracker, TrackerState};
pub use error::{ConfigError, MonitorError, RegistryError, RemediationError, SourceError};
pub use healing::{
    default_actions, ActionRegistry, CpuOptimizationAction, HealOutcome, HealingCoordinator,
    LatencyOptimizationAction, MemoryCleanupAction, RemediationAction,
};
pub use monitor::{
    MonitorBuilder, MonitorHandle, MonitorLoop, MonitorState, MonitorStats, SnapshotReader,
    StatsView, TickReport,
};
pub use report::{FanoutSink, HealEvent, ReportSink, TracingSink};
pub use snapshot::MetricsSnapshot;
pub use source::{HostMetricsSource, MetricWriter, MetricsSource, SimulatedMetricsSource};
