//! Remediation of confirmed anomalies
//!
//! - [`RemediationAction`]: corrective work for exactly one anomaly kind
//! - [`ActionRegistry`]: kind -> action table, fixed at startup
//! - [`HealingCoordinator`]: dispatch with per-action failure isolation

mod actions;
mod coordinator;
mod registry;

pub use actions::{
    default_actions, CpuOptimizationAction, LatencyOptimizationAction, MemoryCleanupAction,
};
pub use coordinator::{HealOutcome, HealingCoordinator};
pub use registry::ActionRegistry;

use async_trait::async_trait;

use crate::anomaly::AnomalyKind;
use crate::error::RemediationError;

/// Corrective work for one anomaly kind.
///
/// Implementations must be idempotent: the coordinator may fire the same
/// action on consecutive ticks.
#[async_trait]
pub trait RemediationAction: Send + Sync {
    fn kind(&self) -> AnomalyKind;

    /// Label used in reports
    fn name(&self) -> &str;

    async fn remediate(&self) -> Result<(), RemediationError>;
}
