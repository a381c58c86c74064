//! Error types for the control loop
//!
//! Only a registry conflict or an invalid configuration is fatal, and only at
//! startup. Everything raised while the loop runs is reported and absorbed.

use crate::anomaly::AnomalyKind;

/// Failure of the metrics source collaborator
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("metrics sample failed: {0}")]
    SampleFailed(String),
    #[error("unknown metric: {0}")]
    UnknownMetric(String),
    #[error("metrics source unavailable: {0}")]
    Unavailable(String),
}

/// Failure raised by a remediation action
#[derive(Debug, thiserror::Error)]
pub enum RemediationError {
    #[error("remediation failed: {0}")]
    Failed(String),
    #[error("metric write-back failed: {0}")]
    WriteBack(#[from] SourceError),
}

/// Ambiguous action mapping detected while building the registry
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("anomaly kind {kind} claimed by both '{first}' and '{second}'")]
    DuplicateKind {
        kind: AnomalyKind,
        first: String,
        second: String,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("consecutive detection threshold must be at least 1")]
    ZeroConsecutiveThreshold,
    #[error("threshold for {kind} must be a finite number, got {value}")]
    InvalidThreshold { kind: AnomalyKind, value: f64 },
    #[error("more than one policy declared for {0}")]
    DuplicatePolicy(AnomalyKind),
    #[error("monitor period must be greater than zero")]
    ZeroPeriod,
}

#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    #[error("monitor task failed: {0}")]
    TaskFailed(#[from] tokio::task::JoinError),
}
