//! Anomaly classification

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Metric carrying CPU utilisation, in percent
pub const CPU_USAGE: &str = "cpuUsage";
/// Metric carrying memory utilisation, in percent
pub const MEMORY_USAGE: &str = "memoryUsage";
/// Metric carrying response latency, in milliseconds
pub const LATENCY_MS: &str = "latencyMs";

/// Category of health problem the loop can confirm and remediate.
///
/// Adding a variant means adding a policy (see [`crate::DetectionConfig`])
/// and an action for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AnomalyKind {
    HighCpu,
    HighMemory,
    SlowResponse,
}

impl AnomalyKind {
    pub const ALL: [AnomalyKind; 3] = [
        AnomalyKind::HighCpu,
        AnomalyKind::HighMemory,
        AnomalyKind::SlowResponse,
    ];

    /// Snapshot metric this kind is judged on
    pub fn metric(&self) -> &'static str {
        match self {
            AnomalyKind::HighCpu => CPU_USAGE,
            AnomalyKind::HighMemory => MEMORY_USAGE,
            AnomalyKind::SlowResponse => LATENCY_MS,
        }
    }

    pub fn from_metric(metric: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.metric() == metric)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AnomalyKind::HighCpu => "HIGH_CPU",
            AnomalyKind::HighMemory => "HIGH_MEMORY",
            AnomalyKind::SlowResponse => "SLOW_RESPONSE",
        }
    }
}

impl fmt::Display for AnomalyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A breach sequence that persisted long enough to act on.
/// Consumed once by the coordinator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfirmedAnomaly {
    pub kind: AnomalyKind,
    pub observed: f64,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_mapping_round_trips() {
        for kind in AnomalyKind::ALL {
            assert_eq!(AnomalyKind::from_metric(kind.metric()), Some(kind));
        }
        assert_eq!(AnomalyKind::from_metric("diskUsage"), None);
    }

    #[test]
    fn test_display_matches_wire_name() {
        assert_eq!(AnomalyKind::HighCpu.to_string(), "HIGH_CPU");
        assert_eq!(AnomalyKind::SlowResponse.to_string(), "SLOW_RESPONSE");
    }
}
