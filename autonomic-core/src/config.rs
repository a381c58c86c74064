//! Detection and scheduling settings
//!
//! Plain serde structs with defaults matching the production thresholds.
//! Loading them from disk is the host's job.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::anomaly::AnomalyKind;
use crate::detection::{AnomalyPolicy, CONSECUTIVE_DETECTION_THRESHOLD};
use crate::error::ConfigError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    pub consecutive_threshold: u32,
    /// Percent
    pub cpu_threshold: f64,
    /// Percent
    pub memory_threshold: f64,
    pub latency_threshold_ms: f64,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            consecutive_threshold: CONSECUTIVE_DETECTION_THRESHOLD,
            cpu_threshold: 90.0,
            memory_threshold: 80.0,
            latency_threshold_ms: 1000.0,
        }
    }
}

impl DetectionConfig {
    pub fn threshold_for(&self, kind: AnomalyKind) -> f64 {
        match kind {
            AnomalyKind::HighCpu => self.cpu_threshold,
            AnomalyKind::HighMemory => self.memory_threshold,
            AnomalyKind::SlowResponse => self.latency_threshold_ms,
        }
    }

    /// One policy per kind, in [`AnomalyKind::ALL`] order
    pub fn policies(&self) -> Vec<AnomalyPolicy> {
        AnomalyKind::ALL
            .into_iter()
            .map(|kind| AnomalyPolicy::new(kind, self.threshold_for(kind)))
            .collect()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.consecutive_threshold == 0 {
            return Err(ConfigError::ZeroConsecutiveThreshold);
        }
        for kind in AnomalyKind::ALL {
            let value = self.threshold_for(kind);
            if !value.is_finite() {
                return Err(ConfigError::InvalidThreshold { kind, value });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub period_ms: u64,
    /// `None` lets an action run as long as it needs
    pub action_timeout_ms: Option<u64>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            period_ms: 5000,
            action_timeout_ms: Some(10_000),
        }
    }
}

impl MonitorConfig {
    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms)
    }

    pub fn action_timeout(&self) -> Option<Duration> {
        self.action_timeout_ms.map(Duration::from_millis)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.period_ms == 0 {
            return Err(ConfigError::ZeroPeriod);
        }
        Ok(())
    }
}
