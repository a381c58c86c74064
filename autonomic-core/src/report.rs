//! Reporting side channel
//!
//! Operators only ever see the loop through these events. Sinks must not
//! block: they are called from the tick path.

use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::anomaly::{AnomalyKind, ConfirmedAnomaly};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum HealEvent {
    AnomalyConfirmed(ConfirmedAnomaly),
    RemediationSucceeded {
        kind: AnomalyKind,
        action: String,
        elapsed_ms: u64,
    },
    RemediationFailed {
        kind: AnomalyKind,
        action: String,
        reason: String,
    },
    RemediationTimedOut {
        kind: AnomalyKind,
        action: String,
        timeout_ms: u64,
    },
    /// Confirmed kind with no action registered
    NoRemediation { kind: AnomalyKind },
    /// Detectable kind with no action, found at startup
    ConfigurationGap { kind: AnomalyKind },
    SampleFailed { reason: String },
}

pub trait ReportSink: Send + Sync {
    fn report(&self, event: &HealEvent);
}

/// Default sink: one log line per event
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl ReportSink for TracingSink {
    fn report(&self, event: &HealEvent) {
        match event {
            HealEvent::AnomalyConfirmed(anomaly) => {
                error!(
                    kind = %anomaly.kind,
                    observed = anomaly.observed,
                    "Confirmed {} anomaly. Triggering healing.",
                    anomaly.kind
                );
            }
            HealEvent::RemediationSucceeded { kind, action, elapsed_ms } => {
                info!(
                    kind = %kind,
                    elapsed_ms,
                    "Remediation '{}' for {} completed successfully",
                    action,
                    kind
                );
            }
            HealEvent::RemediationFailed { kind, action, reason } => {
                error!(
                    kind = %kind,
                    "Error during remediation '{}' for {}: {}",
                    action,
                    kind,
                    reason
                );
            }
            HealEvent::RemediationTimedOut { kind, action, timeout_ms } => {
                error!(
                    kind = %kind,
                    "Remediation '{}' for {} timed out after {}ms",
                    action,
                    kind,
                    timeout_ms
                );
            }
            HealEvent::NoRemediation { kind } => {
                warn!(kind = %kind, "No remediation action configured for {}", kind);
            }
            HealEvent::ConfigurationGap { kind } => {
                warn!(kind = %kind, "{} is detectable but has no remediation action", kind);
            }
            HealEvent::SampleFailed { reason } => {
                warn!("Metrics sample failed, skipping tick: {}", reason);
            }
        }
    }
}

/// Forwards every event to each inner sink in order
#[derive(Clone, Default)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn ReportSink>>,
}

impl FanoutSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a sink; events reach sinks in insertion order
    pub fn with(mut self, sink: Arc<dyn ReportSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl ReportSink for FanoutSink {
    fn report(&self, event: &HealEvent) {
        for sink in &self.sinks {
            sink.report(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Collect(Mutex<Vec<HealEvent>>);

    impl ReportSink for Collect {
        fn report(&self, event: &HealEvent) {
            self.0.lock().push(event.clone());
        }
    }

    #[test]
    fn test_fanout_reaches_every_sink() {
        let a = Arc::new(Collect::default());
        let b = Arc::new(Collect::default());
        let fanout = FanoutSink::new()
            .with(a.clone())
            .with(Arc::new(TracingSink))
            .with(b.clone());
        assert_eq!(fanout.len(), 3);

        let event = HealEvent::NoRemediation { kind: AnomalyKind::HighMemory };
        fanout.report(&event);
        assert_eq!(a.0.lock().as_slice(), &[event.clone()]);
        assert_eq!(b.0.lock().as_slice(), &[event]);
    }

    #[test]
    fn test_confirmed_event_json_is_flat_and_tagged() {
        let timestamp = chrono::DateTime::parse_from_rfc3339("2024-05-01T12:00:00Z")
            .unwrap()
            .with_timezone(&chrono::Utc);
        let event = HealEvent::AnomalyConfirmed(ConfirmedAnomaly {
            kind: AnomalyKind::HighCpu,
            observed: 95.0,
            timestamp,
        });

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "anomaly_confirmed");
        assert_eq!(json["kind"], "HIGH_CPU");
        assert_eq!(json["observed"], 95.0);
        assert_eq!(json["timestamp"], "2024-05-01T12:00:00Z");
    }

    #[test]
    fn test_failure_event_json_fields() {
        let event = HealEvent::RemediationFailed {
            kind: AnomalyKind::HighCpu,
            action: "CPU Optimization Action".to_string(),
            reason: "cgroup locked".to_string(),
        };

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "event": "remediation_failed",
                "kind": "HIGH_CPU",
                "action": "CPU Optimization Action",
                "reason": "cgroup locked",
            })
        );

        let gap = serde_json::to_value(HealEvent::ConfigurationGap {
            kind: AnomalyKind::SlowResponse,
        })
        .unwrap();
        assert_eq!(gap["event"], "configuration_gap");
        assert_eq!(gap["kind"], "SLOW_RESPONSE");
    }
}
