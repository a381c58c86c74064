//! Anomaly detection for the control loop
//!
//! Two layers, applied to every tracked kind on every tick:
//! - [`AnomalyPolicy`]: stateless threshold verdict for one reading
//! - [`HysteresisTracker`]: turns repeated breaches into a confirmation
//!
//! Detection is deterministic: no statistics, no history beyond the
//! consecutive-breach counters.

mod hysteresis;

pub use hysteresis::{HysteresisTracker, TrackerState, CONSECUTIVE_DETECTION_THRESHOLD};

use tracing::{debug, error, warn};

use crate::anomaly::{AnomalyKind, ConfirmedAnomaly};
use crate::config::DetectionConfig;
use crate::error::ConfigError;
use crate::snapshot::MetricsSnapshot;

/// One metric, one threshold, strictly-greater-than comparison.
#[derive(Debug, Clone, PartialEq)]
pub struct AnomalyPolicy {
    kind: AnomalyKind,
    threshold: f64,
}

impl AnomalyPolicy {
    pub fn new(kind: AnomalyKind, threshold: f64) -> Self {
        Self { kind, threshold }
    }

    pub fn kind(&self) -> AnomalyKind {
        self.kind
    }

    pub fn metric(&self) -> &'static str {
        self.kind.metric()
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// A value equal to the threshold does not breach. NaN never does.
    pub fn breached(&self, value: f64) -> bool {
        value > self.threshold
    }

    /// Reading for this policy's metric and its verdict. A missing reading
    /// reports 0.0 and never breaches, whatever the threshold.
    pub fn evaluate(&self, snapshot: &MetricsSnapshot) -> (f64, bool) {
        match snapshot.get(self.metric()) {
            Some(value) => (value, self.breached(value)),
            None => (0.0, false),
        }
    }
}

/// Applies every policy to a snapshot and reports the kinds confirmed on
/// this tick.
///
/// `evaluate` takes `&mut self`: the detector is owned by the tick path, so
/// two evaluations can never interleave.
#[derive(Debug)]
pub struct AnomalyDetector {
    policies: Vec<AnomalyPolicy>,
    tracker: HysteresisTracker,
}

impl AnomalyDetector {
    pub fn new(
        policies: Vec<AnomalyPolicy>,
        consecutive_threshold: u32,
    ) -> Result<Self, ConfigError> {
        if consecutive_threshold == 0 {
            return Err(ConfigError::ZeroConsecutiveThreshold);
        }
        for (i, policy) in policies.iter().enumerate() {
            if !policy.threshold.is_finite() {
                return Err(ConfigError::InvalidThreshold {
                    kind: policy.kind,
                    value: policy.threshold,
                });
            }
            if policies[..i].iter().any(|p| p.kind == policy.kind) {
                return Err(ConfigError::DuplicatePolicy(policy.kind));
            }
        }

        Ok(Self {
            policies,
            tracker: HysteresisTracker::new(consecutive_threshold),
        })
    }

    pub fn from_config(config: &DetectionConfig) -> Result<Self, ConfigError> {
        Self::new(config.policies(), config.consecutive_threshold)
    }

    /// Kinds this detector can emit
    pub fn kinds(&self) -> Vec<AnomalyKind> {
        self.policies.iter().map(|p| p.kind).collect()
    }

    pub fn policies(&self) -> &[AnomalyPolicy] {
        &self.policies
    }

    pub fn tracker(&self) -> &HysteresisTracker {
        &self.tracker
    }

    /// Run one tick of detection.
    ///
    /// A confirmed kind's counter is cleared as soon as it is handed out for
    /// dispatch, whatever the remediation later does with it.
    pub fn evaluate(&mut self, snapshot: &MetricsSnapshot) -> Vec<ConfirmedAnomaly> {
        let mut confirmed = Vec::new();

        for policy in &self.policies {
            let (value, breached) = policy.evaluate(snapshot);
            debug!(kind = %policy.kind, value, breached, "Evaluated policy");

            match self.tracker.observe(policy.kind, breached) {
                TrackerState::Normal => {}
                TrackerState::Suspect(n) => {
                    warn!(
                        "Potential {} detected (current: {}). Consecutive detections: {}",
                        policy.kind, value, n
                    );
                }
                TrackerState::Confirmed => {
                    error!("Confirmed {} anomaly (current: {})", policy.kind, value);
                    self.tracker.reset(policy.kind);
                    confirmed.push(ConfirmedAnomaly {
                        kind: policy.kind,
                        observed: value,
                        timestamp: snapshot.taken_at(),
                    });
                }
            }
        }

        confirmed
    }
}

impl Default for AnomalyDetector {
    fn default() -> Self {
        let config = DetectionConfig::default();
        Self {
            policies: config.policies(),
            tracker: HysteresisTracker::new(config.consecutive_threshold),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anomaly::{CPU_USAGE, LATENCY_MS, MEMORY_USAGE};

    fn cpu(value: f64) -> MetricsSnapshot {
        MetricsSnapshot::from_pairs([(CPU_USAGE, value)])
    }

    #[test]
    fn test_policy_boundary_is_not_a_breach() {
        let policy = AnomalyPolicy::new(AnomalyKind::HighCpu, 90.0);
        assert!(!policy.breached(20.0));
        assert!(!policy.breached(90.0));
        assert!(policy.breached(90.0001));
        assert!(!policy.breached(f64::NAN));
    }

    #[test]
    fn test_missing_metric_never_breaches() {
        let policy = AnomalyPolicy::new(AnomalyKind::SlowResponse, 1000.0);
        assert_eq!(policy.evaluate(&MetricsSnapshot::empty()), (0.0, false));
    }

    #[test]
    fn test_negative_threshold_ignores_missing_metric() {
        let policy = AnomalyPolicy::new(AnomalyKind::SlowResponse, -1.0);
        assert_eq!(policy.evaluate(&MetricsSnapshot::empty()), (0.0, false));
        assert!(policy.evaluate(&MetricsSnapshot::from_pairs([(LATENCY_MS, 0.0)])).1);

        let mut detector =
            AnomalyDetector::new(vec![policy], CONSECUTIVE_DETECTION_THRESHOLD).unwrap();
        let no_latency = MetricsSnapshot::from_pairs([(CPU_USAGE, 20.0)]);
        assert!(detector.evaluate(&no_latency).is_empty());
        assert!(detector.evaluate(&no_latency).is_empty());
        assert_eq!(detector.tracker().count(AnomalyKind::SlowResponse), 0);
    }

    #[test]
    fn test_cpu_scenario_dispatches_once() {
        let mut detector = AnomalyDetector::default();

        assert!(detector.evaluate(&cpu(95.0)).is_empty());
        assert_eq!(detector.tracker().state(AnomalyKind::HighCpu), TrackerState::Suspect(1));

        let confirmed = detector.evaluate(&cpu(95.0));
        assert_eq!(confirmed.len(), 1);
        assert_eq!(confirmed[0].kind, AnomalyKind::HighCpu);
        assert_eq!(confirmed[0].observed, 95.0);
        assert_eq!(detector.tracker().count(AnomalyKind::HighCpu), 0);

        assert!(detector.evaluate(&cpu(20.0)).is_empty());
        assert_eq!(detector.tracker().state(AnomalyKind::HighCpu), TrackerState::Normal);
    }

    #[test]
    fn test_sustained_breach_refires_every_threshold_ticks() {
        let mut detector = AnomalyDetector::default();
        let fired: usize = (0..6).map(|_| detector.evaluate(&cpu(99.0)).len()).sum();
        assert_eq!(fired, 3);
    }

    #[test]
    fn test_good_reading_delays_confirmation() {
        let mut detector = AnomalyDetector::default();
        assert!(detector.evaluate(&cpu(95.0)).is_empty());
        assert!(detector.evaluate(&cpu(10.0)).is_empty());
        assert!(detector.evaluate(&cpu(95.0)).is_empty());
        assert_eq!(detector.evaluate(&cpu(95.0)).len(), 1);
    }

    #[test]
    fn test_multiple_kinds_confirm_on_same_tick() {
        let mut detector = AnomalyDetector::default();
        let bad = MetricsSnapshot::from_pairs([
            (CPU_USAGE, 95.0),
            (MEMORY_USAGE, 85.0),
            (LATENCY_MS, 100.0),
        ]);
        detector.evaluate(&bad);
        let kinds: Vec<_> = detector.evaluate(&bad).into_iter().map(|a| a.kind).collect();
        assert_eq!(kinds, vec![AnomalyKind::HighCpu, AnomalyKind::HighMemory]);
    }

    #[test]
    fn test_rejects_invalid_construction() {
        assert!(matches!(
            AnomalyDetector::new(vec![], 0),
            Err(ConfigError::ZeroConsecutiveThreshold)
        ));
        assert!(matches!(
            AnomalyDetector::new(
                vec![
                    AnomalyPolicy::new(AnomalyKind::HighCpu, 90.0),
                    AnomalyPolicy::new(AnomalyKind::HighCpu, 80.0),
                ],
                2
            ),
            Err(ConfigError::DuplicatePolicy(AnomalyKind::HighCpu))
        ));
        assert!(matches!(
            AnomalyDetector::new(vec![AnomalyPolicy::new(AnomalyKind::HighCpu, f64::INFINITY)], 2),
            Err(ConfigError::InvalidThreshold { .. })
        ));
    }

    #[test]
    fn test_evaluate_leaves_snapshot_untouched() {
        let mut detector = AnomalyDetector::default();
        let snapshot = cpu(95.0);
        let before = snapshot.clone();
        detector.evaluate(&snapshot);
        assert_eq!(snapshot, before);
    }
}
