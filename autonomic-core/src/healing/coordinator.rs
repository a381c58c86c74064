use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

use super::registry::ActionRegistry;
use crate::anomaly::{AnomalyKind, ConfirmedAnomaly};
use crate::report::{HealEvent, ReportSink};

/// What happened to one confirmed anomaly
#[derive(Debug, Clone, PartialEq)]
pub enum HealOutcome {
    Remediated {
        kind: AnomalyKind,
        action: String,
        elapsed: Duration,
    },
    /// The action returned an error or panicked
    Failed {
        kind: AnomalyKind,
        action: String,
        reason: String,
    },
    TimedOut {
        kind: AnomalyKind,
        action: String,
        after: Duration,
    },
    Unmapped { kind: AnomalyKind },
}

impl HealOutcome {
    /// Kind the outcome belongs to
    pub fn kind(&self) -> AnomalyKind {
        match self {
            HealOutcome::Remediated { kind, .. }
            | HealOutcome::Failed { kind, .. }
            | HealOutcome::TimedOut { kind, .. }
            | HealOutcome::Unmapped { kind } => *kind,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, HealOutcome::Remediated { .. })
    }
}

/// Dispatches confirmed anomalies to their actions.
///
/// Every invocation is one-shot: no retries, and nothing an action does
/// (error, panic, hang past the timeout) escapes `heal`.
pub struct HealingCoordinator {
    registry: ActionRegistry,
    sink: Arc<dyn ReportSink>,
    action_timeout: Option<Duration>,
}

impl HealingCoordinator {
    /// `action_timeout` of `None` lets an action run to completion
    pub fn new(
        registry: ActionRegistry,
        sink: Arc<dyn ReportSink>,
        action_timeout: Option<Duration>,
    ) -> Self {
        Self {
            registry,
            sink,
            action_timeout,
        }
    }

    /// Table the coordinator dispatches from
    pub fn registry(&self) -> &ActionRegistry {
        &self.registry
    }

    /// Per-invocation limit, if any
    pub fn action_timeout(&self) -> Option<Duration> {
        self.action_timeout
    }

    /// Dispatch one confirmed anomaly to its action and report the outcome.
    pub async fn heal(&self, anomaly: &ConfirmedAnomaly) -> HealOutcome {
        let kind = anomaly.kind;
        debug!("Attempting to perform healing for anomaly kind: {}", kind);

        let Some(action) = self.registry.get(kind).cloned() else {
            self.sink.report(&HealEvent::NoRemediation { kind });
            return HealOutcome::Unmapped { kind };
        };

        let name = action.name().to_string();
        info!("Found remediation action '{}' for {}. Executing...", name, kind);

        // Own task per action: a panic ends up in the JoinError, not here
        let started = Instant::now();
        let mut task = tokio::spawn(async move { action.remediate().await });

        let joined = match self.action_timeout {
            Some(limit) => match tokio::time::timeout(limit, &mut task).await {
                Ok(joined) => joined,
                Err(_) => {
                    task.abort();
                    self.sink.report(&HealEvent::RemediationTimedOut {
                        kind,
                        action: name.clone(),
                        timeout_ms: limit.as_millis() as u64,
                    });
                    return HealOutcome::TimedOut {
                        kind,
                        action: name,
                        after: limit,
                    };
                }
            },
            None => task.await,
        };

        let failure = match joined {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(e.to_string()),
            Err(e) if e.is_panic() => Some("remediation action panicked".to_string()),
            Err(e) => Some(format!("remediation task cancelled: {}", e)),
        };

        match failure {
            None => {
                let elapsed = started.elapsed();
                self.sink.report(&HealEvent::RemediationSucceeded {
                    kind,
                    action: name.clone(),
                    elapsed_ms: elapsed.as_millis() as u64,
                });
                HealOutcome::Remediated {
                    kind,
                    action: name,
                    elapsed,
                }
            }
            Some(reason) => {
                self.sink.report(&HealEvent::RemediationFailed {
                    kind,
                    action: name.clone(),
                    reason: reason.clone(),
                });
                HealOutcome::Failed {
                    kind,
                    action: name,
                    reason,
                }
            }
        }
    }

    /// Heal each anomaly in order; one outcome per anomaly.
    pub async fn heal_all(&self, anomalies: &[ConfirmedAnomaly]) -> Vec<HealOutcome> {
        let mut outcomes = Vec::with_capacity(anomalies.len());
        for anomaly in anomalies {
            outcomes.push(self.heal(anomaly).await);
        }
        outcomes
    }
}
