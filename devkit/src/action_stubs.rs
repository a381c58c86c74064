/*!
Remediation action and report sink doubles

Each action stub counts its invocations so tests can check the
"at most one dispatch per confirmation" rule directly.
*/

use async_trait::async_trait;
use autonomic_core::{
    AnomalyKind, HealEvent, MetricWriter, RemediationAction, RemediationError, ReportSink,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Succeeds, optionally writing a value back through a [`MetricWriter`]
#[derive(Clone)]
pub struct RecordingAction {
    kind: AnomalyKind,
    name: String,
    calls: Arc<AtomicUsize>,
    write_back: Option<(Arc<dyn MetricWriter>, f64)>,
}

impl RecordingAction {
    /// Named `recording-<kind>`, no write-back
    pub fn new(kind: AnomalyKind) -> Self {
        Self {
            kind,
            name: format!("recording-{}", kind.as_str().to_lowercase()),
            calls: Arc::new(AtomicUsize::new(0)),
            write_back: None,
        }
    }

    /// Reset the kind's metric to `value` on every invocation
    pub fn with_write_back(mut self, writer: Arc<dyn MetricWriter>, value: f64) -> Self {
        self.write_back = Some((writer, value));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn shared(&self) -> Arc<dyn RemediationAction> {
        Arc::new(self.clone())
    }
}

#[async_trait]
impl RemediationAction for RecordingAction {
    fn kind(&self) -> AnomalyKind {
        self.kind
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn remediate(&self) -> Result<(), RemediationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some((writer, value)) = &self.write_back {
            writer.reset_metric(self.kind.metric(), *value)?;
        }
        Ok(())
    }
}

/// Always returns [`RemediationError::Failed`]
#[derive(Clone)]
pub struct FailingAction {
    kind: AnomalyKind,
    reason: String,
    calls: Arc<AtomicUsize>,
}

impl FailingAction {
    pub fn new(kind: AnomalyKind, reason: &str) -> Self {
        Self {
            kind,
            reason: reason.to_string(),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn shared(&self) -> Arc<dyn RemediationAction> {
        Arc::new(self.clone())
    }
}

#[async_trait]
impl RemediationAction for FailingAction {
    fn kind(&self) -> AnomalyKind {
        self.kind
    }

    fn name(&self) -> &str {
        "failing"
    }

    async fn remediate(&self) -> Result<(), RemediationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(RemediationError::Failed(self.reason.clone()))
    }
}

/// Sleeps for `delay` before succeeding; pair with a paused clock
#[derive(Clone)]
pub struct SlowAction {
    kind: AnomalyKind,
    delay: Duration,
    calls: Arc<AtomicUsize>,
    completed: Arc<AtomicUsize>,
}

impl SlowAction {
    pub fn new(kind: AnomalyKind, delay: Duration) -> Self {
        Self {
            kind,
            delay,
            calls: Arc::new(AtomicUsize::new(0)),
            completed: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Invocations that ran to the end (not cut short by a timeout)
    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    pub fn shared(&self) -> Arc<dyn RemediationAction> {
        Arc::new(self.clone())
    }
}

#[async_trait]
impl RemediationAction for SlowAction {
    fn kind(&self) -> AnomalyKind {
        self.kind
    }

    fn name(&self) -> &str {
        "slow"
    }

    async fn remediate(&self) -> Result<(), RemediationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.completed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Clone)]
pub struct PanickingAction {
    kind: AnomalyKind,
}

impl PanickingAction {
    pub fn new(kind: AnomalyKind) -> Self {
        Self { kind }
    }

    pub fn shared(&self) -> Arc<dyn RemediationAction> {
        Arc::new(self.clone())
    }
}

#[async_trait]
impl RemediationAction for PanickingAction {
    fn kind(&self) -> AnomalyKind {
        self.kind
    }

    fn name(&self) -> &str {
        "panicking"
    }

    async fn remediate(&self) -> Result<(), RemediationError> {
        panic!("remediation for {} panicked on purpose", self.kind);
    }
}

/// Keeps every reported event in order
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    events: Arc<Mutex<Vec<HealEvent>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything reported so far
    pub fn events(&self) -> Vec<HealEvent> {
        self.events.lock().clone()
    }

    pub fn count_where<F>(&self, predicate: F) -> usize
    where
        F: Fn(&HealEvent) -> bool,
    {
        self.events.lock().iter().filter(|e| predicate(e)).count()
    }

    /// Remediation attempts (any result) for `kind`
    pub fn dispatches(&self, kind: AnomalyKind) -> usize {
        self.count_where(|event| match event {
            HealEvent::RemediationSucceeded { kind: k, .. }
            | HealEvent::RemediationFailed { kind: k, .. }
            | HealEvent::RemediationTimedOut { kind: k, .. } => *k == kind,
            _ => false,
        })
    }

    /// `AnomalyConfirmed` events for `kind`
    pub fn confirmations(&self, kind: AnomalyKind) -> usize {
        self.count_where(|event| matches!(event, HealEvent::AnomalyConfirmed(a) if a.kind == kind))
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl ReportSink for RecordingSink {
    fn report(&self, event: &HealEvent) {
        self.events.lock().push(event.clone());
    }
}
