//! Monitor loop: sample -> detect -> heal, once per period
//!
//! The loop owns the detector, so ticks are single-flight by construction:
//! a slow tick delays the next one instead of overlapping it. Readers get
//! the latest snapshot through a [`SnapshotReader`], which swaps in a new
//! `Arc` each tick and never hands out anything mutable.

use parking_lot::RwLock;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::anomaly::ConfirmedAnomaly;
use crate::config::MonitorConfig;
use crate::detection::AnomalyDetector;
use crate::error::{MonitorError, RegistryError, SourceError};
use crate::healing::{ActionRegistry, HealOutcome, HealingCoordinator, RemediationAction};
use crate::report::{HealEvent, ReportSink, TracingSink};
use crate::snapshot::MetricsSnapshot;
use crate::source::MetricsSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MonitorState {
    Stopped,
    Running,
}

/// Read side of the published snapshot
#[derive(Debug, Clone)]
pub struct SnapshotReader {
    latest: Arc<RwLock<Arc<MetricsSnapshot>>>,
}

impl SnapshotReader {
    fn new() -> Self {
        Self {
            latest: Arc::new(RwLock::new(Arc::new(MetricsSnapshot::empty()))),
        }
    }

    /// Empty until the first successful tick
    pub fn latest(&self) -> Arc<MetricsSnapshot> {
        self.latest.read().clone()
    }

    fn publish(&self, snapshot: Arc<MetricsSnapshot>) {
        *self.latest.write() = snapshot;
    }
}

/// Counters shared between the loop and status readers
#[derive(Debug, Default)]
pub struct MonitorStats {
    ticks: AtomicU64,
    skipped_ticks: AtomicU64,
    confirmed: AtomicU64,
    remediated: AtomicU64,
    failed_remediations: AtomicU64,
    unmapped: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsView {
    pub ticks: u64,
    pub skipped_ticks: u64,
    pub confirmed: u64,
    pub remediated: u64,
    pub failed_remediations: u64,
    pub unmapped: u64,
}

impl MonitorStats {
    pub fn view(&self) -> StatsView {
        StatsView {
            ticks: self.ticks.load(Ordering::Relaxed),
            skipped_ticks: self.skipped_ticks.load(Ordering::Relaxed),
            confirmed: self.confirmed.load(Ordering::Relaxed),
            remediated: self.remediated.load(Ordering::Relaxed),
            failed_remediations: self.failed_remediations.load(Ordering::Relaxed),
            unmapped: self.unmapped.load(Ordering::Relaxed),
        }
    }

    fn record_outcome(&self, outcome: &HealOutcome) {
        let counter = match outcome {
            HealOutcome::Remediated { .. } => &self.remediated,
            HealOutcome::Failed { .. } | HealOutcome::TimedOut { .. } => &self.failed_remediations,
            HealOutcome::Unmapped { .. } => &self.unmapped,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Result of a single tick
#[derive(Debug, Clone)]
pub struct TickReport {
    /// `None` when the source failed and the tick was skipped
    pub snapshot: Option<Arc<MetricsSnapshot>>,
    pub confirmed: Vec<ConfirmedAnomaly>,
    pub outcomes: Vec<HealOutcome>,
}

impl TickReport {
    fn skipped() -> Self {
        Self {
            snapshot: None,
            confirmed: Vec::new(),
            outcomes: Vec::new(),
        }
    }

    pub fn was_skipped(&self) -> bool {
        self.snapshot.is_none()
    }

    pub fn remediated(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }
}

/// Collects everything the loop needs before it can start.
pub struct MonitorBuilder {
    source: Arc<dyn MetricsSource>,
    detector: Option<AnomalyDetector>,
    actions: Vec<Arc<dyn RemediationAction>>,
    sink: Arc<dyn ReportSink>,
    action_timeout: Option<Duration>,
}

impl MonitorBuilder {
    /// Replace the default detector
    pub fn detector(mut self, detector: AnomalyDetector) -> Self {
        self.detector = Some(detector);
        self
    }

    /// Registration hook for remediation actions
    pub fn register(mut self, action: Arc<dyn RemediationAction>) -> Self {
        self.actions.push(action);
        self
    }

    pub fn register_all<I>(mut self, actions: I) -> Self
    where
        I: IntoIterator<Item = Arc<dyn RemediationAction>>,
    {
        self.actions.extend(actions);
        self
    }

    /// Where events go; defaults to [`TracingSink`]
    pub fn sink(mut self, sink: Arc<dyn ReportSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Per-action limit; `None` disables it. Defaults to 10s.
    pub fn action_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.action_timeout = timeout;
        self
    }

    /// Fails only on an ambiguous action mapping. Detectable kinds without
    /// an action are reported as configuration gaps and left running.
    pub fn build(self) -> Result<MonitorLoop, RegistryError> {
        let registry = ActionRegistry::build(self.actions)?;
        let detector = self.detector.unwrap_or_default();

        for kind in registry.missing(&detector.kinds()) {
            self.sink.report(&HealEvent::ConfigurationGap { kind });
        }

        Ok(MonitorLoop {
            source: self.source,
            detector,
            coordinator: HealingCoordinator::new(registry, self.sink.clone(), self.action_timeout),
            sink: self.sink,
            snapshots: SnapshotReader::new(),
            stats: Arc::new(MonitorStats::default()),
        })
    }
}

pub struct MonitorLoop {
    source: Arc<dyn MetricsSource>,
    detector: AnomalyDetector,
    coordinator: HealingCoordinator,
    sink: Arc<dyn ReportSink>,
    snapshots: SnapshotReader,
    stats: Arc<MonitorStats>,
}

impl MonitorLoop {
    /// Start wiring a loop around `source`
    pub fn builder(source: Arc<dyn MetricsSource>) -> MonitorBuilder {
        MonitorBuilder {
            source,
            detector: None,
            actions: Vec::new(),
            sink: Arc::new(TracingSink),
            action_timeout: MonitorConfig::default().action_timeout(),
        }
    }

    pub fn detector(&self) -> &AnomalyDetector {
        &self.detector
    }

    /// Action table the coordinator dispatches from
    pub fn registry(&self) -> &ActionRegistry {
        self.coordinator.registry()
    }

    pub fn latest_snapshot(&self) -> Arc<MetricsSnapshot> {
        self.snapshots.latest()
    }

    pub fn snapshots(&self) -> SnapshotReader {
        self.snapshots.clone()
    }

    pub fn stats(&self) -> Arc<MonitorStats> {
        self.stats.clone()
    }

    /// Run exactly one sample -> detect -> heal cycle.
    ///
    /// A failed sample is reported and the tick skipped: no anomaly, tracker
    /// counters and the published snapshot left as they were.
    pub async fn tick(&mut self) -> TickReport {
        self.stats.ticks.fetch_add(1, Ordering::Relaxed);

        let snapshot = match self.sample().await {
            Ok(snapshot) => Arc::new(snapshot),
            Err(e) => {
                self.stats.skipped_ticks.fetch_add(1, Ordering::Relaxed);
                self.sink.report(&HealEvent::SampleFailed {
                    reason: e.to_string(),
                });
                return TickReport::skipped();
            }
        };

        debug!(readings = ?snapshot.readings(), "Collected metrics");
        self.snapshots.publish(snapshot.clone());

        let confirmed = self.detector.evaluate(&snapshot);
        for anomaly in &confirmed {
            self.stats.confirmed.fetch_add(1, Ordering::Relaxed);
            self.sink.report(&HealEvent::AnomalyConfirmed(anomaly.clone()));
        }

        let outcomes = self.coordinator.heal_all(&confirmed).await;
        for outcome in &outcomes {
            self.stats.record_outcome(outcome);
        }

        TickReport {
            snapshot: Some(snapshot),
            confirmed,
            outcomes,
        }
    }

    /// Sample on its own task so a panicking source only costs this tick
    async fn sample(&self) -> Result<MetricsSnapshot, SourceError> {
        let source = self.source.clone();
        match tokio::spawn(async move { source.sample().await }).await {
            Ok(result) => result,
            Err(e) if e.is_panic() => Err(SourceError::SampleFailed(
                "metrics source panicked".to_string(),
            )),
            Err(e) => Err(SourceError::SampleFailed(format!(
                "metrics sample cancelled: {}",
                e
            ))),
        }
    }

    /// Move the loop onto its own task and tick every `period`
    /// (Stopped -> Running). The first tick fires immediately.
    ///
    /// Dropping the returned handle stops the loop after its current tick.
    pub fn start(self, period: Duration) -> MonitorHandle {
        let period = if period.is_zero() {
            warn!("Monitor period of zero requested, using 1ms");
            Duration::from_millis(1)
        } else {
            period
        };

        let (stop_tx, mut stop_rx) = watch::channel(false);
        let snapshots = self.snapshots.clone();
        let stats = self.stats.clone();
        let running = Arc::new(AtomicBool::new(true));
        let flag = running.clone();
        let mut monitor = self;

        let task = tokio::spawn(async move {
            let _running = RunningGuard(flag);
            info!("Monitor loop started (period: {:?})", period);
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    changed = stop_rx.changed() => {
                        if changed.is_err() || *stop_rx.borrow() {
                            break;
                        }
                    }
                    _ = interval.tick() => {
                        // stop requests wait for the tick in progress
                        monitor.tick().await;
                    }
                }
            }

            info!("Monitor loop stopped");
            monitor
        });

        MonitorHandle {
            stop_tx,
            task,
            snapshots,
            stats,
            running,
        }
    }
}

/// Clears the running flag on every exit path of the loop task, unwinding
/// included
struct RunningGuard(Arc<AtomicBool>);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Control and read access to a running loop
pub struct MonitorHandle {
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<MonitorLoop>,
    snapshots: SnapshotReader,
    stats: Arc<MonitorStats>,
    running: Arc<AtomicBool>,
}

impl MonitorHandle {
    /// `Stopped` once the loop task has exited, for any reason
    pub fn state(&self) -> MonitorState {
        if self.running.load(Ordering::SeqCst) {
            MonitorState::Running
        } else {
            MonitorState::Stopped
        }
    }

    pub fn latest_snapshot(&self) -> Arc<MetricsSnapshot> {
        self.snapshots.latest()
    }

    pub fn snapshots(&self) -> SnapshotReader {
        self.snapshots.clone()
    }

    pub fn stats(&self) -> Arc<MonitorStats> {
        self.stats.clone()
    }

    /// Running -> Stopped. Waits for an in-flight tick, then hands the loop
    /// back with its tracker state intact.
    pub async fn stop(self) -> Result<MonitorLoop, MonitorError> {
        let _ = self.stop_tx.send(true);
        Ok(self.task.await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anomaly::{AnomalyKind, CPU_USAGE};
    use crate::error::{RemediationError, SourceError};
    use crate::healing::default_actions;
    use crate::source::SimulatedMetricsSource;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use tokio::time::Instant;

    /// Replays readings for cpuUsage; `None` entries fail the sample
    struct Replay {
        readings: Mutex<VecDeque<Option<f64>>>,
        sampled_at: Mutex<Vec<Instant>>,
    }

    impl Replay {
        fn new(readings: impl IntoIterator<Item = Option<f64>>) -> Arc<Self> {
            Arc::new(Self {
                readings: Mutex::new(readings.into_iter().collect()),
                sampled_at: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl MetricsSource for Replay {
        async fn sample(&self) -> Result<MetricsSnapshot, SourceError> {
            self.sampled_at.lock().push(Instant::now());
            match self.readings.lock().pop_front().flatten() {
                Some(cpu) => Ok(MetricsSnapshot::from_pairs([(CPU_USAGE, cpu)])),
                None => Err(SourceError::SampleFailed("collector offline".to_string())),
            }
        }
    }

    struct SlowCpuAction;

    #[async_trait]
    impl RemediationAction for SlowCpuAction {
        fn kind(&self) -> AnomalyKind {
            AnomalyKind::HighCpu
        }
        fn name(&self) -> &str {
            "slow"
        }
        async fn remediate(&self) -> Result<(), RemediationError> {
            tokio::time::sleep(Duration::from_millis(100)).await;
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_cpu_spike_is_healed_once() {
        let source = Arc::new(SimulatedMetricsSource::new());
        let mut monitor = MonitorLoop::builder(source.clone())
            .register_all(default_actions(source.clone()))
            .build()
            .unwrap();

        source.inject_fault(AnomalyKind::HighCpu);

        let first = monitor.tick().await;
        assert!(first.confirmed.is_empty());

        let second = monitor.tick().await;
        assert_eq!(second.confirmed.len(), 1);
        assert_eq!(second.remediated(), 1);
        assert!(!source.is_fault_active(AnomalyKind::HighCpu));

        let third = monitor.tick().await;
        assert!(third.confirmed.is_empty());
        assert_eq!(third.snapshot.unwrap().get(CPU_USAGE), Some(25.0));

        let stats = monitor.stats().view();
        assert_eq!(stats.ticks, 3);
        assert_eq!(stats.confirmed, 1);
        assert_eq!(stats.remediated, 1);
    }

    #[tokio::test]
    async fn test_failed_sample_skips_tick() {
        let source = Replay::new([Some(95.0), None, Some(95.0)]);
        let mut monitor = MonitorLoop::builder(source).build().unwrap();

        assert!(!monitor.tick().await.was_skipped());
        let published = monitor.latest_snapshot();

        let skipped = monitor.tick().await;
        assert!(skipped.was_skipped());
        assert!(Arc::ptr_eq(&published, &monitor.latest_snapshot()));
        assert_eq!(monitor.detector().tracker().count(AnomalyKind::HighCpu), 1);

        // counter survived the skipped tick, so this breach confirms
        let third = monitor.tick().await;
        assert_eq!(third.confirmed.len(), 1);
        assert_eq!(monitor.stats().view().skipped_ticks, 1);
        assert_eq!(monitor.stats().view().unmapped, 1);
    }

    #[tokio::test]
    async fn test_snapshot_published_by_replacement() {
        let source = Arc::new(SimulatedMetricsSource::new());
        let mut monitor = MonitorLoop::builder(source.clone()).build().unwrap();
        let reader = monitor.snapshots();

        let before = reader.latest();
        assert!(before.is_empty());

        monitor.tick().await;
        let after = reader.latest();
        assert_eq!(after.get(CPU_USAGE), Some(20.0));
        assert!(before.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_and_stop() {
        let source = Arc::new(SimulatedMetricsSource::new());
        let monitor = MonitorLoop::builder(source.clone()).build().unwrap();

        let handle = monitor.start(Duration::from_millis(10));
        assert_eq!(handle.state(), MonitorState::Running);

        tokio::time::sleep(Duration::from_millis(35)).await;
        let stats = handle.stats();
        assert!(!handle.latest_snapshot().is_empty());

        let monitor = handle.stop().await.unwrap();
        let ticks = stats.view().ticks;
        assert!(ticks >= 2);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(monitor.stats().view().ticks, ticks);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_tick_delays_next_one() {
        let source = Replay::new(std::iter::repeat(Some(95.0)).take(64));
        let monitor = MonitorLoop::builder(source.clone())
            .register(Arc::new(SlowCpuAction))
            .action_timeout(None)
            .build()
            .unwrap();

        let handle = monitor.start(Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(500)).await;
        handle.stop().await.unwrap();

        let sampled = source.sampled_at.lock().clone();
        assert!(sampled.len() >= 3);
        // every second tick confirms and spends 100ms remediating
        for pair in sampled.windows(2).skip(1).step_by(2) {
            assert!(pair[1] - pair[0] >= Duration::from_millis(100));
        }
    }
}
