/*!
Test harness for the control loop

Drives a [`MonitorLoop`] tick by tick against a scripted source:
- Recording actions for every kind by default
- Expectations on dispatch counts per kind
- Event and counter statistics
*/

use crate::action_stubs::{RecordingAction, RecordingSink};
use crate::source_stub::ScriptedMetricsSource;
use anyhow::Result;
use autonomic_core::{
    AnomalyDetector, AnomalyKind, HealEvent, MonitorLoop, RemediationAction, StatsView, TickReport,
};
use std::collections::HashMap;
use std::sync::Arc;

pub struct TestHarness {
    pub source: ScriptedMetricsSource,
    pub sink: RecordingSink,
    monitor: MonitorLoop,
    recorders: HashMap<AnomalyKind, RecordingAction>,
    expectations: Vec<Expectation>,
    reports: Vec<TickReport>,
}

#[derive(Debug)]
struct Expectation {
    kind: AnomalyKind,
    expected_dispatches: usize,
}

impl TestHarness {
    /// Default detector, one [`RecordingAction`] per kind
    pub fn new() -> Result<Self> {
        let recorders: HashMap<_, _> = AnomalyKind::ALL
            .iter()
            .map(|kind| (*kind, RecordingAction::new(*kind)))
            .collect();
        let actions = recorders.values().map(RecordingAction::shared).collect();
        let mut harness = Self::build(AnomalyDetector::default(), actions)?;
        harness.recorders = recorders;
        Ok(harness)
    }

    /// Custom detector and actions; nothing is registered implicitly
    pub fn build(
        detector: AnomalyDetector,
        actions: Vec<Arc<dyn RemediationAction>>,
    ) -> Result<Self> {
        tracing_subscriber::fmt().with_test_writer().try_init().ok();

        let source = ScriptedMetricsSource::new();
        let sink = RecordingSink::new();
        let monitor = MonitorLoop::builder(Arc::new(source.clone()))
            .detector(detector)
            .register_all(actions)
            .sink(Arc::new(sink.clone()))
            .build()?;

        Ok(Self {
            source,
            sink,
            monitor,
            recorders: HashMap::new(),
            expectations: Vec::new(),
            reports: Vec::new(),
        })
    }

    pub fn monitor(&self) -> &MonitorLoop {
        &self.monitor
    }

    /// Queue readings for one metric, one per tick
    pub fn feed(&self, metric: &str, values: &[f64]) -> &Self {
        self.source.push_series(metric, values);
        self
    }

    /// Run one tick and keep its report for the stats
    pub async fn tick(&mut self) -> TickReport {
        let report = self.monitor.tick().await;
        self.reports.push(report.clone());
        report
    }

    pub async fn run_ticks(&mut self, count: usize) -> Vec<TickReport> {
        let mut reports = Vec::with_capacity(count);
        for _ in 0..count {
            reports.push(self.tick().await);
        }
        reports
    }

    /// Drain everything queued on the source
    pub async fn run_script(&mut self) -> Vec<TickReport> {
        let pending = self.source.remaining();
        self.run_ticks(pending).await
    }

    /// Invocations seen by the default recorder for `kind`
    pub fn recorded_calls(&self, kind: AnomalyKind) -> usize {
        self.recorders.get(&kind).map(RecordingAction::calls).unwrap_or(0)
    }

    /// Expect `count` remediation attempts for `kind` at verification
    pub fn expect_dispatches(&mut self, kind: AnomalyKind, count: usize) -> &mut Self {
        self.expectations.push(Expectation {
            kind,
            expected_dispatches: count,
        });
        self
    }

    /// Check every expectation against the recorded events
    pub fn verify_expectations(&self) -> Result<()> {
        for expectation in &self.expectations {
            let actual = self.sink.dispatches(expectation.kind);
            if actual != expectation.expected_dispatches {
                anyhow::bail!(
                    "Expectation failed for {}: expected {} dispatches, got {}",
                    expectation.kind,
                    expectation.expected_dispatches,
                    actual
                );
            }
            tracing::info!(kind = %expectation.kind, dispatches = actual, "Expectation met");
        }
        Ok(())
    }

    pub fn get_stats(&self) -> TestStats {
        let mut event_counts = HashMap::new();
        for event in self.sink.events() {
            *event_counts.entry(event_name(&event)).or_insert(0) += 1;
        }

        TestStats {
            ticks_run: self.reports.len(),
            monitor: self.monitor.stats().view(),
            event_counts,
        }
    }

    /// Clear script, events and expectations; tracker state is kept
    pub fn reset(&mut self) {
        self.source.clear();
        self.sink.clear();
        self.expectations.clear();
        self.reports.clear();
    }
}

fn event_name(event: &HealEvent) -> &'static str {
    match event {
        HealEvent::AnomalyConfirmed(_) => "anomaly_confirmed",
        HealEvent::RemediationSucceeded { .. } => "remediation_succeeded",
        HealEvent::RemediationFailed { .. } => "remediation_failed",
        HealEvent::RemediationTimedOut { .. } => "remediation_timed_out",
        HealEvent::NoRemediation { .. } => "no_remediation",
        HealEvent::ConfigurationGap { .. } => "configuration_gap",
        HealEvent::SampleFailed { .. } => "sample_failed",
    }
}

#[derive(Debug)]
pub struct TestStats {
    pub ticks_run: usize,
    pub monitor: StatsView,
    pub event_counts: HashMap<&'static str, usize>,
}

impl TestStats {
    pub fn print(&self) {
        println!("Control loop statistics:");
        println!("  Ticks run: {}", self.ticks_run);
        println!("  Monitor: {:?}", self.monitor);
        for (event, count) in &self.event_counts {
            println!("    {}: {}", event, count);
        }
    }
}

/// Declare a tokio test that receives a fresh default [`TestHarness`]
/// and fails on any `Err` returned from the body.
#[macro_export]
macro_rules! loop_test {
    ($name:ident, |$harness:ident| $body:block) => {
        #[tokio::test]
        async fn $name() {
            #[allow(unused_mut)]
            let mut $harness = $crate::test_utils::TestHarness::new().expect("default harness");
            let result: anyhow::Result<()> = async { $body }.await;

            match result {
                Ok(()) => $harness.get_stats().print(),
                Err(e) => panic!("Test '{}' failed: {}", stringify!($name), e),
            }
        }
    };
}
