/*!
Scripted metrics source

Replays a queue of snapshots (or failures), one per tick. Once the script
runs out it keeps returning the fallback snapshot, empty by default, so
every policy reads as healthy. Also records every write-back so action
tests can assert on it.
*/

use async_trait::async_trait;
use autonomic_core::{MetricWriter, MetricsSnapshot, MetricsSource, SourceError};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

#[derive(Debug, Clone)]
enum Step {
    Sample(MetricsSnapshot),
    Fail(String),
    Panic(String),
}

#[derive(Debug, Default)]
struct Script {
    steps: VecDeque<Step>,
    fallback: Option<MetricsSnapshot>,
    samples_taken: usize,
    writes: Vec<(String, f64)>,
}

#[derive(Debug, Clone, Default)]
pub struct ScriptedMetricsSource {
    script: Arc<Mutex<Script>>,
}

impl ScriptedMetricsSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue one snapshot
    pub fn push(&self, snapshot: MetricsSnapshot) -> &Self {
        self.script.lock().steps.push_back(Step::Sample(snapshot));
        self
    }

    /// Queue one reading per tick for a single metric
    pub fn push_series(&self, metric: &str, values: &[f64]) -> &Self {
        for value in values {
            self.push(MetricsSnapshot::from_pairs([(metric, *value)]));
        }
        self
    }

    /// Queue a sample failure
    pub fn push_failure(&self, reason: &str) -> &Self {
        self.script.lock().steps.push_back(Step::Fail(reason.to_string()));
        self
    }

    /// Queue a sample that panics instead of returning
    pub fn push_panic(&self, message: &str) -> &Self {
        self.script.lock().steps.push_back(Step::Panic(message.to_string()));
        self
    }

    /// Snapshot returned once the script is exhausted
    pub fn set_fallback(&self, snapshot: MetricsSnapshot) -> &Self {
        self.script.lock().fallback = Some(snapshot);
        self
    }

    /// Steps still queued
    pub fn remaining(&self) -> usize {
        self.script.lock().steps.len()
    }

    /// Calls to `sample`, panicking ones included
    pub fn samples_taken(&self) -> usize {
        self.script.lock().samples_taken
    }

    /// Every `(metric, value)` written back, in order
    pub fn writes(&self) -> Vec<(String, f64)> {
        self.script.lock().writes.clone()
    }

    /// Drop the script, the fallback and recorded writes
    pub fn clear(&self) {
        *self.script.lock() = Script::default();
    }
}

#[async_trait]
impl MetricsSource for ScriptedMetricsSource {
    async fn sample(&self) -> Result<MetricsSnapshot, SourceError> {
        let step = {
            let mut script = self.script.lock();
            script.samples_taken += 1;
            script.steps.pop_front()
        };
        match step {
            Some(Step::Sample(snapshot)) => Ok(snapshot),
            Some(Step::Fail(reason)) => Err(SourceError::SampleFailed(reason)),
            Some(Step::Panic(message)) => panic!("{}", message),
            None => Ok(self.script.lock().fallback.clone().unwrap_or_default()),
        }
    }
}

impl MetricWriter for ScriptedMetricsSource {
    fn reset_metric(&self, metric: &str, value: f64) -> Result<(), SourceError> {
        self.script.lock().writes.push((metric.to_string(), value));
        Ok(())
    }
}
