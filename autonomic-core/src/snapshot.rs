//! Metrics snapshot captured once per tick

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;

/// Named numeric readings taken at one instant.
///
/// Immutable once built: readers get it behind an `Arc` and the loop
/// publishes a fresh one each tick instead of mutating the previous one.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    readings: HashMap<String, f64>,
    taken_at: DateTime<Utc>,
}

impl MetricsSnapshot {
    pub fn new(readings: HashMap<String, f64>) -> Self {
        Self {
            readings,
            taken_at: Utc::now(),
        }
    }

    pub fn empty() -> Self {
        Self::new(HashMap::new())
    }

    pub fn from_pairs<I, K>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, f64)>,
        K: Into<String>,
    {
        Self::new(pairs.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// `None` when the source omitted `metric`
    pub fn get(&self, metric: &str) -> Option<f64> {
        self.readings.get(metric).copied()
    }

    /// Reading for `metric`, or 0.0 when the source omitted it
    pub fn value_or_default(&self, metric: &str) -> f64 {
        self.get(metric).unwrap_or(0.0)
    }

    pub fn taken_at(&self) -> DateTime<Utc> {
        self.taken_at
    }

    pub fn readings(&self) -> &HashMap<String, f64> {
        &self.readings
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }
}

impl Default for MetricsSnapshot {
    fn default() -> Self {
        Self::empty()
    }
}
