//! Consecutive-breach tracking per anomaly kind

use std::collections::HashMap;
use tracing::debug;

use crate::anomaly::AnomalyKind;

/// Consecutive checks an anomaly must persist before it is confirmed
pub const CONSECUTIVE_DETECTION_THRESHOLD: u32 = 2;

/// Where one kind stands after a tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerState {
    /// No breach on the latest tick (counter = 0)
    Normal,
    /// Breaching, not yet long enough (1 <= n < threshold)
    Suspect(u32),
    /// Counter reached the threshold on this tick
    Confirmed,
}

/// Per-kind counters. Kinds are independent of each other.
#[derive(Debug)]
pub struct HysteresisTracker {
    threshold: u32,
    counters: HashMap<AnomalyKind, u32>,
}

impl HysteresisTracker {
    /// A threshold of 0 is treated as 1: every breach confirms.
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold: threshold.max(1),
            counters: HashMap::new(),
        }
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    /// Feed one tick's verdict for `kind`.
    ///
    /// A breach increments the counter by exactly one; a healthy reading
    /// clears it whatever the prior state was.
    pub fn observe(&mut self, kind: AnomalyKind, breached: bool) -> TrackerState {
        if !breached {
            self.reset(kind);
            return TrackerState::Normal;
        }

        let counter = self.counters.entry(kind).or_insert(0);
        *counter = counter.saturating_add(1);

        if *counter >= self.threshold {
            TrackerState::Confirmed
        } else {
            TrackerState::Suspect(*counter)
        }
    }

    /// Clear the counter for `kind`.
    pub fn reset(&mut self, kind: AnomalyKind) {
        if let Some(counter) = self.counters.get_mut(&kind) {
            if *counter > 0 {
                debug!("Resetting consecutive count for {}", kind);
            }
            *counter = 0;
        }
    }

    pub fn count(&self, kind: AnomalyKind) -> u32 {
        self.counters.get(&kind).copied().unwrap_or(0)
    }

    pub fn state(&self, kind: AnomalyKind) -> TrackerState {
        match self.count(kind) {
            0 => TrackerState::Normal,
            n if n >= self.threshold => TrackerState::Confirmed,
            n => TrackerState::Suspect(n),
        }
    }
}

impl Default for HysteresisTracker {
    fn default() -> Self {
        Self::new(CONSECUTIVE_DETECTION_THRESHOLD)
    }
}
