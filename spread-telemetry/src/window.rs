//! Fixed-capacity sliding window of chart samples.
//!
//! Exists purely to bound rendering cost; statistics live in the much larger
//! sample history of [`SpreadAnalytics`](crate::aggregation::SpreadAnalytics).

use serde::Serialize;
use std::collections::VecDeque;

/// Default number of chart points retained
pub const DEFAULT_CHART_CAPACITY: usize = 50;

/// Current chart window, oldest point first
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChartSnapshot {
    pub labels: Vec<String>,
    pub values: Vec<f64>,
    pub thresholds: Vec<f64>,
}

impl ChartSnapshot {
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// Three parallel ring buffers (label, spread, threshold) of equal length
#[derive(Debug, Clone)]
pub struct ChartWindow {
    labels: VecDeque<String>,
    values: VecDeque<f64>,
    thresholds: VecDeque<f64>,
    capacity: usize,
}

impl ChartWindow {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            labels: VecDeque::with_capacity(capacity),
            values: VecDeque::with_capacity(capacity),
            thresholds: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, label: impl Into<String>, value: f64, threshold: f64) {
        if self.labels.len() >= self.capacity {
            self.labels.pop_front();
            self.values.pop_front();
            self.thresholds.pop_front();
        }

        self.labels.push_back(label.into());
        self.values.push_back(value);
        self.thresholds.push_back(threshold);

        debug_assert!(
            self.labels.len() == self.values.len() && self.values.len() == self.thresholds.len(),
            "chart window sequences out of step"
        );
    }

    pub fn snapshot(&self) -> ChartSnapshot {
        ChartSnapshot {
            labels: self.labels.iter().cloned().collect(),
            values: self.values.iter().copied().collect(),
            thresholds: self.thresholds.iter().copied().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Most recent spread value
    pub fn latest_value(&self) -> Option<f64> {
        self.values.back().copied()
    }
}

impl Default for ChartWindow {
    fn default() -> Self {
        Self::new(DEFAULT_CHART_CAPACITY)
    }
}
