/// Rolling spread analytics
///
/// Keeps running counters plus a capped sample history, and projects min/max/average
/// and threshold-breach statistics on a fixed refresh cadence.
use crate::types::{SpreadLog, StateSnapshot};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;

/// Maximum spread samples kept for statistics
pub const DEFAULT_SAMPLE_CAPACITY: usize = 10_000;

/// Projection is recomputed on every Nth tracked snapshot
pub const DEFAULT_REFRESH_EVERY: u64 = 10;

/// Spread cutoffs (percent) with independent breach counters
pub const DEFAULT_BREACH_CUTOFFS: [f64; 3] = [0.10, 0.15, 0.20];

/// Round for display; internal state always keeps full precision
pub fn round_to(value: f64, digits: i32) -> f64 {
    let factor = 10_f64.powi(digits);
    (value * factor).round() / factor
}

/// Format a spread value (4 decimal places)
pub fn format_spread(value: f64) -> String {
    format!("{:.4}%", value)
}

/// Format a percentage (2 decimal places)
pub fn format_pct(value: f64) -> String {
    format!("{:.2}%", value)
}

/// Breach statistics for one cutoff
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct BreachStat {
    pub cutoff: f64,
    pub count: u64,
    /// Share of all price updates, in percent
    pub pct: f64,
}

/// Opportunity counter from a single source
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OpportunityCount {
    pub above_threshold: u64,
    pub total_checks: u64,
}

impl OpportunityCount {
    pub fn rate_pct(&self) -> f64 {
        if self.total_checks == 0 {
            0.0
        } else {
            self.above_threshold as f64 / self.total_checks as f64 * 100.0
        }
    }
}

impl From<SpreadLog> for OpportunityCount {
    fn from(log: SpreadLog) -> Self {
        Self {
            above_threshold: log.above_threshold,
            total_checks: log.total_checks,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CountSource {
    #[default]
    Local,
    Server,
}

/// Local and server opportunity counters side by side
///
/// Precedence: the server counter wins as soon as the server has reported one with a
/// non-zero `total_checks`. The local counter is always maintained and is the fallback
/// until then.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct OpportunityCounts {
    pub local: OpportunityCount,
    pub server: Option<OpportunityCount>,
}

impl OpportunityCounts {
    pub fn effective(&self) -> OpportunityCount {
        self.server.unwrap_or(self.local)
    }

    pub fn source(&self) -> CountSource {
        match self.server {
            Some(_) => CountSource::Server,
            None => CountSource::Local,
        }
    }
}

/// Read-only projection of the analytics state
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AnalyticsSnapshot {
    /// Samples currently held in the history window
    pub count: usize,
    pub price_updates: u64,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub average: Option<f64>,
    pub breaches: Vec<BreachStat>,
    pub opportunities: OpportunityCounts,
}

#[derive(Debug, Clone)]
pub struct SpreadAnalytics {
    session_start: DateTime<Utc>,
    price_updates: u64,
    samples: VecDeque<f64>,
    sample_capacity: usize,
    cutoffs: Vec<f64>,
    breach_counts: Vec<u64>,
    opportunities: OpportunityCounts,
    refresh_every: u64,
    projection: AnalyticsSnapshot,
}

impl SpreadAnalytics {
    pub fn new() -> Self {
        Self::with_settings(
            DEFAULT_SAMPLE_CAPACITY,
            DEFAULT_REFRESH_EVERY,
            &DEFAULT_BREACH_CUTOFFS,
        )
    }

    pub fn with_settings(sample_capacity: usize, refresh_every: u64, cutoffs: &[f64]) -> Self {
        let sample_capacity = sample_capacity.max(1);
        Self {
            session_start: Utc::now(),
            price_updates: 0,
            samples: VecDeque::with_capacity(sample_capacity.min(DEFAULT_SAMPLE_CAPACITY)),
            sample_capacity,
            cutoffs: cutoffs.to_vec(),
            breach_counts: vec![0; cutoffs.len()],
            opportunities: OpportunityCounts::default(),
            refresh_every: refresh_every.max(1),
            projection: AnalyticsSnapshot {
                breaches: cutoffs
                    .iter()
                    .map(|&cutoff| BreachStat {
                        cutoff,
                        ..Default::default()
                    })
                    .collect(),
                ..Default::default()
            },
        }
    }

    /// Record one accepted snapshot
    ///
    /// Returns true when this call refreshed the cached projection.
    pub fn track(&mut self, snapshot: &StateSnapshot) -> bool {
        let entry = snapshot.spread.entry;

        self.price_updates += 1;

        if self.samples.len() >= self.sample_capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(entry);

        for (cutoff, count) in self.cutoffs.iter().zip(self.breach_counts.iter_mut()) {
            if entry > *cutoff {
                *count += 1;
            }
        }

        self.opportunities.local.total_checks += 1;
        if snapshot.spread.is_opportunity {
            self.opportunities.local.above_threshold += 1;
        }
        if let Some(log) = snapshot.spread_log.filter(|log| log.total_checks > 0) {
            self.opportunities.server = Some(log.into());
        }

        if self.price_updates % self.refresh_every == 0 {
            self.projection = self.compute();
            true
        } else {
            false
        }
    }

    /// Cached projection, stale by at most `refresh_every - 1` snapshots
    pub fn snapshot(&self) -> AnalyticsSnapshot {
        self.projection.clone()
    }

    /// Full recomputation over the current sample window
    pub fn compute(&self) -> AnalyticsSnapshot {
        let count = self.samples.len();

        let (min, max, average) = if count == 0 {
            (None, None, None)
        } else {
            let min = self.samples.iter().copied().fold(f64::INFINITY, f64::min);
            let max = self
                .samples
                .iter()
                .copied()
                .fold(f64::NEG_INFINITY, f64::max);
            let sum: f64 = self.samples.iter().sum();
            (Some(min), Some(max), Some(sum / count as f64))
        };

        let breaches = self
            .cutoffs
            .iter()
            .zip(self.breach_counts.iter())
            .map(|(&cutoff, &count)| BreachStat {
                cutoff,
                count,
                pct: if self.price_updates > 0 {
                    count as f64 / self.price_updates as f64 * 100.0
                } else {
                    0.0
                },
            })
            .collect();

        AnalyticsSnapshot {
            count,
            price_updates: self.price_updates,
            min,
            max,
            average,
            breaches,
            opportunities: self.opportunities,
        }
    }

    pub fn session_start(&self) -> DateTime<Utc> {
        self.session_start
    }

    pub fn price_updates(&self) -> u64 {
        self.price_updates
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    /// Raw breach counters paired with their cutoffs
    pub fn breach_counts(&self) -> Vec<(f64, u64)> {
        self.cutoffs
            .iter()
            .copied()
            .zip(self.breach_counts.iter().copied())
            .collect()
    }

    pub fn opportunities(&self) -> OpportunityCounts {
        self.opportunities
    }

    pub fn refresh_every(&self) -> u64 {
        self.refresh_every
    }
}

impl Default for SpreadAnalytics {
    fn default() -> Self {
        Self::new()
    }
}
