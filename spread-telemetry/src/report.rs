/// Point-in-time session export
///
/// Values are rounded for presentation here (4 dp spreads, 2 dp percentages); the
/// engine itself keeps full precision.
use crate::aggregation::{round_to, AnalyticsSnapshot, CountSource, OpportunityCount};
use crate::error::TelemetryError;
use crate::types::{BotConfig, Position, StateSnapshot};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::Serialize;

const SPREAD_DIGITS: i32 = 4;
const PCT_DIGITS: i32 = 2;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionMeta {
    pub start: DateTime<Utc>,
    pub exported_at: DateTime<Utc>,
    pub duration_secs: i64,
    pub duration: String,
    pub price_updates: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BreachReport {
    pub cutoff: f64,
    pub count: u64,
    pub pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpreadStatsReport {
    pub count: usize,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub avg: Option<f64>,
    pub breaches: Vec<BreachReport>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OpportunityReport {
    pub count: u64,
    pub total_checks: u64,
    pub rate_pct: f64,
    pub source: CountSource,
    pub local: OpportunityCount,
    pub server: Option<OpportunityCount>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TradeReport {
    pub count: u64,
    pub total_pnl: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionReport {
    pub session: SessionMeta,
    pub spread_stats: SpreadStatsReport,
    pub opportunities: OpportunityReport,
    pub trades: TradeReport,
    pub position: Position,
    pub config: BotConfig,
}

impl SessionReport {
    pub fn build(
        session_start: DateTime<Utc>,
        exported_at: DateTime<Utc>,
        stats: &AnalyticsSnapshot,
        snapshot: &StateSnapshot,
    ) -> Self {
        let elapsed = exported_at - session_start;
        let opportunities = stats.opportunities.effective();

        Self {
            session: SessionMeta {
                start: session_start,
                exported_at,
                duration_secs: elapsed.num_seconds().max(0),
                duration: format_session_duration(elapsed),
                price_updates: stats.price_updates,
            },
            spread_stats: SpreadStatsReport {
                count: stats.count,
                min: stats.min.map(|v| round_to(v, SPREAD_DIGITS)),
                max: stats.max.map(|v| round_to(v, SPREAD_DIGITS)),
                avg: stats.average.map(|v| round_to(v, SPREAD_DIGITS)),
                breaches: stats
                    .breaches
                    .iter()
                    .map(|breach| BreachReport {
                        cutoff: breach.cutoff,
                        count: breach.count,
                        pct: round_to(breach.pct, PCT_DIGITS),
                    })
                    .collect(),
            },
            opportunities: OpportunityReport {
                count: opportunities.above_threshold,
                total_checks: opportunities.total_checks,
                rate_pct: round_to(opportunities.rate_pct(), PCT_DIGITS),
                source: stats.opportunities.source(),
                local: stats.opportunities.local,
                server: stats.opportunities.server,
            },
            trades: TradeReport {
                count: snapshot.stats.trades,
                total_pnl: snapshot.stats.total_pnl,
            },
            position: snapshot.position.clone(),
            config: snapshot.config.clone(),
        }
    }

    pub fn to_json_pretty(&self) -> Result<String, TelemetryError> {
        serde_json::to_string_pretty(self).map_err(TelemetryError::Serialize)
    }
}

/// Format an elapsed session as HH:MM:SS (hours may exceed 24)
pub fn format_session_duration(elapsed: ChronoDuration) -> String {
    let total = elapsed.num_seconds().max(0);
    format!(
        "{:02}:{:02}:{:02}",
        total / 3600,
        (total % 3600) / 60,
        total % 60
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregation::{BreachStat, OpportunityCounts};

    #[test]
    fn test_format_session_duration() {
        assert_eq!(format_session_duration(ChronoDuration::seconds(0)), "00:00:00");
        assert_eq!(format_session_duration(ChronoDuration::seconds(3725)), "01:02:05");
        assert_eq!(format_session_duration(ChronoDuration::hours(30)), "30:00:00");
        assert_eq!(format_session_duration(ChronoDuration::seconds(-5)), "00:00:00");
    }

    #[test]
    fn test_report_before_first_message() {
        let start = Utc::now();
        let report = SessionReport::build(
            start,
            start,
            &AnalyticsSnapshot::default(),
            &StateSnapshot::default(),
        );

        assert_eq!(report.spread_stats.count, 0);
        assert_eq!(report.spread_stats.avg, None);
        assert_eq!(report.opportunities.rate_pct, 0.0);
        assert_eq!(report.opportunities.source, CountSource::Local);

        let json: serde_json::Value =
            serde_json::from_str(&report.to_json_pretty().unwrap()).unwrap();
        assert_eq!(json["session"]["duration"], "00:00:00");
        assert!(json["spread_stats"]["min"].is_null());
        assert_eq!(json["opportunities"]["source"], "local");
    }

    #[test]
    fn test_report_rounds_for_presentation() {
        let start = Utc::now();
        let stats = AnalyticsSnapshot {
            count: 3,
            price_updates: 3,
            min: Some(0.123456),
            max: Some(0.2),
            average: Some(0.1666666),
            breaches: vec![BreachStat {
                cutoff: 0.10,
                count: 2,
                pct: 66.666666,
            }],
            opportunities: OpportunityCounts {
                local: OpportunityCount {
                    above_threshold: 1,
                    total_checks: 3,
                },
                server: None,
            },
        };

        let report = SessionReport::build(
            start,
            start + ChronoDuration::seconds(90),
            &stats,
            &StateSnapshot::default(),
        );

        assert_eq!(report.session.duration, "00:01:30");
        assert_eq!(report.session.duration_secs, 90);
        assert_eq!(report.spread_stats.min, Some(0.1235));
        assert_eq!(report.spread_stats.avg, Some(0.1667));
        assert_eq!(report.spread_stats.breaches[0].pct, 66.67);
        assert_eq!(report.opportunities.rate_pct, 33.33);
    }
}
