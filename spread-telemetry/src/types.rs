/// Core data types for the telemetry stream
///
/// These types match the JSON envelope broadcast by the arbitrage bot dashboard
/// server at ws://127.0.0.1:8080/ws. Every section is optional on the wire and every
/// field inside a section falls back to its default, so partial envelopes degrade
/// gracefully instead of failing the whole update.
use crate::log_buffer::Severity;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::VecDeque;

/// Deserialize an explicit JSON `null` as the field's default, same as a missing field
fn de_null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// Best bid/ask on both legs
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Prices {
    #[serde(deserialize_with = "de_null_as_default")]
    pub spot_bid: f64,
    #[serde(deserialize_with = "de_null_as_default")]
    pub spot_ask: f64,
    #[serde(deserialize_with = "de_null_as_default")]
    pub perp_bid: f64,
    #[serde(deserialize_with = "de_null_as_default")]
    pub perp_ask: f64,
}

impl Prices {
    pub fn spot_mid(&self) -> f64 {
        (self.spot_bid + self.spot_ask) / 2.0
    }

    pub fn perp_mid(&self) -> f64 {
        (self.perp_bid + self.perp_ask) / 2.0
    }
}

/// Spread values in percent
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Spread {
    /// Entry spread (perp bid vs spot ask), the value the opportunity rule keys on
    #[serde(deserialize_with = "de_null_as_default")]
    pub entry: f64,
    /// Exit spread, when the server reports it
    pub exit: Option<f64>,
    #[serde(deserialize_with = "de_null_as_default")]
    pub threshold: f64,
    #[serde(deserialize_with = "de_null_as_default")]
    pub is_opportunity: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Position {
    #[serde(deserialize_with = "de_null_as_default")]
    pub has_position: bool,
    #[serde(deserialize_with = "de_null_as_default")]
    pub size: f64,
    #[serde(deserialize_with = "de_null_as_default")]
    pub entry_spot: f64,
    #[serde(deserialize_with = "de_null_as_default")]
    pub entry_perp: f64,
    pub entry_time: Option<String>,
    #[serde(deserialize_with = "de_null_as_default")]
    pub unrealized_pnl: f64,
}

impl Position {
    /// One-line summary for status output
    pub fn summary(&self) -> String {
        if self.has_position {
            format!(
                "{:.4} @ spot {:.4} / perp {:.4} (uPnL {:+.2})",
                self.size, self.entry_spot, self.entry_perp, self.unrealized_pnl
            )
        } else {
            "flat".to_string()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Stats {
    #[serde(deserialize_with = "de_null_as_default")]
    pub trades: u64,
    #[serde(deserialize_with = "de_null_as_default")]
    pub total_pnl: f64,
    /// Informational only; opportunity precedence comes from `spread_log`
    pub opportunities: Option<u64>,
    pub funding_rate: Option<f64>,
}

/// Bot configuration as reported by the server
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct BotConfig {
    #[serde(deserialize_with = "de_null_as_default")]
    pub dry_run: bool,
    #[serde(deserialize_with = "de_null_as_default")]
    pub max_position: f64,
    pub spot_symbol: Option<String>,
    pub perp_symbol: Option<String>,
}

/// Server-side connection status (independent of our own transport)
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerStatus {
    #[serde(deserialize_with = "de_null_as_default")]
    pub ws_connected: bool,
    pub bot_running: Option<bool>,
    #[serde(deserialize_with = "de_null_as_default")]
    pub last_update: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Account {
    #[serde(deserialize_with = "de_null_as_default")]
    pub spot: f64,
    #[serde(deserialize_with = "de_null_as_default")]
    pub perp: f64,
    pub total: Option<f64>,
}

impl Account {
    /// Reported total, or the sum of both legs when the server omits it
    pub fn total_value(&self) -> f64 {
        self.total.unwrap_or(self.spot + self.perp)
    }
}

/// Discrete trade notification (entry, exit, error, ...)
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct TradeEvent {
    #[serde(deserialize_with = "de_null_as_default")]
    pub timestamp: String,
    #[serde(deserialize_with = "de_null_as_default")]
    pub message: String,
    #[serde(deserialize_with = "de_null_as_default")]
    pub event_type: String,
}

impl TradeEvent {
    /// Dedup identity: timestamp followed by message text
    pub fn identity(&self) -> String {
        format!("{}{}", self.timestamp, self.message)
    }

    pub fn severity(&self) -> Severity {
        Severity::from_event_type(&self.event_type)
    }
}

/// Authoritative opportunity counters kept by the server
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct SpreadLog {
    #[serde(deserialize_with = "de_null_as_default")]
    pub above_threshold: u64,
    #[serde(deserialize_with = "de_null_as_default")]
    pub total_checks: u64,
}

/// One complete update message received over the channel
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Envelope {
    pub prices: Option<Prices>,
    pub spread: Option<Spread>,
    pub position: Option<Position>,
    pub stats: Option<Stats>,
    pub config: Option<BotConfig>,
    pub status: Option<ServerStatus>,
    pub account: Option<Account>,
    pub trade_events: Option<Vec<TradeEvent>>,
    pub spread_log: Option<SpreadLog>,
}

impl Envelope {
    /// True when the frame carries no state section at all (pong, welcome, ...)
    pub fn is_empty(&self) -> bool {
        self.prices.is_none()
            && self.spread.is_none()
            && self.position.is_none()
            && self.stats.is_none()
            && self.config.is_none()
            && self.status.is_none()
            && self.account.is_none()
            && self.trade_events.is_none()
            && self.spread_log.is_none()
    }
}

/// Latest fully-applied server state
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StateSnapshot {
    pub prices: Prices,
    pub spread: Spread,
    pub position: Position,
    pub account: Account,
    pub stats: Stats,
    pub config: BotConfig,
    pub status: ServerStatus,
    pub spread_log: Option<SpreadLog>,
    /// Newly-seen trade events, oldest first
    pub trade_events: VecDeque<TradeEvent>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_envelope_defaults() {
        let env: Envelope =
            serde_json::from_str(r#"{"spread": {"entry": 0.12}, "stats": {"trades": 3}}"#)
                .unwrap();

        let spread = env.spread.unwrap();
        assert_eq!(spread.entry, 0.12);
        assert_eq!(spread.threshold, 0.0);
        assert!(!spread.is_opportunity);

        let stats = env.stats.unwrap();
        assert_eq!(stats.trades, 3);
        assert_eq!(stats.opportunities, None);
        assert!(env.prices.is_none());
        assert!(env.trade_events.is_none());
    }

    #[test]
    fn test_null_scalars_default() {
        let env: Envelope = serde_json::from_str(
            r#"{
                "spread": {"entry": null, "threshold": 0.15, "is_opportunity": null},
                "status": {"ws_connected": true, "last_update": null},
                "trade_events": [{"timestamp": "t", "message": null, "event_type": "entry"}],
                "prices": null
            }"#,
        )
        .unwrap();

        let spread = env.spread.unwrap();
        assert_eq!(spread.entry, 0.0);
        assert_eq!(spread.threshold, 0.15);
        assert!(!spread.is_opportunity);
        assert_eq!(env.status.unwrap().last_update, "");
        assert_eq!(env.trade_events.unwrap()[0].message, "");
        assert!(env.prices.is_none());
    }

    #[test]
    fn test_empty_envelope() {
        let env: Envelope = serde_json::from_str(r#"{"pong": true}"#).unwrap();
        assert!(env.is_empty());
    }

    #[test]
    fn test_account_total_fallback() {
        let account = Account {
            spot: 120.0,
            perp: 80.5,
            total: None,
        };
        assert_eq!(account.total_value(), 200.5);

        let account = Account {
            total: Some(199.0),
            ..account
        };
        assert_eq!(account.total_value(), 199.0);
    }

    #[test]
    fn test_trade_event_identity() {
        let event = TradeEvent {
            timestamp: "2024-01-01T00:00:00".to_string(),
            message: "ENTRY 10 HYPE".to_string(),
            event_type: "entry".to_string(),
        };
        assert_eq!(event.identity(), "2024-01-01T00:00:00ENTRY 10 HYPE");
        assert_eq!(event.severity(), Severity::Success);
    }

    #[test]
    fn test_position_summary() {
        assert_eq!(Position::default().summary(), "flat");

        let position = Position {
            has_position: true,
            size: 10.0,
            entry_spot: 25.0,
            entry_perp: 25.05,
            entry_time: None,
            unrealized_pnl: -1.5,
        };
        assert_eq!(position.summary(), "10.0000 @ spot 25.0000 / perp 25.0500 (uPnL -1.50)");
    }
}
