//! Telemetry engine: the single owner of all client-side state.
//!
//! Consumes [`ClientEvent`]s one at a time, applies each envelope completely (or not
//! at all), and publishes a read-only [`EngineView`] to subscribers afterwards.

use crate::aggregation::{AnalyticsSnapshot, SpreadAnalytics};
use crate::config::EngineConfig;
use crate::connection::ConnectionState;
use crate::dispatcher::{parse_envelope, SeenEvents};
use crate::error::TelemetryError;
use crate::log_buffer::{LogBuffer, LogEntry, Severity};
use crate::report::{format_session_duration, SessionReport};
use crate::types::{
    Account, BotConfig, Envelope, Position, Prices, ServerStatus, Spread, StateSnapshot, Stats,
};
use crate::websocket::ClientEvent;
use crate::window::{ChartSnapshot, ChartWindow};
use chrono::Utc;
use serde::Serialize;
use tokio::sync::watch;
use tracing::debug;

/// Funding payments per year (hourly funding)
const FUNDING_PERIODS_PER_YEAR: f64 = 24.0 * 365.0;

/// Current-status readout
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatusReadout {
    /// Our own transport
    pub connection: ConnectionState,
    /// Server's upstream feed, as reported in the payload
    pub server_connected: bool,
    pub bot_running: Option<bool>,
    pub last_update: String,
    pub price_updates: u64,
    pub session_duration: String,
}

/// Values derived by the updaters for display
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DerivedState {
    pub spot_mid: f64,
    pub perp_mid: f64,
    pub funding_apr_pct: f64,
    pub account_total: f64,
    /// Effective opportunity count, see [`OpportunityCounts`](crate::aggregation::OpportunityCounts)
    pub opportunities: u64,
}

/// Read-only view published after every applied event
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EngineView {
    pub status: StatusReadout,
    pub snapshot: StateSnapshot,
    pub derived: DerivedState,
    pub analytics: AnalyticsSnapshot,
    pub chart: ChartSnapshot,
    pub logs: Vec<LogEntry>,
}

#[derive(Debug)]
pub struct Engine {
    config: EngineConfig,
    connection: ConnectionState,
    snapshot: StateSnapshot,
    derived: DerivedState,
    analytics: SpreadAnalytics,
    chart: ChartWindow,
    logs: LogBuffer,
    seen_events: SeenEvents,
    view_tx: watch::Sender<EngineView>,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        let (view_tx, _) = watch::channel(EngineView::default());

        let mut engine = Self {
            analytics: SpreadAnalytics::with_settings(
                config.sample_capacity,
                config.refresh_every,
                &config.breach_cutoffs,
            ),
            chart: ChartWindow::new(config.chart_capacity),
            logs: LogBuffer::new(config.log_capacity),
            seen_events: SeenEvents::new(config.seen_event_capacity),
            connection: ConnectionState::Idle,
            snapshot: StateSnapshot::default(),
            derived: DerivedState::default(),
            config,
            view_tx,
        };
        engine.publish();
        engine
    }

    /// Subscribe to views published after each applied event
    pub fn subscribe(&self) -> watch::Receiver<EngineView> {
        self.view_tx.subscribe()
    }

    pub fn on_client_event(&mut self, event: ClientEvent) {
        match event {
            ClientEvent::Frame(raw) => {
                self.handle(&raw);
                return;
            }
            ClientEvent::Status(state) => self.set_connection_state(state),
            ClientEvent::TransportError(message) => {
                self.logs
                    .append(Severity::Error, format!("Connection error: {message}"));
            }
            ClientEvent::ReconnectScheduled(delay) => {
                self.logs.append(
                    Severity::Info,
                    format!("Reconnecting in {:.1}s", delay.as_secs_f64()),
                );
            }
        }
        self.publish();
    }

    /// Dispatch one raw frame; never fails, malformed frames become a log entry
    pub fn handle(&mut self, raw: &str) {
        match parse_envelope(raw) {
            Ok(envelope) if envelope.is_empty() => {
                debug!("Ignoring frame without state sections");
                return;
            }
            Ok(envelope) => self.apply(envelope),
            Err(error) => {
                debug!("Raw message: {}", raw);
                self.logs.append(Severity::Error, error.to_string());
            }
        }
        self.publish();
    }

    fn apply(&mut self, envelope: Envelope) {
        let Envelope {
            prices,
            spread,
            position,
            stats,
            config,
            status,
            account,
            trade_events,
            spread_log,
        } = envelope;

        if let Some(events) = trade_events {
            for event in self.seen_events.retain_new(events) {
                self.logs.append(event.severity(), event.message.clone());
                self.snapshot.trade_events.push_back(event);
            }
            while self.snapshot.trade_events.len() > self.config.log_capacity {
                self.snapshot.trade_events.pop_front();
            }
        }
        if spread_log.is_some() {
            self.snapshot.spread_log = spread_log;
        }

        // Fixed order; analytics last since it reads back what the others set
        self.update_prices(prices);
        self.update_spread(spread);
        self.update_position(position);
        self.update_stats(stats);
        self.update_funding_rate();
        self.update_config(config);
        self.update_server_status(status);
        self.update_account(account);
        self.track_analytics();
    }

    fn update_prices(&mut self, prices: Option<Prices>) {
        if let Some(prices) = prices {
            self.derived.spot_mid = prices.spot_mid();
            self.derived.perp_mid = prices.perp_mid();
            self.snapshot.prices = prices;
        }
    }

    fn update_spread(&mut self, spread: Option<Spread>) {
        if let Some(spread) = spread {
            let label = Utc::now().format("%H:%M:%S").to_string();
            self.chart.push(label, spread.entry, spread.threshold);
            self.snapshot.spread = spread;
        }
    }

    fn update_position(&mut self, position: Option<Position>) {
        if let Some(position) = position {
            self.snapshot.position = position;
        }
    }

    fn update_stats(&mut self, stats: Option<Stats>) {
        if let Some(mut stats) = stats {
            // Funding is reported intermittently; keep the last known rate
            if stats.funding_rate.is_none() {
                stats.funding_rate = self.snapshot.stats.funding_rate;
            }
            self.snapshot.stats = stats;
        }
    }

    fn update_funding_rate(&mut self) {
        if let Some(rate) = self.snapshot.stats.funding_rate {
            self.derived.funding_apr_pct = rate * FUNDING_PERIODS_PER_YEAR * 100.0;
        }
    }

    fn update_config(&mut self, config: Option<BotConfig>) {
        if let Some(config) = config {
            self.snapshot.config = config;
        }
    }

    fn update_server_status(&mut self, status: Option<ServerStatus>) {
        if let Some(status) = status {
            self.snapshot.status = status;
        }
    }

    fn update_account(&mut self, account: Option<Account>) {
        if let Some(account) = account {
            self.derived.account_total = account.total_value();
            self.snapshot.account = account;
        }
    }

    fn track_analytics(&mut self) {
        self.analytics.track(&self.snapshot);
        self.derived.opportunities = self.analytics.opportunities().effective().above_threshold;
    }

    fn set_connection_state(&mut self, state: ConnectionState) {
        if self.connection == state {
            return;
        }
        self.connection = state;

        match state {
            ConnectionState::Connected => {
                self.logs.append(Severity::Success, "Connected to telemetry stream")
            }
            ConnectionState::Disconnected => {
                self.logs.append(Severity::Warning, "Disconnected from telemetry stream")
            }
            ConnectionState::Connecting | ConnectionState::Idle => {
                debug!("Connection state: {}", state)
            }
        }
    }

    fn publish(&self) {
        self.view_tx.send_replace(self.view());
    }

    /// Full read-only view of current state
    pub fn view(&self) -> EngineView {
        EngineView {
            status: self.status(),
            snapshot: self.snapshot.clone(),
            derived: self.derived.clone(),
            analytics: self.analytics.snapshot(),
            chart: self.chart.snapshot(),
            logs: self.logs.entries(),
        }
    }

    pub fn status(&self) -> StatusReadout {
        StatusReadout {
            connection: self.connection,
            server_connected: self.snapshot.status.ws_connected,
            bot_running: self.snapshot.status.bot_running,
            last_update: self.snapshot.status.last_update.clone(),
            price_updates: self.analytics.price_updates(),
            session_duration: format_session_duration(
                Utc::now() - self.analytics.session_start(),
            ),
        }
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection
    }

    pub fn snapshot(&self) -> &StateSnapshot {
        &self.snapshot
    }

    pub fn derived(&self) -> &DerivedState {
        &self.derived
    }

    pub fn chart(&self) -> ChartSnapshot {
        self.chart.snapshot()
    }

    pub fn logs(&self) -> Vec<LogEntry> {
        self.logs.entries()
    }

    /// Cached analytics projection (refreshed on the aggregator's cadence)
    pub fn analytics(&self) -> AnalyticsSnapshot {
        self.analytics.snapshot()
    }

    /// Freshly computed analytics
    pub fn stats(&self) -> AnalyticsSnapshot {
        self.analytics.compute()
    }

    pub fn export_report(&self) -> SessionReport {
        SessionReport::build(
            self.analytics.session_start(),
            Utc::now(),
            &self.analytics.compute(),
            &self.snapshot,
        )
    }

    pub fn export_json(&self) -> Result<String, TelemetryError> {
        self.export_report().to_json_pretty()
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}
