/// Spread Telemetry - Shared Library
///
/// Client side of the spot/perp arbitrage bot's live telemetry stream:
/// - WebSocket client with fixed-delay reconnects and manual resume
/// - Envelope dispatch into a single-owner telemetry engine
/// - Rolling spread analytics, bounded chart window and bounded activity log
/// - Session report export
pub mod aggregation;
pub mod config;
pub mod connection;
pub mod dispatcher;
pub mod error;
pub mod event_loop;
pub mod log_buffer;
pub mod report;
pub mod state;
pub mod types;
pub mod websocket;
pub mod window;

// Re-export commonly used types for convenience
pub use types::{
    Account, BotConfig, Envelope, Position, Prices, ServerStatus, Spread, SpreadLog,
    StateSnapshot, Stats, TradeEvent,
};

pub use connection::{ConnectionManager, ConnectionState, ReconnectPolicy};
pub use websocket::{ClientConfig, ClientEvent, ClientHandle, TelemetryClient};

pub use aggregation::{AnalyticsSnapshot, CountSource, SpreadAnalytics};
pub use log_buffer::{LogBuffer, LogEntry, Severity};
pub use window::{ChartSnapshot, ChartWindow};

// Telemetry engine
pub use config::{EngineConfig, Settings};
pub use error::TelemetryError;
pub use event_loop::run_engine;
pub use report::SessionReport;
pub use state::{DerivedState, Engine, EngineView, StatusReadout};
