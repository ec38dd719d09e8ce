//! Runtime configuration.
//!
//! Everything is read from environment variables with sane defaults, the same way
//! the other terminals pick up `WS_URL`/`TICKERS`.

use crate::aggregation::{DEFAULT_BREACH_CUTOFFS, DEFAULT_REFRESH_EVERY, DEFAULT_SAMPLE_CAPACITY};
use crate::dispatcher::DEFAULT_SEEN_EVENT_CAPACITY;
use crate::error::TelemetryError;
use crate::log_buffer::DEFAULT_LOG_CAPACITY;
use crate::websocket::ClientConfig;
use crate::window::DEFAULT_CHART_CAPACITY;
use std::{path::PathBuf, str::FromStr, time::Duration};
use tracing::warn;

pub const ENV_WS_URL: &str = "TELEMETRY_WS_URL";
pub const ENV_PING_SECS: &str = "TELEMETRY_PING_SECS";
pub const ENV_STATUS_SECS: &str = "TELEMETRY_STATUS_SECS";
pub const ENV_EXPORT_PATH: &str = "TELEMETRY_EXPORT_PATH";

/// Capacities and cadences for the engine's data structures
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub sample_capacity: usize,
    pub chart_capacity: usize,
    pub log_capacity: usize,
    pub seen_event_capacity: usize,
    pub refresh_every: u64,
    pub breach_cutoffs: Vec<f64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_capacity: DEFAULT_SAMPLE_CAPACITY,
            chart_capacity: DEFAULT_CHART_CAPACITY,
            log_capacity: DEFAULT_LOG_CAPACITY,
            seen_event_capacity: DEFAULT_SEEN_EVENT_CAPACITY,
            refresh_every: DEFAULT_REFRESH_EVERY,
            breach_cutoffs: DEFAULT_BREACH_CUTOFFS.to_vec(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub client: ClientConfig,
    pub engine: EngineConfig,
    /// Cadence of the session status line
    pub status_interval: Duration,
    /// Where the session report is written on shutdown (stdout when unset)
    pub export_path: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            client: ClientConfig::default(),
            engine: EngineConfig::default(),
            status_interval: Duration::from_secs(1),
            export_path: None,
        }
    }
}

impl Settings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from any key lookup; invalid values fall back to defaults
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = Settings::default();

        if let Some(url) = lookup(ENV_WS_URL).filter(|url| !url.trim().is_empty()) {
            settings.client.url = url.trim().to_string();
        }

        if let Some(secs) = parse_or_warn::<u64, _>(&lookup, ENV_PING_SECS) {
            settings.client.ping_interval = Duration::from_secs(secs.max(1));
        }

        if let Some(secs) = parse_or_warn::<u64, _>(&lookup, ENV_STATUS_SECS) {
            settings.status_interval = Duration::from_secs(secs.max(1));
        }

        settings.export_path = lookup(ENV_EXPORT_PATH)
            .filter(|path| !path.trim().is_empty())
            .map(PathBuf::from);

        settings
    }
}

/// Parse an optional variable, reporting values that do not parse
pub fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>, TelemetryError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| TelemetryError::Config {
                key: key.to_string(),
                value: raw,
            }),
    }
}

fn parse_or_warn<T, F>(lookup: &F, key: &str) -> Option<T>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    parse_var(lookup, key).unwrap_or_else(|error| {
        warn!("{}, using default", error);
        None
    })
}
