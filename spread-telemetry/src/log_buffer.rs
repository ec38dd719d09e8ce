/// Bounded, newest-first event log
///
/// Every component surfaces human-readable status through this buffer. Entries are
/// mirrored to `tracing` so headless runs still see them.
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use tracing::{error, info, warn};

/// Default number of log entries retained
pub const DEFAULT_LOG_CAPACITY: usize = 50;

/// Log entry severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

impl Severity {
    /// Convert to display string
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Success => "success",
            Severity::Warning => "warning",
            Severity::Error => "error",
        }
    }

    /// Severity for a server trade event type
    pub fn from_event_type(event_type: &str) -> Self {
        match event_type {
            "entry" => Severity::Success,
            "exit" => Severity::Warning,
            "error" => Severity::Error,
            _ => Severity::Info,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single log line
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub severity: Severity,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct LogBuffer {
    /// Front is the newest entry
    entries: VecDeque<LogEntry>,
    capacity: usize,
}

impl LogBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a message stamped with the current time
    pub fn append(&mut self, severity: Severity, message: impl Into<String>) {
        self.append_at(Utc::now(), severity, message);
    }

    pub fn append_at(
        &mut self,
        timestamp: DateTime<Utc>,
        severity: Severity,
        message: impl Into<String>,
    ) {
        let message = message.into();

        match severity {
            Severity::Info | Severity::Success => info!(%severity, "{}", message),
            Severity::Warning => warn!("{}", message),
            Severity::Error => error!("{}", message),
        }

        self.entries.push_front(LogEntry {
            timestamp,
            severity,
            message,
        });
        self.entries.truncate(self.capacity);
    }

    /// Copy of all entries, newest first
    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.iter().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }

    pub fn latest(&self) -> Option<&LogEntry> {
        self.entries.front()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for LogBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_newest_first_ordering() {
        let mut logs = LogBuffer::default();
        logs.append(Severity::Info, "first");
        logs.append(Severity::Warning, "second");

        let entries = logs.entries();
        assert_eq!(entries[0].message, "second");
        assert_eq!(entries[0].severity, Severity::Warning);
        assert_eq!(entries[1].message, "first");
    }

    #[test]
    fn test_capacity_drops_oldest() {
        let mut logs = LogBuffer::new(50);
        for i in 0..60 {
            logs.append(Severity::Info, format!("msg {i}"));
        }

        assert_eq!(logs.len(), 50);
        assert_eq!(logs.latest().unwrap().message, "msg 59");
        assert_eq!(logs.iter().last().unwrap().message, "msg 10");
    }

    #[test]
    fn test_entries_is_a_copy() {
        let mut logs = LogBuffer::new(3);
        logs.append(Severity::Error, "boom");

        let mut copy = logs.entries();
        copy.clear();
        assert_eq!(logs.len(), 1);
    }

    #[test]
    fn test_severity_from_event_type() {
        assert_eq!(Severity::from_event_type("entry"), Severity::Success);
        assert_eq!(Severity::from_event_type("exit"), Severity::Warning);
        assert_eq!(Severity::from_event_type("error"), Severity::Error);
        assert_eq!(Severity::from_event_type("funding"), Severity::Info);
        assert_eq!(Severity::from_event_type(""), Severity::Info);
    }
}
