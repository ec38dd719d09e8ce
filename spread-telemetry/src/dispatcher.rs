//! Envelope parsing and trade-event deduplication.
//!
//! Routing of a parsed envelope to the individual updaters lives on
//! [`Engine`](crate::state::Engine), which owns the state they write to.

use crate::error::TelemetryError;
use crate::types::{Envelope, TradeEvent};
use indexmap::IndexSet;

/// Default number of trade-event identities remembered
///
/// The server replays its most recent events on every frame, so this only has to
/// comfortably exceed that replay window.
pub const DEFAULT_SEEN_EVENT_CAPACITY: usize = 256;

/// Parse a raw text frame into an envelope
///
/// The whole frame is decoded before anything is applied, so a malformed frame
/// never leaves state half-updated.
pub fn parse_envelope(raw: &str) -> Result<Envelope, TelemetryError> {
    serde_json::from_str(raw).map_err(TelemetryError::Parse)
}

/// Insertion-ordered, FIFO-bounded set of trade-event identities
#[derive(Debug, Clone)]
pub struct SeenEvents {
    ids: IndexSet<String>,
    capacity: usize,
}

impl SeenEvents {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            ids: IndexSet::with_capacity(capacity),
            capacity,
        }
    }

    /// Record an identity, returning true if it had not been seen
    pub fn insert(&mut self, id: String) -> bool {
        if self.ids.contains(&id) {
            return false;
        }
        if self.ids.len() >= self.capacity {
            self.ids.shift_remove_index(0);
        }
        self.ids.insert(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    /// Filter to events not seen before, preserving input order
    pub fn retain_new(&mut self, events: Vec<TradeEvent>) -> Vec<TradeEvent> {
        events
            .into_iter()
            .filter(|event| self.insert(event.identity()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

impl Default for SeenEvents {
    fn default() -> Self {
        Self::new(DEFAULT_SEEN_EVENT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(timestamp: &str, message: &str, event_type: &str) -> TradeEvent {
        TradeEvent {
            timestamp: timestamp.to_string(),
            message: message.to_string(),
            event_type: event_type.to_string(),
        }
    }

    #[test]
    fn test_parse_envelope() {
        struct TestCase {
            input: &'static str,
            expected_ok: bool,
        }

        let tests = vec![
            TestCase {
                // TC0: valid envelope
                input: r#"{"prices": {"spot_bid": 25.1}, "spread": {"entry": 0.12}}"#,
                expected_ok: true,
            },
            TestCase {
                // TC1: not JSON
                input: "not json",
                expected_ok: false,
            },
            TestCase {
                // TC2: JSON but not an object
                input: "[1, 2, 3]",
                expected_ok: false,
            },
            TestCase {
                // TC3: wrong field type
                input: r#"{"spread": {"entry": "wide"}}"#,
                expected_ok: false,
            },
            TestCase {
                // TC4: truncated frame
                input: r#"{"prices": {"spot_bid": 25.1"#,
                expected_ok: false,
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let actual = parse_envelope(test.input).is_ok();
            assert_eq!(actual, test.expected_ok, "TC{} failed", index);
        }
    }

    #[test]
    fn test_retain_new_preserves_order_and_dedups() {
        let mut seen = SeenEvents::default();

        let first = seen.retain_new(vec![
            event("10:00", "ENTRY", "entry"),
            event("10:05", "EXIT", "exit"),
        ]);
        assert_eq!(first.len(), 2);
        assert_eq!(first[0].message, "ENTRY");
        assert_eq!(first[1].message, "EXIT");

        let replay = seen.retain_new(vec![
            event("10:00", "ENTRY", "entry"),
            event("10:05", "EXIT", "exit"),
            event("10:06", "Order rejected", "error"),
        ]);
        assert_eq!(replay.len(), 1);
        assert_eq!(replay[0].event_type, "error");
    }

    #[test]
    fn test_duplicates_within_one_frame() {
        let mut seen = SeenEvents::default();
        let fresh = seen.retain_new(vec![event("t", "m", "entry"), event("t", "m", "entry")]);
        assert_eq!(fresh.len(), 1);
    }

    #[test]
    fn test_capacity_evicts_oldest_identity() {
        let mut seen = SeenEvents::new(3);
        for i in 0..4 {
            assert!(seen.insert(format!("id{i}")));
        }

        assert_eq!(seen.len(), 3);
        assert!(!seen.contains("id0"));
        assert!(seen.contains("id3"));
        assert!(!seen.insert("id3".to_string()));
    }
}
