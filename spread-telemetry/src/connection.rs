/// Connection lifecycle state machine
///
/// Idle --connect--> Connecting --open--> Connected --close--> Disconnected --timer--> Connecting
///
/// The transport task consults this before opening a socket, so at most one transport
/// is ever live. There is no terminal state, the client retries forever.
use serde::Serialize;
use std::time::Duration;

/// Transport status as seen by the rest of the client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum ConnectionState {
    #[default]
    Idle,
    Connecting,
    Connected,
    Disconnected,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Idle => "idle",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Disconnected => "disconnected",
        }
    }

    /// A transport is open or being opened
    pub fn is_live(&self) -> bool {
        matches!(self, ConnectionState::Connecting | ConnectionState::Connected)
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Why the transport went away
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseKind {
    /// An established session closed (server close, read error, ping failure)
    Clean,
    /// The socket could not be constructed (refused, handshake failure)
    ConnectFailed,
}

/// Fixed reconnect delays, one per close kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub after_close: Duration,
    pub after_connect_failure: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            after_close: Duration::from_secs(3),
            after_connect_failure: Duration::from_secs(5),
        }
    }
}

impl ReconnectPolicy {
    pub fn delay_for(&self, kind: CloseKind) -> Duration {
        match kind {
            CloseKind::Clean => self.after_close,
            CloseKind::ConnectFailed => self.after_connect_failure,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConnectionManager {
    state: ConnectionState,
    policy: ReconnectPolicy,
    /// Number of transports opened so far
    sessions: u64,
}

impl ConnectionManager {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self {
            state: ConnectionState::Idle,
            policy,
            sessions: 0,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn policy(&self) -> ReconnectPolicy {
        self.policy
    }

    pub fn sessions(&self) -> u64 {
        self.sessions
    }

    /// Begin opening a transport
    ///
    /// Returns true when the caller must open one; false while a transport is already
    /// open or opening.
    pub fn connect(&mut self) -> bool {
        if self.state.is_live() {
            return false;
        }
        self.state = ConnectionState::Connecting;
        true
    }

    /// Transport handshake completed
    pub fn on_open(&mut self) -> bool {
        if self.state != ConnectionState::Connecting {
            return false;
        }
        self.state = ConnectionState::Connected;
        self.sessions += 1;
        true
    }

    /// Transport closed or could not be opened
    ///
    /// Returns the reconnect delay to schedule, or None if the close was already
    /// handled (a second close for the same transport never schedules twice).
    pub fn on_close(&mut self, kind: CloseKind) -> Option<Duration> {
        if !self.state.is_live() {
            return None;
        }
        self.state = ConnectionState::Disconnected;
        Some(self.policy.delay_for(kind))
    }

    /// Scheduled reconnect delay elapsed
    pub fn on_timer(&mut self) -> bool {
        if self.state != ConnectionState::Disconnected {
            return false;
        }
        self.connect()
    }

    /// Host signalled that we should be online again (e.g. regained focus)
    ///
    /// Reconnects immediately, bypassing any pending delay, unless a transport is
    /// already open or opening.
    pub fn resume(&mut self) -> bool {
        self.connect()
    }
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new(ReconnectPolicy::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_lifecycle() {
        let mut manager = ConnectionManager::default();
        assert_eq!(manager.state(), ConnectionState::Idle);

        assert!(manager.connect());
        assert_eq!(manager.state(), ConnectionState::Connecting);

        assert!(manager.on_open());
        assert_eq!(manager.state(), ConnectionState::Connected);
        assert_eq!(manager.sessions(), 1);

        assert_eq!(
            manager.on_close(CloseKind::Clean),
            Some(Duration::from_secs(3))
        );
        assert_eq!(manager.state(), ConnectionState::Disconnected);

        assert!(manager.on_timer());
        assert_eq!(manager.state(), ConnectionState::Connecting);
    }

    #[test]
    fn test_connect_is_idempotent_while_live() {
        let mut manager = ConnectionManager::default();
        assert!(manager.connect());
        assert!(!manager.connect());
        assert!(!manager.resume());

        manager.on_open();
        assert!(!manager.connect());
        assert!(!manager.resume());
        assert_eq!(manager.state(), ConnectionState::Connected);
        assert_eq!(manager.sessions(), 1);
    }

    #[test]
    fn test_resume_bypasses_pending_reconnect() {
        let mut manager = ConnectionManager::default();
        manager.connect();
        manager.on_open();
        manager.on_close(CloseKind::Clean);

        assert!(manager.resume());
        assert_eq!(manager.state(), ConnectionState::Connecting);

        // The superseded timer firing later must not start another attempt
        assert!(!manager.on_timer());
    }

    #[test]
    fn test_connect_failure_uses_longer_delay() {
        let mut manager = ConnectionManager::default();
        manager.connect();

        assert_eq!(
            manager.on_close(CloseKind::ConnectFailed),
            Some(Duration::from_secs(5))
        );
        assert_eq!(manager.sessions(), 0);
    }

    #[test]
    fn test_second_close_does_not_reschedule() {
        let mut manager = ConnectionManager::default();
        manager.connect();
        manager.on_open();

        assert!(manager.on_close(CloseKind::Clean).is_some());
        assert!(manager.on_close(CloseKind::Clean).is_none());
    }

    #[test]
    fn test_open_requires_connecting() {
        let mut manager = ConnectionManager::default();
        assert!(!manager.on_open());
        assert!(!manager.on_timer());
        assert_eq!(manager.state(), ConnectionState::Idle);
    }
}
