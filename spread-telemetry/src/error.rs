use thiserror::Error;
use tokio_tungstenite::tungstenite;

/// All errors generated in `spread-telemetry`.
#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("failed to parse envelope: {0}")]
    Parse(#[source] serde_json::Error),

    #[error("failed to serialise report: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("websocket error: {0}")]
    WebSocket(Box<tungstenite::Error>),

    #[error("connect timed out after {0:?}")]
    ConnectTimeout(std::time::Duration),

    #[error("{0} channel closed")]
    ChannelClosed(&'static str),

    #[error("invalid configuration value for {key}: {value}")]
    Config { key: String, value: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl TelemetryError {
    /// Determine if an error requires the transport to be torn down and re-established.
    pub fn is_terminal(&self) -> bool {
        match self {
            // Oversized frames are dropped, the socket itself is still usable
            TelemetryError::WebSocket(error) => {
                !matches!(error.as_ref(), tungstenite::Error::Capacity(_))
            }
            TelemetryError::ChannelClosed(_) => true,
            _ => false,
        }
    }
}

impl From<tungstenite::Error> for TelemetryError {
    fn from(value: tungstenite::Error) -> Self {
        Self::WebSocket(Box::new(value))
    }
}
