/// WebSocket client for the bot's telemetry stream
///
/// Owns the transport lifecycle: one socket at a time, fixed-delay reconnects,
/// heartbeat pings, and an immediate reconnect on resume.
use crate::connection::{CloseKind, ConnectionManager, ConnectionState, ReconnectPolicy};
use crate::error::TelemetryError;
use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_tungstenite::{
    connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream,
};
use tracing::{debug, error, info, warn};

/// WebSocket client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// WebSocket server URL
    pub url: String,
    /// Ping interval to keep connection alive
    pub ping_interval: Duration,
    /// Upper bound on TCP connect plus websocket handshake
    pub connect_timeout: Duration,
    /// Reconnection delays after disconnect
    pub reconnect: ReconnectPolicy,
    /// Maximum channel buffer size for events
    pub channel_buffer_size: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: "ws://127.0.0.1:8080/ws".to_string(),
            ping_interval: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            reconnect: ReconnectPolicy::default(),
            channel_buffer_size: 1000,
        }
    }
}

impl ClientConfig {
    /// Create a new configuration with custom URL
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Set ping interval
    pub fn with_ping_interval(mut self, interval: Duration) -> Self {
        self.ping_interval = interval;
        self
    }

    /// Set connect timeout
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set reconnect delays
    pub fn with_reconnect_policy(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnect = policy;
        self
    }

    /// Set channel buffer size
    pub fn with_channel_buffer_size(mut self, size: usize) -> Self {
        self.channel_buffer_size = size;
        self
    }
}

/// Everything the transport reports to the engine
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    Status(ConnectionState),
    /// Raw text frame, parsed by the engine
    Frame(String),
    TransportError(String),
    ReconnectScheduled(Duration),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientCommand {
    Resume,
    Shutdown,
}

/// Control handle for a running client
#[derive(Debug, Clone)]
pub struct ClientHandle {
    command_tx: mpsc::Sender<ClientCommand>,
}

impl ClientHandle {
    /// Reconnect now if no transport is open or opening; no-op otherwise
    pub async fn resume(&self) -> Result<(), TelemetryError> {
        self.send(ClientCommand::Resume).await
    }

    /// Close the transport and stop the client task
    pub async fn shutdown(&self) -> Result<(), TelemetryError> {
        self.send(ClientCommand::Shutdown).await
    }

    async fn send(&self, command: ClientCommand) -> Result<(), TelemetryError> {
        self.command_tx
            .send(command)
            .await
            .map_err(|_| TelemetryError::ChannelClosed("client command"))
    }
}

/// WebSocket client for telemetry envelopes
pub struct TelemetryClient {
    config: ClientConfig,
    event_tx: mpsc::Sender<ClientEvent>,
    event_rx: mpsc::Receiver<ClientEvent>,
    command_tx: mpsc::Sender<ClientCommand>,
    command_rx: mpsc::Receiver<ClientCommand>,
}

impl TelemetryClient {
    /// Create a new client with default configuration
    pub fn new() -> Self {
        Self::with_config(ClientConfig::default())
    }

    /// Create a new client with custom configuration
    pub fn with_config(config: ClientConfig) -> Self {
        let (event_tx, event_rx) = mpsc::channel(config.channel_buffer_size.max(1));
        let (command_tx, command_rx) = mpsc::channel(16);

        Self {
            config,
            event_tx,
            event_rx,
            command_tx,
            command_rx,
        }
    }

    /// Start the client connection
    ///
    /// Returns a receiver for client events and a handle for resume/shutdown. Dropping
    /// every handle stops the client.
    pub fn start(self) -> (mpsc::Receiver<ClientEvent>, ClientHandle) {
        let Self {
            config,
            event_tx,
            event_rx,
            command_tx,
            command_rx,
        } = self;

        tokio::spawn(async move {
            run_websocket_loop(config, event_tx, command_rx).await;
        });

        (event_rx, ClientHandle { command_tx })
    }
}

impl Default for TelemetryClient {
    fn default() -> Self {
        Self::new()
    }
}

/// How a connected session ended
enum SessionEnd {
    Closed,
    Shutdown,
}

/// Main connection loop with auto-reconnect
async fn run_websocket_loop(
    config: ClientConfig,
    event_tx: mpsc::Sender<ClientEvent>,
    mut command_rx: mpsc::Receiver<ClientCommand>,
) {
    info!("Starting telemetry client for {}", config.url);

    let mut manager = ConnectionManager::new(config.reconnect);
    let mut reconnect_at: Option<Instant> = None;
    let mut open_now = manager.connect();

    loop {
        if open_now {
            open_now = false;
            reconnect_at = None;

            if emit(&event_tx, ClientEvent::Status(ConnectionState::Connecting))
                .await
                .is_err()
            {
                break;
            }

            let connect = tokio::time::timeout(config.connect_timeout, connect_async(&config.url));
            tokio::pin!(connect);

            // Commands stay live while the handshake is pending
            let attempt = loop {
                tokio::select! {
                    result = &mut connect => break Some(result),
                    command = command_rx.recv() => match command {
                        Some(ClientCommand::Resume) => {
                            debug!("Resume ignored, transport is {}", manager.state());
                        }
                        Some(ClientCommand::Shutdown) | None => break None,
                    }
                }
            };
            let Some(attempt) = attempt else {
                break;
            };

            let connected = match attempt {
                Ok(Ok((ws_stream, _))) => Ok(ws_stream),
                Ok(Err(e)) => Err(TelemetryError::from(e)),
                Err(_) => Err(TelemetryError::ConnectTimeout(config.connect_timeout)),
            };

            let close_kind = match connected {
                Ok(ws_stream) => {
                    manager.on_open();
                    info!("Connected to telemetry server at {}", config.url);
                    if emit(&event_tx, ClientEvent::Status(ConnectionState::Connected))
                        .await
                        .is_err()
                    {
                        break;
                    }

                    match run_session(ws_stream, &config, &event_tx, &mut command_rx, &mut manager)
                        .await
                    {
                        Ok(SessionEnd::Closed) => CloseKind::Clean,
                        Ok(SessionEnd::Shutdown) | Err(_) => break,
                    }
                }
                Err(error) => {
                    error!("Failed to connect to {}: {}", config.url, error);
                    if emit(&event_tx, ClientEvent::TransportError(error.to_string()))
                        .await
                        .is_err()
                    {
                        break;
                    }
                    CloseKind::ConnectFailed
                }
            };

            if let Some(delay) = manager.on_close(close_kind) {
                debug!("Waiting {:?} before reconnecting...", delay);
                reconnect_at = Some(Instant::now() + delay);
                if emit(&event_tx, ClientEvent::Status(ConnectionState::Disconnected))
                    .await
                    .is_err()
                {
                    break;
                }
                if emit(&event_tx, ClientEvent::ReconnectScheduled(delay))
                    .await
                    .is_err()
                {
                    break;
                }
            }
            continue;
        }

        tokio::select! {
            _ = sleep_until_deadline(reconnect_at) => {
                reconnect_at = None;
                open_now = manager.on_timer();
            }
            command = command_rx.recv() => match command {
                Some(ClientCommand::Resume) => {
                    if manager.resume() {
                        info!("Resume requested, reconnecting immediately");
                        // Supersedes the pending reconnect timer
                        open_now = true;
                    } else {
                        debug!("Resume ignored, transport is {}", manager.state());
                    }
                }
                Some(ClientCommand::Shutdown) | None => break,
            }
        }
    }

    info!("Telemetry client for {} stopped", config.url);
}

/// Read frames from an established socket until it closes
async fn run_session(
    ws_stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    config: &ClientConfig,
    event_tx: &mpsc::Sender<ClientEvent>,
    command_rx: &mut mpsc::Receiver<ClientCommand>,
    manager: &mut ConnectionManager,
) -> Result<SessionEnd, TelemetryError> {
    let (mut write, mut read) = ws_stream.split();

    let mut ping = tokio::time::interval_at(
        Instant::now() + config.ping_interval,
        config.ping_interval,
    );

    loop {
        tokio::select! {
            message = read.next() => match message {
                Some(Ok(Message::Text(text))) => {
                    emit(event_tx, ClientEvent::Frame(text.to_string())).await?;
                }
                Some(Ok(Message::Close(_))) => {
                    info!("Server closed connection");
                    return Ok(SessionEnd::Closed);
                }
                Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => {
                    // Heartbeat messages - tungstenite handles these automatically
                }
                Some(Ok(_)) => {
                    debug!("Ignoring non-text frame");
                }
                Some(Err(e)) => {
                    let error = TelemetryError::from(e);
                    error!("WebSocket error: {}", error);
                    emit(event_tx, ClientEvent::TransportError(error.to_string())).await?;
                    if error.is_terminal() {
                        return Ok(SessionEnd::Closed);
                    }
                }
                None => {
                    warn!("Connection closed, will reconnect...");
                    return Ok(SessionEnd::Closed);
                }
            },
            _ = ping.tick() => {
                if write.send(Message::Ping(vec![].into())).await.is_err() {
                    debug!("Failed to send ping, connection likely dead");
                    return Ok(SessionEnd::Closed);
                }
            }
            command = command_rx.recv() => match command {
                Some(ClientCommand::Resume) => {
                    let reopened = manager.resume();
                    debug_assert!(!reopened, "resume must be a no-op while connected");
                    debug!("Resume ignored, transport is {}", manager.state());
                }
                Some(ClientCommand::Shutdown) | None => {
                    let _ = write.send(Message::Close(None)).await;
                    return Ok(SessionEnd::Shutdown);
                }
            }
        }
    }
}

async fn emit(
    event_tx: &mpsc::Sender<ClientEvent>,
    event: ClientEvent,
) -> Result<(), TelemetryError> {
    event_tx.send(event).await.map_err(|_| {
        warn!("Event receiver dropped, stopping client");
        TelemetryError::ChannelClosed("client event")
    })
}

/// Sleep until the deadline, or forever when none is pending
async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending::<()>().await,
    }
}
