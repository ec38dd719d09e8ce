use rustls::crypto::ring::default_provider;
use spread_telemetry::{
    aggregation::format_spread, run_engine, ClientHandle, Engine, EngineView, Settings,
    TelemetryClient,
};
use std::error::Error;
use tokio::sync::watch;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let _ = default_provider().install_default();
    init_logging();

    let settings = Settings::from_env();
    info!("Connecting to telemetry stream at {}", settings.client.url);

    let engine = Engine::new(settings.engine.clone());
    spawn_opportunity_watch(engine.subscribe());

    let client = TelemetryClient::with_config(settings.client.clone());
    let (event_rx, handle) = client.start();
    spawn_resume_listener(handle.clone());

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for ctrl-c: {}", e);
            std::future::pending::<()>().await;
        }
    };

    let engine = run_engine(engine, event_rx, settings.status_interval, shutdown).await;

    if handle.shutdown().await.is_err() {
        info!("Telemetry client already stopped");
    }

    let report = engine.export_json()?;
    match &settings.export_path {
        Some(path) => {
            std::fs::write(path, &report)?;
            info!("Session report written to {}", path.display());
        }
        None => println!("{report}"),
    }

    Ok(())
}

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_ansi(cfg!(debug_assertions))
        .init();
}

/// Log every time the spread crosses into or out of opportunity territory
fn spawn_opportunity_watch(mut view_rx: watch::Receiver<EngineView>) {
    tokio::spawn(async move {
        let mut in_opportunity = false;
        while view_rx.changed().await.is_ok() {
            let spread = view_rx.borrow_and_update().snapshot.spread.clone();
            if spread.is_opportunity == in_opportunity {
                continue;
            }
            in_opportunity = spread.is_opportunity;
            if in_opportunity {
                info!(
                    "Opportunity: spread {} above threshold {}",
                    format_spread(spread.entry),
                    format_spread(spread.threshold)
                );
            } else {
                info!("Opportunity closed at spread {}", format_spread(spread.entry));
            }
        }
    });
}

/// SIGUSR1 asks the client to reconnect immediately
#[cfg(unix)]
fn spawn_resume_listener(handle: ClientHandle) {
    use tokio::signal::unix::{signal, SignalKind};

    tokio::spawn(async move {
        let mut resume_signal = match signal(SignalKind::user_defined1()) {
            Ok(stream) => stream,
            Err(e) => {
                warn!("Failed to register SIGUSR1 handler: {}", e);
                return;
            }
        };
        while resume_signal.recv().await.is_some() {
            info!("SIGUSR1 received, resuming connection");
            if handle.resume().await.is_err() {
                break;
            }
        }
    });
}

#[cfg(not(unix))]
fn spawn_resume_listener(_handle: ClientHandle) {}
