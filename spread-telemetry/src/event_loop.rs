//! Single-consumer loop feeding [`ClientEvent`]s into the [`Engine`].

use crate::aggregation::{format_pct, format_spread};
use crate::state::Engine;
use crate::websocket::ClientEvent;
use std::future::Future;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::info;

/// Drive the engine until `shutdown` resolves or the client stops, then hand it back
pub async fn run_engine<F>(
    mut engine: Engine,
    mut events_rx: mpsc::Receiver<ClientEvent>,
    status_interval: Duration,
    shutdown: F,
) -> Engine
where
    F: Future<Output = ()>,
{
    let mut status_tick = interval_at(Instant::now() + status_interval, status_interval);
    status_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Shutdown requested");
                break;
            }
            event = events_rx.recv() => match event {
                Some(event) => engine.on_client_event(event),
                None => {
                    info!("Telemetry client stopped");
                    break;
                }
            },
            _ = status_tick.tick() => log_status_line(&engine),
        }
    }

    engine
}

fn log_status_line(engine: &Engine) {
    let status = engine.status();
    let snapshot = engine.snapshot();
    let opportunities = engine.analytics().opportunities.effective();

    info!(
        "[{}] {} | spread {} (thr {}) | opp {}/{} ({}) | updates {} | pos {}",
        status.session_duration,
        status.connection,
        format_spread(snapshot.spread.entry),
        format_spread(snapshot.spread.threshold),
        opportunities.above_threshold,
        opportunities.total_checks,
        format_pct(opportunities.rate_pct()),
        status.price_updates,
        snapshot.position.summary(),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::ConnectionState;

    #[tokio::test]
    async fn test_returns_engine_when_client_stops() {
        let (event_tx, event_rx) = mpsc::channel(8);
        event_tx
            .send(ClientEvent::Status(ConnectionState::Connected))
            .await
            .unwrap();
        event_tx
            .send(ClientEvent::Frame(
                r#"{"spread": {"entry": 0.18, "threshold": 0.15, "is_opportunity": true}}"#
                    .to_string(),
            ))
            .await
            .unwrap();
        drop(event_tx);

        let engine = run_engine(
            Engine::default(),
            event_rx,
            Duration::from_secs(60),
            std::future::pending(),
        )
        .await;

        assert_eq!(engine.connection_state(), ConnectionState::Connected);
        assert_eq!(engine.status().price_updates, 1);
    }

    #[tokio::test]
    async fn test_stops_on_shutdown() {
        let (_event_tx, event_rx) = mpsc::channel::<ClientEvent>(8);

        let engine = run_engine(
            Engine::default(),
            event_rx,
            Duration::from_millis(10),
            tokio::time::sleep(Duration::from_millis(50)),
        )
        .await;

        assert_eq!(engine.status().price_updates, 0);
    }
}
