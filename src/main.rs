//! testweb-realtime - watch live test progress from the command line.

use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use testweb_realtime::adapters::websocket::WebSocketTransport;
use testweb_realtime::application::RealtimeClient;
use testweb_realtime::config::AppConfig;
use testweb_realtime::domain::progress::InboundEvent;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    config.validate()?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.client.log_level));
    if config.client.log_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer())
            .with(filter)
            .init();
    }

    info!("testweb-realtime v{}", env!("CARGO_PKG_VERSION"));

    let client = RealtimeClient::new(&config.client, Arc::new(WebSocketTransport::new()))?;
    let mut events = client.events();

    for test_id in config.watch.test_ids_list() {
        client.subscribe_to_test(&test_id);
    }
    if let Some(room) = config.watch.room.as_deref() {
        client.join_room(room);
    }
    if config.watch.is_empty() {
        tracing::warn!("No test ids or room configured; only connection events will show");
    }

    if client.auto_connect() {
        client.connect().await?;
    } else {
        tracing::warn!("Auto-connect disabled; waiting for Ctrl-C without connecting");
    }

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Received shutdown signal");
                break;
            }
            received = events.recv() => match received {
                Ok(event) => log_event(&event),
                Err(RecvError::Lagged(missed)) => {
                    tracing::warn!(missed, "Event stream lagged");
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    client.teardown();
    info!("Shutdown complete");
    Ok(())
}

fn log_event(event: &InboundEvent) {
    match event {
        InboundEvent::TestProgress(p) => info!(
            test_id = %p.test_id,
            progress = ?p.progress.map(|v| v.value()),
            step = ?p.current_step,
            total = ?p.total_steps,
            phase = ?p.phase,
            message = ?p.message,
            "progress"
        ),
        InboundEvent::TestStatusUpdate(s) => info!(
            test_id = %s.test_id,
            status = %s.status,
            progress = ?s.progress.map(|v| v.value()),
            "status"
        ),
        InboundEvent::TestCompleted(c) => info!(
            test_id = %c.test_id,
            results = %c.results,
            "completed"
        ),
        InboundEvent::TestError(f) => tracing::warn!(
            test_id = %f.test_id,
            message = %f.message,
            "test failed"
        ),
        InboundEvent::Connected { client_id } => info!(client_id = ?client_id, "connected"),
        InboundEvent::Disconnected { reason } => tracing::warn!(%reason, "disconnected"),
        InboundEvent::Error { message } => tracing::error!(%message, "error"),
        InboundEvent::Unknown { kind } => tracing::debug!(%kind, "unknown frame"),
    }
}
