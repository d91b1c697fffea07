use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::watch;

use crate::app::create_app;
use crate::configs::Settings;
use crate::services::{
    BusEventHandler, BusService, Clock, ControlService, StateStore, SystemClock, Watchdog,
};

pub mod app;
pub mod configs;
pub mod errors;
pub mod handles;
pub mod models;
pub mod services;

/// Upper bound on waiting for the OFFLINE announcement and disconnect to
/// reach the broker during shutdown.
const BUS_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

pub async fn run(settings: &Arc<Settings>) -> anyhow::Result<()> {
    let telemetry = &settings.telemetry;
    let primary = telemetry.primary_location;

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let store = Arc::new(StateStore::new(telemetry.history_capacity, clock));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let handler = Arc::new(BusEventHandler::new(store.clone(), primary));
    let (bus, event_loop) = BusService::new(&settings.gateway, handler);
    let mut bus_task = bus.spawn(event_loop, shutdown_rx.clone());

    tracing::info!(
        "connecting to MQTT broker at {}:{}",
        settings.gateway.host,
        settings.gateway.port
    );

    let watchdog = Watchdog::new(
        store.clone(),
        telemetry.liveness_timeout(),
        telemetry.watchdog_period(),
    );
    let watchdog_task = tokio::spawn(watchdog.run(shutdown_rx));

    let control_service = Arc::new(ControlService::new(store, bus.publisher(), primary));
    let app = create_app(control_service);

    let ip_addr = settings
        .server
        .host
        .parse::<IpAddr>()
        .with_context(|| format!("invalid server host {:?}", settings.server.host))?;

    let address = SocketAddr::from((ip_addr, settings.server.port));

    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind {address}"))?;

    tracing::info!("listening on {:?}", address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Stop order: HTTP is closed above, then announce OFFLINE, disconnect,
    // and only then stop the background tasks.
    tracing::info!("shutting down gracefully");

    if let Err(e) = bus.shutdown().await {
        tracing::error!("failed to announce shutdown on the bus: {}", e);
    }

    let drained = tokio::time::timeout(BUS_DRAIN_TIMEOUT, &mut bus_task)
        .await
        .is_ok();

    let _ = shutdown_tx.send(true);

    if !drained {
        tracing::warn!("MQTT client did not disconnect in time");
        let _ = bus_task.await;
    }

    let _ = watchdog_task.await;

    tracing::info!("shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("failed to listen for ctrl-c: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
