//! `listen`: serve the HTTP surface, drain events, run periodic jobs,
//! exit cleanly on signal.

use std::future::IntoFuture;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{info, warn, Level};

use cnv_config::Settings;
use cnv_engine::RefreshDriver;
use cnv_model::RepositoryEvent;

use crate::bootstrap::bootstrap;
use crate::error::DaemonError;
use crate::ingress::spawn_listeners;
use crate::routes::build_router;
use crate::state::AppState;

/// Events buffered between the HTTP ingress and the dispatcher.
const INGRESS_QUEUE: usize = 256;

/// Bound on the drain wait at shutdown.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Run the daemon until SIGINT/SIGTERM.
pub async fn run(settings: Settings) -> Result<(), DaemonError> {
    let runtime = bootstrap(&settings).await?;

    let (ingress_tx, ingress_rx) = mpsc::channel::<RepositoryEvent>(INGRESS_QUEUE);
    let state = AppState::new(
        settings.http_agent.clone(),
        runtime.config_hash.clone(),
        ingress_tx,
    );

    let listeners = spawn_listeners(
        ingress_rx,
        Arc::clone(&state.counters),
        Arc::clone(&runtime.ctx),
        Arc::clone(&runtime.errors),
        runtime.workers.clone(),
        settings.listener_concurrency,
    );

    // Periodic job: re-poll SUBMITTED deposits that no event will revisit.
    let refresh_job = spawn_refresh_job(RefreshDriver::new(Arc::clone(&runtime.ctx)), settings.jobs_interval);
    let heartbeat = crate::state::spawn_heartbeat(state.bus.clone(), Duration::from_secs(1));

    let app = build_router(Arc::clone(&state)).layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
            .on_response(DefaultOnResponse::new().level(Level::INFO)),
    );
    let listener = tokio::net::TcpListener::bind(settings.daemon_addr)
        .await
        .map_err(|e| DaemonError::Config(format!("cannot bind {}: {e}", settings.daemon_addr)))?;
    info!("conveyor listening on http://{}", settings.daemon_addr);

    // Not graceful-shutdown: open SSE streams would hold the server future
    // forever. Dropping the server closes connections; the pipeline below
    // still drains fully.
    let server = axum::serve(listener, app).into_future();
    tokio::select! {
        result = server => {
            result.map_err(|e| {
                DaemonError::Fault(anyhow::Error::new(e).context("http server crashed"))
            })?;
        }
        _ = shutdown_signal() => {}
    }

    // Signal received: stop ingress, drain the pipeline back-to-front.
    info!("shutting down; draining listeners and workers");
    refresh_job.abort();
    heartbeat.abort();
    drop(state); // drops the ingress sender held by the router state
    listeners.drain().await;
    drop(runtime.workers);
    runtime.pool.shutdown(SHUTDOWN_GRACE).await;
    info!("conveyor exited cleanly");
    Ok(())
}

fn spawn_refresh_job(
    driver: RefreshDriver,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // The first tick fires immediately; skip it so a restart does not
        // instantly re-poll everything.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match driver.refresh_all().await {
                Ok(report) => info!(scanned = report.scanned, "periodic refresh sweep"),
                Err(e) => warn!(cause = %format!("{e:#}"), "periodic refresh sweep failed"),
            }
        }
    })
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}
