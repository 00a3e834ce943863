mod api;
mod config;
mod error;
mod geo;
mod lifecycle;
mod models;
mod notify;
mod observability;
mod sim;
mod state;
mod store;

use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::EnvFilter;

use crate::notify::dispatcher::run_dispatcher;
use crate::notify::transport::transports_from_config;

#[tokio::main]
async fn main() -> Result<(), error::AppError> {
    let config = config::Config::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(config.log_level.clone()))
        .with_target(false)
        .compact()
        .init();

    let transports = transports_from_config(&config);
    let (app_state, notify_rx) = state::AppState::new(&config, transports);
    let shared_state = Arc::new(app_state);

    shared_state.dispatcher.restore_queues().await;

    tokio::spawn(run_dispatcher(shared_state.dispatcher.clone(), notify_rx));

    let drain_handle = shared_state
        .dispatcher
        .clone()
        .start_drain(Duration::from_millis(config.notify_drain_interval_ms));

    let app = api::rest::router(shared_state.clone());

    let bind_addr = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|err| error::AppError::Internal(format!("failed to bind {bind_addr}: {err}")))?;

    tracing::info!(http_port = config.http_port, "http server started");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| error::AppError::Internal(format!("server error: {err}")))?;

    drain_handle.stop().await;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
    }
}
