// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Strava webhook bridge server
//!
//! Keeps the Strava push subscription in sync with this instance and turns
//! webhook pings into activity refreshes.

use std::sync::Arc;
use strava_webhook_bridge::{config::Config, AppState, BackgroundTasks};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging
    init_logging();

    // Load configuration from environment
    let config = Config::from_env().expect("Failed to load configuration");
    tracing::info!(
        port = config.port,
        callback_url = %config.callback_url(),
        "Starting Strava webhook bridge"
    );

    let state = Arc::new(AppState::new(config.clone()).expect("Failed to build HTTP client"));

    // Restore local state so pings are accepted before the first reconcile
    if let Err(e) = state.subscriptions.load_persisted().await {
        tracing::warn!(error = %e, "Ignoring unreadable subscription state");
    }
    match state.image_cache.load().await {
        Ok(count) => tracing::info!(count, "Image cache loaded"),
        Err(e) => tracing::warn!(error = %e, "Starting with an empty image cache"),
    }

    let mut tasks = BackgroundTasks::start(&state);

    // Build router
    let app = strava_webhook_bridge::routes::create_router(state.clone());

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    // The reconcile probes our own callback URL, so it runs once we listen
    let startup_state = state.clone();
    tasks.push(tokio::spawn(async move {
        startup_state.reconcile_and_refresh().await;
    }));

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Shutting down");
    tasks.shutdown().await;

    if let Err(e) = state.image_cache.persist().await {
        tracing::error!(error = %e, "Failed to persist image cache");
    }
    if config.unsubscribe_on_shutdown {
        if let Err(e) = state.subscriptions.unsubscribe().await {
            tracing::error!(error = %e, "Failed to delete Strava webhook subscription");
        }
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}

/// Initialize structured JSON logging.
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("strava_webhook_bridge=debug".parse().unwrap())
                .add_directive("info".parse().unwrap()),
        )
        .with(format)
        .init();
}
