// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Admin routes (bearer token required).

use crate::error::{AppError, Result};
use crate::models::Subscription;
use crate::AppState;
use axum::{
    extract::{Json, State},
    http::StatusCode,
    routing::{get, post},
    Router,
};
use serde::Serialize;
use std::sync::Arc;

/// Admin routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/strava/refresh", post(refresh))
        .route("/api/strava/reload", post(reload))
        .route("/api/strava/subscription", get(subscription))
}

#[derive(Serialize)]
pub struct QueuedResponse {
    pub status: &'static str,
}

/// Queue a refresh cycle.
async fn refresh(State(state): State<Arc<AppState>>) -> (StatusCode, Json<QueuedResponse>) {
    state.trigger_refresh("admin");
    (StatusCode::ACCEPTED, Json(QueuedResponse { status: "queued" }))
}

/// Reconcile the subscription now, then queue a refresh.
async fn reload(State(state): State<Arc<AppState>>) -> Result<Json<Subscription>> {
    let subscription = state
        .subscriptions
        .reconcile(&state.config.callback_url())
        .await?;
    state.trigger_refresh("reload");
    Ok(Json(subscription))
}

/// Currently known subscription.
async fn subscription(State(state): State<Arc<AppState>>) -> Result<Json<Subscription>> {
    state
        .subscriptions
        .current()
        .await
        .map(Json)
        .ok_or_else(|| AppError::NotFound("No webhook subscription".to_string()))
}
