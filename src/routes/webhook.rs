// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Webhook route for Strava push subscriptions.
//!
//! Strava expects every call to be answered with 200 within a couple of
//! seconds, so nothing here waits on the network.

use crate::config::{Config, WEBHOOK_PATH};
use crate::error::AppError;
use crate::AppState;
use axum::{
    body::Bytes,
    extract::{rejection::QueryRejection, Json, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Webhook routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route(
        WEBHOOK_PATH,
        get(verify)
            .post(handle_event)
            .fallback(|| async { StatusCode::OK }),
    )
}

/// Strava webhook verification query params.
#[derive(Debug, Default, PartialEq)]
struct VerifyParams {
    mode: Option<String>,
    challenge: Option<String>,
    verify_token: Option<String>,
}

impl VerifyParams {
    /// Pick the `hub.*` params out of a decoded query. The first occurrence
    /// of a repeated key wins; unknown keys are ignored.
    fn from_pairs(pairs: Vec<(String, String)>) -> Self {
        let mut params = Self::default();
        for (key, value) in pairs {
            let slot = match key.as_str() {
                "hub.mode" => &mut params.mode,
                "hub.challenge" => &mut params.challenge,
                "hub.verify_token" => &mut params.verify_token,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value);
            }
        }
        params
    }
}

/// Verification response.
#[derive(Serialize)]
struct VerifyResponse {
    #[serde(rename = "hub.challenge")]
    challenge: String,
}

/// Answer the subscription handshake (GET).
///
/// The challenge is echoed whenever present. A plain GET without one is the
/// reachability probe and gets an empty 200. An undecodable query is
/// treated the same way.
async fn verify(
    State(state): State<Arc<AppState>>,
    query: Result<Query<Vec<(String, String)>>, QueryRejection>,
) -> Response {
    let params = match query {
        Ok(Query(pairs)) => VerifyParams::from_pairs(pairs),
        Err(e) => {
            tracing::warn!(error = %e, "Unreadable webhook query");
            VerifyParams::default()
        }
    };

    let Some(challenge) = params.challenge else {
        tracing::debug!("Webhook probed without a challenge");
        return StatusCode::OK.into_response();
    };

    if params.verify_token.as_deref() != Some(state.config.webhook_verify_token.as_str()) {
        tracing::warn!(
            mode = params.mode.as_deref().unwrap_or(""),
            "Webhook challenge with unexpected verify token"
        );
    } else {
        tracing::info!("Webhook subscription challenge answered");
    }

    (StatusCode::OK, Json(VerifyResponse { challenge })).into_response()
}

/// Strava webhook event payload. Only the subscription id drives behavior.
#[derive(Deserialize, Debug)]
struct WebhookEvent {
    subscription_id: u64,
    #[serde(default)]
    object_type: Option<String>,
    #[serde(default)]
    object_id: Option<u64>,
    #[serde(default)]
    aspect_type: Option<String>,
}

fn parse_event(body: &[u8]) -> Result<WebhookEvent, AppError> {
    serde_json::from_slice(body).map_err(|e| AppError::MalformedWebhookPayload(e.to_string()))
}

/// Whether the request was addressed to our public host.
///
/// An explicit port in the Host header is ignored when the public URL has
/// none.
fn host_matches(headers: &HeaderMap, config: &Config) -> bool {
    let Some(expected) = config.public_host() else {
        return false;
    };
    let Some(host) = headers.get(header::HOST).and_then(|h| h.to_str().ok()) else {
        return false;
    };

    if host.eq_ignore_ascii_case(&expected) {
        return true;
    }
    !expected.contains(':')
        && host
            .rsplit_once(':')
            .is_some_and(|(bare, _)| bare.eq_ignore_ascii_case(&expected))
}

/// Handle an incoming webhook event (POST).
async fn handle_event(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    let subscription_id = match parse_event(&body) {
        Ok(event) => {
            tracing::info!(
                subscription_id = event.subscription_id,
                object_type = event.object_type.as_deref().unwrap_or(""),
                object_id = event.object_id,
                aspect_type = event.aspect_type.as_deref().unwrap_or(""),
                "Webhook event received"
            );
            Some(event.subscription_id)
        }
        Err(e) => {
            tracing::warn!(error = %e, "Ignoring webhook payload");
            None
        }
    };

    let known_id = state.subscriptions.current_id().await;
    let id_matches = subscription_id.is_some() && subscription_id == known_id;

    if id_matches || host_matches(&headers, &state.config) {
        state.trigger_refresh("webhook");
    } else {
        tracing::warn!(
            received_id = subscription_id,
            expected_id = known_id,
            "Webhook event not for this instance"
        );
    }

    // Always return 200 OK quickly (Strava requirement)
    StatusCode::OK
}
