// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types with consistent API responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Application error type.
///
/// Remote failures only ever abort the current reconcile or refresh cycle.
/// The HTTP conversion is used by the admin routes; the webhook route never
/// returns an error to its caller.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Callback URL not reachable: {0}")]
    CallbackUnreachable(String),

    #[error("Expected at most one webhook subscription, found {0}")]
    InconsistentRemoteState(usize),

    #[error("Strava API rate limit reached")]
    RemoteRateLimited,

    #[error("Unexpected response (HTTP {status}): {body}")]
    RemoteUnexpectedStatus { status: u16, body: String },

    #[error("Malformed webhook payload: {0}")]
    MalformedWebhookPayload(String),

    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Authentication required")]
    Unauthorized,

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Whether this error came from Strava's 429 response.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, AppError::RemoteRateLimited)
    }
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, details) = match &self {
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized", None),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", Some(msg.clone())),
            AppError::CallbackUnreachable(url) => (
                StatusCode::BAD_GATEWAY,
                "callback_unreachable",
                Some(url.clone()),
            ),
            AppError::InconsistentRemoteState(_) => (
                StatusCode::CONFLICT,
                "inconsistent_remote_state",
                Some(self.to_string()),
            ),
            AppError::RemoteRateLimited => {
                (StatusCode::TOO_MANY_REQUESTS, "rate_limited", None)
            }
            AppError::RemoteUnexpectedStatus { .. } | AppError::Transport(_) => {
                (StatusCode::BAD_GATEWAY, "strava_error", Some(self.to_string()))
            }
            AppError::MalformedWebhookPayload(msg) => {
                (StatusCode::BAD_REQUEST, "bad_request", Some(msg.clone()))
            }
            AppError::Storage(msg) => {
                tracing::error!(error = %msg, "Storage error");
                (StatusCode::INTERNAL_SERVER_ERROR, "storage_error", None)
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None)
            }
        };

        let body = ErrorResponse {
            error: error.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for services and handlers
pub type Result<T> = std::result::Result<T, AppError>;
