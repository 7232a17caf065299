// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Strava API client.
//!
//! Handles:
//! - Latest activities, activity photos and athlete stats
//! - Push subscription listing, creation and deletion
//! - Token refresh when expired
//! - Rate limit detection (aborts the caller's cycle)

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::models::{PeriodTotals, SportSummary, Subscription, SummaryStats};
use chrono::{DateTime, Duration, Utc};
use reqwest::StatusCode;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Margin before token expiration when we proactively refresh (5 minutes).
const TOKEN_REFRESH_MARGIN_SECS: i64 = 5 * 60;

/// Upper bound on any single outbound request.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Cached access token with expiry information.
#[derive(Clone)]
struct CachedToken {
    access_token: String,
    refresh_token: Option<String>,
    expires_at: DateTime<Utc>,
}

/// Bearer token owner for the single configured athlete.
///
/// The mutex is held across a refresh so concurrent callers wait for the
/// winner instead of spending the refresh token twice.
#[derive(Clone)]
pub struct StravaSession {
    token: Arc<Mutex<CachedToken>>,
}

impl StravaSession {
    pub fn new(access_token: String, refresh_token: Option<String>, expires_at: i64) -> Self {
        let expires_at = DateTime::from_timestamp(expires_at, 0).unwrap_or_default();
        Self {
            token: Arc::new(Mutex::new(CachedToken {
                access_token,
                refresh_token,
                expires_at,
            })),
        }
    }
}

/// Strava API client.
#[derive(Clone)]
pub struct StravaClient {
    http: reqwest::Client,
    base_url: String,
    oauth_token_url: String,
    client_id: String,
    client_secret: String,
    session: StravaSession,
}

impl StravaClient {
    /// Create a new Strava client from the application config.
    pub fn new(config: &Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            http,
            base_url: config.strava_api_url.trim_end_matches('/').to_string(),
            oauth_token_url: config.strava_oauth_token_url.clone(),
            client_id: config.strava_client_id.clone(),
            client_secret: config.strava_client_secret.clone(),
            session: StravaSession::new(
                config.strava_access_token.clone(),
                config.strava_refresh_token.clone(),
                config.strava_token_expires_at,
            ),
        })
    }

    // ─── Athlete data ────────────────────────────────────────────────────────

    /// List the athlete's latest activities, newest first.
    pub async fn list_activities(&self, per_page: u32) -> Result<Vec<StravaActivitySummary>> {
        let url = format!("{}/athlete/activities", self.base_url);
        let response = self
            .http
            .get(&url)
            .bearer_auth(self.access_token().await?)
            .query(&[("per_page", per_page.to_string())])
            .send()
            .await?;

        check_response_json(response, StatusCode::OK).await
    }

    /// Photos attached to an activity, at the requested size.
    pub async fn get_activity_photos(&self, activity_id: u64, size: u32) -> Result<Vec<StravaPhoto>> {
        let url = format!("{}/activities/{}/photos", self.base_url, activity_id);
        let response = self
            .http
            .get(&url)
            .bearer_auth(self.access_token().await?)
            .query(&[("size", size.to_string())])
            .send()
            .await?;

        check_response_json(response, StatusCode::OK).await
    }

    /// Year-to-date and all-time totals for an athlete.
    pub async fn get_athlete_stats(&self, athlete_id: u64) -> Result<StravaAthleteStats> {
        let url = format!("{}/athletes/{}/stats", self.base_url, athlete_id);
        let response = self
            .http
            .get(&url)
            .bearer_auth(self.access_token().await?)
            .send()
            .await?;

        check_response_json(response, StatusCode::OK).await
    }

    // ─── Push subscriptions ──────────────────────────────────────────────────
    //
    // These use the application's client credentials rather than the
    // athlete's bearer token.

    /// List the application's push subscriptions.
    pub async fn list_subscriptions(&self) -> Result<Vec<Subscription>> {
        let url = format!("{}/push_subscriptions", self.base_url);
        let response = self
            .http
            .get(&url)
            .query(&self.client_credentials())
            .send()
            .await?;

        let subscriptions: Vec<StravaSubscription> =
            check_response_json(response, StatusCode::OK).await?;
        Ok(subscriptions.into_iter().map(Subscription::from).collect())
    }

    /// Register a push subscription. Strava answers 201 with the new id.
    pub async fn create_subscription(
        &self,
        callback_url: &str,
        verify_token: &str,
    ) -> Result<Subscription> {
        let url = format!("{}/push_subscriptions", self.base_url);
        let response = self
            .http
            .post(&url)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("callback_url", callback_url),
                ("verify_token", verify_token),
            ])
            .send()
            .await?;

        let created: CreatedSubscription = check_response_json(response, StatusCode::CREATED).await?;
        Ok(Subscription {
            id: created.id,
            callback_url: callback_url.to_string(),
        })
    }

    /// Delete a push subscription. Strava answers 204.
    pub async fn delete_subscription(&self, subscription_id: u64) -> Result<()> {
        let url = format!("{}/push_subscriptions/{}", self.base_url, subscription_id);
        let response = self
            .http
            .delete(&url)
            .query(&self.client_credentials())
            .send()
            .await?;

        check_response(response, StatusCode::NO_CONTENT).await?;
        Ok(())
    }

    /// Plain unauthenticated GET that must answer 200.
    pub async fn check_reachable(&self, url: &str) -> Result<()> {
        let response = self.http.get(url).send().await?;
        check_response(response, StatusCode::OK).await?;
        Ok(())
    }

    /// Shared HTTP client, reused by the geocoder and image cache.
    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    fn client_credentials(&self) -> [(&str, &str); 2] {
        [
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
        ]
    }

    // ─── Token Management ────────────────────────────────────────────────────

    /// Get a valid (non-expired) access token, refreshing it when needed.
    ///
    /// Without a refresh token the configured access token is returned as is.
    pub async fn access_token(&self) -> Result<String> {
        let mut cached = self.session.token.lock().await;

        let margin = Duration::seconds(TOKEN_REFRESH_MARGIN_SECS);
        if Utc::now() + margin < cached.expires_at {
            return Ok(cached.access_token.clone());
        }

        let Some(refresh_token) = cached.refresh_token.clone() else {
            return Ok(cached.access_token.clone());
        };

        tracing::info!("Access token expired, refreshing");
        let refreshed = self.refresh_token(&refresh_token).await?;

        cached.access_token = refreshed.access_token;
        cached.refresh_token = Some(refreshed.refresh_token);
        cached.expires_at = DateTime::from_timestamp(refreshed.expires_at, 0).unwrap_or_default();

        tracing::info!(expires_at = %cached.expires_at, "Token refreshed");
        Ok(cached.access_token.clone())
    }

    /// Refresh an expired access token.
    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenRefreshResponse> {
        let response = self
            .http
            .post(&self.oauth_token_url)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await?;

        check_response_json(response, StatusCode::OK).await
    }
}

/// Check that the response has the expected status.
///
/// 429 maps to [`AppError::RemoteRateLimited`]; any other mismatch keeps the
/// status and body for the log line.
async fn check_response(
    response: reqwest::Response,
    expected: StatusCode,
) -> Result<reqwest::Response> {
    let status = response.status();
    if status == expected {
        return Ok(response);
    }

    if status == StatusCode::TOO_MANY_REQUESTS {
        tracing::warn!("Strava rate limit hit (429)");
        return Err(AppError::RemoteRateLimited);
    }

    let body = response.text().await.unwrap_or_default();
    Err(AppError::RemoteUnexpectedStatus {
        status: status.as_u16(),
        body,
    })
}

/// Check response status and parse the JSON body.
async fn check_response_json<T: for<'de> Deserialize<'de>>(
    response: reqwest::Response,
    expected: StatusCode,
) -> Result<T> {
    let response = check_response(response, expected).await?;
    let status = response.status();
    let body = response.text().await?;

    serde_json::from_str(&body).map_err(|e| AppError::RemoteUnexpectedStatus {
        status: status.as_u16(),
        body: format!("JSON parse error: {} in {}", e, body),
    })
}

/// Token refresh response from Strava.
#[derive(Debug, Clone, Deserialize)]
struct TokenRefreshResponse {
    access_token: String,
    refresh_token: String,
    expires_at: i64,
}

/// Push subscription as listed by Strava.
#[derive(Debug, Clone, Deserialize)]
struct StravaSubscription {
    id: u64,
    callback_url: String,
}

impl From<StravaSubscription> for Subscription {
    fn from(s: StravaSubscription) -> Self {
        Subscription {
            id: s.id,
            callback_url: s.callback_url,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct CreatedSubscription {
    id: u64,
}

/// Summary activity from `/athlete/activities`.
///
/// Every metric is optional: Strava omits fields the recording device did not
/// capture (power, energy) and the whole location for indoor activities.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StravaActivitySummary {
    pub id: u64,
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub activity_type: Option<String>,
    pub distance: Option<f64>,
    pub elapsed_time: Option<f64>,
    pub moving_time: Option<f64>,
    pub kudos_count: Option<u32>,
    pub kilojoules: Option<f64>,
    pub total_elevation_gain: Option<f64>,
    pub average_watts: Option<f64>,
    pub achievement_count: Option<u32>,
    pub start_date_local: Option<String>,
    pub start_latlng: Option<Vec<f64>>,
    pub start_latitude: Option<f64>,
    pub start_longitude: Option<f64>,
    pub athlete: Option<StravaAthleteRef>,
}

impl StravaActivitySummary {
    /// Start coordinates, or `None` when absent or reported as (0, 0).
    pub fn start_coordinates(&self) -> Option<(f64, f64)> {
        let coords = match self.start_latlng.as_deref() {
            Some([lat, lon]) => Some((*lat, *lon)),
            _ => self.start_latitude.zip(self.start_longitude),
        };
        coords.filter(|&(lat, lon)| lat != 0.0 || lon != 0.0)
    }
}

/// Athlete reference embedded in activity summaries.
#[derive(Debug, Clone, Deserialize)]
pub struct StravaAthleteRef {
    pub id: u64,
}

/// Activity photo from `/activities/{id}/photos`.
#[derive(Debug, Clone, Deserialize)]
pub struct StravaPhoto {
    /// Size → URL. Placeholder photos still processing have null URLs.
    #[serde(default)]
    pub urls: BTreeMap<String, Option<String>>,
    pub created_at_local: Option<String>,
}

impl StravaPhoto {
    pub fn url(&self) -> Option<&str> {
        self.urls.values().find_map(|u| u.as_deref())
    }
}

/// Totals block from `/athletes/{id}/stats`.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(default)]
pub struct StravaTotals {
    pub distance: f64,
    pub count: u32,
    pub moving_time: f64,
}

/// Athlete stats response.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(default)]
pub struct StravaAthleteStats {
    pub ytd_ride_totals: StravaTotals,
    pub all_ride_totals: StravaTotals,
    pub ytd_run_totals: StravaTotals,
    pub all_run_totals: StravaTotals,
    pub ytd_swim_totals: StravaTotals,
    pub all_swim_totals: StravaTotals,
}

impl From<StravaTotals> for PeriodTotals {
    fn from(t: StravaTotals) -> Self {
        PeriodTotals {
            distance: t.distance,
            activity_count: t.count,
            moving_time: t.moving_time,
        }
    }
}

impl From<StravaAthleteStats> for SummaryStats {
    fn from(s: StravaAthleteStats) -> Self {
        let sport = |ytd: StravaTotals, all: StravaTotals| SportSummary {
            year_to_date: ytd.into(),
            all_time: all.into(),
        };

        SummaryStats {
            ride: sport(s.ytd_ride_totals, s.all_ride_totals),
            run: sport(s.ytd_run_totals, s.all_run_totals),
            swim: sport(s.ytd_swim_totals, s.all_swim_totals),
        }
    }
}
