// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared test fixtures: an in-process fake of the Strava API, the geocoder,
//! our own callback URL and a photo host, all on one random local port.

use axum::{
    extract::{Form, Path, Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use strava_webhook_bridge::config::Config;
use strava_webhook_bridge::routes::create_router;
use strava_webhook_bridge::services::StravaEvent;
use strava_webhook_bridge::AppState;
use tokio::sync::broadcast;

/// Athlete owning every fake activity.
#[allow(dead_code)]
pub const ATHLETE_ID: u64 = 99;

/// Mutable behavior and call log of the fake backend.
#[derive(Default)]
pub struct FakeState {
    /// Every request seen, as `"METHOD /path"` (Strava paths without `/api/v3`).
    pub calls: Vec<String>,
    /// Registered push subscriptions, `(id, callback_url)`.
    pub subscriptions: Vec<(u64, String)>,
    pub next_subscription_id: u64,
    pub activities: Vec<Value>,
    pub photos: HashMap<u64, Vec<Value>>,
    /// Forced status per endpoint: `activities`, `photos`, `stats`, `list`,
    /// `create`, `delete`, `geocode`, `callback`.
    pub status: HashMap<&'static str, u16>,
    /// Delay before the activity list answers.
    pub activities_delay: Duration,
}

/// Handle to the running fake backend.
#[derive(Clone)]
pub struct FakeBackend {
    pub url: String,
    state: Arc<Mutex<FakeState>>,
}

#[allow(dead_code)]
impl FakeBackend {
    pub async fn start() -> Self {
        let state = Arc::new(Mutex::new(FakeState {
            next_subscription_id: 1000,
            ..Default::default()
        }));

        let router = Router::new()
            .route("/api/v3/athlete/activities", get(list_activities))
            .route("/api/v3/activities/{id}/photos", get(activity_photos))
            .route("/api/v3/athletes/{id}/stats", get(athlete_stats))
            .route(
                "/api/v3/push_subscriptions",
                get(list_subscriptions).post(create_subscription),
            )
            .route(
                "/api/v3/push_subscriptions/{id}",
                axum::routing::delete(delete_subscription),
            )
            .route("/geo/{coords}", get(geocode))
            .route("/api/strava/webhook", get(callback))
            .route("/img/{name}", get(image))
            .layer(middleware::from_fn_with_state(state.clone(), record_call))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind fake backend");
        let url = format!("http://{}", listener.local_addr().unwrap());

        tokio::spawn(async move {
            axum::serve(listener, router)
                .await
                .expect("Fake backend failed");
        });

        Self { url, state }
    }

    /// Inspect or change the fake's behavior.
    pub fn with<T>(&self, f: impl FnOnce(&mut FakeState) -> T) -> T {
        let mut state = self.state.lock().unwrap();
        f(&mut *state)
    }

    pub fn set_status(&self, endpoint: &'static str, status: u16) {
        self.with(|s| {
            s.status.insert(endpoint, status);
        });
    }

    pub fn clear_status(&self, endpoint: &'static str) {
        self.with(|s| {
            s.status.remove(endpoint);
        });
    }

    pub fn calls(&self) -> Vec<String> {
        self.with(|s| s.calls.clone())
    }

    /// Calls whose `"METHOD /path"` starts with `prefix`.
    pub fn count_calls(&self, prefix: &str) -> usize {
        self.with(|s| s.calls.iter().filter(|c| c.starts_with(prefix)).count())
    }

    pub fn reset_calls(&self) {
        self.with(|s| s.calls.clear());
    }

    /// Calls that change Strava's subscription state.
    pub fn mutating_calls(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c.starts_with("POST /push_subscriptions") || c.starts_with("DELETE "))
            .collect()
    }

    pub fn callback_url(&self) -> String {
        format!("{}/api/strava/webhook", self.url)
    }

    pub fn image_url(&self, name: &str) -> String {
        format!("{}/img/{}", self.url, name)
    }

    /// Configuration pointing every outbound call at this fake.
    pub fn config(&self, data_dir: &std::path::Path) -> Config {
        Config {
            public_url: self.url.clone(),
            strava_api_url: format!("{}/api/v3", self.url),
            strava_oauth_token_url: format!("{}/oauth/token", self.url),
            geocode_url: format!("{}/geo", self.url),
            data_dir: data_dir.to_path_buf(),
            ..Config::test_default()
        }
    }
}

/// Fake Strava activity summary.
#[allow(dead_code)]
pub fn activity_json(id: u64, start_date_local: &str) -> Value {
    json!({
        "id": id,
        "name": format!("Activity {}", id),
        "type": "Ride",
        "distance": 25000.0,
        "elapsed_time": 4000,
        "moving_time": 3600,
        "kudos_count": 3,
        "kilojoules": 600.0,
        "total_elevation_gain": 350.0,
        "average_watts": 180.0,
        "achievement_count": 1,
        "start_date_local": start_date_local,
        "start_latlng": [37.4, -122.1],
        "athlete": {"id": ATHLETE_ID}
    })
}

/// Fake Strava photo.
#[allow(dead_code)]
pub fn photo_json(url: &str, created_at_local: &str) -> Value {
    json!({
        "urls": {"512": url},
        "created_at_local": created_at_local
    })
}

/// A running app wired to a fake backend.
#[allow(dead_code)]
pub struct TestApp {
    pub fake: FakeBackend,
    pub state: Arc<AppState>,
    pub router: Router,
    _data_dir: tempfile::TempDir,
}

#[allow(dead_code)]
impl TestApp {
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    pub async fn with_config(customize: impl FnOnce(&mut Config)) -> Self {
        let fake = FakeBackend::start().await;
        let data_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let mut config = fake.config(data_dir.path());
        customize(&mut config);

        let state = Arc::new(AppState::new(config).expect("Failed to build app state"));
        let router = create_router(state.clone());
        Self {
            fake,
            state,
            router,
            _data_dir: data_dir,
        }
    }
}

/// Drain every event already published to `rx`.
#[allow(dead_code)]
pub fn drain_events(rx: &mut broadcast::Receiver<StravaEvent>) -> Vec<StravaEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

// ─── Fake handlers ───────────────────────────────────────────────────────────

type Shared = State<Arc<Mutex<FakeState>>>;

async fn record_call(
    State(state): Shared,
    request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path();
    let path = path.strip_prefix("/api/v3").unwrap_or(path);
    let call = format!("{} {}", request.method(), path);
    state.lock().unwrap().calls.push(call);
    next.run(request).await
}

fn forced(state: &Arc<Mutex<FakeState>>, endpoint: &str) -> Option<Response> {
    let status = *state.lock().unwrap().status.get(endpoint)?;
    let status = StatusCode::from_u16(status).unwrap();
    Some((status, format!("forced {}", status.as_u16())).into_response())
}

async fn list_activities(State(state): Shared) -> Response {
    let delay = state.lock().unwrap().activities_delay;
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
    if let Some(response) = forced(&state, "activities") {
        return response;
    }
    let activities = state.lock().unwrap().activities.clone();
    Json(activities).into_response()
}

async fn activity_photos(State(state): Shared, Path(id): Path<u64>) -> Response {
    if let Some(response) = forced(&state, "photos") {
        return response;
    }
    let photos = state
        .lock()
        .unwrap()
        .photos
        .get(&id)
        .cloned()
        .unwrap_or_default();
    Json(photos).into_response()
}

async fn athlete_stats(State(state): Shared, Path(_id): Path<u64>) -> Response {
    if let Some(response) = forced(&state, "stats") {
        return response;
    }
    Json(json!({
        "ytd_ride_totals": {"distance": 1500000.0, "count": 60, "moving_time": 250000},
        "all_ride_totals": {"distance": 9000000.0, "count": 400, "moving_time": 1500000},
        "ytd_run_totals": {"distance": 100000.0, "count": 12, "moving_time": 36000},
        "all_run_totals": {"distance": 800000.0, "count": 90, "moving_time": 280000},
        "ytd_swim_totals": {"distance": 0.0, "count": 0, "moving_time": 0},
        "all_swim_totals": {"distance": 20000.0, "count": 10, "moving_time": 30000}
    }))
    .into_response()
}

async fn list_subscriptions(State(state): Shared) -> Response {
    if let Some(response) = forced(&state, "list") {
        return response;
    }
    let subs: Vec<Value> = state
        .lock()
        .unwrap()
        .subscriptions
        .iter()
        .map(|(id, url)| json!({"id": id, "callback_url": url, "application_id": 1}))
        .collect();
    Json(subs).into_response()
}

#[derive(Deserialize)]
struct CreateForm {
    callback_url: String,
}

async fn create_subscription(State(state): Shared, Form(form): Form<CreateForm>) -> Response {
    if let Some(response) = forced(&state, "create") {
        return response;
    }
    let mut state = state.lock().unwrap();
    let id = state.next_subscription_id;
    state.next_subscription_id += 1;
    state.subscriptions.push((id, form.callback_url));
    (StatusCode::CREATED, Json(json!({"id": id}))).into_response()
}

async fn delete_subscription(State(state): Shared, Path(id): Path<u64>) -> Response {
    if let Some(response) = forced(&state, "delete") {
        return response;
    }
    state.lock().unwrap().subscriptions.retain(|(s, _)| *s != id);
    StatusCode::NO_CONTENT.into_response()
}

async fn geocode(State(state): Shared, Path(_coords): Path<String>) -> Response {
    if let Some(response) = forced(&state, "geocode") {
        return response;
    }
    Json(json!({"city": "Palo Alto", "name": "Stanford"})).into_response()
}

async fn callback(State(state): Shared) -> Response {
    if let Some(response) = forced(&state, "callback") {
        return response;
    }
    StatusCode::OK.into_response()
}

async fn image(Path(name): Path<String>) -> StatusCode {
    if name.starts_with("ok") {
        StatusCode::OK
    } else {
        StatusCode::NOT_FOUND
    }
}
