// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Strava webhook bridge
//!
//! Keeps a single Strava push subscription pointed at this instance, turns
//! webhook pings into activity refresh cycles, and fans the normalized
//! results out to display subscribers as typed events.

pub mod config;
pub mod error;
pub mod fs_utils;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use error::Result;
use services::scheduler::spawn_periodic;
use services::{
    ActivityAggregator, EventPublisher, GeocodeClient, ImageCache, StravaClient, StravaEvent,
    SubscriptionManager, SubscriptionStore,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Shared application state, one per running instance.
pub struct AppState {
    pub config: Config,
    pub publisher: EventPublisher,
    pub subscriptions: SubscriptionManager,
    pub aggregator: Arc<ActivityAggregator>,
    pub image_cache: Arc<ImageCache>,
}

impl AppState {
    /// Wire every service from the configuration. Nothing touches the
    /// network or the disk here.
    pub fn new(config: Config) -> Result<Self> {
        let publisher = EventPublisher::new();
        let strava = StravaClient::new(&config)?;
        let geocoder = GeocodeClient::new(strava.http().clone(), &config.geocode_url);

        let subscriptions = SubscriptionManager::new(
            strava.clone(),
            SubscriptionStore::new(config.subscription_state_path()),
            publisher.clone(),
            config.webhook_verify_token.clone(),
        );
        let image_cache = Arc::new(ImageCache::new(
            strava.http().clone(),
            config.image_cache_path(),
            config.max_images,
        ));
        let aggregator = Arc::new(ActivityAggregator::new(
            strava,
            geocoder,
            publisher.clone(),
            config.nb_activities,
            config.img_size,
        ));

        Ok(Self {
            config,
            publisher,
            subscriptions,
            aggregator,
            image_cache,
        })
    }

    /// Queue a refresh cycle without waiting for it.
    pub fn trigger_refresh(&self, trigger: &'static str) -> JoinHandle<()> {
        self.aggregator.spawn_refresh(trigger)
    }

    /// Reconcile the subscription with our callback URL, then refresh.
    ///
    /// A failed reconcile is logged and skips the refresh; the next trigger
    /// tries again.
    pub async fn reconcile_and_refresh(&self) {
        let callback_url = self.config.callback_url();
        match self.subscriptions.reconcile(&callback_url).await {
            Ok(sub) => {
                tracing::info!(subscription_id = sub.id, "Strava webhook subscription ready");
                if let Err(e) = self.aggregator.refresh().await {
                    tracing::warn!(error = %e, "Initial refresh aborted");
                }
            }
            Err(e) => {
                tracing::error!(error = %e, callback_url = %callback_url, "Subscription reconcile failed");
            }
        }
    }
}

/// Handles of the long-running jobs started next to the HTTP server.
#[derive(Default)]
pub struct BackgroundTasks {
    handles: Vec<JoinHandle<()>>,
}

impl BackgroundTasks {
    /// Start image ingestion, scheduled refreshes and image rotation.
    pub fn start(state: &Arc<AppState>) -> Self {
        let mut handles = vec![state.image_cache.clone().spawn_ingest(&state.publisher)];

        let refresh_state = state.clone();
        handles.extend(spawn_periodic(
            "refresh",
            Duration::from_secs(state.config.refresh_interval_secs),
            move || {
                let state = refresh_state.clone();
                async move {
                    if let Err(e) = state.aggregator.refresh().await {
                        tracing::warn!(trigger = "schedule", error = %e, "Refresh cycle aborted");
                    }
                }
            },
        ));

        let rotate_state = state.clone();
        handles.extend(spawn_periodic(
            "image_rotation",
            Duration::from_secs(state.config.img_rotate_interval_secs),
            move || {
                let state = rotate_state.clone();
                async move {
                    if let Some(image) = state.image_cache.rotate().await {
                        state
                            .publisher
                            .publish(StravaEvent::ImageRotated { url: image.url });
                    }
                }
            },
        ));

        Self { handles }
    }

    /// Track an extra task so it is stopped with the others.
    pub fn push(&mut self, handle: JoinHandle<()>) {
        self.handles.push(handle);
    }

    /// Abort every job and wait for it to finish unwinding.
    pub async fn shutdown(self) {
        for handle in &self.handles {
            handle.abort();
        }
        for handle in self.handles {
            let _ = handle.await;
        }
    }
}
