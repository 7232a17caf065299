// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Activity refresh pipeline.
//!
//! One refresh cycle:
//! 1. Fetch the latest activities from Strava
//! 2. Reverse-geocode each start point
//! 3. Normalize and sort newest first
//! 4. Fetch photos for activities not checked within the last day
//! 5. Fetch summary stats if a new activity showed up (or an earlier stats
//!    fetch for one failed)
//! 6. Publish activities (+ stats), then photos
//!
//! A 429 anywhere aborts the whole cycle before anything is published.

use crate::error::{AppError, Result};
use crate::models::activity::sort_newest_first;
use crate::models::{Activity, ImageUrl, SummaryStats};
use crate::services::events::{ActivityData, EventPublisher, StravaEvent};
use crate::services::geocode::GeocodeClient;
use crate::services::strava::{StravaActivitySummary, StravaClient};
use crate::time_utils::{parse_strava_local, whole_days_between};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// kJ of mechanical work → kcal, as Strava reports it.
const FACTOR_KILOJOULES_TO_KILOCALORIES: f64 = 0.239006;

/// Photos of an activity are refetched at most this often.
const PHOTO_REFRESH_DAYS: i64 = 1;

/// When each recent activity last had its photos fetched.
///
/// Keys are exactly the activity ids of the last published cycle, so the key
/// set doubles as "activities seen before". In-memory only: after a restart
/// every activity counts as new, which costs one extra stats and photo fetch.
#[derive(Debug, Clone, Default)]
pub struct PhotoCache {
    last_fetched: HashMap<u64, Option<DateTime<Utc>>>,
}

impl PhotoCache {
    /// Ids not seen in the previous cycle.
    pub fn new_ids(&self, ids: &[u64]) -> Vec<u64> {
        ids.iter()
            .copied()
            .filter(|id| !self.last_fetched.contains_key(id))
            .collect()
    }

    /// Forget activities that dropped out of the latest list and start
    /// tracking new ones (never fetched).
    pub fn retain_current(&mut self, ids: &[u64]) {
        self.last_fetched = ids
            .iter()
            .map(|id| (*id, self.last_fetched.get(id).copied().flatten()))
            .collect();
    }

    /// Whether photos for `id` should be fetched at `now`.
    pub fn is_due(&self, id: u64, now: DateTime<Utc>) -> bool {
        match self.last_fetched.get(&id).copied().flatten() {
            Some(last) => whole_days_between(last, now) >= PHOTO_REFRESH_DAYS,
            None => true,
        }
    }

    pub fn mark_fetched(&mut self, id: u64, now: DateTime<Utc>) {
        self.last_fetched.insert(id, Some(now));
    }

    pub fn len(&self) -> usize {
        self.last_fetched.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_fetched.is_empty()
    }
}

/// State carried from one refresh cycle to the next.
#[derive(Debug, Clone, Default)]
struct CycleState {
    photos: PhotoCache,
    /// A new activity was seen but its stats were never published.
    stats_pending: bool,
}

/// Convert a Strava summary into the published shape.
pub fn normalize_activity(summary: &StravaActivitySummary, city: String) -> Activity {
    Activity {
        id: summary.id,
        title: summary
            .name
            .clone()
            .unwrap_or_else(|| "Strava Activity".to_string()),
        activity_type: summary
            .activity_type
            .as_deref()
            .unwrap_or("Ride")
            .to_lowercase(),
        distance: summary.distance,
        duration: summary.elapsed_time,
        moving_time: summary.moving_time,
        kudos: summary.kudos_count,
        calories: summary
            .kilojoules
            .map(|kj| (kj * FACTOR_KILOJOULES_TO_KILOCALORIES) as u32),
        elevation: summary.total_elevation_gain,
        power: summary.average_watts,
        trophies: summary.achievement_count,
        city,
        start_date: parse_strava_local(summary.start_date_local.as_deref()),
    }
}

/// Fetches, normalizes and publishes the athlete's recent activity data.
pub struct ActivityAggregator {
    strava: StravaClient,
    geocoder: GeocodeClient,
    publisher: EventPublisher,
    nb_activities: u32,
    img_size: u32,
    /// Held for the whole cycle: overlapping triggers run one after another.
    cycle: Mutex<CycleState>,
}

impl ActivityAggregator {
    pub fn new(
        strava: StravaClient,
        geocoder: GeocodeClient,
        publisher: EventPublisher,
        nb_activities: u32,
        img_size: u32,
    ) -> Self {
        Self {
            strava,
            geocoder,
            publisher,
            nb_activities,
            img_size,
            cycle: Mutex::new(CycleState::default()),
        }
    }

    /// Run one refresh cycle.
    ///
    /// Results only leave through the event publisher; the returned error is
    /// for logging. Photo-cache changes are committed only when the cycle
    /// publishes.
    pub async fn refresh(&self) -> Result<()> {
        let mut cycle = self.cycle.lock().await;
        let now = Utc::now();

        tracing::debug!(per_page = self.nb_activities, "Fetching data from Strava API");
        let summaries = self
            .strava
            .list_activities(self.nb_activities)
            .await
            .inspect_err(|e| log_stage_failure("activities", e))?;

        let mut activities = Vec::with_capacity(summaries.len());
        for summary in &summaries {
            let city = self.geocoder.city_for(summary.start_coordinates()).await;
            activities.push(normalize_activity(summary, city));
        }
        sort_newest_first(&mut activities);

        let ids: Vec<u64> = summaries.iter().map(|s| s.id).collect();
        let mut next = cycle.clone();
        let new_ids = next.photos.new_ids(&ids);
        next.photos.retain_current(&ids);
        if !new_ids.is_empty() {
            next.stats_pending = true;
        }

        let img_urls = self.fetch_photos(&ids, &mut next.photos, now).await?;

        let summary_stats = if next.stats_pending {
            tracing::debug!(new_ids = ?new_ids, "New activities, fetching summary stats");
            self.fetch_summary_stats(&summaries).await?
        } else {
            None
        };
        if summary_stats.is_some() {
            next.stats_pending = false;
        }

        tracing::info!(
            activities = activities.len(),
            new_activities = new_ids.len(),
            photos = img_urls.len(),
            with_stats = summary_stats.is_some(),
            "Strava data refreshed"
        );

        self.publisher
            .publish(StravaEvent::ActivityDataUpdated(ActivityData {
                activities,
                summary_stats,
            }));
        if !img_urls.is_empty() {
            self.publisher
                .publish(StravaEvent::ImagesUpdated { img_urls });
        }

        *cycle = next;
        Ok(())
    }

    /// Run a refresh cycle in the background, logging its outcome.
    pub fn spawn_refresh(self: &Arc<Self>, trigger: &'static str) -> JoinHandle<()> {
        let aggregator = Arc::clone(self);
        tokio::spawn(async move {
            tracing::debug!(trigger, "Refresh cycle queued");
            if let Err(e) = aggregator.refresh().await {
                tracing::warn!(trigger, error = %e, "Refresh cycle aborted");
            }
        })
    }

    /// Fetch photos for every activity that is due.
    ///
    /// A rate limit aborts the cycle. Any other failure stops the photo chain
    /// but keeps what was collected before it.
    async fn fetch_photos(
        &self,
        ids: &[u64],
        cache: &mut PhotoCache,
        now: DateTime<Utc>,
    ) -> Result<Vec<ImageUrl>> {
        let mut img_urls = Vec::new();

        for &activity_id in ids {
            if !cache.is_due(activity_id, now) {
                continue;
            }

            match self
                .strava
                .get_activity_photos(activity_id, self.img_size)
                .await
            {
                Ok(photos) => {
                    img_urls.extend(photos.iter().filter_map(|photo| {
                        photo.url().map(|url| ImageUrl {
                            url: url.to_string(),
                            date: parse_strava_local(photo.created_at_local.as_deref()),
                        })
                    }));
                    cache.mark_fetched(activity_id, now);
                }
                Err(e) if e.is_rate_limited() => {
                    log_stage_failure("photos", &e);
                    return Err(e);
                }
                Err(e) => {
                    log_stage_failure("photos", &e);
                    break;
                }
            }
        }

        Ok(img_urls)
    }

    /// Fetch summary stats for the athlete owning `summaries`.
    ///
    /// Only a rate limit is an error; other failures publish without stats
    /// and leave them pending for the next cycle.
    async fn fetch_summary_stats(
        &self,
        summaries: &[StravaActivitySummary],
    ) -> Result<Option<SummaryStats>> {
        let Some(athlete_id) = summaries.iter().find_map(|s| s.athlete.as_ref().map(|a| a.id))
        else {
            tracing::warn!("No athlete id in activity list, skipping summary stats");
            return Ok(None);
        };

        match self.strava.get_athlete_stats(athlete_id).await {
            Ok(raw) => Ok(Some(raw.into())),
            Err(e) if e.is_rate_limited() => {
                log_stage_failure("stats", &e);
                Err(e)
            }
            Err(e) => {
                log_stage_failure("stats", &e);
                Ok(None)
            }
        }
    }
}

fn log_stage_failure(stage: &'static str, error: &AppError) {
    match error {
        AppError::RemoteRateLimited => {
            tracing::warn!(stage, "Strava API rate limit has been reached");
        }
        AppError::RemoteUnexpectedStatus { status, body } => {
            tracing::error!(stage, status, body = %body, "Could not fetch Strava data");
        }
        other => {
            tracing::error!(stage, error = %other, "Could not fetch Strava data");
        }
    }
}
