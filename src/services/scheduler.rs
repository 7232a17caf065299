// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Periodic background jobs.

use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Run `job` every `period`, starting one period from now.
///
/// Each run is awaited before the next tick is considered, so a slow job
/// delays the schedule instead of piling up. Returns `None` when `period` is
/// zero (job disabled).
pub fn spawn_periodic<F, Fut>(name: &'static str, period: Duration, mut job: F) -> Option<JoinHandle<()>>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    if period.is_zero() {
        tracing::info!(job = name, "Periodic job disabled");
        return None;
    }

    tracing::info!(job = name, period_secs = period.as_secs(), "Periodic job scheduled");
    Some(tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        interval.tick().await;

        loop {
            interval.tick().await;
            tracing::debug!(job = name, "Periodic job firing");
            job().await;
        }
    }))
}
