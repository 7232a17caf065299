// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Normalized activity snapshot published to display entities.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// One activity as published in `activity_data_updated`.
///
/// Values stay in Strava's units (meters, seconds, watts); conversion for
/// display happens downstream. Metrics Strava did not report are `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    /// Strava activity ID
    pub id: u64,
    /// Activity name/title
    pub title: String,
    /// Lower-cased Strava activity type (ride, run, swim, ...)
    pub activity_type: String,
    /// Distance in meters
    pub distance: Option<f64>,
    /// Elapsed time in seconds
    pub duration: Option<f64>,
    /// Moving time in seconds
    pub moving_time: Option<f64>,
    pub kudos: Option<u32>,
    /// Energy in kcal (derived from kilojoules)
    pub calories: Option<u32>,
    /// Total elevation gain in meters
    pub elevation: Option<f64>,
    /// Average power in watts
    pub power: Option<f64>,
    /// Achievement count
    pub trophies: Option<u32>,
    /// Reverse-geocoded start location
    pub city: String,
    /// Local start time
    pub start_date: NaiveDateTime,
}

/// Sort activities newest first.
///
/// This is the only ordering consumers may rely on. The sort is stable, so
/// activities sharing a start time keep the order Strava returned them in.
pub fn sort_newest_first(activities: &mut [Activity]) {
    activities.sort_by(|a, b| b.start_date.cmp(&a.start_date));
}
