//! Athlete summary statistics.
//!
//! Rebuilt from Strava's `/athletes/{id}/stats` endpoint whenever a refresh
//! cycle sees an activity it has not seen before. Nothing is accumulated
//! locally.

use serde::{Deserialize, Serialize};

/// Totals for one sport over one period.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PeriodTotals {
    /// Distance in meters
    pub distance: f64,
    pub activity_count: u32,
    /// Moving time in seconds
    pub moving_time: f64,
}

/// Year-to-date and all-time totals for one sport.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SportSummary {
    #[serde(rename = "summary_ytd")]
    pub year_to_date: PeriodTotals,
    #[serde(rename = "summary_all")]
    pub all_time: PeriodTotals,
}

/// Summary statistics published alongside activities.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SummaryStats {
    pub ride: SportSummary,
    pub run: SportSummary,
    pub swim: SportSummary,
}
