// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared helpers for date/time parsing.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

/// Format Strava uses for `*_local` timestamps.
const STRAVA_LOCAL_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Date used when Strava omits or mangles a local timestamp.
pub fn fallback_date() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2000, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or_default()
}

/// Parse a Strava local timestamp such as `2024-05-01T07:12:44Z`.
///
/// The trailing `Z` is part of Strava's format even though the value is local
/// time, so the result is a naive datetime.
pub fn parse_strava_local(value: Option<&str>) -> NaiveDateTime {
    value
        .and_then(|v| NaiveDateTime::parse_from_str(v, STRAVA_LOCAL_FORMAT).ok())
        .unwrap_or_else(fallback_date)
}

/// Number of whole days elapsed between `earlier` and `later`.
pub fn whole_days_between(earlier: DateTime<Utc>, later: DateTime<Utc>) -> i64 {
    (later - earlier).num_days()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_parse_strava_local() {
        let parsed = parse_strava_local(Some("2024-05-01T07:12:44Z"));
        assert_eq!(parsed.to_string(), "2024-05-01 07:12:44");
    }

    #[test]
    fn test_parse_strava_local_falls_back() {
        assert_eq!(parse_strava_local(None), fallback_date());
        assert_eq!(parse_strava_local(Some("yesterday")), fallback_date());
    }

    #[test]
    fn test_whole_days_between() {
        let t = Utc::now();
        assert_eq!(whole_days_between(t, t + Duration::hours(23)), 0);
        assert_eq!(whole_days_between(t, t + Duration::hours(24)), 1);
        assert_eq!(whole_days_between(t, t + Duration::days(3)), 3);
    }
}
