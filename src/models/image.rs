// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Activity photo URLs.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A photo URL with its capture date, as published in `images_updated`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageUrl {
    pub url: String,
    /// Local capture time reported by Strava
    pub date: NaiveDateTime,
}

impl ImageUrl {
    /// Stable cache key for this URL (hex SHA-256).
    pub fn cache_key(&self) -> String {
        cache_key(&self.url)
    }
}

/// Hex SHA-256 of a URL.
pub fn cache_key(url: &str) -> String {
    hex::encode(Sha256::digest(url.as_bytes()))
}
