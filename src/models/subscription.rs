// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Strava push subscription.

use serde::{Deserialize, Serialize};

/// A webhook subscription registered with Strava.
///
/// Strava allows one subscription per application, so at most one of these
/// should exist remotely at any time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub id: u64,
    pub callback_url: String,
}
