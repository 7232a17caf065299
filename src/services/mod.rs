// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod activity;
pub mod events;
pub mod geocode;
pub mod image_cache;
pub mod scheduler;
pub mod strava;
pub mod subscription;

pub use activity::{ActivityAggregator, PhotoCache};
pub use events::{ActivityData, EventPublisher, StravaEvent};
pub use geocode::GeocodeClient;
pub use image_cache::ImageCache;
pub use strava::StravaClient;
pub use subscription::{SubscriptionManager, SubscriptionStore};
