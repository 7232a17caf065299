// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Typed event fan-out to display entities.
//!
//! Delivery is at-most-once: a subscriber that falls more than
//! `EVENT_BUFFER` events behind loses the oldest ones, and nothing orders
//! events of different kinds relative to each other.

use crate::models::{Activity, ImageUrl, SummaryStats};
use serde::Serialize;
use tokio::sync::broadcast;

/// Events retained per slow subscriber.
const EVENT_BUFFER: usize = 64;

/// Payload of `activity_data_updated`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivityData {
    /// Newest first
    pub activities: Vec<Activity>,
    /// Present only when the cycle saw a new activity
    pub summary_stats: Option<SummaryStats>,
}

/// Events published to subscribers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event_type", content = "data", rename_all = "snake_case")]
pub enum StravaEvent {
    ActivityDataUpdated(ActivityData),
    ImagesUpdated { img_urls: Vec<ImageUrl> },
    ConfigChanged {},
    ImageRotated { url: String },
}

impl StravaEvent {
    /// Wire name of the event.
    pub fn name(&self) -> &'static str {
        match self {
            StravaEvent::ActivityDataUpdated(_) => "activity_data_updated",
            StravaEvent::ImagesUpdated { .. } => "images_updated",
            StravaEvent::ConfigChanged {} => "config_changed",
            StravaEvent::ImageRotated { .. } => "image_rotated",
        }
    }
}

/// Broadcast publisher; cheap to clone.
#[derive(Clone)]
pub struct EventPublisher {
    tx: broadcast::Sender<StravaEvent>,
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new()
    }
}

impl EventPublisher {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_BUFFER);
        Self { tx }
    }

    /// Register a new subscriber. It only sees events published afterwards.
    pub fn subscribe(&self) -> broadcast::Receiver<StravaEvent> {
        self.tx.subscribe()
    }

    /// Publish an event; returns how many subscribers it reached.
    pub fn publish(&self, event: StravaEvent) -> usize {
        let name = event.name();
        match self.tx.send(event) {
            Ok(receivers) => {
                tracing::debug!(event = name, receivers, "Event published");
                receivers
            }
            Err(_) => {
                tracing::debug!(event = name, "Event dropped (no subscribers)");
                0
            }
        }
    }
}
