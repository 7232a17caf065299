// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod activity;
pub mod image;
pub mod stats;
pub mod subscription;

pub use activity::Activity;
pub use image::ImageUrl;
pub use stats::{PeriodTotals, SportSummary, SummaryStats};
pub use subscription::Subscription;
