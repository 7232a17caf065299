// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Bounded cache of activity photo URLs.
//!
//! Entries are keyed by the SHA-256 of their URL, so ingesting the same photo
//! twice never grows the cache. Only the `capacity` most recent photos (by
//! capture date) are kept. The cache survives restarts as a versioned JSON
//! file:
//!
//! ```json
//! {"version": 1, "records": {"<sha256>": {"url": "...", "date": "..."}}}
//! ```

use crate::error::{AppError, Result};
use crate::fs_utils::{read_optional, write_atomic};
use crate::models::image::cache_key;
use crate::models::ImageUrl;
use crate::services::events::{EventPublisher, StravaEvent};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;

/// Current on-disk format version.
pub const CACHE_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct CacheFile {
    version: u32,
    records: BTreeMap<String, ImageUrl>,
}

#[derive(Debug, Default)]
struct CacheState {
    records: HashMap<String, ImageUrl>,
    /// Key of the image currently shown
    current: Option<String>,
}

/// Image URL cache feeding the photo rotation.
pub struct ImageCache {
    http: reqwest::Client,
    path: PathBuf,
    capacity: usize,
    state: Mutex<CacheState>,
}

impl ImageCache {
    pub fn new(http: reqwest::Client, path: PathBuf, capacity: usize) -> Self {
        Self {
            http,
            path,
            capacity,
            state: Mutex::new(CacheState::default()),
        }
    }

    /// Insert every live URL from `records` and return that live subset.
    ///
    /// A URL repeated within the batch counts once (first occurrence). URLs
    /// already cached are not re-checked. Liveness checks run before the lock
    /// is taken, so readers are never blocked on the network.
    pub async fn upsert_many(&self, records: Vec<ImageUrl>) -> Vec<ImageUrl> {
        let mut seen = HashSet::new();
        let records: Vec<(String, ImageUrl)> = records
            .into_iter()
            .map(|r| (r.cache_key(), r))
            .filter(|(key, _)| seen.insert(key.clone()))
            .collect();

        let known: Vec<bool> = {
            let state = self.state.lock().await;
            records
                .iter()
                .map(|(key, _)| state.records.contains_key(key))
                .collect()
        };

        let mut live = Vec::with_capacity(records.len());
        for ((key, record), is_known) in records.into_iter().zip(known) {
            if is_known || self.is_live(&record.url).await {
                live.push((key, record));
            }
        }

        let mut state = self.state.lock().await;
        live.into_iter()
            .map(|(key, record)| {
                state.records.insert(key, record.clone());
                record
            })
            .collect()
    }

    /// Keep only the `max` most recent records; returns how many were evicted.
    pub async fn evict_to_capacity(&self, max: usize) -> usize {
        let mut state = self.state.lock().await;
        if state.records.len() <= max {
            return 0;
        }

        let mut entries: Vec<(String, ImageUrl)> = state.records.drain().collect();
        // Newest first; the key breaks date ties deterministically.
        entries.sort_by(|(ka, a), (kb, b)| b.date.cmp(&a.date).then_with(|| ka.cmp(kb)));
        let evicted = entries.len() - max;
        entries.truncate(max);

        state.records = entries.into_iter().collect();
        evicted
    }

    /// Write the cache to disk.
    pub async fn persist(&self) -> Result<()> {
        let file = {
            let state = self.state.lock().await;
            CacheFile {
                version: CACHE_FORMAT_VERSION,
                records: state
                    .records
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect(),
            }
        };

        let json = serde_json::to_vec(&file).map_err(|e| AppError::Internal(anyhow::anyhow!(e)))?;
        write_atomic(&self.path, &json).await?;
        tracing::debug!(path = %self.path.display(), count = file.records.len(), "Image cache persisted");
        Ok(())
    }

    /// Replace the in-memory cache with the persisted one.
    ///
    /// A missing file loads as empty. Records whose key does not match their
    /// URL are re-keyed. Returns the number of records loaded.
    pub async fn load(&self) -> Result<usize> {
        let Some(raw) = read_optional(&self.path).await? else {
            return Ok(0);
        };

        let file: CacheFile = serde_json::from_slice(&raw)
            .map_err(|e| AppError::Storage(format!("{}: {}", self.path.display(), e)))?;
        if file.version != CACHE_FORMAT_VERSION {
            return Err(AppError::Storage(format!(
                "{}: unsupported image cache version {}",
                self.path.display(),
                file.version
            )));
        }

        let mut state = self.state.lock().await;
        state.records = file
            .records
            .into_values()
            .map(|r| (cache_key(&r.url), r))
            .collect();
        state.current = None;
        Ok(state.records.len())
    }

    /// Upsert a published batch, trim to capacity and persist.
    pub async fn ingest(&self, img_urls: Vec<ImageUrl>) -> Result<()> {
        let offered = img_urls.len();
        let live = self.upsert_many(img_urls).await;
        let evicted = self.evict_to_capacity(self.capacity).await;
        tracing::info!(offered, live = live.len(), evicted, "Image URLs ingested");
        self.persist().await
    }

    /// Advance to the image after the current one in date order.
    ///
    /// Starts from the oldest image when nothing is shown yet or the current
    /// one was evicted.
    pub async fn rotate(&self) -> Option<ImageUrl> {
        let mut state = self.state.lock().await;

        let mut ordered: Vec<(&String, &ImageUrl)> = state.records.iter().collect();
        ordered.sort_by(|(_, a), (_, b)| a.date.cmp(&b.date).then_with(|| a.url.cmp(&b.url)));

        let next = match state
            .current
            .as_ref()
            .and_then(|current| ordered.iter().position(|(key, _)| *key == current))
        {
            Some(pos) => (pos + 1) % ordered.len(),
            None => 0,
        };
        let (key, image) = ordered.get(next).map(|(k, i)| ((*k).clone(), (*i).clone()))?;
        state.current = Some(key);
        Some(image)
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.records.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// All cached records, oldest first.
    pub async fn records(&self) -> Vec<ImageUrl> {
        let state = self.state.lock().await;
        let mut records: Vec<ImageUrl> = state.records.values().cloned().collect();
        records.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.url.cmp(&b.url)));
        records
    }

    async fn is_live(&self, url: &str) -> bool {
        match self.http.get(url).send().await {
            Ok(response) if response.status() == reqwest::StatusCode::OK => true,
            Ok(response) => {
                tracing::warn!(url, status = %response.status(), "Image URL did not return an image");
                false
            }
            Err(e) => {
                tracing::warn!(url, error = %e, "Image URL not reachable");
                false
            }
        }
    }

    /// Feed every `images_updated` event into the cache until the publisher
    /// goes away.
    pub fn spawn_ingest(self: Arc<Self>, publisher: &EventPublisher) -> JoinHandle<()> {
        let mut rx = publisher.subscribe();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(StravaEvent::ImagesUpdated { img_urls }) => {
                        if let Err(e) = self.ingest(img_urls).await {
                            tracing::error!(error = %e, "Failed to ingest image URLs");
                        }
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Image cache fell behind; events dropped");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }
}
