// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Webhook subscription lifecycle.
//!
//! Strava allows a single push subscription per application, and its
//! callback URL cannot be changed in place. Reconciling therefore means:
//! 1. Verify our callback URL answers (a broken public URL must never reach
//!    the mutation step)
//! 2. List what Strava has
//! 3. Delete a subscription pointing at a stale URL
//! 4. Create one if none is left
//! 5. Persist the result so webhook pings can be authenticated after restart

use crate::error::{AppError, Result};
use crate::fs_utils::{read_optional, write_atomic};
use crate::models::Subscription;
use crate::services::events::{EventPublisher, StravaEvent};
use crate::services::strava::StravaClient;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::sync::{Mutex, RwLock};

/// On-disk subscription state.
#[derive(Debug, Default, Serialize, Deserialize)]
struct PersistedState {
    subscription: Option<Subscription>,
}

/// JSON file holding the last reconciled subscription.
#[derive(Debug, Clone)]
pub struct SubscriptionStore {
    path: PathBuf,
}

impl SubscriptionStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Load the persisted subscription; a missing file means none.
    pub async fn load(&self) -> Result<Option<Subscription>> {
        let Some(raw) = read_optional(&self.path).await? else {
            return Ok(None);
        };

        let state: PersistedState = serde_json::from_slice(&raw)
            .map_err(|e| AppError::Storage(format!("{}: {}", self.path.display(), e)))?;
        Ok(state.subscription)
    }

    /// Replace the persisted subscription (write to a temp file, then rename).
    pub async fn save(&self, subscription: Option<&Subscription>) -> Result<()> {
        let state = PersistedState {
            subscription: subscription.cloned(),
        };
        let json = serde_json::to_vec_pretty(&state)
            .map_err(|e| AppError::Internal(anyhow::anyhow!(e)))?;
        write_atomic(&self.path, &json).await
    }
}

/// Keeps exactly one Strava push subscription pointing at our callback URL.
pub struct SubscriptionManager {
    strava: StravaClient,
    store: SubscriptionStore,
    publisher: EventPublisher,
    verify_token: String,
    /// Last known subscription; read by the webhook handler on every ping.
    current: RwLock<Option<Subscription>>,
    /// Serializes reconcile/unsubscribe so two triggers can't both create.
    mutation_lock: Mutex<()>,
}

impl SubscriptionManager {
    pub fn new(
        strava: StravaClient,
        store: SubscriptionStore,
        publisher: EventPublisher,
        verify_token: String,
    ) -> Self {
        Self {
            strava,
            store,
            publisher,
            verify_token,
            current: RwLock::new(None),
            mutation_lock: Mutex::new(()),
        }
    }

    /// Seed the known subscription from disk so pings are accepted before
    /// the first reconcile finishes.
    pub async fn load_persisted(&self) -> Result<Option<Subscription>> {
        let persisted = self.store.load().await?;
        if let Some(sub) = &persisted {
            tracing::info!(
                subscription_id = sub.id,
                callback_url = %sub.callback_url,
                "Loaded persisted webhook subscription"
            );
        }
        *self.current.write().await = persisted.clone();
        Ok(persisted)
    }

    /// Currently known subscription.
    pub async fn current(&self) -> Option<Subscription> {
        self.current.read().await.clone()
    }

    /// Currently known subscription id.
    pub async fn current_id(&self) -> Option<u64> {
        self.current.read().await.as_ref().map(|s| s.id)
    }

    /// Make Strava's subscription state match `desired_callback_url`.
    ///
    /// Performs at most one mutating path (delete+create or create) and none
    /// at all when the existing subscription already points at the URL.
    pub async fn reconcile(&self, desired_callback_url: &str) -> Result<Subscription> {
        let _guard = self.mutation_lock.lock().await;

        if let Err(e) = self.strava.check_reachable(desired_callback_url).await {
            tracing::error!(
                callback_url = %desired_callback_url,
                error = %e,
                "Callback URL for Strava webhook not reachable"
            );
            return Err(AppError::CallbackUnreachable(format!(
                "{}: {}",
                desired_callback_url, e
            )));
        }

        let mut existing = self.strava.list_subscriptions().await?;
        if existing.len() > 1 {
            tracing::error!(
                callback_url = %desired_callback_url,
                found = existing.len(),
                "Expected at most one existing Strava webhook subscription"
            );
            return Err(AppError::InconsistentRemoteState(existing.len()));
        }

        let subscription = match existing.pop() {
            Some(sub) if sub.callback_url == desired_callback_url => {
                tracing::debug!(subscription_id = sub.id, "Webhook subscription up to date");
                sub
            }
            Some(stale) => {
                tracing::info!(
                    subscription_id = stale.id,
                    stale_url = %stale.callback_url,
                    "Deleting outdated Strava webhook subscription"
                );
                if let Err(e) = self.strava.delete_subscription(stale.id).await {
                    tracing::error!(
                        subscription_id = stale.id,
                        error = %e,
                        "Failed to delete Strava webhook subscription"
                    );
                    return Err(e);
                }
                self.remember(None).await?;
                self.create(desired_callback_url).await?
            }
            None => self.create(desired_callback_url).await?,
        };

        self.remember(Some(subscription.clone())).await?;
        Ok(subscription)
    }

    /// Delete our subscription from Strava and forget it locally.
    pub async fn unsubscribe(&self) -> Result<()> {
        let _guard = self.mutation_lock.lock().await;

        let existing = self.strava.list_subscriptions().await?;
        match existing.as_slice() {
            [] => {
                tracing::info!("No Strava webhook subscription to delete");
            }
            [sub] => {
                self.strava.delete_subscription(sub.id).await?;
                tracing::info!(
                    subscription_id = sub.id,
                    callback_url = %sub.callback_url,
                    "Deleted Strava webhook subscription"
                );
            }
            many => {
                tracing::error!(found = many.len(), "Refusing to guess which subscription to delete");
                return Err(AppError::InconsistentRemoteState(many.len()));
            }
        }

        self.remember(None).await
    }

    async fn create(&self, callback_url: &str) -> Result<Subscription> {
        tracing::info!(callback_url = %callback_url, "Creating Strava webhook subscription");
        match self
            .strava
            .create_subscription(callback_url, &self.verify_token)
            .await
        {
            Ok(sub) => {
                tracing::info!(subscription_id = sub.id, "Strava webhook subscription created");
                Ok(sub)
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to create Strava webhook subscription");
                Err(e)
            }
        }
    }

    /// Persist and publish a subscription change; no-op when unchanged.
    async fn remember(&self, subscription: Option<Subscription>) -> Result<()> {
        let mut current = self.current.write().await;
        if *current == subscription {
            return Ok(());
        }

        self.store.save(subscription.as_ref()).await?;
        *current = subscription;
        drop(current);

        self.publisher.publish(StravaEvent::ConfigChanged {});
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = SubscriptionStore::new(dir.path().join("nested").join("subscription.json"));

        assert_eq!(store.load().await.unwrap(), None);

        let sub = Subscription {
            id: 4242,
            callback_url: "https://home.example.org/api/strava/webhook".to_string(),
        };
        store.save(Some(&sub)).await.unwrap();
        assert_eq!(store.load().await.unwrap(), Some(sub));

        store.save(None).await.unwrap();
        assert_eq!(store.load().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_store_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("subscription.json");
        std::fs::write(&path, b"not json").unwrap();

        let err = SubscriptionStore::new(path).load().await.unwrap_err();
        assert!(matches!(err, AppError::Storage(_)));
    }
}
