// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Webhook subscription reconcile tests against the fake Strava API.

mod common;

use common::{drain_events, TestApp};
use strava_webhook_bridge::error::AppError;
use strava_webhook_bridge::services::StravaEvent;
use strava_webhook_bridge::AppState;

const STALE_URL: &str = "https://old.example.org/api/strava/webhook";

#[tokio::test]
async fn test_reconcile_creates_once_then_is_idempotent() {
    let app = TestApp::new().await;
    let mut rx = app.state.publisher.subscribe();
    let callback_url = app.fake.callback_url();

    let created = app.state.subscriptions.reconcile(&callback_url).await.unwrap();
    assert_eq!(created.callback_url, callback_url);
    assert_eq!(app.fake.mutating_calls(), vec!["POST /push_subscriptions"]);
    assert_eq!(drain_events(&mut rx), vec![StravaEvent::ConfigChanged {}]);

    app.fake.reset_calls();
    let again = app.state.subscriptions.reconcile(&callback_url).await.unwrap();
    assert_eq!(again, created);
    assert!(app.fake.mutating_calls().is_empty());
    assert!(drain_events(&mut rx).is_empty());
    assert_eq!(app.fake.with(|s| s.subscriptions.len()), 1);
}

#[tokio::test]
async fn test_reconcile_adopts_matching_subscription() {
    let app = TestApp::new().await;
    let callback_url = app.fake.callback_url();
    app.fake
        .with(|s| s.subscriptions.push((77, callback_url.clone())));

    let sub = app.state.subscriptions.reconcile(&callback_url).await.unwrap();
    assert_eq!(sub.id, 77);
    assert_eq!(app.state.subscriptions.current_id().await, Some(77));
    assert!(app.fake.mutating_calls().is_empty());
}

#[tokio::test]
async fn test_reconcile_refuses_multiple_subscriptions() {
    let app = TestApp::new().await;
    app.fake.with(|s| {
        s.subscriptions.push((1, STALE_URL.to_string()));
        s.subscriptions.push((2, STALE_URL.to_string()));
    });

    let err = app
        .state
        .subscriptions
        .reconcile(&app.fake.callback_url())
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::InconsistentRemoteState(2)));
    assert!(app.fake.mutating_calls().is_empty());
    assert_eq!(app.state.subscriptions.current().await, None);
}

#[tokio::test]
async fn test_changed_url_deletes_then_creates() {
    let app = TestApp::new().await;
    app.fake
        .with(|s| s.subscriptions.push((7, STALE_URL.to_string())));
    let callback_url = app.fake.callback_url();

    let sub = app.state.subscriptions.reconcile(&callback_url).await.unwrap();

    assert_eq!(
        app.fake.mutating_calls(),
        vec!["DELETE /push_subscriptions/7", "POST /push_subscriptions"]
    );
    assert_eq!(sub.callback_url, callback_url);
    assert_eq!(
        app.fake.with(|s| s.subscriptions.clone()),
        vec![(sub.id, callback_url)]
    );
}

#[tokio::test]
async fn test_failed_delete_does_not_create() {
    let app = TestApp::new().await;
    app.fake
        .with(|s| s.subscriptions.push((7, STALE_URL.to_string())));
    app.fake.set_status("delete", 500);

    let err = app
        .state
        .subscriptions
        .reconcile(&app.fake.callback_url())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        AppError::RemoteUnexpectedStatus { status: 500, .. }
    ));
    assert_eq!(
        app.fake.mutating_calls(),
        vec!["DELETE /push_subscriptions/7"]
    );
    assert_eq!(app.fake.with(|s| s.subscriptions.len()), 1);
}

#[tokio::test]
async fn test_unreachable_callback_never_touches_strava() {
    let app = TestApp::new().await;
    app.fake.set_status("callback", 503);

    let err = app
        .state
        .subscriptions
        .reconcile(&app.fake.callback_url())
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::CallbackUnreachable(_)));
    assert_eq!(app.fake.count_calls("GET /push_subscriptions"), 0);
    assert!(app.fake.mutating_calls().is_empty());
}

#[tokio::test]
async fn test_rate_limited_listing() {
    let app = TestApp::new().await;
    app.fake.set_status("list", 429);

    let err = app
        .state
        .subscriptions
        .reconcile(&app.fake.callback_url())
        .await
        .unwrap_err();

    assert!(err.is_rate_limited());
    assert!(app.fake.mutating_calls().is_empty());
}

#[tokio::test]
async fn test_subscription_survives_restart() {
    let app = TestApp::new().await;
    let sub = app
        .state
        .subscriptions
        .reconcile(&app.fake.callback_url())
        .await
        .unwrap();

    let restarted = AppState::new(app.state.config.clone()).unwrap();
    assert_eq!(restarted.subscriptions.current().await, None);
    assert_eq!(
        restarted.subscriptions.load_persisted().await.unwrap(),
        Some(sub.clone())
    );
    assert_eq!(restarted.subscriptions.current_id().await, Some(sub.id));
}

#[tokio::test]
async fn test_unsubscribe() {
    let app = TestApp::new().await;
    let sub = app
        .state
        .subscriptions
        .reconcile(&app.fake.callback_url())
        .await
        .unwrap();

    app.state.subscriptions.unsubscribe().await.unwrap();
    assert_eq!(
        app.fake.mutating_calls().last().map(String::as_str),
        Some(format!("DELETE /push_subscriptions/{}", sub.id).as_str())
    );
    assert!(app.fake.with(|s| s.subscriptions.is_empty()));
    assert_eq!(app.state.subscriptions.current().await, None);

    // Nothing left to delete.
    app.fake.reset_calls();
    app.state.subscriptions.unsubscribe().await.unwrap();
    assert!(app.fake.mutating_calls().is_empty());
}

#[tokio::test]
async fn test_unsubscribe_refuses_multiple() {
    let app = TestApp::new().await;
    app.fake.with(|s| {
        s.subscriptions.push((1, STALE_URL.to_string()));
        s.subscriptions.push((2, STALE_URL.to_string()));
    });

    let err = app.state.subscriptions.unsubscribe().await.unwrap_err();
    assert!(matches!(err, AppError::InconsistentRemoteState(2)));
    assert!(app.fake.mutating_calls().is_empty());
}
