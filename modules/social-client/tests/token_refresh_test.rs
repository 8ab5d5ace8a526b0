//! Refresh-policy tests, one fake provider per case.
//!
//! The properties pinned here: expiry-gated providers call the provider
//! exactly once past expiry and not at all before it; the no-refresh
//! provider never calls out; rotating providers replace both tokens and
//! fail loudly on a spent refresh token; the offline-client provider treats
//! a token-less response as fatal.

mod support;

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::extract::{Form, Query};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use creatorlink_common::Platform;
use serde_json::json;
use social_client::platforms::{
    FacebookAdapter, InstagramAdapter, LinkedInAdapter, TikTokAdapter, TwitterAdapter,
    YouTubeAdapter,
};
use social_client::{ProviderAdapter, ProviderError};

use support::{account, future, past, settings, spawn};

#[tokio::test]
async fn instagram_refresh_past_expiry_issues_one_call_with_later_expiry() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let app = Router::new().route(
        "/refresh_access_token",
        get(move |Query(q): Query<HashMap<String, String>>| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                assert_eq!(q.get("grant_type").map(String::as_str), Some("ig_refresh_token"));
                assert_eq!(q.get("access_token").map(String::as_str), Some("ig-old"));
                Json(json!({
                    "access_token": "ig-new",
                    "token_type": "bearer",
                    "expires_in": 5_184_000,
                }))
            }
        }),
    );
    let base = spawn(app).await;
    let adapter = InstagramAdapter::new(settings(&base), reqwest::Client::new());

    let old_expiry = past();
    let account = account(Platform::Instagram, "ig-old", old_expiry, None, None);
    let outcome = adapter.refresh(&account).await.unwrap();

    assert_eq!(outcome.access_token, "ig-new");
    let patch = outcome.patch.expect("refresh past expiry must produce a patch");
    assert_eq!(patch.token.as_deref(), Some("ig-new"));
    assert!(patch.token_expiry.unwrap() > old_expiry.unwrap());
    assert!(patch.token_expiry.unwrap() > Utc::now());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn instagram_refresh_before_expiry_issues_no_calls() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let app = Router::new().fallback(move || {
        let counter = counter.clone();
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    });
    let base = spawn(app).await;
    let adapter = InstagramAdapter::new(settings(&base), reqwest::Client::new());

    let account = account(Platform::Instagram, "ig-live", future(), None, None);
    let outcome = adapter.refresh(&account).await.unwrap();

    assert_eq!(outcome.access_token, "ig-live");
    assert!(outcome.patch.is_none());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn facebook_refresh_returns_stored_token_even_past_expiry() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let app = Router::new().fallback(move || {
        let counter = counter.clone();
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    });
    let base = spawn(app).await;
    let adapter = FacebookAdapter::new(settings(&base), reqwest::Client::new());

    let account = account(Platform::Facebook, "fb-expired", past(), None, None);
    let outcome = adapter.refresh(&account).await.unwrap();

    assert_eq!(outcome.access_token, "fb-expired");
    assert!(outcome.patch.is_none());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

fn rotating_token_route(current: Arc<Mutex<String>>) -> Router {
    Router::new().route(
        "/v2/oauth/token/",
        post(move |Form(form): Form<HashMap<String, String>>| {
            let current = current.clone();
            async move {
                let mut current = current.lock().unwrap();
                if form.get("refresh_token") == Some(&*current) {
                    *current = "r2".to_string();
                    Json(json!({
                        "access_token": "a2",
                        "expires_in": 86_400,
                        "refresh_token": "r2",
                        "refresh_expires_in": 31_536_000,
                        "open_id": "o1",
                        "scope": "user.info.basic",
                        "token_type": "Bearer",
                    }))
                    .into_response()
                } else {
                    (
                        StatusCode::BAD_REQUEST,
                        Json(json!({
                            "error": "invalid_grant",
                            "error_description": "refresh token invalid or already used",
                        })),
                    )
                        .into_response()
                }
            }
        }),
    )
}

#[tokio::test]
async fn tiktok_refresh_rotates_both_tokens() {
    let base = spawn(rotating_token_route(Arc::new(Mutex::new("r1".into())))).await;
    let adapter = TikTokAdapter::new(settings(&base), reqwest::Client::new());

    let account = account(Platform::TikTok, "a1", past(), Some("r1"), future());
    let outcome = adapter.refresh(&account).await.unwrap();

    assert_eq!(outcome.access_token, "a2");
    let patch = outcome.patch.unwrap();
    assert_eq!(patch.token.as_deref(), Some("a2"));
    assert_eq!(patch.refresh_token.as_deref(), Some("r2"));
    assert!(patch.token_expiry.unwrap() > Utc::now());
    assert!(patch.refresh_token_expiry.unwrap() > patch.token_expiry.unwrap());
}

#[tokio::test]
async fn tiktok_spent_refresh_token_fails_with_refresh_error() {
    let base = spawn(rotating_token_route(Arc::new(Mutex::new("r1".into())))).await;
    let adapter = TikTokAdapter::new(settings(&base), reqwest::Client::new());

    // First refresh wins the rotation: the provider now only knows r2.
    let stale = account(Platform::TikTok, "a1", past(), Some("r1"), future());
    adapter.refresh(&stale).await.unwrap();

    // Second refresh replays r1, as a concurrent reader would.
    let err = adapter.refresh(&stale).await.unwrap_err();
    assert!(
        matches!(err, ProviderError::Refresh { platform: Platform::TikTok, .. }),
        "expected Refresh, got {err:?}"
    );
}

#[tokio::test]
async fn twitter_refresh_rotates_and_sends_client_basic_auth() {
    let app = Router::new().route(
        "/2/oauth2/token",
        post(
            |headers: HeaderMap, Form(form): Form<HashMap<String, String>>| async move {
                let auth = headers
                    .get("authorization")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default();
                assert!(auth.starts_with("Basic "), "missing client basic auth");
                assert_eq!(form.get("grant_type").map(String::as_str), Some("refresh_token"));
                Json(json!({
                    "token_type": "bearer",
                    "expires_in": 7200,
                    "access_token": "tw-a2",
                    "scope": "tweet.read users.read offline.access",
                    "refresh_token": "tw-r2",
                }))
            },
        ),
    );
    let base = spawn(app).await;
    let adapter = TwitterAdapter::new(settings(&base), reqwest::Client::new());

    let account = account(Platform::Twitter, "tw-a1", past(), Some("tw-r1"), None);
    let outcome = adapter.refresh(&account).await.unwrap();

    assert_eq!(outcome.access_token, "tw-a2");
    let patch = outcome.patch.unwrap();
    assert_eq!(patch.refresh_token.as_deref(), Some("tw-r2"));
}

#[tokio::test]
async fn youtube_refresh_persists_new_access_token() {
    let app = Router::new().route(
        "/token",
        post(|Form(form): Form<HashMap<String, String>>| async move {
            assert_eq!(form.get("grant_type").map(String::as_str), Some("refresh_token"));
            assert_eq!(form.get("refresh_token").map(String::as_str), Some("yt-r1"));
            Json(json!({ "access_token": "yt-new", "expires_in": 3599 }))
        }),
    );
    let base = spawn(app).await;
    let adapter = YouTubeAdapter::new(settings(&base), reqwest::Client::new());

    let account = account(Platform::YouTube, "yt-old", past(), Some("yt-r1"), None);
    let outcome = adapter.refresh(&account).await.unwrap();

    assert_eq!(outcome.access_token, "yt-new");
    let patch = outcome.patch.unwrap();
    assert_eq!(patch.token.as_deref(), Some("yt-new"));
    assert!(patch.token_expiry.unwrap() > Utc::now());
}

#[tokio::test]
async fn youtube_refresh_without_access_token_is_fatal() {
    let app = Router::new().route(
        "/token",
        post(|| async { Json(json!({ "expires_in": 3599 })) }),
    );
    let base = spawn(app).await;
    let adapter = YouTubeAdapter::new(settings(&base), reqwest::Client::new());

    let account = account(Platform::YouTube, "yt-old", past(), Some("yt-r1"), None);
    let err = adapter.refresh(&account).await.unwrap_err();
    assert!(
        matches!(err, ProviderError::Refresh { platform: Platform::YouTube, .. }),
        "expected Refresh, got {err:?}"
    );
}

#[tokio::test]
async fn linkedin_refresh_past_expiry_issues_one_call() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let app = Router::new().route(
        "/oauth/v2/accessToken",
        post(move |Form(form): Form<HashMap<String, String>>| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                assert_eq!(form.get("grant_type").map(String::as_str), Some("refresh_token"));
                Json(json!({ "access_token": "li-new", "expires_in": 86_400 }))
            }
        }),
    );
    let base = spawn(app).await;
    let adapter = LinkedInAdapter::new(settings(&base), reqwest::Client::new());

    let account = account(Platform::LinkedIn, "li-old", past(), Some("li-r1"), None);
    let outcome = adapter.refresh(&account).await.unwrap();

    assert_eq!(outcome.access_token, "li-new");
    assert!(outcome.patch.unwrap().token_expiry.unwrap() > Utc::now());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}
