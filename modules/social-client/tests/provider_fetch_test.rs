//! Profile/post read tests: normalization, cursor pagination through the
//! lazy post stream, and structural validation of provider payloads.

mod support;

use std::collections::HashMap;

use axum::extract::Query;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use creatorlink_common::Platform;
use futures::TryStreamExt;
use serde_json::json;
use social_client::platforms::{InstagramAdapter, TikTokAdapter};
use social_client::{ProviderAdapter, ProviderError};

use support::{settings, spawn};

fn instagram_profile_route() -> Router {
    Router::new().route(
        "/me",
        get(|| async {
            Json(json!({
                "id": "178414",
                "username": "wanderingchef",
                "followers_count": 12_400,
                "profile_picture_url": "https://cdn.example.com/avatar.jpg",
            }))
        }),
    )
}

#[tokio::test]
async fn instagram_fetch_page_collects_profile_and_paginated_posts() {
    let app = instagram_profile_route().route(
        "/me/media",
        get(|Query(q): Query<HashMap<String, String>>| async move {
            match q.get("after").map(String::as_str) {
                None => Json(json!({
                    "data": [
                        {
                            "id": "m1",
                            "caption": "tasting menu night",
                            "media_url": "https://cdn.example.com/m1.jpg",
                            "timestamp": "2026-02-01T18:00:00+0000",
                            "permalink": "https://instagram.com/p/m1",
                        },
                        { "id": "m2", "media_url": "https://cdn.example.com/m2.jpg" },
                    ],
                    "paging": { "cursors": { "after": "cursor-2" } },
                })),
                Some("cursor-2") => Json(json!({
                    "data": [ { "id": "m3" } ],
                })),
                Some(other) => panic!("unexpected cursor {other}"),
            }
        }),
    );
    let base = spawn(app).await;
    let adapter = InstagramAdapter::new(settings(&base), reqwest::Client::new());

    let page = adapter.fetch_page("tok").await.unwrap();
    assert_eq!(page.profile.display_name, "wanderingchef");
    assert_eq!(page.profile.follower_count, Some(12_400));
    let ids: Vec<&str> = page.posts.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, ["m1", "m2", "m3"]);
    assert!(page.posts[0].timestamp.is_some());
    assert!(page.posts[2].timestamp.is_none());
}

#[tokio::test]
async fn post_stream_is_lazy_until_polled() {
    // No routes at all: building the stream must not hit the network.
    let base = spawn(Router::new()).await;
    let adapter = InstagramAdapter::new(settings(&base), reqwest::Client::new());

    let stream = adapter.recent_posts("tok");
    drop(stream);

    // Polling it does hit the (empty) server and fails.
    let err = adapter
        .recent_posts("tok")
        .try_collect::<Vec<_>>()
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::Api { status: 404, .. }));
}

#[tokio::test]
async fn malformed_profile_payload_is_invalid_response() {
    let app = Router::new().route("/me", get(|| async { Json(json!({ "unexpected": true })) }));
    let base = spawn(app).await;
    let adapter = InstagramAdapter::new(settings(&base), reqwest::Client::new());

    let err = adapter.fetch_profile("tok").await.unwrap_err();
    assert!(
        matches!(err, ProviderError::InvalidResponse { platform: Platform::Instagram, .. }),
        "expected InvalidResponse, got {err:?}"
    );
}

#[tokio::test]
async fn unauthorized_fetch_maps_to_api_error() {
    let app = Router::new().route(
        "/me",
        get(|| async {
            (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "error": { "message": "Invalid OAuth access token." } })),
            )
                .into_response()
        }),
    );
    let base = spawn(app).await;
    let adapter = InstagramAdapter::new(settings(&base), reqwest::Client::new());

    let err = adapter.fetch_profile("bad").await.unwrap_err();
    match err {
        ProviderError::Api { status, .. } => assert_eq!(status, 401),
        other => panic!("expected Api, got {other:?}"),
    }
}

#[tokio::test]
async fn tiktok_profile_unwraps_the_data_envelope() {
    let app = Router::new().route(
        "/v2/user/info/",
        get(|| async {
            Json(json!({
                "data": {
                    "user": {
                        "open_id": "open-9",
                        "display_name": "dance.daily",
                        "avatar_url": "https://cdn.example.com/tt.jpg",
                        "follower_count": 88_000,
                    }
                },
                "error": { "code": "ok", "message": "" },
            }))
        }),
    );
    let base = spawn(app).await;
    let adapter = TikTokAdapter::new(settings(&base), reqwest::Client::new());

    let profile = adapter.fetch_profile("tok").await.unwrap();
    assert_eq!(profile.id, "open-9");
    assert_eq!(profile.display_name, "dance.daily");
    assert_eq!(profile.follower_count, Some(88_000));
}
