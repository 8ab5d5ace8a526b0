//! Code-exchange tests against fake providers: hop counts, credential
//! forwarding, and the error taxonomy on rejected or non-token payloads.

mod support;

use std::collections::HashMap;

use axum::extract::{Form, Query};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use creatorlink_common::Platform;
use serde_json::json;
use social_client::platforms::{InstagramAdapter, TikTokAdapter, TwitterAdapter};
use social_client::{ProviderAdapter, ProviderError};

use support::{settings, spawn};

#[tokio::test]
async fn instagram_exchange_trades_short_lived_for_long_lived() {
    let app = Router::new()
        .route(
            "/oauth/access_token",
            post(|Form(form): Form<HashMap<String, String>>| async move {
                assert_eq!(form.get("code").map(String::as_str), Some("abc"));
                assert_eq!(
                    form.get("grant_type").map(String::as_str),
                    Some("authorization_code")
                );
                Json(json!({ "access_token": "short-lived", "user_id": 17841401234567890u64 }))
            }),
        )
        .route(
            "/access_token",
            get(|Query(q): Query<HashMap<String, String>>| async move {
                assert_eq!(q.get("grant_type").map(String::as_str), Some("ig_exchange_token"));
                assert_eq!(q.get("access_token").map(String::as_str), Some("short-lived"));
                Json(json!({
                    "access_token": "long-lived",
                    "token_type": "bearer",
                    "expires_in": 5_184_000,
                }))
            }),
        );
    let base = spawn(app).await;
    let adapter = InstagramAdapter::new(settings(&base), reqwest::Client::new());

    let bundle = adapter.exchange_code("abc").await.unwrap();
    assert_eq!(bundle.access_token, "long-lived");
    assert_eq!(bundle.expires_in, Some(5_184_000));
    assert!(bundle.refresh_token.is_none());
}

#[tokio::test]
async fn tiktok_exchange_returns_the_full_rotating_bundle() {
    let app = Router::new().route(
        "/v2/oauth/token/",
        post(|Form(form): Form<HashMap<String, String>>| async move {
            assert_eq!(form.get("client_key").map(String::as_str), Some("client-id"));
            Json(json!({
                "access_token": "act.a1",
                "expires_in": 86_400,
                "open_id": "open-1",
                "refresh_expires_in": 31_536_000,
                "refresh_token": "rft.r1",
                "scope": "user.info.basic,video.list",
                "token_type": "Bearer",
            }))
        }),
    );
    let base = spawn(app).await;
    let adapter = TikTokAdapter::new(settings(&base), reqwest::Client::new());

    let bundle = adapter.exchange_code("code-1").await.unwrap();
    assert_eq!(bundle.access_token, "act.a1");
    assert_eq!(bundle.refresh_token.as_deref(), Some("rft.r1"));
    assert_eq!(bundle.refresh_expires_in, Some(31_536_000));
}

#[tokio::test]
async fn rejected_exchange_surfaces_auth_exchange_error() {
    let app = Router::new().route(
        "/v2/oauth/token/",
        post(|| async {
            (
                StatusCode::BAD_REQUEST,
                Json(json!({
                    "error": "invalid_request",
                    "error_description": "Authorization code expired.",
                })),
            )
                .into_response()
        }),
    );
    let base = spawn(app).await;
    let adapter = TikTokAdapter::new(settings(&base), reqwest::Client::new());

    let err = adapter.exchange_code("stale").await.unwrap_err();
    match err {
        ProviderError::AuthExchange { platform, detail } => {
            assert_eq!(platform, Platform::TikTok);
            assert!(detail.contains("Authorization code expired"));
        }
        other => panic!("expected AuthExchange, got {other:?}"),
    }
}

#[tokio::test]
async fn non_token_payload_surfaces_auth_exchange_error() {
    // 200 OK but no token fields: must not slip through as a success.
    let app = Router::new().route(
        "/v2/oauth/token/",
        post(|| async { Json(json!({ "ok": true })) }),
    );
    let base = spawn(app).await;
    let adapter = TikTokAdapter::new(settings(&base), reqwest::Client::new());

    let err = adapter.exchange_code("abc").await.unwrap_err();
    assert!(
        matches!(err, ProviderError::AuthExchange { .. }),
        "expected AuthExchange, got {err:?}"
    );
}

#[tokio::test]
async fn twitter_exchange_sends_basic_auth_and_pkce_verifier() {
    let app = Router::new().route(
        "/2/oauth2/token",
        post(
            |headers: axum::http::HeaderMap, Form(form): Form<HashMap<String, String>>| async move {
                let auth = headers
                    .get("authorization")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default();
                assert!(auth.starts_with("Basic "), "missing client basic auth");
                assert!(form.contains_key("code_verifier"), "missing PKCE verifier");
                Json(json!({
                    "token_type": "bearer",
                    "expires_in": 7200,
                    "access_token": "tw-a1",
                    "refresh_token": "tw-r1",
                    "scope": "tweet.read users.read offline.access",
                }))
            },
        ),
    );
    let base = spawn(app).await;
    let adapter = TwitterAdapter::new(settings(&base), reqwest::Client::new());

    let bundle = adapter.exchange_code("tw-code").await.unwrap();
    assert_eq!(bundle.access_token, "tw-a1");
    assert_eq!(bundle.refresh_token.as_deref(), Some("tw-r1"));
}
