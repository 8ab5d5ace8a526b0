//! Fake-provider harness: each test builds an axum router that plays the
//! platform's endpoints, binds it to an ephemeral port, and points the
//! adapter at it through the `api_base` override.

// Not every test binary uses every helper.
#![allow(dead_code)]

use axum::Router;
use chrono::{DateTime, Duration, Utc};
use creatorlink_common::{Account, Platform};
use social_client::AdapterSettings;

pub async fn spawn(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

pub fn settings(base: &str) -> AdapterSettings {
    AdapterSettings {
        client_id: "client-id".into(),
        client_secret: "client-secret".into(),
        redirect_uri: "https://api.example.com/cb".into(),
        api_base: Some(base.to_string()),
        pkce_verifier: None,
    }
}

pub fn account(
    platform: Platform,
    token: &str,
    token_expiry: Option<DateTime<Utc>>,
    refresh_token: Option<&str>,
    refresh_token_expiry: Option<DateTime<Utc>>,
) -> Account {
    let now = Utc::now();
    Account {
        id: uuid::Uuid::new_v4(),
        platform,
        token: token.to_string(),
        token_expiry,
        refresh_token: refresh_token.map(str::to_string),
        refresh_token_expiry,
        scope: None,
        token_type: Some("bearer".into()),
        user_id: "u1".into(),
        username: None,
        followers: None,
        category: None,
        country: None,
        city: None,
        language: None,
        prices: Default::default(),
        available_services: Vec::new(),
        is_verified: false,
        is_active: true,
        hide_identity: false,
        created_at: now,
        updated_at: now,
        deleted_at: None,
    }
}

pub fn past() -> Option<DateTime<Utc>> {
    Some(Utc::now() - Duration::hours(1))
}

pub fn future() -> Option<DateTime<Utc>> {
    Some(Utc::now() + Duration::hours(12))
}
