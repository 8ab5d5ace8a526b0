//! Twitter adapter.
//!
//! OAuth 2.0 with PKCE (plain method, configured verifier — the URL must be
//! deterministic) and `offline.access`, so refresh tokens rotate: every
//! refresh invalidates the previous refresh token and the new pair is
//! persisted in one patch. Token calls authenticate with the confidential
//! client's basic auth header.

use async_stream::try_stream;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use creatorlink_common::{Account, AccountPatch, Platform};
use futures::stream::BoxStream;
use serde::Deserialize;
use url::Url;

use crate::adapter::ProviderAdapter;
use crate::error::{ProviderError, Result};
use crate::http::{decode, parse_timestamp, read_json, CallKind};
use crate::types::{AdapterSettings, PostSnapshot, ProfileSnapshot, RefreshOutcome, TokenBundle};

const AUTH_BASE: &str = "https://twitter.com";
const API_BASE: &str = "https://api.twitter.com";
const SCOPES: &str = "tweet.read users.read offline.access";
const DEFAULT_PKCE_VERIFIER: &str = "creatorlink-plain-verifier-0123456789abcdefghij";
const POSTS_PER_PAGE: u32 = 25;
const MAX_POSTS: usize = 50;

pub struct TwitterAdapter {
    settings: AdapterSettings,
    client: reqwest::Client,
}

impl TwitterAdapter {
    pub fn new(settings: AdapterSettings, client: reqwest::Client) -> Self {
        Self { settings, client }
    }

    fn auth_base(&self) -> &str {
        self.settings.api_base.as_deref().unwrap_or(AUTH_BASE)
    }

    fn api_base(&self) -> &str {
        self.settings.api_base.as_deref().unwrap_or(API_BASE)
    }

    fn pkce_verifier(&self) -> &str {
        self.settings
            .pkce_verifier
            .as_deref()
            .unwrap_or(DEFAULT_PKCE_VERIFIER)
    }

    async fn token_call(&self, kind: CallKind, form: &[(&str, &str)]) -> Result<TwitterToken> {
        let resp = self
            .client
            .post(format!("{}/2/oauth2/token", self.api_base()))
            .basic_auth(&self.settings.client_id, Some(&self.settings.client_secret))
            .form(form)
            .send()
            .await?;
        let value = read_json(Platform::Twitter, kind, resp).await?;
        decode(Platform::Twitter, kind, value)
    }
}

#[derive(Deserialize)]
struct TwitterToken {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    scope: Option<String>,
    #[serde(default)]
    token_type: Option<String>,
}

#[derive(Deserialize)]
struct UserEnvelope {
    data: TwitterUser,
}

#[derive(Deserialize)]
struct TwitterUser {
    id: String,
    name: String,
    #[serde(default)]
    profile_image_url: Option<String>,
    #[serde(default)]
    public_metrics: Option<PublicMetrics>,
}

#[derive(Deserialize)]
struct PublicMetrics {
    #[serde(default)]
    followers_count: Option<u64>,
}

#[derive(Deserialize)]
struct TweetsPage {
    #[serde(default)]
    data: Vec<Tweet>,
    #[serde(default)]
    meta: Option<TweetsMeta>,
}

#[derive(Deserialize)]
struct Tweet {
    id: String,
    text: String,
    #[serde(default)]
    created_at: Option<String>,
}

#[derive(Deserialize)]
struct TweetsMeta {
    #[serde(default)]
    next_token: Option<String>,
}

#[async_trait]
impl ProviderAdapter for TwitterAdapter {
    fn platform(&self) -> Platform {
        Platform::Twitter
    }

    fn authorization_url(&self, user_id: &str) -> Result<Url> {
        Ok(Url::parse_with_params(
            &format!("{}/i/oauth2/authorize", self.auth_base()),
            &[
                ("response_type", "code"),
                ("client_id", self.settings.client_id.as_str()),
                ("redirect_uri", self.settings.redirect_uri.as_str()),
                ("scope", SCOPES),
                ("state", user_id),
                ("code_challenge", self.pkce_verifier()),
                ("code_challenge_method", "plain"),
            ],
        )?)
    }

    async fn exchange_code(&self, code: &str) -> Result<TokenBundle> {
        let token = self
            .token_call(
                CallKind::Exchange,
                &[
                    ("grant_type", "authorization_code"),
                    ("code", code),
                    ("redirect_uri", self.settings.redirect_uri.as_str()),
                    ("code_verifier", self.pkce_verifier()),
                ],
            )
            .await?;

        Ok(TokenBundle {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            expires_in: token.expires_in,
            refresh_expires_in: None,
            scope: token.scope,
            token_type: token.token_type,
        })
    }

    async fn refresh(&self, account: &Account) -> Result<RefreshOutcome> {
        let now = Utc::now();
        if !account.is_access_expired(now) && !account.is_refresh_expired(now) {
            return Ok(RefreshOutcome::unchanged(&account.token));
        }

        let refresh_token =
            account
                .refresh_token
                .as_deref()
                .ok_or_else(|| ProviderError::Refresh {
                    platform: Platform::Twitter,
                    detail: "no refresh token on record".to_string(),
                })?;

        tracing::debug!(account_id = %account.id, "rotating Twitter token pair");
        let token = self
            .token_call(
                CallKind::Refresh,
                &[
                    ("grant_type", "refresh_token"),
                    ("refresh_token", refresh_token),
                ],
            )
            .await?;

        let patch = AccountPatch {
            token: Some(token.access_token.clone()),
            token_expiry: token
                .expires_in
                .map(|secs| Utc::now() + Duration::seconds(secs as i64)),
            // Rotation: the provider invalidated the refresh token we sent.
            refresh_token: token.refresh_token,
            ..Default::default()
        };
        Ok(RefreshOutcome {
            access_token: token.access_token,
            patch: Some(patch),
        })
    }

    async fn fetch_profile(&self, access_token: &str) -> Result<ProfileSnapshot> {
        let resp = self
            .client
            .get(format!("{}/2/users/me", self.api_base()))
            .query(&[("user.fields", "profile_image_url,public_metrics")])
            .bearer_auth(access_token)
            .send()
            .await?;
        let value = read_json(Platform::Twitter, CallKind::Fetch, resp).await?;
        let envelope: UserEnvelope = decode(Platform::Twitter, CallKind::Fetch, value)?;
        let user = envelope.data;
        Ok(ProfileSnapshot {
            id: user.id,
            display_name: user.name,
            avatar_url: user.profile_image_url,
            follower_count: user.public_metrics.and_then(|m| m.followers_count),
        })
    }

    fn recent_posts<'a>(
        &'a self,
        access_token: &'a str,
    ) -> BoxStream<'a, Result<PostSnapshot>> {
        Box::pin(try_stream! {
            // The tweets endpoint is keyed by numeric user id.
            let profile = self.fetch_profile(access_token).await?;

            let max = POSTS_PER_PAGE.to_string();
            let mut next_token: Option<String> = None;
            let mut yielded = 0usize;
            'pages: loop {
                let mut req = self
                    .client
                    .get(format!("{}/2/users/{}/tweets", self.api_base(), profile.id))
                    .query(&[
                        ("max_results", max.as_str()),
                        ("tweet.fields", "created_at"),
                    ])
                    .bearer_auth(access_token);
                if let Some(token) = &next_token {
                    req = req.query(&[("pagination_token", token.as_str())]);
                }
                let resp = req.send().await?;
                let value = read_json(Platform::Twitter, CallKind::Fetch, resp).await?;
                let page: TweetsPage = decode(Platform::Twitter, CallKind::Fetch, value)?;

                for tweet in page.data {
                    yield PostSnapshot {
                        permalink: Some(format!(
                            "https://twitter.com/i/web/status/{}",
                            tweet.id
                        )),
                        id: tweet.id,
                        caption: Some(tweet.text),
                        media_url: None,
                        thumbnail: None,
                        timestamp: tweet.created_at.as_deref().and_then(parse_timestamp),
                    };
                    yielded += 1;
                    if yielded >= MAX_POSTS {
                        break 'pages;
                    }
                }
                match page.meta.and_then(|m| m.next_token) {
                    Some(token) => next_token = Some(token),
                    None => break 'pages,
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter() -> TwitterAdapter {
        TwitterAdapter::new(
            AdapterSettings {
                client_id: "tw-client".into(),
                client_secret: "tw-secret".into(),
                redirect_uri: "https://api.example.com/cb/twitter".into(),
                api_base: None,
                pkce_verifier: Some("fixed-verifier".into()),
            },
            reqwest::Client::new(),
        )
    }

    #[test]
    fn authorization_url_embeds_user_id_in_state() {
        let url = adapter().authorization_url("user-11").unwrap();
        assert_eq!(url.host_str(), Some("twitter.com"));
        let state = url
            .query_pairs()
            .find(|(k, _)| k == "state")
            .map(|(_, v)| v.into_owned());
        assert_eq!(state.as_deref(), Some("user-11"));
    }

    #[test]
    fn authorization_url_carries_plain_pkce_challenge() {
        let url = adapter().authorization_url("u").unwrap();
        assert!(url
            .query_pairs()
            .any(|(k, v)| k == "code_challenge" && v == "fixed-verifier"));
        assert!(url
            .query_pairs()
            .any(|(k, v)| k == "code_challenge_method" && v == "plain"));
    }
}
