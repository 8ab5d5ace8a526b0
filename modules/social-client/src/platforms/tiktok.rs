//! TikTok adapter.
//!
//! Both the access and the refresh token carry an expiry, and a refresh
//! rotates the pair: the provider invalidates the old refresh token the
//! moment it issues a new one. Both sides of the rotation land in one patch
//! so they are persisted together. A refresh attempted with an already-spent
//! refresh token fails; the account then needs a re-link.

use async_stream::try_stream;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use creatorlink_common::{Account, AccountPatch, Platform};
use futures::stream::BoxStream;
use serde::Deserialize;
use serde_json::json;
use url::Url;

use crate::adapter::ProviderAdapter;
use crate::error::{ProviderError, Result};
use crate::http::{decode, read_json, CallKind};
use crate::types::{AdapterSettings, PostSnapshot, ProfileSnapshot, RefreshOutcome, TokenBundle};

const AUTH_BASE: &str = "https://www.tiktok.com";
const API_BASE: &str = "https://open.tiktokapis.com";
const SCOPES: &str = "user.info.basic,user.info.stats,video.list";
const POSTS_PER_PAGE: u32 = 20;
const MAX_POSTS: usize = 50;

pub struct TikTokAdapter {
    settings: AdapterSettings,
    client: reqwest::Client,
}

impl TikTokAdapter {
    pub fn new(settings: AdapterSettings, client: reqwest::Client) -> Self {
        Self { settings, client }
    }

    fn auth_base(&self) -> &str {
        self.settings.api_base.as_deref().unwrap_or(AUTH_BASE)
    }

    fn api_base(&self) -> &str {
        self.settings.api_base.as_deref().unwrap_or(API_BASE)
    }

    async fn token_call(&self, kind: CallKind, form: &[(&str, &str)]) -> Result<TikTokToken> {
        let resp = self
            .client
            .post(format!("{}/v2/oauth/token/", self.api_base()))
            .form(form)
            .send()
            .await?;
        let value = read_json(Platform::TikTok, kind, resp).await?;
        decode(Platform::TikTok, kind, value)
    }
}

#[derive(Deserialize)]
struct TikTokToken {
    access_token: String,
    expires_in: u64,
    refresh_token: String,
    refresh_expires_in: u64,
    #[serde(default)]
    scope: Option<String>,
    #[serde(default)]
    token_type: Option<String>,
}

#[derive(Deserialize)]
struct UserInfoEnvelope {
    data: UserInfoData,
}

#[derive(Deserialize)]
struct UserInfoData {
    user: TikTokUser,
}

#[derive(Deserialize)]
struct TikTokUser {
    open_id: String,
    display_name: String,
    #[serde(default)]
    avatar_url: Option<String>,
    #[serde(default)]
    follower_count: Option<u64>,
}

#[derive(Deserialize)]
struct VideoListEnvelope {
    data: VideoListData,
}

#[derive(Deserialize)]
struct VideoListData {
    #[serde(default)]
    videos: Vec<TikTokVideo>,
    #[serde(default)]
    cursor: Option<i64>,
    #[serde(default)]
    has_more: bool,
}

#[derive(Deserialize)]
struct TikTokVideo {
    id: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    cover_image_url: Option<String>,
    #[serde(default)]
    create_time: Option<i64>,
    #[serde(default)]
    share_url: Option<String>,
}

#[async_trait]
impl ProviderAdapter for TikTokAdapter {
    fn platform(&self) -> Platform {
        Platform::TikTok
    }

    fn authorization_url(&self, user_id: &str) -> Result<Url> {
        // TikTok calls the app credential client_key, not client_id.
        Ok(Url::parse_with_params(
            &format!("{}/v2/auth/authorize/", self.auth_base()),
            &[
                ("client_key", self.settings.client_id.as_str()),
                ("redirect_uri", self.settings.redirect_uri.as_str()),
                ("scope", SCOPES),
                ("response_type", "code"),
                ("state", user_id),
            ],
        )?)
    }

    async fn exchange_code(&self, code: &str) -> Result<TokenBundle> {
        let token = self
            .token_call(
                CallKind::Exchange,
                &[
                    ("client_key", self.settings.client_id.as_str()),
                    ("client_secret", self.settings.client_secret.as_str()),
                    ("grant_type", "authorization_code"),
                    ("redirect_uri", self.settings.redirect_uri.as_str()),
                    ("code", code),
                ],
            )
            .await?;

        Ok(TokenBundle {
            access_token: token.access_token,
            refresh_token: Some(token.refresh_token),
            expires_in: Some(token.expires_in),
            refresh_expires_in: Some(token.refresh_expires_in),
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
                    platform: Platform::TikTok,
                    detail: "no refresh token on record".to_string(),
                })?;

        tracing::debug!(account_id = %account.id, "rotating TikTok token pair");
        let token = self
            .token_call(
                CallKind::Refresh,
                &[
                    ("client_key", self.settings.client_id.as_str()),
                    ("client_secret", self.settings.client_secret.as_str()),
                    ("grant_type", "refresh_token"),
                    ("refresh_token", refresh_token),
                ],
            )
            .await?;

        let now = Utc::now();
        let patch = AccountPatch {
            token: Some(token.access_token.clone()),
            token_expiry: Some(now + Duration::seconds(token.expires_in as i64)),
            refresh_token: Some(token.refresh_token),
            refresh_token_expiry: Some(now + Duration::seconds(token.refresh_expires_in as i64)),
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
            .get(format!("{}/v2/user/info/", self.api_base()))
            .query(&[(
                "fields",
                "open_id,display_name,avatar_url,follower_count",
            )])
            .bearer_auth(access_token)
            .send()
            .await?;
        let value = read_json(Platform::TikTok, CallKind::Fetch, resp).await?;
        let envelope: UserInfoEnvelope = decode(Platform::TikTok, CallKind::Fetch, value)?;
        let user = envelope.data.user;
        Ok(ProfileSnapshot {
            id: user.open_id,
            display_name: user.display_name,
            avatar_url: user.avatar_url,
            follower_count: user.follower_count,
        })
    }

    fn recent_posts<'a>(
        &'a self,
        access_token: &'a str,
    ) -> BoxStream<'a, Result<PostSnapshot>> {
        Box::pin(try_stream! {
            let mut cursor: Option<i64> = None;
            let mut yielded = 0usize;
            'pages: loop {
                let mut body = json!({ "max_count": POSTS_PER_PAGE });
                if let Some(c) = cursor {
                    body["cursor"] = json!(c);
                }
                let resp = self
                    .client
                    .post(format!("{}/v2/video/list/", self.api_base()))
                    .query(&[("fields", "id,title,cover_image_url,create_time,share_url")])
                    .bearer_auth(access_token)
                    .json(&body)
                    .send()
                    .await?;
                let value = read_json(Platform::TikTok, CallKind::Fetch, resp).await?;
                let envelope: VideoListEnvelope = decode(Platform::TikTok, CallKind::Fetch, value)?;
                let data = envelope.data;

                for video in data.videos {
                    yield PostSnapshot {
                        id: video.id,
                        caption: video.title,
                        media_url: video.share_url.clone(),
                        thumbnail: video.cover_image_url,
                        timestamp: video
                            .create_time
                            .and_then(|secs| chrono::DateTime::from_timestamp(secs, 0)),
                        permalink: video.share_url,
                    };
                    yielded += 1;
                    if yielded >= MAX_POSTS {
                        break 'pages;
                    }
                }
                match data.cursor {
                    Some(c) if data.has_more => cursor = Some(c),
                    _ => break 'pages,
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter() -> TikTokAdapter {
        TikTokAdapter::new(
            AdapterSettings {
                client_id: "tt-key".into(),
                client_secret: "tt-secret".into(),
                redirect_uri: "https://api.example.com/cb/tiktok".into(),
                api_base: None,
                pkce_verifier: None,
            },
            reqwest::Client::new(),
        )
    }

    #[test]
    fn authorization_url_embeds_user_id_in_state() {
        let url = adapter().authorization_url("user-9").unwrap();
        assert_eq!(url.host_str(), Some("www.tiktok.com"));
        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert!(pairs.contains(&("client_key".into(), "tt-key".into())));
        assert!(pairs.contains(&("state".into(), "user-9".into())));
    }
}
