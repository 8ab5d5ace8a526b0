//! Instagram adapter.
//!
//! Code exchange is two hops: the authorization code buys a short-lived
//! token on `api.instagram.com`, which is then traded for a ~60-day
//! long-lived token on `graph.instagram.com`. Refresh is expiry-gated:
//! a live token is returned as-is, an expired one is renewed through
//! `/refresh_access_token`.

use async_stream::try_stream;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use creatorlink_common::{Account, AccountPatch, Platform};
use futures::stream::BoxStream;
use serde::Deserialize;
use url::Url;

use crate::adapter::ProviderAdapter;
use crate::error::Result;
use crate::http::{decode, parse_timestamp, read_json, CallKind};
use crate::types::{AdapterSettings, PostSnapshot, ProfileSnapshot, RefreshOutcome, TokenBundle};

const AUTH_BASE: &str = "https://api.instagram.com";
const API_BASE: &str = "https://graph.instagram.com";
const SCOPES: &str = "user_profile,user_media";
const POSTS_PER_PAGE: u32 = 25;
const MAX_POSTS: usize = 50;

pub struct InstagramAdapter {
    settings: AdapterSettings,
    client: reqwest::Client,
}

impl InstagramAdapter {
    pub fn new(settings: AdapterSettings, client: reqwest::Client) -> Self {
        Self { settings, client }
    }

    fn auth_base(&self) -> &str {
        self.settings.api_base.as_deref().unwrap_or(AUTH_BASE)
    }

    fn api_base(&self) -> &str {
        self.settings.api_base.as_deref().unwrap_or(API_BASE)
    }
}

#[derive(Deserialize)]
struct ShortLivedToken {
    access_token: String,
}

#[derive(Deserialize)]
struct LongLivedToken {
    access_token: String,
    #[serde(default)]
    token_type: Option<String>,
    expires_in: u64,
}

#[derive(Deserialize)]
struct IgProfile {
    id: String,
    username: String,
    #[serde(default)]
    followers_count: Option<u64>,
    #[serde(default)]
    profile_picture_url: Option<String>,
}

#[derive(Deserialize)]
struct MediaPage {
    data: Vec<MediaItem>,
    #[serde(default)]
    paging: Option<Paging>,
}

#[derive(Deserialize)]
struct MediaItem {
    id: String,
    #[serde(default)]
    caption: Option<String>,
    #[serde(default)]
    media_url: Option<String>,
    #[serde(default)]
    thumbnail_url: Option<String>,
    #[serde(default)]
    timestamp: Option<String>,
    #[serde(default)]
    permalink: Option<String>,
}

#[derive(Deserialize)]
struct Paging {
    #[serde(default)]
    cursors: Option<Cursors>,
}

#[derive(Deserialize)]
struct Cursors {
    #[serde(default)]
    after: Option<String>,
}

#[async_trait]
impl ProviderAdapter for InstagramAdapter {
    fn platform(&self) -> Platform {
        Platform::Instagram
    }

    fn authorization_url(&self, user_id: &str) -> Result<Url> {
        Ok(Url::parse_with_params(
            &format!("{}/oauth/authorize", self.auth_base()),
            &[
                ("client_id", self.settings.client_id.as_str()),
                ("redirect_uri", self.settings.redirect_uri.as_str()),
                ("scope", SCOPES),
                ("response_type", "code"),
                ("state", user_id),
            ],
        )?)
    }

    async fn exchange_code(&self, code: &str) -> Result<TokenBundle> {
        let form = [
            ("client_id", self.settings.client_id.as_str()),
            ("client_secret", self.settings.client_secret.as_str()),
            ("grant_type", "authorization_code"),
            ("redirect_uri", self.settings.redirect_uri.as_str()),
            ("code", code),
        ];
        let resp = self
            .client
            .post(format!("{}/oauth/access_token", self.auth_base()))
            .form(&form)
            .send()
            .await?;
        let value = read_json(Platform::Instagram, CallKind::Exchange, resp).await?;
        let short: ShortLivedToken = decode(Platform::Instagram, CallKind::Exchange, value)?;

        let resp = self
            .client
            .get(format!("{}/access_token", self.api_base()))
            .query(&[
                ("grant_type", "ig_exchange_token"),
                ("client_secret", self.settings.client_secret.as_str()),
                ("access_token", short.access_token.as_str()),
            ])
            .send()
            .await?;
        let value = read_json(Platform::Instagram, CallKind::Exchange, resp).await?;
        let long: LongLivedToken = decode(Platform::Instagram, CallKind::Exchange, value)?;

        Ok(TokenBundle {
            access_token: long.access_token,
            refresh_token: None,
            expires_in: Some(long.expires_in),
            refresh_expires_in: None,
            scope: None,
            token_type: long.token_type,
        })
    }

    async fn refresh(&self, account: &Account) -> Result<RefreshOutcome> {
        if !account.is_access_expired(Utc::now()) {
            return Ok(RefreshOutcome::unchanged(&account.token));
        }

        tracing::debug!(account_id = %account.id, "refreshing long-lived Instagram token");
        let resp = self
            .client
            .get(format!("{}/refresh_access_token", self.api_base()))
            .query(&[
                ("grant_type", "ig_refresh_token"),
                ("access_token", account.token.as_str()),
            ])
            .send()
            .await?;
        let value = read_json(Platform::Instagram, CallKind::Refresh, resp).await?;
        let renewed: LongLivedToken = decode(Platform::Instagram, CallKind::Refresh, value)?;

        let patch = AccountPatch {
            token: Some(renewed.access_token.clone()),
            token_expiry: Some(Utc::now() + Duration::seconds(renewed.expires_in as i64)),
            ..Default::default()
        };
        Ok(RefreshOutcome {
            access_token: renewed.access_token,
            patch: Some(patch),
        })
    }

    async fn fetch_profile(&self, access_token: &str) -> Result<ProfileSnapshot> {
        let resp = self
            .client
            .get(format!("{}/me", self.api_base()))
            .query(&[
                ("fields", "id,username,followers_count,profile_picture_url"),
                ("access_token", access_token),
            ])
            .send()
            .await?;
        let value = read_json(Platform::Instagram, CallKind::Fetch, resp).await?;
        let profile: IgProfile = decode(Platform::Instagram, CallKind::Fetch, value)?;
        Ok(ProfileSnapshot {
            id: profile.id,
            display_name: profile.username,
            avatar_url: profile.profile_picture_url,
            follower_count: profile.followers_count,
        })
    }

    fn recent_posts<'a>(
        &'a self,
        access_token: &'a str,
    ) -> BoxStream<'a, Result<PostSnapshot>> {
        Box::pin(try_stream! {
            let limit = POSTS_PER_PAGE.to_string();
            let mut after: Option<String> = None;
            let mut yielded = 0usize;
            'pages: loop {
                let mut req = self
                    .client
                    .get(format!("{}/me/media", self.api_base()))
                    .query(&[
                        ("fields", "id,caption,media_url,thumbnail_url,timestamp,permalink"),
                        ("limit", limit.as_str()),
                        ("access_token", access_token),
                    ]);
                if let Some(cursor) = &after {
                    req = req.query(&[("after", cursor.as_str())]);
                }
                let resp = req.send().await?;
                let value = read_json(Platform::Instagram, CallKind::Fetch, resp).await?;
                let page: MediaPage = decode(Platform::Instagram, CallKind::Fetch, value)?;

                let empty = page.data.is_empty();
                for item in page.data {
                    yield PostSnapshot {
                        id: item.id,
                        caption: item.caption,
                        media_url: item.media_url,
                        thumbnail: item.thumbnail_url,
                        timestamp: item.timestamp.as_deref().and_then(parse_timestamp),
                        permalink: item.permalink,
                    };
                    yielded += 1;
                    if yielded >= MAX_POSTS {
                        break 'pages;
                    }
                }
                match page.paging.and_then(|p| p.cursors).and_then(|c| c.after) {
                    Some(cursor) if !empty => after = Some(cursor),
                    _ => break 'pages,
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter() -> InstagramAdapter {
        InstagramAdapter::new(
            AdapterSettings {
                client_id: "ig-client".into(),
                client_secret: "ig-secret".into(),
                redirect_uri: "https://api.example.com/cb/instagram".into(),
                api_base: None,
                pkce_verifier: None,
            },
            reqwest::Client::new(),
        )
    }

    #[test]
    fn authorization_url_embeds_user_id_in_state() {
        let url = adapter().authorization_url("user-42").unwrap();
        assert_eq!(url.host_str(), Some("api.instagram.com"));
        assert_eq!(url.path(), "/oauth/authorize");
        let state = url
            .query_pairs()
            .find(|(k, _)| k == "state")
            .map(|(_, v)| v.into_owned());
        assert_eq!(state.as_deref(), Some("user-42"));
    }

    #[test]
    fn authorization_url_requests_read_scopes() {
        let url = adapter().authorization_url("u").unwrap();
        let scope = url
            .query_pairs()
            .find(|(k, _)| k == "scope")
            .map(|(_, v)| v.into_owned())
            .unwrap();
        assert_eq!(scope, "user_profile,user_media");
    }
}
