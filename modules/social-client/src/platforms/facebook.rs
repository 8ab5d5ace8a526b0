//! Facebook adapter.
//!
//! Exchange is two hops: the code buys a short-lived user token, which is
//! immediately traded for a ~60-day long-lived one via `fb_exchange_token`.
//! There is no server-side renewal for long-lived user tokens, so `refresh`
//! hands back the stored token unchanged even past its expiry; re-linking is
//! the only recovery. That is the platform's limitation, not ours to paper
//! over.

use async_stream::try_stream;
use async_trait::async_trait;
use creatorlink_common::{Account, Platform};
use futures::stream::BoxStream;
use serde::Deserialize;
use url::Url;

use crate::adapter::ProviderAdapter;
use crate::error::Result;
use crate::http::{decode, parse_timestamp, read_json, CallKind};
use crate::types::{AdapterSettings, PostSnapshot, ProfileSnapshot, RefreshOutcome, TokenBundle};

const AUTH_BASE: &str = "https://www.facebook.com";
const API_BASE: &str = "https://graph.facebook.com";
const GRAPH_VERSION: &str = "v19.0";
const SCOPES: &str = "public_profile";
const POSTS_PER_PAGE: u32 = 25;
const MAX_POSTS: usize = 50;

pub struct FacebookAdapter {
    settings: AdapterSettings,
    client: reqwest::Client,
}

impl FacebookAdapter {
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
struct FbToken {
    access_token: String,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    expires_in: Option<u64>,
}

#[derive(Deserialize)]
struct FbProfile {
    id: String,
    name: String,
    #[serde(default)]
    followers_count: Option<u64>,
    #[serde(default)]
    picture: Option<FbPicture>,
}

#[derive(Deserialize)]
struct FbPicture {
    data: FbPictureData,
}

#[derive(Deserialize)]
struct FbPictureData {
    #[serde(default)]
    url: Option<String>,
}

#[derive(Deserialize)]
struct PostsPage {
    data: Vec<FbPost>,
    #[serde(default)]
    paging: Option<Paging>,
}

#[derive(Deserialize)]
struct FbPost {
    id: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    full_picture: Option<String>,
    #[serde(default)]
    created_time: Option<String>,
    #[serde(default)]
    permalink_url: Option<String>,
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
impl ProviderAdapter for FacebookAdapter {
    fn platform(&self) -> Platform {
        Platform::Facebook
    }

    fn authorization_url(&self, user_id: &str) -> Result<Url> {
        Ok(Url::parse_with_params(
            &format!("{}/{GRAPH_VERSION}/dialog/oauth", self.auth_base()),
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
        let resp = self
            .client
            .get(format!(
                "{}/{GRAPH_VERSION}/oauth/access_token",
                self.api_base()
            ))
            .query(&[
                ("client_id", self.settings.client_id.as_str()),
                ("client_secret", self.settings.client_secret.as_str()),
                ("redirect_uri", self.settings.redirect_uri.as_str()),
                ("code", code),
            ])
            .send()
            .await?;
        let value = read_json(Platform::Facebook, CallKind::Exchange, resp).await?;
        let short: FbToken = decode(Platform::Facebook, CallKind::Exchange, value)?;

        // Second hop: short-lived user token -> long-lived user token.
        let resp = self
            .client
            .get(format!(
                "{}/{GRAPH_VERSION}/oauth/access_token",
                self.api_base()
            ))
            .query(&[
                ("grant_type", "fb_exchange_token"),
                ("client_id", self.settings.client_id.as_str()),
                ("client_secret", self.settings.client_secret.as_str()),
                ("fb_exchange_token", short.access_token.as_str()),
            ])
            .send()
            .await?;
        let value = read_json(Platform::Facebook, CallKind::Exchange, resp).await?;
        let long: FbToken = decode(Platform::Facebook, CallKind::Exchange, value)?;

        Ok(TokenBundle {
            access_token: long.access_token,
            refresh_token: None,
            expires_in: long.expires_in,
            refresh_expires_in: None,
            scope: None,
            token_type: long.token_type,
        })
    }

    async fn refresh(&self, account: &Account) -> Result<RefreshOutcome> {
        // No renewal endpoint for long-lived user tokens; stored token is
        // returned even when token_expiry has passed.
        Ok(RefreshOutcome::unchanged(&account.token))
    }

    async fn fetch_profile(&self, access_token: &str) -> Result<ProfileSnapshot> {
        let resp = self
            .client
            .get(format!("{}/{GRAPH_VERSION}/me", self.api_base()))
            .query(&[
                ("fields", "id,name,followers_count,picture{url}"),
                ("access_token", access_token),
            ])
            .send()
            .await?;
        let value = read_json(Platform::Facebook, CallKind::Fetch, resp).await?;
        let profile: FbProfile = decode(Platform::Facebook, CallKind::Fetch, value)?;
        Ok(ProfileSnapshot {
            id: profile.id,
            display_name: profile.name,
            avatar_url: profile.picture.and_then(|p| p.data.url),
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
                    .get(format!("{}/{GRAPH_VERSION}/me/posts", self.api_base()))
                    .query(&[
                        ("fields", "id,message,full_picture,created_time,permalink_url"),
                        ("limit", limit.as_str()),
                        ("access_token", access_token),
                    ]);
                if let Some(cursor) = &after {
                    req = req.query(&[("after", cursor.as_str())]);
                }
                let resp = req.send().await?;
                let value = read_json(Platform::Facebook, CallKind::Fetch, resp).await?;
                let page: PostsPage = decode(Platform::Facebook, CallKind::Fetch, value)?;

                let empty = page.data.is_empty();
                for post in page.data {
                    yield PostSnapshot {
                        id: post.id,
                        caption: post.message,
                        media_url: post.full_picture.clone(),
                        thumbnail: post.full_picture,
                        timestamp: post.created_time.as_deref().and_then(parse_timestamp),
                        permalink: post.permalink_url,
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

    fn adapter() -> FacebookAdapter {
        FacebookAdapter::new(
            AdapterSettings {
                client_id: "fb-client".into(),
                client_secret: "fb-secret".into(),
                redirect_uri: "https://api.example.com/cb/facebook".into(),
                api_base: None,
                pkce_verifier: None,
            },
            reqwest::Client::new(),
        )
    }

    #[test]
    fn authorization_url_embeds_user_id_in_state() {
        let url = adapter().authorization_url("user-7").unwrap();
        assert_eq!(url.host_str(), Some("www.facebook.com"));
        assert_eq!(url.path(), "/v19.0/dialog/oauth");
        let state = url
            .query_pairs()
            .find(|(k, _)| k == "state")
            .map(|(_, v)| v.into_owned());
        assert_eq!(state.as_deref(), Some("user-7"));
    }
}
