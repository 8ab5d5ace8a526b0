//! LinkedIn adapter.
//!
//! Three-legged OAuth with programmatic refresh: past the access token's
//! expiry, one call to the token endpoint with the stored refresh token
//! yields a new access token (and, for apps enrolled in refresh-token
//! rotation, a new refresh token pair). Profile comes from the OIDC
//! userinfo endpoint; posts from the member's UGC feed, offset-paged.

use async_stream::try_stream;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use creatorlink_common::{Account, AccountPatch, Platform};
use futures::stream::BoxStream;
use serde::Deserialize;
use url::Url;

use crate::adapter::ProviderAdapter;
use crate::error::{ProviderError, Result};
use crate::http::{decode, read_json, CallKind};
use crate::types::{AdapterSettings, PostSnapshot, ProfileSnapshot, RefreshOutcome, TokenBundle};

const AUTH_BASE: &str = "https://www.linkedin.com";
const API_BASE: &str = "https://api.linkedin.com";
const SCOPES: &str = "openid profile w_member_social";
const POSTS_PER_PAGE: usize = 25;
const MAX_POSTS: usize = 50;

pub struct LinkedInAdapter {
    settings: AdapterSettings,
    client: reqwest::Client,
}

impl LinkedInAdapter {
    pub fn new(settings: AdapterSettings, client: reqwest::Client) -> Self {
        Self { settings, client }
    }

    fn auth_base(&self) -> &str {
        self.settings.api_base.as_deref().unwrap_or(AUTH_BASE)
    }

    fn api_base(&self) -> &str {
        self.settings.api_base.as_deref().unwrap_or(API_BASE)
    }

    async fn token_call(&self, kind: CallKind, form: &[(&str, &str)]) -> Result<LinkedInToken> {
        let resp = self
            .client
            .post(format!("{}/oauth/v2/accessToken", self.auth_base()))
            .form(form)
            .send()
            .await?;
        let value = read_json(Platform::LinkedIn, kind, resp).await?;
        decode(Platform::LinkedIn, kind, value)
    }
}

#[derive(Deserialize)]
struct LinkedInToken {
    access_token: String,
    expires_in: u64,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    refresh_token_expires_in: Option<u64>,
    #[serde(default)]
    scope: Option<String>,
}

#[derive(Deserialize)]
struct UserInfo {
    sub: String,
    name: String,
    #[serde(default)]
    picture: Option<String>,
}

#[derive(Deserialize)]
struct UgcPage {
    elements: Vec<UgcPost>,
}

#[derive(Deserialize)]
struct UgcPost {
    id: String,
    #[serde(default)]
    created: Option<UgcCreated>,
    #[serde(default, rename = "specificContent")]
    specific_content: Option<UgcSpecificContent>,
}

#[derive(Deserialize)]
struct UgcCreated {
    // Epoch milliseconds.
    time: i64,
}

#[derive(Deserialize)]
struct UgcSpecificContent {
    #[serde(default, rename = "com.linkedin.ugc.ShareContent")]
    share_content: Option<UgcShareContent>,
}

#[derive(Deserialize)]
struct UgcShareContent {
    #[serde(default, rename = "shareCommentary")]
    share_commentary: Option<UgcText>,
}

#[derive(Deserialize)]
struct UgcText {
    text: String,
}

#[async_trait]
impl ProviderAdapter for LinkedInAdapter {
    fn platform(&self) -> Platform {
        Platform::LinkedIn
    }

    fn authorization_url(&self, user_id: &str) -> Result<Url> {
        Ok(Url::parse_with_params(
            &format!("{}/oauth/v2/authorization", self.auth_base()),
            &[
                ("response_type", "code"),
                ("client_id", self.settings.client_id.as_str()),
                ("redirect_uri", self.settings.redirect_uri.as_str()),
                ("scope", SCOPES),
                ("state", user_id),
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
                    ("client_id", self.settings.client_id.as_str()),
                    ("client_secret", self.settings.client_secret.as_str()),
                    ("redirect_uri", self.settings.redirect_uri.as_str()),
                ],
            )
            .await?;

        Ok(TokenBundle {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            expires_in: Some(token.expires_in),
            refresh_expires_in: token.refresh_token_expires_in,
            scope: token.scope,
            token_type: None,
        })
    }

    async fn refresh(&self, account: &Account) -> Result<RefreshOutcome> {
        if !account.is_access_expired(Utc::now()) {
            return Ok(RefreshOutcome::unchanged(&account.token));
        }

        let refresh_token =
            account
                .refresh_token
                .as_deref()
                .ok_or_else(|| ProviderError::Refresh {
                    platform: Platform::LinkedIn,
                    detail: "no refresh token on record".to_string(),
                })?;

        tracing::debug!(account_id = %account.id, "refreshing LinkedIn access token");
        let token = self
            .token_call(
                CallKind::Refresh,
                &[
                    ("grant_type", "refresh_token"),
                    ("refresh_token", refresh_token),
                    ("client_id", self.settings.client_id.as_str()),
                    ("client_secret", self.settings.client_secret.as_str()),
                ],
            )
            .await?;

        let now = Utc::now();
        let patch = AccountPatch {
            token: Some(token.access_token.clone()),
            token_expiry: Some(now + Duration::seconds(token.expires_in as i64)),
            refresh_token: token.refresh_token,
            refresh_token_expiry: token
                .refresh_token_expires_in
                .map(|secs| now + Duration::seconds(secs as i64)),
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
            .get(format!("{}/v2/userinfo", self.api_base()))
            .bearer_auth(access_token)
            .send()
            .await?;
        let value = read_json(Platform::LinkedIn, CallKind::Fetch, resp).await?;
        let info: UserInfo = decode(Platform::LinkedIn, CallKind::Fetch, value)?;
        Ok(ProfileSnapshot {
            id: info.sub,
            display_name: info.name,
            avatar_url: info.picture,
            // Follower counts need a partner-program scope; not exposed here.
            follower_count: None,
        })
    }

    fn recent_posts<'a>(
        &'a self,
        access_token: &'a str,
    ) -> BoxStream<'a, Result<PostSnapshot>> {
        Box::pin(try_stream! {
            let profile = self.fetch_profile(access_token).await?;
            let author = format!("List(urn:li:person:{})", profile.id);

            let count = POSTS_PER_PAGE.to_string();
            let mut start = 0usize;
            let mut yielded = 0usize;
            'pages: loop {
                let resp = self
                    .client
                    .get(format!("{}/v2/ugcPosts", self.api_base()))
                    .query(&[
                        ("q", "authors"),
                        ("authors", author.as_str()),
                        ("count", count.as_str()),
                        ("start", start.to_string().as_str()),
                    ])
                    .bearer_auth(access_token)
                    .send()
                    .await?;
                let value = read_json(Platform::LinkedIn, CallKind::Fetch, resp).await?;
                let page: UgcPage = decode(Platform::LinkedIn, CallKind::Fetch, value)?;

                let fetched = page.elements.len();
                for post in page.elements {
                    let caption = post
                        .specific_content
                        .and_then(|c| c.share_content)
                        .and_then(|s| s.share_commentary)
                        .map(|t| t.text);
                    yield PostSnapshot {
                        permalink: Some(format!(
                            "https://www.linkedin.com/feed/update/{}",
                            post.id
                        )),
                        id: post.id,
                        caption,
                        media_url: None,
                        thumbnail: None,
                        timestamp: post
                            .created
                            .and_then(|c| chrono::DateTime::from_timestamp_millis(c.time)),
                    };
                    yielded += 1;
                    if yielded >= MAX_POSTS {
                        break 'pages;
                    }
                }
                if fetched < POSTS_PER_PAGE {
                    break 'pages;
                }
                start += fetched;
            }
        })
    }
}
