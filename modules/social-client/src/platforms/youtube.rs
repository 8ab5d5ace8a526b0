//! YouTube adapter.
//!
//! Linking goes through Google OAuth with `access_type=offline`, so the
//! exchange yields a durable refresh token. Refresh delegates to a
//! [`GoogleTokenClient`] built per call — credential state never lives in a
//! shared client object. Profile and uploads come from the YouTube Data API.

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

const AUTH_BASE: &str = "https://accounts.google.com";
const TOKEN_BASE: &str = "https://oauth2.googleapis.com";
const API_BASE: &str = "https://www.googleapis.com";
const SCOPES: &str = "https://www.googleapis.com/auth/youtube.readonly";
const POSTS_PER_PAGE: u32 = 25;
const MAX_POSTS: usize = 50;

pub struct YouTubeAdapter {
    settings: AdapterSettings,
    client: reqwest::Client,
}

impl YouTubeAdapter {
    pub fn new(settings: AdapterSettings, client: reqwest::Client) -> Self {
        Self { settings, client }
    }

    fn auth_base(&self) -> &str {
        self.settings.api_base.as_deref().unwrap_or(AUTH_BASE)
    }

    fn token_base(&self) -> &str {
        self.settings.api_base.as_deref().unwrap_or(TOKEN_BASE)
    }

    fn api_base(&self) -> &str {
        self.settings.api_base.as_deref().unwrap_or(API_BASE)
    }
}

/// Stateful token client in the shape of Google's OAuth2 SDK clients: holds
/// the app credential for one refresh cycle. Built per call so credential
/// state is never shared across concurrent requests.
struct GoogleTokenClient<'a> {
    client_id: &'a str,
    client_secret: &'a str,
    token_url: String,
    http: &'a reqwest::Client,
}

impl GoogleTokenClient<'_> {
    async fn refresh_access_token(&self, refresh_token: &str) -> Result<GoogleRefreshResponse> {
        let form = [
            ("client_id", self.client_id),
            ("client_secret", self.client_secret),
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ];
        let resp = self.http.post(&self.token_url).form(&form).send().await?;
        let value = read_json(Platform::YouTube, CallKind::Refresh, resp).await?;
        decode(Platform::YouTube, CallKind::Refresh, value)
    }
}

#[derive(Deserialize)]
struct GoogleToken {
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
struct GoogleRefreshResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    expires_in: Option<u64>,
    #[serde(default)]
    refresh_token: Option<String>,
}

#[derive(Deserialize)]
struct ChannelList {
    items: Vec<Channel>,
}

#[derive(Deserialize)]
struct Channel {
    id: String,
    snippet: ChannelSnippet,
    #[serde(default)]
    statistics: Option<ChannelStatistics>,
}

// The uploads lookup asks for part=contentDetails only, so it gets its own
// minimal shape.
#[derive(Deserialize)]
struct UploadsChannelList {
    items: Vec<UploadsChannel>,
}

#[derive(Deserialize)]
struct UploadsChannel {
    #[serde(rename = "contentDetails")]
    content_details: ContentDetails,
}

#[derive(Deserialize)]
struct ChannelSnippet {
    title: String,
    #[serde(default)]
    thumbnails: Option<Thumbnails>,
}

#[derive(Deserialize)]
struct ChannelStatistics {
    // The Data API serializes counts as strings.
    #[serde(default, rename = "subscriberCount")]
    subscriber_count: Option<String>,
}

#[derive(Deserialize)]
struct ContentDetails {
    #[serde(rename = "relatedPlaylists")]
    related_playlists: RelatedPlaylists,
}

#[derive(Deserialize)]
struct RelatedPlaylists {
    uploads: String,
}

#[derive(Deserialize)]
struct Thumbnails {
    #[serde(default)]
    default: Option<Thumbnail>,
    #[serde(default)]
    high: Option<Thumbnail>,
}

#[derive(Deserialize)]
struct Thumbnail {
    url: String,
}

#[derive(Deserialize)]
struct PlaylistItemsPage {
    items: Vec<PlaylistItem>,
    #[serde(default, rename = "nextPageToken")]
    next_page_token: Option<String>,
}

#[derive(Deserialize)]
struct PlaylistItem {
    snippet: PlaylistItemSnippet,
}

#[derive(Deserialize)]
struct PlaylistItemSnippet {
    title: String,
    #[serde(default, rename = "publishedAt")]
    published_at: Option<String>,
    #[serde(default)]
    thumbnails: Option<Thumbnails>,
    #[serde(rename = "resourceId")]
    resource_id: ResourceId,
}

#[derive(Deserialize)]
struct ResourceId {
    #[serde(rename = "videoId")]
    video_id: String,
}

#[async_trait]
impl ProviderAdapter for YouTubeAdapter {
    fn platform(&self) -> Platform {
        Platform::YouTube
    }

    fn authorization_url(&self, user_id: &str) -> Result<Url> {
        Ok(Url::parse_with_params(
            &format!("{}/o/oauth2/v2/auth", self.auth_base()),
            &[
                ("client_id", self.settings.client_id.as_str()),
                ("redirect_uri", self.settings.redirect_uri.as_str()),
                ("scope", SCOPES),
                ("response_type", "code"),
                // Offline access so the exchange yields a refresh token.
                ("access_type", "offline"),
                ("prompt", "consent"),
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
            .post(format!("{}/token", self.token_base()))
            .form(&form)
            .send()
            .await?;
        let value = read_json(Platform::YouTube, CallKind::Exchange, resp).await?;
        let token: GoogleToken = decode(Platform::YouTube, CallKind::Exchange, value)?;

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
        if !account.is_access_expired(Utc::now()) {
            return Ok(RefreshOutcome::unchanged(&account.token));
        }

        let refresh_token =
            account
                .refresh_token
                .as_deref()
                .ok_or_else(|| ProviderError::Refresh {
                    platform: Platform::YouTube,
                    detail: "no refresh token on record".to_string(),
                })?;

        tracing::debug!(account_id = %account.id, "refreshing Google access token");
        let token_client = GoogleTokenClient {
            client_id: &self.settings.client_id,
            client_secret: &self.settings.client_secret,
            token_url: format!("{}/token", self.token_base()),
            http: &self.client,
        };
        let renewed = token_client.refresh_access_token(refresh_token).await?;

        // A refresh that comes back without an access token is fatal.
        let access_token = renewed.access_token.ok_or_else(|| ProviderError::Refresh {
            platform: Platform::YouTube,
            detail: "provider returned no access token".to_string(),
        })?;

        let patch = AccountPatch {
            token: Some(access_token.clone()),
            token_expiry: renewed
                .expires_in
                .map(|secs| Utc::now() + Duration::seconds(secs as i64)),
            refresh_token: renewed.refresh_token,
            ..Default::default()
        };
        Ok(RefreshOutcome {
            access_token,
            patch: Some(patch),
        })
    }

    async fn fetch_profile(&self, access_token: &str) -> Result<ProfileSnapshot> {
        let resp = self
            .client
            .get(format!("{}/youtube/v3/channels", self.api_base()))
            .query(&[("part", "snippet,statistics"), ("mine", "true")])
            .bearer_auth(access_token)
            .send()
            .await?;
        let value = read_json(Platform::YouTube, CallKind::Fetch, resp).await?;
        let list: ChannelList = decode(Platform::YouTube, CallKind::Fetch, value)?;
        let channel = list
            .items
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::InvalidResponse {
                platform: Platform::YouTube,
                detail: "no channel for the authorized account".to_string(),
            })?;

        Ok(ProfileSnapshot {
            id: channel.id,
            display_name: channel.snippet.title,
            avatar_url: channel
                .snippet
                .thumbnails
                .and_then(|t| t.default.or(t.high))
                .map(|t| t.url),
            follower_count: channel
                .statistics
                .and_then(|s| s.subscriber_count)
                .and_then(|count| count.parse().ok()),
        })
    }

    fn recent_posts<'a>(
        &'a self,
        access_token: &'a str,
    ) -> BoxStream<'a, Result<PostSnapshot>> {
        Box::pin(try_stream! {
            // Uploads live in a well-known playlist resolved per channel.
            let resp = self
                .client
                .get(format!("{}/youtube/v3/channels", self.api_base()))
                .query(&[("part", "contentDetails"), ("mine", "true")])
                .bearer_auth(access_token)
                .send()
                .await?;
            let value = read_json(Platform::YouTube, CallKind::Fetch, resp).await?;
            let list: UploadsChannelList = decode(Platform::YouTube, CallKind::Fetch, value)?;
            let uploads = list
                .items
                .into_iter()
                .next()
                .ok_or_else(|| ProviderError::InvalidResponse {
                    platform: Platform::YouTube,
                    detail: "no uploads playlist for the authorized account".to_string(),
                })?
                .content_details
                .related_playlists
                .uploads;

            let max = POSTS_PER_PAGE.to_string();
            let mut page_token: Option<String> = None;
            let mut yielded = 0usize;
            'pages: loop {
                let mut req = self
                    .client
                    .get(format!("{}/youtube/v3/playlistItems", self.api_base()))
                    .query(&[
                        ("part", "snippet"),
                        ("playlistId", uploads.as_str()),
                        ("maxResults", max.as_str()),
                    ])
                    .bearer_auth(access_token);
                if let Some(token) = &page_token {
                    req = req.query(&[("pageToken", token.as_str())]);
                }
                let resp = req.send().await?;
                let value = read_json(Platform::YouTube, CallKind::Fetch, resp).await?;
                let page: PlaylistItemsPage = decode(Platform::YouTube, CallKind::Fetch, value)?;

                for item in page.items {
                    let snippet = item.snippet;
                    let video_id = snippet.resource_id.video_id;
                    yield PostSnapshot {
                        permalink: Some(format!("https://www.youtube.com/watch?v={video_id}")),
                        id: video_id,
                        caption: Some(snippet.title),
                        media_url: None,
                        thumbnail: snippet
                            .thumbnails
                            .and_then(|t| t.high.or(t.default))
                            .map(|t| t.url),
                        timestamp: snippet
                            .published_at
                            .as_deref()
                            .and_then(parse_timestamp),
                    };
                    yielded += 1;
                    if yielded >= MAX_POSTS {
                        break 'pages;
                    }
                }
                match page.next_page_token {
                    Some(token) => page_token = Some(token),
                    None => break 'pages,
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter() -> YouTubeAdapter {
        YouTubeAdapter::new(
            AdapterSettings {
                client_id: "yt-client".into(),
                client_secret: "yt-secret".into(),
                redirect_uri: "https://api.example.com/cb/youtube".into(),
                api_base: None,
                pkce_verifier: None,
            },
            reqwest::Client::new(),
        )
    }

    #[test]
    fn authorization_url_embeds_user_id_in_state() {
        let url = adapter().authorization_url("user-3").unwrap();
        assert_eq!(url.host_str(), Some("accounts.google.com"));
        let state = url
            .query_pairs()
            .find(|(k, _)| k == "state")
            .map(|(_, v)| v.into_owned());
        assert_eq!(state.as_deref(), Some("user-3"));
    }

    #[test]
    fn authorization_url_requests_offline_access() {
        let url = adapter().authorization_url("u").unwrap();
        assert!(url
            .query_pairs()
            .any(|(k, v)| k == "access_type" && v == "offline"));
    }
}
