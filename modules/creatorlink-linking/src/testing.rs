//! Scripted adapter for orchestrator and pipeline tests: no network, call
//! counts observable.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use creatorlink_common::{Account, AccountPatch, Platform};
use futures::stream::{self, BoxStream};
use url::Url;

use social_client::{
    PostSnapshot, ProfileSnapshot, ProviderAdapter, ProviderError, ProviderPage, RefreshOutcome,
    Result, TokenBundle,
};

use crate::traits::Adapters;

enum RefreshScript {
    Unchanged,
    Rotate {
        access_token: String,
        patch: AccountPatch,
    },
    Fail(String),
}

pub struct MockAdapter {
    platform: Platform,
    exchange_bundle: Option<TokenBundle>,
    refresh_script: RefreshScript,
    page: ProviderPage,
    pub exchange_calls: AtomicUsize,
    pub refresh_calls: AtomicUsize,
    pub fetch_calls: AtomicUsize,
}

impl MockAdapter {
    pub fn new(platform: Platform) -> Self {
        Self {
            platform,
            exchange_bundle: Some(TokenBundle {
                access_token: "mock-access".into(),
                refresh_token: Some("mock-refresh".into()),
                expires_in: Some(3600),
                refresh_expires_in: None,
                scope: Some("read".into()),
                token_type: Some("bearer".into()),
            }),
            refresh_script: RefreshScript::Unchanged,
            page: ProviderPage {
                profile: ProfileSnapshot {
                    id: "profile-1".into(),
                    display_name: "mock.creator".into(),
                    avatar_url: Some("https://cdn.example.com/mock.jpg".into()),
                    follower_count: Some(1200),
                },
                posts: vec![PostSnapshot {
                    id: "post-1".into(),
                    caption: Some("hello".into()),
                    media_url: None,
                    thumbnail: None,
                    timestamp: None,
                    permalink: None,
                }],
            },
            exchange_calls: AtomicUsize::new(0),
            refresh_calls: AtomicUsize::new(0),
            fetch_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_exchange(mut self, bundle: TokenBundle) -> Self {
        self.exchange_bundle = Some(bundle);
        self
    }

    pub fn failing_exchange(mut self) -> Self {
        self.exchange_bundle = None;
        self
    }

    pub fn with_refresh_patch(mut self, access_token: &str, patch: AccountPatch) -> Self {
        self.refresh_script = RefreshScript::Rotate {
            access_token: access_token.to_string(),
            patch,
        };
        self
    }

    pub fn failing_refresh(mut self, detail: &str) -> Self {
        self.refresh_script = RefreshScript::Fail(detail.to_string());
        self
    }

    pub fn with_page(mut self, page: ProviderPage) -> Self {
        self.page = page;
        self
    }

    pub fn fetches(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProviderAdapter for MockAdapter {
    fn platform(&self) -> Platform {
        self.platform
    }

    fn authorization_url(&self, user_id: &str) -> Result<Url> {
        Ok(Url::parse_with_params(
            &format!("https://auth.example.com/{}/authorize", self.platform),
            &[("state", user_id)],
        )?)
    }

    async fn exchange_code(&self, code: &str) -> Result<TokenBundle> {
        self.exchange_calls.fetch_add(1, Ordering::SeqCst);
        self.exchange_bundle
            .clone()
            .ok_or_else(|| ProviderError::AuthExchange {
                platform: self.platform,
                detail: format!("scripted rejection for code {code}"),
            })
    }

    async fn refresh(&self, account: &Account) -> Result<RefreshOutcome> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        match &self.refresh_script {
            RefreshScript::Unchanged => Ok(RefreshOutcome::unchanged(&account.token)),
            RefreshScript::Rotate {
                access_token,
                patch,
            } => Ok(RefreshOutcome {
                access_token: access_token.clone(),
                patch: Some(patch.clone()),
            }),
            RefreshScript::Fail(detail) => Err(ProviderError::Refresh {
                platform: self.platform,
                detail: detail.clone(),
            }),
        }
    }

    async fn fetch_profile(&self, _access_token: &str) -> Result<ProfileSnapshot> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.page.profile.clone())
    }

    fn recent_posts<'a>(
        &'a self,
        _access_token: &'a str,
    ) -> BoxStream<'a, Result<PostSnapshot>> {
        Box::pin(stream::iter(self.page.posts.clone().into_iter().map(Ok)))
    }
}

/// A mock doubles as its own single-adapter registry.
impl Adapters for MockAdapter {
    fn adapter(&self, _platform: Platform) -> &dyn ProviderAdapter {
        self
    }
}
