use async_trait::async_trait;
use creatorlink_common::{Account, Platform};
use futures::stream::BoxStream;
use futures::TryStreamExt;
use url::Url;

use crate::error::Result;
use crate::types::{PostSnapshot, ProfileSnapshot, ProviderPage, RefreshOutcome, TokenBundle};

/// One social platform's linking capability: authorization URL construction,
/// code exchange, token refresh under the platform's renewal policy, and
/// normalized profile/post reads.
///
/// Refresh is a command/result operation: the adapter decides whether the
/// stored credential is still usable, performs at most one provider call,
/// and hands back the token plus any field updates as a patch for the caller
/// to persist. Adapters never touch storage. There is deliberately no
/// cross-request coordination here: concurrent refreshes of the same expired
/// account each hit the provider, and on rotating-token platforms the loser
/// surfaces a refresh error because the winner already invalidated the old
/// refresh token.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    fn platform(&self) -> Platform;

    /// Consent-page URL for `user_id`. Deterministic; the user id travels in
    /// the `state` parameter so the callback can recover it.
    fn authorization_url(&self, user_id: &str) -> Result<Url>;

    /// Trade an authorization code for token material. One round trip, two
    /// on platforms that require a short-lived to long-lived exchange.
    async fn exchange_code(&self, code: &str) -> Result<TokenBundle>;

    /// Resolve a usable access token for `account`, refreshing per the
    /// platform policy.
    async fn refresh(&self, account: &Account) -> Result<RefreshOutcome>;

    async fn fetch_profile(&self, access_token: &str) -> Result<ProfileSnapshot>;

    /// Recent posts as a lazy, finite stream: pages are fetched as the
    /// stream is polled, and one call's stream cannot be restarted.
    fn recent_posts<'a>(
        &'a self,
        access_token: &'a str,
    ) -> BoxStream<'a, Result<PostSnapshot>>;

    /// Profile plus collected posts. The exact union of `fetch_profile` and
    /// `recent_posts`; no third network path.
    async fn fetch_page(&self, access_token: &str) -> Result<ProviderPage> {
        let profile = self.fetch_profile(access_token).await?;
        let posts = self.recent_posts(access_token).try_collect().await?;
        Ok(ProviderPage { profile, posts })
    }
}
