//! Enrichment pipeline: stored account + live provider page, cache-fronted.

use chrono::Utc;
use creatorlink_common::Account;
use creatorlink_store::{DocumentStore, KvCache};
use serde::{Deserialize, Serialize};
use social_client::{PostSnapshot, ProviderAdapter, ProviderPage};
use tracing::debug;
use uuid::Uuid;

use crate::accounts::AccountStore;
use crate::cache::EnrichmentCache;
use crate::error::LinkError;
use crate::traits::Adapters;

/// The merged view an account read returns: stored fields with live profile
/// data layered on top, plus the recent posts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichedAccount {
    #[serde(flatten)]
    pub account: Account,
    pub avatar_url: Option<String>,
    pub posts: Vec<PostSnapshot>,
}

/// Resolve the enriched view for one account.
///
/// Cache first: an entry inside its horizon is returned as-is. Otherwise
/// the full pipeline runs — load, refresh (persisting any token patch the
/// adapter hands back), live fetch, merge, cache overwrite. Either the
/// whole pipeline succeeds or the error surfaces; no partial views. The
/// cache is an optimization only: a missing or unreadable entry simply
/// means the pipeline runs, with no read-side locking. Concurrent calls
/// past the horizon each refresh independently; see the adapter contract
/// for what that means on rotating-token platforms.
pub async fn enriched_account<A, S, C>(
    adapters: &A,
    accounts: &AccountStore<S>,
    cache: &EnrichmentCache<C>,
    account_id: Uuid,
) -> Result<EnrichedAccount, LinkError>
where
    A: Adapters + ?Sized,
    S: DocumentStore,
    C: KvCache,
{
    if let Some(entry) = cache.get(account_id).await? {
        if Utc::now() < entry.expires_at {
            debug!(%account_id, "enrichment cache hit");
            return Ok(entry.account);
        }
        debug!(%account_id, "enrichment cache entry past horizon, refetching");
    }

    let mut account = accounts
        .get(account_id)
        .await?
        .ok_or(LinkError::AccountNotFound(account_id))?;
    let adapter = adapters.adapter(account.platform);

    let outcome = adapter.refresh(&account).await?;
    if let Some(patch) = outcome.patch {
        account = accounts.apply_patch(account_id, &patch).await?;
    }

    let page = adapter.fetch_page(&outcome.access_token).await?;
    let merged = merge_live(account, page);
    cache.put(account_id, &merged).await?;
    Ok(merged)
}

/// Live provider fields win over what was stored at link time.
fn merge_live(mut account: Account, page: ProviderPage) -> EnrichedAccount {
    account.username = Some(page.profile.display_name.clone());
    if let Some(count) = page.profile.follower_count {
        account.followers = Some(count);
    }
    EnrichedAccount {
        account,
        avatar_url: page.profile.avatar_url,
        posts: page.posts,
    }
}
