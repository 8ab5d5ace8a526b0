//! The two cache surfaces over the key-value seam.
//!
//! Pending registrations bridge the pre-auth form to the callback: staged
//! before the redirect, consumed exactly once after the account write. No
//! TTL — an abandoned linking attempt leaves its entry in place until the
//! same user starts another attempt, which overwrites it.
//!
//! The enrichment cache is a best-effort read optimization with a fixed
//! one-hour horizon stored inside the value; staleness is judged by the
//! reader, and anything unreadable counts as a miss.

use chrono::{DateTime, Duration, Utc};
use creatorlink_store::{KvCache, StoreError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;
use uuid::Uuid;

use crate::enrich::EnrichedAccount;

pub struct PendingRegistrations<C> {
    cache: C,
}

impl<C: KvCache> PendingRegistrations<C> {
    pub fn new(cache: C) -> Self {
        Self { cache }
    }

    fn key(user_id: &str) -> String {
        format!("pending:{user_id}")
    }

    /// Stage listing fields for a user about to be redirected. A second
    /// attempt for the same user overwrites the first.
    pub async fn stage(&self, user_id: &str, fields: Value) -> Result<(), StoreError> {
        self.cache.set(&Self::key(user_id), fields).await
    }

    pub async fn peek(&self, user_id: &str) -> Result<Option<Value>, StoreError> {
        self.cache.get(&Self::key(user_id)).await
    }

    pub async fn clear(&self, user_id: &str) -> Result<(), StoreError> {
        self.cache.delete(&Self::key(user_id)).await
    }
}

/// What the enrichment cache stores per account id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedEnrichedAccount {
    pub account: EnrichedAccount,
    pub expires_at: DateTime<Utc>,
}

pub struct EnrichmentCache<C> {
    cache: C,
}

impl<C: KvCache> EnrichmentCache<C> {
    pub fn new(cache: C) -> Self {
        Self { cache }
    }

    /// How long a cached enriched view is served before the next read goes
    /// back to the provider.
    pub fn horizon() -> Duration {
        Duration::hours(1)
    }

    fn key(account_id: Uuid) -> String {
        format!("enriched:{account_id}")
    }

    /// The raw entry, fresh or stale; the caller compares `expires_at`.
    /// A malformed entry is a miss, not an error.
    pub async fn get(&self, account_id: Uuid) -> Result<Option<CachedEnrichedAccount>, StoreError> {
        let Some(value) = self.cache.get(&Self::key(account_id)).await? else {
            return Ok(None);
        };
        match serde_json::from_value(value) {
            Ok(entry) => Ok(Some(entry)),
            Err(e) => {
                warn!(%account_id, error = %e, "discarding unreadable enrichment cache entry");
                Ok(None)
            }
        }
    }

    /// Overwrite the entry with a fresh horizon. No merging with whatever
    /// was cached before.
    pub async fn put(&self, account_id: Uuid, account: &EnrichedAccount) -> Result<(), StoreError> {
        let entry = CachedEnrichedAccount {
            account: account.clone(),
            expires_at: Utc::now() + Self::horizon(),
        };
        self.cache
            .set(&Self::key(account_id), serde_json::to_value(&entry)?)
            .await
    }

    pub async fn invalidate(&self, account_id: Uuid) -> Result<(), StoreError> {
        self.cache.delete(&Self::key(account_id)).await
    }
}
