//! OAuth callback orchestration: code + state in, persisted account out.

use chrono::{DateTime, Duration, Utc};
use creatorlink_common::{Account, ListingDraft, Platform};
use creatorlink_store::{DocumentStore, KvCache};
use social_client::{ProviderAdapter, TokenBundle};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::accounts::AccountStore;
use crate::cache::PendingRegistrations;
use crate::error::LinkError;

/// Query parameters the provider redirects back with.
#[derive(Debug, Clone, Default)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
}

/// Drive a callback to completion: exchange the code, merge the staged
/// listing fields, persist the account, then consume the pending entry.
///
/// The pending entry is deleted only after the account write lands, and
/// there is no idempotency key on the exchange — two near-simultaneous
/// callbacks for one user can both observe the entry and each mint an
/// account. That is the contract, not an accident.
pub async fn complete_link<S, C>(
    adapter: &dyn ProviderAdapter,
    accounts: &AccountStore<S>,
    pending: &PendingRegistrations<C>,
    params: CallbackParams,
) -> Result<Account, LinkError>
where
    S: DocumentStore,
    C: KvCache,
{
    let platform = adapter.platform();

    // Missing either parameter aborts before any side effect.
    let code = params
        .code
        .filter(|c| !c.is_empty())
        .ok_or(LinkError::MissingParam("code"))?;
    let user_id = params
        .state
        .filter(|s| !s.is_empty())
        .ok_or(LinkError::MissingParam("state"))?;

    debug!(%platform, user_id, "exchanging authorization code");
    let bundle = adapter.exchange_code(&code).await?;

    // Absent staged fields are fine: the account is built from token
    // material alone.
    let staged = pending.peek(&user_id).await?;
    let draft = match staged {
        Some(value) => match serde_json::from_value::<ListingDraft>(value) {
            Ok(draft) => draft,
            Err(e) => {
                warn!(user_id, error = %e, "unreadable pending registration, linking without it");
                ListingDraft::default()
            }
        },
        None => ListingDraft::default(),
    };

    let account = build_account(platform, &user_id, &bundle, draft, Utc::now());
    let account = accounts.create(&account).await?;
    pending.clear(&user_id).await?;

    info!(account_id = %account.id, %platform, user_id, "social account linked");
    Ok(account)
}

/// Assemble a new account from token material plus staged listing fields.
pub fn build_account(
    platform: Platform,
    user_id: &str,
    bundle: &TokenBundle,
    draft: ListingDraft,
    now: DateTime<Utc>,
) -> Account {
    Account {
        id: Uuid::new_v4(),
        platform,
        token: bundle.access_token.clone(),
        token_expiry: bundle
            .expires_in
            .map(|secs| now + Duration::seconds(secs as i64)),
        refresh_token: bundle.refresh_token.clone(),
        refresh_token_expiry: bundle
            .refresh_expires_in
            .map(|secs| now + Duration::seconds(secs as i64)),
        scope: bundle.scope.clone(),
        token_type: bundle.token_type.clone(),
        user_id: user_id.to_string(),
        username: draft.username,
        followers: None,
        category: draft.category,
        country: draft.country,
        city: draft.city,
        language: draft.language,
        prices: draft.prices,
        available_services: draft.available_services,
        is_verified: false,
        is_active: draft.is_active.unwrap_or(true),
        hide_identity: draft.hide_identity.unwrap_or(false),
        created_at: now,
        updated_at: now,
        deleted_at: None,
    }
}
