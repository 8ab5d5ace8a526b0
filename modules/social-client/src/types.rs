use chrono::{DateTime, Utc};
use creatorlink_common::{AccountPatch, ProviderSettings};
use serde::{Deserialize, Serialize};

/// Everything an adapter needs to talk to its platform's OAuth app.
/// Built once at startup and passed to the adapter constructor; adapters
/// never read process configuration themselves.
#[derive(Debug, Clone)]
pub struct AdapterSettings {
    pub client_id: String,
    pub client_secret: String,
    /// Callback URI registered with the provider.
    pub redirect_uri: String,
    /// Override for the provider origin(s). Staging and tests point this at
    /// a local server; `None` uses the live endpoints.
    pub api_base: Option<String>,
    /// PKCE code verifier for providers that require one (Twitter).
    pub pkce_verifier: Option<String>,
}

impl AdapterSettings {
    pub fn from_provider(settings: &ProviderSettings, redirect_uri: String) -> Self {
        Self {
            client_id: settings.client_id.clone(),
            client_secret: settings.client_secret.clone(),
            redirect_uri,
            api_base: settings.api_base.clone(),
            pkce_verifier: settings.pkce_verifier.clone(),
        }
    }
}

/// Result of a code exchange, normalized across platforms. Lifetimes are
/// relative (`expires_in` seconds) because that is what every provider
/// returns; the caller stamps absolute expiries at persist time.
#[derive(Debug, Clone)]
pub struct TokenBundle {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: Option<u64>,
    pub refresh_expires_in: Option<u64>,
    pub scope: Option<String>,
    pub token_type: Option<String>,
}

/// Result of a refresh: the token to use now, plus the field updates the
/// caller must persist (command/result — the adapter never touches storage).
/// `patch: None` means the stored credential is still current.
#[derive(Debug, Clone)]
pub struct RefreshOutcome {
    pub access_token: String,
    pub patch: Option<AccountPatch>,
}

impl RefreshOutcome {
    pub fn unchanged(token: &str) -> Self {
        Self {
            access_token: token.to_string(),
            patch: None,
        }
    }
}

/// Normalized profile view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileSnapshot {
    pub id: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub follower_count: Option<u64>,
}

/// Normalized post view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostSnapshot {
    pub id: String,
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default)]
    pub media_url: Option<String>,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub permalink: Option<String>,
}

/// Profile plus recent posts, as one unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderPage {
    pub profile: ProfileSnapshot,
    pub posts: Vec<PostSnapshot>,
}
