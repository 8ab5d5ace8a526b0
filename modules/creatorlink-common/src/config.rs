use std::env;

use crate::types::Platform;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Postgres
    pub database_url: String,

    // Web server
    pub web_host: String,
    pub web_port: u16,

    /// Public origin this service is reachable at; OAuth redirect URIs are
    /// `{public_base_url}/cb/{platform}` and must match the URIs registered
    /// with each provider.
    pub public_base_url: String,

    /// Front-end URL the callback redirects to after a successful link.
    pub link_success_url: String,

    // Provider credentials
    pub instagram: ProviderSettings,
    pub facebook: ProviderSettings,
    pub tiktok: ProviderSettings,
    pub youtube: ProviderSettings,
    pub twitter: ProviderSettings,
    pub linkedin: ProviderSettings,
}

/// Per-platform OAuth app credentials, passed explicitly to adapter
/// constructors.
#[derive(Debug, Clone)]
pub struct ProviderSettings {
    pub client_id: String,
    pub client_secret: String,
    /// Override for the provider API origin (staging, tests). `None` uses
    /// the live endpoints.
    pub api_base: Option<String>,
    /// PKCE code verifier for providers that require one (Twitter).
    pub pkce_verifier: Option<String>,
}

impl Config {
    /// Load configuration from environment variables.
    /// Panics with a clear message if required vars are missing.
    pub fn from_env() -> Self {
        Self {
            database_url: required_env("DATABASE_URL"),
            web_host: env::var("WEB_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            web_port: env::var("WEB_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .expect("WEB_PORT must be a number"),
            public_base_url: required_env("PUBLIC_BASE_URL"),
            link_success_url: required_env("LINK_SUCCESS_URL"),
            instagram: ProviderSettings::from_env("INSTAGRAM"),
            facebook: ProviderSettings::from_env("FACEBOOK"),
            tiktok: ProviderSettings::from_env("TIKTOK"),
            youtube: ProviderSettings::from_env("YOUTUBE"),
            twitter: ProviderSettings::from_env("TWITTER"),
            linkedin: ProviderSettings::from_env("LINKEDIN"),
        }
    }

    pub fn provider(&self, platform: Platform) -> &ProviderSettings {
        match platform {
            Platform::Instagram => &self.instagram,
            Platform::Facebook => &self.facebook,
            Platform::TikTok => &self.tiktok,
            Platform::YouTube => &self.youtube,
            Platform::Twitter => &self.twitter,
            Platform::LinkedIn => &self.linkedin,
        }
    }

    /// The callback URI registered with `platform`'s OAuth app.
    pub fn redirect_uri(&self, platform: Platform) -> String {
        format!(
            "{}/cb/{platform}",
            self.public_base_url.trim_end_matches('/')
        )
    }
}

impl ProviderSettings {
    fn from_env(prefix: &str) -> Self {
        Self {
            client_id: required_env(&format!("{prefix}_CLIENT_ID")),
            client_secret: required_env(&format!("{prefix}_CLIENT_SECRET")),
            api_base: env::var(format!("{prefix}_API_BASE")).ok(),
            pkce_verifier: env::var(format!("{prefix}_PKCE_VERIFIER")).ok(),
        }
    }
}

fn required_env(key: &str) -> String {
    env::var(key).unwrap_or_else(|_| panic!("{key} environment variable is required"))
}
