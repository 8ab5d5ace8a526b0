use creatorlink_common::{Config, Platform};

use crate::adapter::ProviderAdapter;
use crate::platforms::{
    FacebookAdapter, InstagramAdapter, LinkedInAdapter, TikTokAdapter, TwitterAdapter,
    YouTubeAdapter,
};
use crate::types::AdapterSettings;

/// Owns one adapter per platform and dispatches over the closed set.
/// The match below is exhaustive on purpose: adding a platform forces every
/// dispatch site through the compiler, and there is no default arm to fall
/// into. Unknown platform strings never get this far — they fail at the
/// `Platform::from_str` boundary.
pub struct ProviderRegistry {
    instagram: InstagramAdapter,
    facebook: FacebookAdapter,
    tiktok: TikTokAdapter,
    youtube: YouTubeAdapter,
    twitter: TwitterAdapter,
    linkedin: LinkedInAdapter,
}

impl ProviderRegistry {
    /// Build all six adapters from app configuration. The reqwest client is
    /// shared; per-platform credentials are cloned into each adapter.
    pub fn from_config(config: &Config, client: reqwest::Client) -> Self {
        let settings = |platform: Platform| {
            AdapterSettings::from_provider(config.provider(platform), config.redirect_uri(platform))
        };
        Self {
            instagram: InstagramAdapter::new(settings(Platform::Instagram), client.clone()),
            facebook: FacebookAdapter::new(settings(Platform::Facebook), client.clone()),
            tiktok: TikTokAdapter::new(settings(Platform::TikTok), client.clone()),
            youtube: YouTubeAdapter::new(settings(Platform::YouTube), client.clone()),
            twitter: TwitterAdapter::new(settings(Platform::Twitter), client.clone()),
            linkedin: LinkedInAdapter::new(settings(Platform::LinkedIn), client),
        }
    }

    pub fn adapter(&self, platform: Platform) -> &dyn ProviderAdapter {
        match platform {
            Platform::Instagram => &self.instagram,
            Platform::Facebook => &self.facebook,
            Platform::TikTok => &self.tiktok,
            Platform::YouTube => &self.youtube,
            Platform::Twitter => &self.twitter,
            Platform::LinkedIn => &self.linkedin,
        }
    }
}
