//! Adapter resolution seam so the enrichment pipeline can run against the
//! real registry in production and a scripted adapter in tests.

use creatorlink_common::Platform;
use social_client::{ProviderAdapter, ProviderRegistry};

pub trait Adapters: Send + Sync {
    fn adapter(&self, platform: Platform) -> &dyn ProviderAdapter;
}

impl Adapters for ProviderRegistry {
    fn adapter(&self, platform: Platform) -> &dyn ProviderAdapter {
        ProviderRegistry::adapter(self, platform)
    }
}
