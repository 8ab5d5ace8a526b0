//! The account-linking core: credential storage, the pending-registration
//! bridge, the OAuth callback orchestrator, and the enrichment pipeline
//! that turns a stored account into a live profile-plus-posts view.

pub mod accounts;
pub mod cache;
pub mod enrich;
pub mod error;
pub mod link;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;
pub mod traits;

pub use accounts::AccountStore;
pub use cache::{CachedEnrichedAccount, EnrichmentCache, PendingRegistrations};
pub use enrich::{enriched_account, EnrichedAccount};
pub use error::LinkError;
pub use link::{complete_link, CallbackParams};
pub use traits::Adapters;
