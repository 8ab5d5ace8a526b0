use creatorlink_store::StoreError;
use social_client::ProviderError;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum LinkError {
    /// The provider redirected back without a required query parameter.
    #[error("missing callback parameter: {0}")]
    MissingParam(&'static str),

    #[error("account {0} not found")]
    AccountNotFound(Uuid),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
