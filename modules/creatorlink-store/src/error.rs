use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{collection}/{id} not found")]
    NotFound { collection: String, id: Uuid },

    #[error("invalid document: {0}")]
    InvalidDocument(String),
}
