//! Typed account access over the document-store seam.

use creatorlink_common::{Account, AccountPatch};
use creatorlink_store::{DocumentStore, StoreError};
use uuid::Uuid;

/// Collection the account documents live in.
pub const ACCOUNTS_COLLECTION: &str = "accounts";

pub struct AccountStore<S> {
    store: S,
}

impl<S: DocumentStore> AccountStore<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub async fn create(&self, account: &Account) -> Result<Account, StoreError> {
        let doc = serde_json::to_value(account)?;
        let stored = self.store.create_document(ACCOUNTS_COLLECTION, doc).await?;
        Ok(serde_json::from_value(stored)?)
    }

    /// `None` for unknown ids and soft-deleted accounts alike.
    pub async fn get(&self, id: Uuid) -> Result<Option<Account>, StoreError> {
        match self.store.get_document_by_id(ACCOUNTS_COLLECTION, id).await? {
            Some(doc) => Ok(Some(serde_json::from_value(doc)?)),
            None => Ok(None),
        }
    }

    /// Persist a partial update and return the merged account.
    pub async fn apply_patch(&self, id: Uuid, patch: &AccountPatch) -> Result<Account, StoreError> {
        let patch = serde_json::to_value(patch)?;
        let doc = self
            .store
            .update_document(ACCOUNTS_COLLECTION, id, patch)
            .await?;
        Ok(serde_json::from_value(doc)?)
    }

    pub async fn soft_delete(&self, id: Uuid) -> Result<(), StoreError> {
        self.store.delete_document(ACCOUNTS_COLLECTION, id).await
    }
}
