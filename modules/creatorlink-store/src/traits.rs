//! The two storage seams the linking subsystem consumes. Documents and
//! cache entries are plain JSON at this layer; typed wrappers live with the
//! code that owns the types. Both traits are implemented for `Arc<T>` so a
//! test can keep a handle on the store it hands in and assert against it.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use crate::error::StoreError;

/// Document persistence: JSON documents in named collections, addressed by
/// the `id` field. Deletion is soft (`deleted_at`); deleted documents are
/// invisible to reads and updates.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert a document. The document must carry a UUID `id` field.
    /// Returns the stored document.
    async fn create_document(&self, collection: &str, doc: Value) -> Result<Value, StoreError>;

    async fn get_document_by_id(
        &self,
        collection: &str,
        id: Uuid,
    ) -> Result<Option<Value>, StoreError>;

    /// Shallow-merge `patch` into the document and bump `updated_at`.
    /// Returns the merged document; `NotFound` if the id is unknown or
    /// soft-deleted.
    async fn update_document(
        &self,
        collection: &str,
        id: Uuid,
        patch: Value,
    ) -> Result<Value, StoreError>;

    /// Soft delete: stamps `deleted_at`, after which the document no longer
    /// appears in reads.
    async fn delete_document(&self, collection: &str, id: Uuid) -> Result<(), StoreError>;
}

/// Key-value cache service: JSON values under string keys, last write wins.
/// No TTL at this layer; expiry policy belongs to the values' owners.
#[async_trait]
pub trait KvCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError>;
    async fn set(&self, key: &str, value: Value) -> Result<(), StoreError>;
    async fn delete(&self, key: &str) -> Result<(), StoreError>;
}

#[async_trait]
impl<T: DocumentStore + ?Sized> DocumentStore for Arc<T> {
    async fn create_document(&self, collection: &str, doc: Value) -> Result<Value, StoreError> {
        (**self).create_document(collection, doc).await
    }

    async fn get_document_by_id(
        &self,
        collection: &str,
        id: Uuid,
    ) -> Result<Option<Value>, StoreError> {
        (**self).get_document_by_id(collection, id).await
    }

    async fn update_document(
        &self,
        collection: &str,
        id: Uuid,
        patch: Value,
    ) -> Result<Value, StoreError> {
        (**self).update_document(collection, id, patch).await
    }

    async fn delete_document(&self, collection: &str, id: Uuid) -> Result<(), StoreError> {
        (**self).delete_document(collection, id).await
    }
}

#[async_trait]
impl<T: KvCache + ?Sized> KvCache for Arc<T> {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        (**self).get(key).await
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        (**self).set(key, value).await
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        (**self).delete(key).await
    }
}
