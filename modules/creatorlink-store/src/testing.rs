//! In-memory implementations of the storage seams. Same observable
//! semantics as the Postgres ones: shallow-merge updates, `updated_at`
//! stamping, soft deletes hidden from reads. No network, no database,
//! `cargo test` in seconds.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use uuid::Uuid;

use crate::error::StoreError;
use crate::traits::{DocumentStore, KvCache};

#[derive(Default)]
pub struct MemoryDocumentStore {
    docs: Mutex<HashMap<(String, Uuid), Value>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count of live (non-deleted) documents in a collection.
    pub fn document_count(&self, collection: &str) -> usize {
        self.docs
            .lock()
            .unwrap()
            .iter()
            .filter(|((coll, _), doc)| coll == collection && !is_deleted(doc))
            .count()
    }
}

fn is_deleted(doc: &Value) -> bool {
    doc.get("deleted_at").is_some_and(|v| !v.is_null())
}

fn document_id(doc: &Value) -> Result<Uuid, StoreError> {
    doc.get("id")
        .and_then(Value::as_str)
        .and_then(|raw| Uuid::parse_str(raw).ok())
        .ok_or_else(|| StoreError::InvalidDocument("missing or non-UUID id field".to_string()))
}

fn shallow_merge(doc: &mut Value, patch: &Value) {
    if let (Some(doc), Some(patch)) = (doc.as_object_mut(), patch.as_object()) {
        for (key, value) in patch {
            doc.insert(key.clone(), value.clone());
        }
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn create_document(&self, collection: &str, doc: Value) -> Result<Value, StoreError> {
        let id = document_id(&doc)?;
        let mut docs = self.docs.lock().unwrap();
        if docs.contains_key(&(collection.to_string(), id)) {
            return Err(StoreError::InvalidDocument(format!(
                "duplicate document {collection}/{id}"
            )));
        }
        docs.insert((collection.to_string(), id), doc.clone());
        Ok(doc)
    }

    async fn get_document_by_id(
        &self,
        collection: &str,
        id: Uuid,
    ) -> Result<Option<Value>, StoreError> {
        let docs = self.docs.lock().unwrap();
        Ok(docs
            .get(&(collection.to_string(), id))
            .filter(|doc| !is_deleted(doc))
            .cloned())
    }

    async fn update_document(
        &self,
        collection: &str,
        id: Uuid,
        patch: Value,
    ) -> Result<Value, StoreError> {
        if !patch.is_object() {
            return Err(StoreError::InvalidDocument(
                "patch must be a JSON object".to_string(),
            ));
        }
        let mut docs = self.docs.lock().unwrap();
        let doc = docs
            .get_mut(&(collection.to_string(), id))
            .filter(|doc| !is_deleted(doc))
            .ok_or_else(|| StoreError::NotFound {
                collection: collection.to_string(),
                id,
            })?;
        shallow_merge(doc, &patch);
        shallow_merge(doc, &serde_json::json!({ "updated_at": Utc::now() }));
        Ok(doc.clone())
    }

    async fn delete_document(&self, collection: &str, id: Uuid) -> Result<(), StoreError> {
        let mut docs = self.docs.lock().unwrap();
        let doc = docs
            .get_mut(&(collection.to_string(), id))
            .filter(|doc| !is_deleted(doc))
            .ok_or_else(|| StoreError::NotFound {
                collection: collection.to_string(),
                id,
            })?;
        shallow_merge(doc, &serde_json::json!({ "deleted_at": Utc::now() }));
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryKv {
    entries: Mutex<HashMap<String, Value>>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.lock().unwrap().contains_key(key)
    }
}

#[async_trait]
impl KvCache for MemoryKv {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.entries.lock().unwrap().get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        self.entries.lock().unwrap().insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.entries.lock().unwrap().remove(key);
        Ok(())
    }
}
