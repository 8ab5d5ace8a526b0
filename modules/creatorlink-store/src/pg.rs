//! Postgres implementations: one JSONB table per concern.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::StoreError;
use crate::traits::{DocumentStore, KvCache};

/// Create the backing tables when they do not exist yet. Called once at
/// startup.
pub async fn ensure_schema(pool: &PgPool) -> Result<(), StoreError> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS documents (
             collection TEXT NOT NULL,
             id UUID NOT NULL,
             doc JSONB NOT NULL,
             created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
             updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
             deleted_at TIMESTAMPTZ,
             PRIMARY KEY (collection, id)
         )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS kv_cache (
             key TEXT PRIMARY KEY,
             value JSONB NOT NULL,
             updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
         )",
    )
    .execute(pool)
    .await?;

    Ok(())
}

#[derive(Clone)]
pub struct PgDocumentStore {
    pool: PgPool,
}

impl PgDocumentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Pull the UUID out of a document's `id` field.
fn document_id(doc: &Value) -> Result<Uuid, StoreError> {
    doc.get("id")
        .and_then(Value::as_str)
        .and_then(|raw| Uuid::parse_str(raw).ok())
        .ok_or_else(|| StoreError::InvalidDocument("missing or non-UUID id field".to_string()))
}

/// Stamp `updated_at` into a merge patch so the document's own timestamp
/// tracks the row's.
fn stamped(mut patch: Value) -> Result<Value, StoreError> {
    let obj = patch
        .as_object_mut()
        .ok_or_else(|| StoreError::InvalidDocument("patch must be a JSON object".to_string()))?;
    obj.insert("updated_at".to_string(), serde_json::json!(Utc::now()));
    Ok(patch)
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn create_document(&self, collection: &str, doc: Value) -> Result<Value, StoreError> {
        let id = document_id(&doc)?;
        sqlx::query("INSERT INTO documents (collection, id, doc) VALUES ($1, $2, $3)")
            .bind(collection)
            .bind(id)
            .bind(&doc)
            .execute(&self.pool)
            .await?;
        tracing::debug!(collection, %id, "document created");
        Ok(doc)
    }

    async fn get_document_by_id(
        &self,
        collection: &str,
        id: Uuid,
    ) -> Result<Option<Value>, StoreError> {
        let row: Option<(Value,)> = sqlx::query_as(
            "SELECT doc FROM documents
             WHERE collection = $1 AND id = $2 AND deleted_at IS NULL",
        )
        .bind(collection)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|(doc,)| doc))
    }

    async fn update_document(
        &self,
        collection: &str,
        id: Uuid,
        patch: Value,
    ) -> Result<Value, StoreError> {
        let patch = stamped(patch)?;
        let row: Option<(Value,)> = sqlx::query_as(
            "UPDATE documents
             SET doc = doc || $3::jsonb, updated_at = now()
             WHERE collection = $1 AND id = $2 AND deleted_at IS NULL
             RETURNING doc",
        )
        .bind(collection)
        .bind(id)
        .bind(&patch)
        .fetch_optional(&self.pool)
        .await?;
        row.map(|(doc,)| doc).ok_or_else(|| StoreError::NotFound {
            collection: collection.to_string(),
            id,
        })
    }

    async fn delete_document(&self, collection: &str, id: Uuid) -> Result<(), StoreError> {
        let deleted_at = serde_json::json!({ "deleted_at": Utc::now() });
        let result = sqlx::query(
            "UPDATE documents
             SET deleted_at = now(), updated_at = now(), doc = doc || $3::jsonb
             WHERE collection = $1 AND id = $2 AND deleted_at IS NULL",
        )
        .bind(collection)
        .bind(id)
        .bind(&deleted_at)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                collection: collection.to_string(),
                id,
            });
        }
        tracing::debug!(collection, %id, "document soft-deleted");
        Ok(())
    }
}

#[derive(Clone)]
pub struct PgKvCache {
    pool: PgPool,
}

impl PgKvCache {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl KvCache for PgKvCache {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let row: Option<(Value,)> = sqlx::query_as("SELECT value FROM kv_cache WHERE key = $1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|(value,)| value))
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO kv_cache (key, value) VALUES ($1, $2)
             ON CONFLICT (key)
             DO UPDATE SET value = EXCLUDED.value, updated_at = now()",
        )
        .bind(key)
        .bind(&value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM kv_cache WHERE key = $1")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
