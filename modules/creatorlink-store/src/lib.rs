//! Persistence collaborators: a JSON document store and a key-value cache,
//! each behind an `async_trait` seam with a Postgres implementation for
//! production and in-memory implementations for tests.

pub mod error;
pub mod pg;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;
pub mod traits;

pub use error::StoreError;
pub use pg::{ensure_schema, PgDocumentStore, PgKvCache};
pub use traits::{DocumentStore, KvCache};
