//! Storage abstraction for embedded chunk records.
//!
//! The pipeline depends on the [`VectorStore`] trait, never on a concrete
//! backend; [`sqlite_store::SqliteVectorStore`] is the durable
//! implementation and its in-memory mode doubles as the test fake.
//!
//! Record identity is the linchpin of idempotent re-indexing: ids derive
//! from `(source path, chunk index)` via [`record_id`], so re-ingesting an
//! unchanged document overwrites its prior records instead of duplicating
//! them.

use crate::error::Result;
use async_trait::async_trait;
use half::f16;
use serde::{Deserialize, Serialize};

pub mod sqlite_store;

/// Stable identifier of a stored record.
pub type RecordId = String;

/// Derive the stable record id for one chunk of one document: a blake3 hash
/// over the source path and chunk index, hex encoded.
pub fn record_id(source_path: &str, chunk_index: usize) -> RecordId {
    let mut hasher = blake3::Hasher::new();
    hasher.update(source_path.as_bytes());
    hasher.update(&[0]);
    hasher.update(&chunk_index.to_le_bytes());
    hex::encode(hasher.finalize().as_bytes())
}

/// Provenance metadata attached to every stored record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordMetadata {
    /// Path of the originating document.
    pub source_path: String,
    /// File-type tag (lowercased extension).
    pub file_type: String,
    /// Index of the chunk within its document.
    pub chunk_index: usize,
    /// Character offset of the chunk start within the document.
    pub char_start: usize,
    /// Character offset one past the chunk end.
    pub char_end: usize,
}

/// The (vector, text, metadata) triple owned by the vector store.
#[derive(Debug, Clone)]
pub struct StoredRecord {
    pub id: RecordId,
    pub content: String,
    pub embedding: Vec<f16>,
    pub metadata: RecordMetadata,
}

/// A stored record paired with its similarity score, as returned by a
/// query. Queries return these in descending score order.
#[derive(Debug, Clone)]
pub struct ScoredRecord {
    pub record: StoredRecord,
    pub score: f32,
}

/// Vector storage capability: persist records, answer nearest-neighbor
/// queries, delete, count.
///
/// Upsert is idempotent keyed by record id. Query ranks by cosine
/// similarity, breaking ties most-recently-inserted first so result order
/// is deterministic. The only component allowed to call `upsert`/`delete`
/// is the ingest engine.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert or overwrite records, keyed by their ids.
    async fn upsert(&self, records: Vec<StoredRecord>) -> Result<()>;

    /// Return up to `top_k` records ranked by descending cosine similarity.
    /// `top_k == 0` is an `InvalidArgument` error; an empty store yields an
    /// empty result.
    async fn query(&self, embedding: &[f16], top_k: usize) -> Result<Vec<ScoredRecord>>;

    /// Delete records by id, returning how many existed.
    async fn delete(&self, ids: &[RecordId]) -> Result<usize>;

    /// Number of stored records.
    async fn count(&self) -> Result<usize>;

    /// The fixed dimensionality this store accepts.
    fn dimension(&self) -> usize;

    /// Monotonic counter incremented by every mutation. Used by the
    /// retrieval cache to invalidate itself wholesale.
    fn generation(&self) -> u64;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_ids_are_stable() {
        let a = record_id("models/orders.sql", 3);
        let b = record_id("models/orders.sql", 3);
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn record_ids_distinguish_path_and_index() {
        let base = record_id("models/orders.sql", 0);
        assert_ne!(base, record_id("models/orders.sql", 1));
        assert_ne!(base, record_id("models/customers.sql", 0));
    }
}
