//! SQLite implementation of the vector store.
//!
//! One `records` table holds the (vector, text, metadata) triples; a
//! `store_meta` row pins the dimensionality the store was created with.
//! Embeddings are stored as f16 blobs. Similarity queries load the stored
//! vectors and rank them in-process with cosine similarity; at the corpus
//! sizes this pipeline targets a linear scan beats maintaining an ANN
//! index.
//!
//! ## Schema
//!
//! ```sql
//! CREATE TABLE store_meta (
//!     id INTEGER PRIMARY KEY CHECK (id = 1),
//!     dimension INTEGER NOT NULL,
//!     created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
//! );
//! CREATE TABLE records (
//!     id TEXT PRIMARY KEY,             -- blake3(source_path, chunk_index)
//!     source_path TEXT NOT NULL,
//!     file_type TEXT NOT NULL,
//!     chunk_index INTEGER NOT NULL,
//!     char_start INTEGER NOT NULL,
//!     char_end INTEGER NOT NULL,
//!     content TEXT NOT NULL,
//!     embedding BLOB NOT NULL,         -- f16 vector
//!     seq INTEGER NOT NULL             -- insertion order, tie-break key
//! );
//! ```

use super::{RecordId, RecordMetadata, ScoredRecord, StoredRecord, VectorStore};
use crate::error::{PipelineError, Result};
use async_trait::async_trait;
use half::f16;
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::{Row, SqlitePool};
use std::path::Path;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

/// Database file name inside the store directory.
pub const STORE_FILE: &str = "strata.db";

/// Durable SQLite-backed vector store.
#[derive(Debug)]
pub struct SqliteVectorStore {
    pool: SqlitePool,
    dimension: usize,
    seq: AtomicI64,
    generation: AtomicU64,
}

impl SqliteVectorStore {
    /// Open (or create) a store at `base/strata.db` with the given
    /// dimensionality. Reopening an existing store with a different
    /// dimensionality fails with `InvalidConfiguration` before any ingest
    /// or query runs.
    pub async fn open(base: &Path, dimension: usize) -> Result<Self> {
        let db_path = base.join(STORE_FILE);
        let pool = SqlitePool::connect_with(
            SqliteConnectOptions::new()
                .filename(db_path)
                .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
                .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
                .busy_timeout(std::time::Duration::from_secs(5))
                .create_if_missing(true)
                .auto_vacuum(sqlx::sqlite::SqliteAutoVacuum::Full)
                .page_size(1 << 16),
        )
        .await
        .map_err(PipelineError::store)?;
        Self::with_pool(pool, dimension).await
    }

    /// Open an in-memory store, for tests and examples.
    pub async fn open_memory(dimension: usize) -> Result<Self> {
        let pool = SqlitePool::connect("sqlite::memory:")
            .await
            .map_err(PipelineError::store)?;
        Self::with_pool(pool, dimension).await
    }

    async fn with_pool(pool: SqlitePool, dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(PipelineError::invalid_configuration(
                "store dimension must be greater than zero",
            ));
        }

        Self::create_tables(&pool)
            .await
            .map_err(PipelineError::store)?;

        let stored_dimension: Option<i64> =
            sqlx::query_scalar("SELECT dimension FROM store_meta WHERE id = 1")
                .fetch_optional(&pool)
                .await
                .map_err(PipelineError::store)?;

        match stored_dimension {
            Some(stored) if stored as usize != dimension => {
                return Err(PipelineError::invalid_configuration(format!(
                    "store was created with dimension {stored} but is being opened with {dimension}"
                )));
            }
            Some(_) => {}
            None => {
                sqlx::query("INSERT INTO store_meta (id, dimension) VALUES (1, ?1)")
                    .bind(dimension as i64)
                    .execute(&pool)
                    .await
                    .map_err(PipelineError::store)?;
            }
        }

        let max_seq: i64 = sqlx::query_scalar("SELECT IFNULL(MAX(seq), 0) FROM records")
            .fetch_one(&pool)
            .await
            .map_err(PipelineError::store)?;

        Ok(Self {
            pool,
            dimension,
            seq: AtomicI64::new(max_seq),
            generation: AtomicU64::new(0),
        })
    }

    async fn create_tables(pool: &SqlitePool) -> sqlx::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS store_meta (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                dimension INTEGER NOT NULL,
                created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS records (
                id TEXT PRIMARY KEY,
                source_path TEXT NOT NULL,
                file_type TEXT NOT NULL,
                chunk_index INTEGER NOT NULL,
                char_start INTEGER NOT NULL,
                char_end INTEGER NOT NULL,
                content TEXT NOT NULL,
                embedding BLOB NOT NULL,
                seq INTEGER NOT NULL
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_records_source ON records(source_path)")
            .execute(pool)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_records_seq ON records(seq)")
            .execute(pool)
            .await?;

        Ok(())
    }

    fn next_seq(&self) -> i64 {
        self.seq.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn bump_generation(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }
}

fn decode_embedding(bytes: &[u8]) -> Vec<f16> {
    bytemuck::cast_slice::<u8, f16>(bytes).to_vec()
}

/// Cosine similarity between two f16 vectors, computed in f32.
pub(crate) fn cosine_similarity(a: &[f16], b: &[f16]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        let x = x.to_f32();
        let y = y.to_f32();
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let norm_a = norm_a.sqrt();
    let norm_b = norm_b.sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    async fn upsert(&self, records: Vec<StoredRecord>) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        for record in &records {
            if record.embedding.len() != self.dimension {
                return Err(PipelineError::invalid_configuration(format!(
                    "record {} has embedding dimension {} but the store is configured for {}",
                    record.id,
                    record.embedding.len(),
                    self.dimension
                )));
            }
        }

        let mut tx = self.pool.begin().await.map_err(PipelineError::store)?;
        for record in &records {
            let embedding_bytes = bytemuck::cast_slice::<f16, u8>(&record.embedding);
            sqlx::query(
                r#"
                INSERT INTO records
                (id, source_path, file_type, chunk_index, char_start, char_end, content, embedding, seq)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                ON CONFLICT(id) DO UPDATE SET
                    source_path = excluded.source_path,
                    file_type = excluded.file_type,
                    chunk_index = excluded.chunk_index,
                    char_start = excluded.char_start,
                    char_end = excluded.char_end,
                    content = excluded.content,
                    embedding = excluded.embedding,
                    seq = excluded.seq
                "#,
            )
            .bind(&record.id)
            .bind(&record.metadata.source_path)
            .bind(&record.metadata.file_type)
            .bind(record.metadata.chunk_index as i64)
            .bind(record.metadata.char_start as i64)
            .bind(record.metadata.char_end as i64)
            .bind(&record.content)
            .bind(embedding_bytes)
            .bind(self.next_seq())
            .execute(&mut *tx)
            .await
            .map_err(PipelineError::store)?;
        }
        tx.commit().await.map_err(PipelineError::store)?;

        self.bump_generation();
        tracing::debug!("upserted {} records", records.len());
        Ok(())
    }

    async fn query(&self, embedding: &[f16], top_k: usize) -> Result<Vec<ScoredRecord>> {
        if top_k == 0 {
            return Err(PipelineError::invalid_argument(
                "top_k must be greater than zero",
            ));
        }
        if embedding.len() != self.dimension {
            return Err(PipelineError::invalid_configuration(format!(
                "query embedding has dimension {} but the store is configured for {}",
                embedding.len(),
                self.dimension
            )));
        }

        let rows = sqlx::query(
            "SELECT id, source_path, file_type, chunk_index, char_start, char_end, content, embedding, seq
             FROM records",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(PipelineError::store)?;

        let mut scored: Vec<(f32, i64, StoredRecord)> = Vec::with_capacity(rows.len());
        for row in rows {
            let embedding_bytes: Vec<u8> = row.get("embedding");
            let stored_embedding = decode_embedding(&embedding_bytes);
            let score = cosine_similarity(embedding, &stored_embedding);
            let seq: i64 = row.get("seq");

            scored.push((
                score,
                seq,
                StoredRecord {
                    id: row.get("id"),
                    content: row.get("content"),
                    embedding: stored_embedding,
                    metadata: RecordMetadata {
                        source_path: row.get("source_path"),
                        file_type: row.get("file_type"),
                        chunk_index: row.get::<i64, _>("chunk_index") as usize,
                        char_start: row.get::<i64, _>("char_start") as usize,
                        char_end: row.get::<i64, _>("char_end") as usize,
                    },
                },
            ));
        }

        // Descending score; ties go to the most recently inserted record.
        scored.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(b.1.cmp(&a.1))
        });
        scored.truncate(top_k);

        Ok(scored
            .into_iter()
            .map(|(score, _, record)| ScoredRecord { record, score })
            .collect())
    }

    async fn delete(&self, ids: &[RecordId]) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }

        let placeholders = ids
            .iter()
            .enumerate()
            .map(|(i, _)| format!("?{}", i + 1))
            .collect::<Vec<_>>()
            .join(", ");
        let query = format!("DELETE FROM records WHERE id IN ({placeholders})");

        let mut query_builder = sqlx::query(&query);
        for id in ids {
            query_builder = query_builder.bind(id);
        }
        let result = query_builder
            .execute(&self.pool)
            .await
            .map_err(PipelineError::store)?;

        self.bump_generation();
        Ok(result.rows_affected() as usize)
    }

    async fn count(&self) -> Result<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM records")
            .fetch_one(&self.pool)
            .await
            .map_err(PipelineError::store)?;
        Ok(count as usize)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }
}
