//! The ingest engine: the pipeline's write path.
//!
//! Orchestrates file enumeration, chunking, batched embedding and storage.
//! Per-document failures are isolated: the run continues and the failure
//! lands in the report with its cause. `InvalidConfiguration` and
//! `StoreUnavailable` abort the whole run.
//!
//! ## Pipeline flow
//!
//! ```text
//! FileSource → TextChunker → EmbeddingProvider (bounded pool) → VectorStore
//! ```
//!
//! Each document commits atomically: every batch of its chunks is embedded
//! first (up to `workers` batches in flight at once), then all records are
//! upserted in one call. Batches carry their index so store contents are
//! independent of completion order. Record ids derive from
//! `(source path, chunk index)`, which keeps re-ingesting an unchanged tree
//! idempotent and lets parallel batches interleave without key collisions.

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::ingest::source::FileSource;
use crate::storage::{RecordMetadata, StoredRecord, VectorStore, record_id};
use chrono::{DateTime, Utc};
use futures::{StreamExt, TryStreamExt};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use strata_context::TextChunker;
use strata_embed::{EmbeddingBatch, EmbeddingProvider};
use tracing::{debug, info, warn};

/// Handle for cooperatively cancelling an ingest run.
///
/// Cancellation is checked at document and batch boundaries: no new batches
/// are submitted after `cancel()`, in-flight batches finish, and only fully
/// processed documents are committed, so the store stays queryable.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    flag: Arc<AtomicBool>,
}

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// One failed document and why it failed.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentFailure {
    pub path: PathBuf,
    pub reason: String,
}

/// Summary of a completed (or cancelled) ingest run.
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub files_processed: usize,
    pub files_failed: Vec<DocumentFailure>,
    pub chunks_written: usize,
    pub cancelled: bool,
    pub started_at: DateTime<Utc>,
    pub elapsed_secs: f64,
}

enum DocumentOutcome {
    Committed(usize),
    Cancelled,
}

/// Orchestrates the write path. The only component that mutates the
/// vector store.
pub struct IngestEngine {
    config: PipelineConfig,
    chunker: TextChunker,
    source: Arc<dyn FileSource>,
    provider: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    cancel: CancelHandle,
}

impl std::fmt::Debug for IngestEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IngestEngine")
            .field("config", &self.config)
            .field("chunker", &self.chunker)
            .finish_non_exhaustive()
    }
}

impl IngestEngine {
    /// Build an engine, validating the configuration and checking that the
    /// provider and store agree on dimensionality. Both checks fail with
    /// `InvalidConfiguration` before anything is ingested.
    pub fn new(
        config: PipelineConfig,
        source: Arc<dyn FileSource>,
        provider: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStore>,
    ) -> Result<Self> {
        config.validate()?;
        let chunker = TextChunker::new(config.chunk_config())?;

        if provider.dimension() != store.dimension() {
            return Err(PipelineError::invalid_configuration(format!(
                "embedding provider '{}' produces {}-dimensional vectors but the store is configured for {}",
                provider.provider_name(),
                provider.dimension(),
                store.dimension()
            )));
        }

        Ok(Self {
            config,
            chunker,
            source,
            provider,
            store,
            cancel: CancelHandle::new(),
        })
    }

    /// A handle that cancels this engine's runs.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Ingest every recognized file under `root`.
    pub async fn run(&self, root: &Path) -> Result<IngestReport> {
        let started_at = Utc::now();
        let start = std::time::Instant::now();

        let files = self
            .source
            .list_files(root, &self.config.extensions)
            .await?;
        info!("ingesting {} files under {}", files.len(), root.display());

        let mut report = IngestReport {
            files_processed: 0,
            files_failed: Vec::new(),
            chunks_written: 0,
            cancelled: false,
            started_at,
            elapsed_secs: 0.0,
        };

        for path in files {
            if self.cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }

            match self.process_document(&path).await {
                Ok(DocumentOutcome::Committed(written)) => {
                    report.files_processed += 1;
                    report.chunks_written += written;
                }
                Ok(DocumentOutcome::Cancelled) => {
                    report.cancelled = true;
                    break;
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!("skipping {}: {e}", path.display());
                    report.files_failed.push(DocumentFailure {
                        path,
                        reason: e.to_string(),
                    });
                }
            }
        }

        report.elapsed_secs = start.elapsed().as_secs_f64();
        info!(
            "ingest finished: {} files, {} chunks, {} failures{} in {:.2}s",
            report.files_processed,
            report.chunks_written,
            report.files_failed.len(),
            if report.cancelled { " (cancelled)" } else { "" },
            report.elapsed_secs
        );
        Ok(report)
    }

    /// Read, chunk, embed and store one document. Nothing is written unless
    /// every chunk of the document embedded successfully.
    async fn process_document(&self, path: &Path) -> Result<DocumentOutcome> {
        let text = self.source.read_text(path).await?;
        let source_path = path.to_string_lossy().to_string();

        let chunks = self.chunker.chunk(&source_path, &text);
        if chunks.is_empty() {
            debug!("{} is empty, nothing to index", path.display());
            return Ok(DocumentOutcome::Committed(0));
        }

        let batches: Vec<(usize, Vec<String>)> = chunks
            .chunks(self.config.batch_size)
            .map(|group| group.iter().map(|c| c.text.clone()).collect::<Vec<_>>())
            .enumerate()
            .collect();

        let mut embedded: Vec<(usize, Option<EmbeddingBatch>)> = futures::stream::iter(batches)
            .map(|(index, texts)| async move {
                if self.cancel.is_cancelled() {
                    return Ok((index, None));
                }
                let batch = self.embed_batch_with_retry(&texts).await?;
                Ok::<_, PipelineError>((index, Some(batch)))
            })
            .buffer_unordered(self.config.workers)
            .try_collect()
            .await?;

        if embedded.iter().any(|(_, batch)| batch.is_none()) {
            debug!("{} cancelled mid-document, not committed", path.display());
            return Ok(DocumentOutcome::Cancelled);
        }

        // Batches complete in arbitrary order; their indexes restore it.
        embedded.sort_by_key(|(index, _)| *index);
        let vectors = embedded
            .into_iter()
            .filter_map(|(_, batch)| batch)
            .flat_map(|batch| batch.vectors);

        let file_type = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();

        let records: Vec<StoredRecord> = chunks
            .iter()
            .zip(vectors)
            .map(|(chunk, embedding)| StoredRecord {
                id: record_id(&source_path, chunk.sequence),
                content: chunk.text.clone(),
                embedding,
                metadata: RecordMetadata {
                    source_path: source_path.clone(),
                    file_type: file_type.clone(),
                    chunk_index: chunk.sequence,
                    char_start: chunk.char_start,
                    char_end: chunk.char_end,
                },
            })
            .collect();

        let written = records.len();
        self.store.upsert(records).await?;
        debug!("indexed {} ({} chunks)", path.display(), written);
        Ok(DocumentOutcome::Committed(written))
    }

    /// Embed one batch, retrying with exponential backoff. A timeout counts
    /// as an embedding failure and is retried the same way.
    async fn embed_batch_with_retry(&self, texts: &[String]) -> Result<EmbeddingBatch> {
        let timeout = self.config.batch_timeout();
        let mut attempt: u32 = 0;

        loop {
            let outcome = tokio::time::timeout(timeout, self.provider.embed_texts(texts)).await;
            let err: PipelineError = match outcome {
                Ok(Ok(batch)) if batch.len() == texts.len() => return Ok(batch),
                Ok(Ok(batch)) => strata_embed::EmbedError::batch_failure(
                    batch.len(),
                    anyhow::anyhow!(
                        "provider returned {} embeddings for {} inputs",
                        batch.len(),
                        texts.len()
                    ),
                )
                .into(),
                Ok(Err(e)) => e.into(),
                Err(_) => strata_embed::EmbedError::batch_failure(
                    0,
                    anyhow::anyhow!("batch timed out after {timeout:?}"),
                )
                .into(),
            };

            if attempt >= self.config.max_retries {
                return Err(err);
            }
            let backoff = self.config.retry_backoff() * 2u32.saturating_pow(attempt.min(10));
            warn!(
                "embedding batch failed (attempt {} of {}), retrying in {backoff:?}: {err}",
                attempt + 1,
                self.config.max_retries + 1
            );
            tokio::time::sleep(backoff).await;
            attempt += 1;
        }
    }
}
