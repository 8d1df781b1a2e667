//! End-to-end tests for the ingest → search → assemble pipeline.
//!
//! These run the real engine against a temporary directory, an in-memory
//! SQLite store and the deterministic mock embedding provider, covering:
//! - ingesting a mixed corpus and querying it back
//! - idempotent re-ingestion
//! - per-document failure isolation (undecodable files, embedding failures)
//! - empty-store queries and fail-fast dimension mismatches
//! - cooperative cancellation
//! - bounded context assembly with citations

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use strata_embed::MockEmbeddingProvider;
use strata_retriever::config::PipelineConfig;
use strata_retriever::error::{PipelineError, Result};
use strata_retriever::ingest::{IngestEngine, LocalFileSource};
use strata_retriever::retriever::Retriever;
use strata_retriever::storage::VectorStore;
use strata_retriever::storage::sqlite_store::SqliteVectorStore;
use tempfile::tempdir;

const DIM: usize = 32;

fn test_config() -> PipelineConfig {
    PipelineConfig::default()
        .with_chunking(200, 40)
        .with_batch_size(4)
        .with_workers(2)
        .with_max_retries(0)
        .with_retry_backoff(Duration::from_millis(1))
}

async fn build_engine(
    provider: MockEmbeddingProvider,
    store: Arc<SqliteVectorStore>,
) -> Result<IngestEngine> {
    IngestEngine::new(
        test_config(),
        Arc::new(LocalFileSource::new()),
        Arc::new(provider),
        store as Arc<dyn VectorStore>,
    )
}

fn write_corpus(root: &Path) {
    std::fs::write(
        root.join("orders.sql"),
        "create table orders (id int, customer_id int, placed_at timestamp);\n\
         -- incremental load keyed on placed_at\n",
    )
    .unwrap();
    std::fs::write(
        root.join("orders.yml"),
        "models:\n  - name: orders\n    description: Order fact table\n",
    )
    .unwrap();
    std::fs::write(
        root.join("README.md"),
        "# Warehouse docs\n\nThe orders model is rebuilt nightly from the raw landing zone.\n",
    )
    .unwrap();
    std::fs::write(root.join("load.py"), "def load():\n    return 'orders'\n").unwrap();
    std::fs::write(root.join("notes.txt"), "Remember to vacuum the warehouse.\n").unwrap();
}

#[tokio::test]
async fn ingest_then_search_round_trip() -> Result<()> {
    let dir = tempdir().unwrap();
    write_corpus(dir.path());

    let provider = MockEmbeddingProvider::new(DIM);
    let store = Arc::new(SqliteVectorStore::open_memory(DIM).await?);
    let engine = build_engine(provider.clone(), Arc::clone(&store)).await?;

    let report = engine.run(dir.path()).await?;
    assert_eq!(report.files_processed, 5);
    assert!(report.files_failed.is_empty());
    assert!(!report.cancelled);
    assert!(report.chunks_written >= 5);
    assert_eq!(store.count().await?, report.chunks_written);

    // Querying with the exact text of a stored chunk must rank it first
    // with similarity ~1 (the mock provider is deterministic).
    let retriever = Retriever::new(
        Arc::new(provider),
        Arc::clone(&store) as Arc<dyn VectorStore>,
    )?;
    let results = retriever
        .search("def load():\n    return 'orders'\n", 3)
        .await?;
    assert!(!results.is_empty());
    assert!(results[0].record.metadata.source_path.ends_with("load.py"));
    assert!(results[0].score > 0.99);

    // Results are sorted, bounded, and free of duplicate ids.
    assert!(results.len() <= 3);
    for pair in results.windows(2) {
        assert!(pair[0].score >= pair[1].score);
    }
    let mut ids: Vec<_> = results.iter().map(|r| r.record.id.clone()).collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), results.len());
    Ok(())
}

#[tokio::test]
async fn reingesting_unchanged_corpus_is_idempotent() -> Result<()> {
    let dir = tempdir().unwrap();
    write_corpus(dir.path());

    let store = Arc::new(SqliteVectorStore::open_memory(DIM).await?);
    let engine = build_engine(MockEmbeddingProvider::new(DIM), Arc::clone(&store)).await?;

    engine.run(dir.path()).await?;
    let count_after_first = store.count().await?;

    let report = engine.run(dir.path()).await?;
    assert_eq!(store.count().await?, count_after_first);
    assert_eq!(report.files_processed, 5);
    Ok(())
}

#[tokio::test]
async fn undecodable_file_is_isolated() -> Result<()> {
    let dir = tempdir().unwrap();
    write_corpus(dir.path());
    // Valid extension, invalid UTF-8.
    std::fs::write(dir.path().join("binary.md"), [0xff, 0xfe, 0x01, 0x02]).unwrap();

    let store = Arc::new(SqliteVectorStore::open_memory(DIM).await?);
    let engine = build_engine(MockEmbeddingProvider::new(DIM), Arc::clone(&store)).await?;

    let report = engine.run(dir.path()).await?;
    assert_eq!(report.files_processed, 5);
    assert_eq!(report.files_failed.len(), 1);
    assert!(report.files_failed[0].path.ends_with("binary.md"));
    assert!(
        report.files_failed[0]
            .reason
            .contains("unsupported encoding")
    );

    // Only the five healthy documents contributed records.
    assert_eq!(store.count().await?, report.chunks_written);
    Ok(())
}

#[tokio::test]
async fn embedding_failure_after_retries_is_isolated() -> Result<()> {
    let dir = tempdir().unwrap();
    write_corpus(dir.path());
    std::fs::write(
        dir.path().join("cursed.md"),
        "this document mentions poison and cannot be embedded",
    )
    .unwrap();

    let store = Arc::new(SqliteVectorStore::open_memory(DIM).await?);
    let engine = build_engine(
        MockEmbeddingProvider::new(DIM).failing_on("poison"),
        Arc::clone(&store),
    )
    .await?;

    let report = engine.run(dir.path()).await?;
    assert_eq!(report.files_processed, 5);
    assert_eq!(report.files_failed.len(), 1);
    assert!(report.files_failed[0].path.ends_with("cursed.md"));
    assert_eq!(store.count().await?, report.chunks_written);
    Ok(())
}

#[tokio::test]
async fn querying_empty_store_returns_empty_result() -> Result<()> {
    let store = Arc::new(SqliteVectorStore::open_memory(DIM).await?);
    let retriever = Retriever::new(
        Arc::new(MockEmbeddingProvider::new(DIM)),
        store as Arc<dyn VectorStore>,
    )?;

    let results = retriever.search("anything at all", 4).await?;
    assert!(results.is_empty());
    Ok(())
}

#[tokio::test]
async fn dimension_mismatch_fails_before_any_ingest() -> Result<()> {
    let store = Arc::new(SqliteVectorStore::open_memory(1536).await?);

    let err = IngestEngine::new(
        test_config(),
        Arc::new(LocalFileSource::new()),
        Arc::new(MockEmbeddingProvider::new(768)),
        Arc::clone(&store) as Arc<dyn VectorStore>,
    )
    .unwrap_err();

    assert!(matches!(err, PipelineError::InvalidConfiguration { .. }));
    assert_eq!(store.count().await?, 0);
    Ok(())
}

#[tokio::test]
async fn cancellation_commits_nothing_new() -> Result<()> {
    let dir = tempdir().unwrap();
    write_corpus(dir.path());

    let store = Arc::new(SqliteVectorStore::open_memory(DIM).await?);
    let engine = build_engine(MockEmbeddingProvider::new(DIM), Arc::clone(&store)).await?;

    engine.cancel_handle().cancel();
    let report = engine.run(dir.path()).await?;

    assert!(report.cancelled);
    assert_eq!(report.files_processed, 0);
    assert_eq!(store.count().await?, 0);
    Ok(())
}

#[tokio::test]
async fn assembled_context_is_bounded_and_cited() -> Result<()> {
    let dir = tempdir().unwrap();
    write_corpus(dir.path());

    let provider = MockEmbeddingProvider::new(DIM);
    let store = Arc::new(SqliteVectorStore::open_memory(DIM).await?);
    let engine = build_engine(provider.clone(), Arc::clone(&store)).await?;
    engine.run(dir.path()).await?;

    let retriever = Retriever::new(
        Arc::new(provider),
        Arc::clone(&store) as Arc<dyn VectorStore>,
    )?;
    let results = retriever.search("orders model documentation", 4).await?;
    assert!(!results.is_empty());

    let budget = 400;
    let context = Retriever::assemble_context(&results, budget);
    assert!(context.text.chars().count() <= budget);

    // Every citation corresponds to a result whose full text made it in.
    for id in &context.included {
        let scored = results.iter().find(|r| &r.record.id == id).unwrap();
        assert!(context.text.contains(&scored.record.content));
    }

    // A zero budget produces an empty context, deterministically.
    let empty = Retriever::assemble_context(&results, 0);
    assert!(empty.is_empty());
    Ok(())
}
