//! End-to-end walkthrough of the retrieval pipeline using the mock
//! embedding provider, so it runs without downloading a model:
//!
//! ```bash
//! cargo run --example end_to_end
//! ```

use std::sync::Arc;
use strata_embed::MockEmbeddingProvider;
use strata_retriever::config::PipelineConfig;
use strata_retriever::ingest::{IngestEngine, LocalFileSource};
use strata_retriever::retriever::Retriever;
use strata_retriever::storage::VectorStore;
use strata_retriever::storage::sqlite_store::SqliteVectorStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    // A throwaway corpus that looks like a slice of a dbt project.
    let corpus = tempfile::tempdir()?;
    std::fs::write(
        corpus.path().join("orders.sql"),
        "select order_id, customer_id, placed_at from {{ ref('stg_orders') }}\n",
    )?;
    std::fs::write(
        corpus.path().join("orders.yml"),
        "models:\n  - name: orders\n    description: Order fact table, rebuilt nightly\n",
    )?;
    std::fs::write(
        corpus.path().join("README.md"),
        "# Warehouse\n\nThe orders model feeds the finance dashboards.\n",
    )?;

    let provider = Arc::new(MockEmbeddingProvider::new(384));
    let store = Arc::new(SqliteVectorStore::open_memory(384).await?);

    let engine = IngestEngine::new(
        PipelineConfig::default().with_chunking(400, 80),
        Arc::new(LocalFileSource::new()),
        provider.clone(),
        Arc::clone(&store) as Arc<dyn VectorStore>,
    )?;
    let report = engine.run(corpus.path()).await?;
    println!(
        "Ingested {} files into {} chunks",
        report.files_processed, report.chunks_written
    );

    let retriever = Retriever::new(provider, store as Arc<dyn VectorStore>)?;
    let results = retriever.search("what rebuilds the orders model?", 3).await?;
    for scored in &results {
        println!(
            "{:.3}  {} [chunk {}]",
            scored.score, scored.record.metadata.source_path, scored.record.metadata.chunk_index
        );
    }

    let context = Retriever::assemble_context(&results, 2000);
    println!("\n--- assembled context ({} records) ---", context.included.len());
    println!("{}", context.text);
    Ok(())
}
