//! strata-retriever: retrieval pipeline for data-engineering corpora.
//!
//! Ingests a file tree (warehouse DDL, dbt YAML, docs), chunks and embeds
//! it, stores vectors in SQLite, answers top-k similarity queries and
//! assembles bounded prompt contexts with citations.
//!
//! ## Key modules
//!
//! - **[`ingest`]**: the write path (file enumeration, chunking, batched
//!   embedding, storage)
//! - **[`storage`]**: the `VectorStore` trait and its SQLite implementation
//! - **[`retriever`]**: the read path (query embedding, ranking, context
//!   assembly)
//! - **[`config`]**: the pipeline configuration, built once at startup
//! - **[`error`]**: the error taxonomy
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use strata_embed::MockEmbeddingProvider;
//! use strata_retriever::config::PipelineConfig;
//! use strata_retriever::ingest::{IngestEngine, LocalFileSource};
//! use strata_retriever::retriever::Retriever;
//! use strata_retriever::storage::sqlite_store::SqliteVectorStore;
//!
//! # async fn example() -> strata_retriever::error::Result<()> {
//! let provider = Arc::new(MockEmbeddingProvider::new(384));
//! let store = Arc::new(SqliteVectorStore::open_memory(384).await?);
//!
//! let engine = IngestEngine::new(
//!     PipelineConfig::default(),
//!     Arc::new(LocalFileSource::new()),
//!     provider.clone(),
//!     store.clone(),
//! )?;
//! let report = engine.run(Path::new("models/")).await?;
//! println!("indexed {} chunks", report.chunks_written);
//!
//! let retriever = Retriever::new(provider, store)?;
//! let hits = retriever.search("orders incremental model", 4).await?;
//! let context = Retriever::assemble_context(&hits, 4000);
//! println!("{}", context.text);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! Files → FileSource → TextChunker → EmbeddingProvider → VectorStore
//!                                                            ↓
//! Query → EmbeddingProvider → Retriever → ContextAssembler → LLM (external)
//! ```

pub mod config;
pub mod error;
pub mod ingest;
pub mod retriever;
pub mod storage;
