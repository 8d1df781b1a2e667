//! strata-embed: embedding providers for the strata retrieval pipeline.
//!
//! The pipeline depends only on the [`EmbeddingProvider`] trait; concrete
//! adapters are interchangeable:
//!
//! - [`FastEmbedProvider`]: local ONNX models via fastembed
//! - [`HttpEmbeddingProvider`]: hosted OpenAI-compatible endpoints
//! - [`MockEmbeddingProvider`]: deterministic vectors for tests
//!
//! All adapters produce fixed-dimensionality `f16` vectors (normalized by
//! default) and embed batches atomically: output order matches input order
//! and any per-input failure fails the whole call with the failing index.
//!
//! # Example
//!
//! ```
//! use strata_embed::{EmbeddingProvider, MockEmbeddingProvider};
//!
//! # async fn example() -> strata_embed::Result<()> {
//! let provider = MockEmbeddingProvider::new(384);
//! let vector = provider.embed_text("incremental model for orders").await?;
//! assert_eq!(vector.len(), provider.dimension());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod mock;
pub mod provider;
pub mod remote;

pub use config::EmbedConfig;
pub use error::{EmbedError, Result};
pub use mock::MockEmbeddingProvider;
pub use provider::{EmbeddingBatch, EmbeddingProvider, FastEmbedProvider};
pub use remote::{HttpEmbeddingProvider, RemoteEmbedConfig};
