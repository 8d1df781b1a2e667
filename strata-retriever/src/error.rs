//! Error taxonomy for the retrieval pipeline.
//!
//! Two classes of failure matter to callers: fatal errors that must stop an
//! operation before it touches anything (`InvalidConfiguration`,
//! `StoreUnavailable`) and per-document failures that an ingest run isolates
//! and reports (`UnsupportedEncoding`, `DocumentIo`, `Embedding`).
//! [`PipelineError::is_fatal`] encodes that split for the ingest engine.

use std::path::{Path, PathBuf};
use strata_embed::EmbedError;

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Unusable configuration. Raised at startup, before any ingest or
    /// query runs; never recovered from.
    #[error("invalid configuration: {message}")]
    InvalidConfiguration { message: String },

    /// A document is not valid UTF-8 text. Isolated to the document rather
    /// than silently corrupting its content with lossy decoding.
    #[error("unsupported encoding in {path}")]
    UnsupportedEncoding { path: PathBuf },

    /// Per-document I/O failure (unreadable file, permissions).
    #[error("failed to read {path}: {source}")]
    DocumentIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Embedding failed, after the ingest engine exhausted its retries.
    #[error("embedding failed: {source}")]
    Embedding {
        #[from]
        source: EmbedError,
    },

    /// The vector store is unreachable or corrupt. Fatal for the current
    /// operation and not retried; it signals an environment problem.
    #[error("vector store unavailable: {source}")]
    StoreUnavailable {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Caller error on a synchronous API (e.g. `top_k == 0`).
    #[error("invalid argument: {message}")]
    InvalidArgument { message: String },

    /// Async task join errors.
    #[error("async task failed: {source}")]
    Task {
        #[from]
        source: tokio::task::JoinError,
    },
}

impl PipelineError {
    pub fn invalid_configuration<S: Into<String>>(message: S) -> Self {
        Self::InvalidConfiguration {
            message: message.into(),
        }
    }

    pub fn invalid_argument<S: Into<String>>(message: S) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    pub fn document_io(path: &Path, source: std::io::Error) -> Self {
        Self::DocumentIo {
            path: path.to_path_buf(),
            source,
        }
    }

    pub fn store<E>(source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::StoreUnavailable {
            source: Box::new(source),
        }
    }

    /// Whether an ingest run must abort instead of skipping the current
    /// document and continuing.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::InvalidConfiguration { .. } | Self::StoreUnavailable { .. }
        )
    }
}

impl From<strata_context::ChunkError> for PipelineError {
    fn from(err: strata_context::ChunkError) -> Self {
        Self::invalid_configuration(err.to_string())
    }
}
