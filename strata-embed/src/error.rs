//! Error types for the embedding system.

/// Result type for embedding operations.
pub type Result<T> = std::result::Result<T, EmbedError>;

/// Error type covering all embedding operations, from configuration problems
/// to runtime failures during embedding generation.
///
/// Batch embedding fails atomically: when any input in a batch cannot be
/// embedded, the whole call fails with [`EmbedError::BatchFailure`] carrying
/// the index of the failing input, and nothing is written downstream.
#[derive(Debug, thiserror::Error)]
pub enum EmbedError {
    /// The provider configuration is unusable.
    #[error("invalid embedding configuration: {message}")]
    InvalidConfig { message: String },

    /// A batch could not be embedded; `index` is the position of the first
    /// input the failure is attributed to.
    #[error("embedding batch failed at input {index}: {source}")]
    BatchFailure {
        index: usize,
        source: anyhow::Error,
    },

    /// HTTP transport failure against a hosted embedding backend.
    #[error("embedding request failed: {source}")]
    Request {
        #[from]
        source: reqwest::Error,
    },

    /// IO errors when touching model files.
    #[error("IO error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// Async task join errors.
    #[error("async task failed: {source}")]
    AsyncTask {
        #[from]
        source: tokio::task::JoinError,
    },

    /// Generic errors from other libraries.
    #[error("external error: {source}")]
    External {
        #[from]
        source: anyhow::Error,
    },
}

impl EmbedError {
    /// Create an invalid configuration error with a custom message.
    pub fn invalid_config<S: Into<String>>(message: S) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Create a batch failure attributed to the input at `index`.
    pub fn batch_failure<E: Into<anyhow::Error>>(index: usize, source: E) -> Self {
        Self::BatchFailure {
            index,
            source: source.into(),
        }
    }

    /// The failing input index, when this error is a batch failure.
    pub fn failing_index(&self) -> Option<usize> {
        match self {
            Self::BatchFailure { index, .. } => Some(*index),
            _ => None,
        }
    }
}
