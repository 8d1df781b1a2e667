//! Pipeline configuration.
//!
//! One [`PipelineConfig`] value is built at startup (defaults, builder
//! methods, or a TOML file) and passed into each component's constructor.
//! There is no ambient global configuration. Invalid values fail fast with
//! `InvalidConfiguration`; they are never silently clamped.

use crate::error::{PipelineError, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use strata_context::ChunkConfig;

/// File extensions recognized by default: the text formats a
/// data-engineering corpus is actually made of.
pub const DEFAULT_EXTENSIONS: &[&str] = &["txt", "md", "py", "sql", "yml", "yaml", "json"];

/// Configuration consumed by the ingest engine and retriever.
///
/// | field                | default | valid        |
/// |----------------------|---------|--------------|
/// | `chunk_size`         | 1000    | ≥ 1          |
/// | `overlap`            | 200     | < chunk_size |
/// | `batch_size`         | 32      | ≥ 1          |
/// | `top_k`              | 4       | ≥ 1          |
/// | `workers`            | 4       | 1..=64       |
/// | `batch_timeout_secs` | 30      | ≥ 1          |
/// | `max_retries`        | 3       | any          |
/// | `retry_backoff_ms`   | 500     | ≥ 1          |
/// | `extensions`         | see [`DEFAULT_EXTENSIONS`] | non-empty |
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Chunk size in characters.
    pub chunk_size: usize,
    /// Overlap between consecutive chunks in characters.
    pub overlap: usize,
    /// Chunks per embedding batch.
    pub batch_size: usize,
    /// Default number of results a similarity query returns.
    pub top_k: usize,
    /// Concurrent embedding batch calls during ingest.
    pub workers: usize,
    /// Deadline for a single embedding batch call, in seconds.
    pub batch_timeout_secs: u64,
    /// Retries per embedding batch before the document is marked failed.
    pub max_retries: u32,
    /// Base delay between retries, in milliseconds; doubles per attempt.
    pub retry_backoff_ms: u64,
    /// File extensions (without dot) recognized during ingest.
    pub extensions: Vec<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            overlap: 200,
            batch_size: 32,
            top_k: 4,
            workers: 4,
            batch_timeout_secs: 30,
            max_retries: 3,
            retry_backoff_ms: 500,
            extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
        }
    }
}

impl PipelineConfig {
    /// Set chunk size and overlap (builder style).
    pub fn with_chunking(self, chunk_size: usize, overlap: usize) -> Self {
        Self {
            chunk_size,
            overlap,
            ..self
        }
    }

    pub fn with_batch_size(self, batch_size: usize) -> Self {
        Self { batch_size, ..self }
    }

    pub fn with_top_k(self, top_k: usize) -> Self {
        Self { top_k, ..self }
    }

    pub fn with_workers(self, workers: usize) -> Self {
        Self { workers, ..self }
    }

    pub fn with_batch_timeout(self, timeout: Duration) -> Self {
        Self {
            batch_timeout_secs: timeout.as_secs(),
            ..self
        }
    }

    pub fn with_max_retries(self, max_retries: u32) -> Self {
        Self {
            max_retries,
            ..self
        }
    }

    pub fn with_retry_backoff(self, backoff: Duration) -> Self {
        Self {
            retry_backoff_ms: backoff.as_millis() as u64,
            ..self
        }
    }

    pub fn with_extensions(self, extensions: Vec<String>) -> Self {
        Self { extensions, ..self }
    }

    pub fn batch_timeout(&self) -> Duration {
        Duration::from_secs(self.batch_timeout_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    /// The chunking parameters as a [`ChunkConfig`].
    pub fn chunk_config(&self) -> ChunkConfig {
        ChunkConfig::new(self.chunk_size, self.overlap)
    }

    /// Check every field against its valid range.
    pub fn validate(&self) -> Result<()> {
        self.chunk_config().validate()?;
        if self.batch_size == 0 {
            return Err(PipelineError::invalid_configuration(
                "batch_size must be greater than zero",
            ));
        }
        if self.top_k == 0 {
            return Err(PipelineError::invalid_configuration(
                "top_k must be greater than zero",
            ));
        }
        if self.workers == 0 || self.workers > 64 {
            return Err(PipelineError::invalid_configuration(format!(
                "workers must be between 1 and 64, got {}",
                self.workers
            )));
        }
        if self.batch_timeout_secs == 0 {
            return Err(PipelineError::invalid_configuration(
                "batch_timeout_secs must be greater than zero",
            ));
        }
        if self.retry_backoff_ms == 0 {
            return Err(PipelineError::invalid_configuration(
                "retry_backoff_ms must be greater than zero",
            ));
        }
        if self.extensions.is_empty() {
            return Err(PipelineError::invalid_configuration(
                "extensions must not be empty",
            ));
        }
        Ok(())
    }

    /// Load and validate a configuration from a TOML file. Missing fields
    /// take their defaults, unknown fields are rejected.
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::invalid_configuration(format!(
                "cannot read config file {}: {e}",
                path.display()
            ))
        })?;
        let config: Self = toml::from_str(&raw).map_err(|e| {
            PipelineError::invalid_configuration(format!(
                "cannot parse config file {}: {e}",
                path.display()
            ))
        })?;
        config.validate()?;
        Ok(config)
    }
}
