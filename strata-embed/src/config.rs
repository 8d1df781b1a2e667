//! Configuration for local embedding models.

use crate::error::{EmbedError, Result};
use serde::{Deserialize, Serialize};

/// Model identifier for the small default model. 384 dimensions, fast enough
/// to index a repository interactively.
pub const DEFAULT_MODEL: &str = "all-minilm-l6-v2";

/// Configuration for the local (fastembed) embedding provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbedConfig {
    /// Name of the embedding model to load.
    pub model_name: String,
    /// Inputs per inference call; bounds peak memory during embedding.
    pub batch_size: usize,
    /// Whether to L2-normalize vectors after generation. Normalized vectors
    /// make cosine similarity a plain dot product downstream.
    pub normalize: bool,
}

impl Default for EmbedConfig {
    fn default() -> Self {
        Self {
            model_name: DEFAULT_MODEL.to_string(),
            batch_size: 16,
            normalize: true,
        }
    }
}

impl EmbedConfig {
    pub fn new(model_name: impl Into<String>) -> Self {
        Self {
            model_name: model_name.into(),
            ..Self::default()
        }
    }

    /// Set the inference batch size (builder style).
    pub fn with_batch_size(self, batch_size: usize) -> Self {
        Self { batch_size, ..self }
    }

    /// Set whether to normalize embeddings (builder style).
    pub fn with_normalize(self, normalize: bool) -> Self {
        Self { normalize, ..self }
    }

    /// Validate the configuration before any model is loaded.
    pub fn validate(&self) -> Result<()> {
        if self.model_name.is_empty() {
            return Err(EmbedError::invalid_config("model_name must not be empty"));
        }
        if self.batch_size == 0 {
            return Err(EmbedError::invalid_config(
                "batch_size must be greater than zero",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = EmbedConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.model_name, DEFAULT_MODEL);
        assert_eq!(config.batch_size, 16);
        assert!(config.normalize);
    }

    #[test]
    fn builder_methods() {
        let config = EmbedConfig::new("bge-small-en-v1.5")
            .with_batch_size(64)
            .with_normalize(false);

        assert_eq!(config.model_name, "bge-small-en-v1.5");
        assert_eq!(config.batch_size, 64);
        assert!(!config.normalize);
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let config = EmbedConfig::default().with_batch_size(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn empty_model_name_is_rejected() {
        let config = EmbedConfig::new("");
        assert!(config.validate().is_err());
    }
}
