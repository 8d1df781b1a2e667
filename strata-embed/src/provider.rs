//! Embedding provider trait and the local fastembed adapter.
//!
//! [`EmbeddingProvider`] is the capability the pipeline depends on: map text
//! to fixed-dimensionality vectors, in batches that preserve input order and
//! fail atomically. [`FastEmbedProvider`] implements it with a local ONNX
//! model; the hosted-API adapter lives in [`crate::remote`] and the
//! deterministic test adapter in [`crate::mock`].
//!
//! Loaded models are cached process-wide so repeated provider construction
//! with the same configuration does not reload weights from disk.

use crate::config::EmbedConfig;
use crate::error::{EmbedError, Result};
use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use fnv::FnvHasher;
use half::f16;
use std::collections::HashMap;
use std::hash::Hasher;
use std::sync::{Arc, Mutex, OnceLock};

/// Result of embedding a batch of texts. `vectors[i]` is the embedding of
/// input `i`; order always matches the input slice.
#[derive(Debug, Clone)]
pub struct EmbeddingBatch {
    pub vectors: Vec<Vec<f16>>,
    /// Dimension of each vector; 0 for an empty batch.
    pub dimension: usize,
}

impl EmbeddingBatch {
    pub fn new(vectors: Vec<Vec<f16>>) -> Self {
        let dimension = vectors.first().map(|v| v.len()).unwrap_or(0);
        Self { vectors, dimension }
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }
}

/// Trait for embedding backends.
///
/// Implementations must keep `embed_texts` output in input order and fail
/// the whole call on any per-input failure; partial results are never
/// returned. `embed_texts(&[t])` must equal `[embed_text(t)]`.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate an embedding for a single text.
    async fn embed_text(&self, text: &str) -> Result<Vec<f16>>;

    /// Generate embeddings for multiple texts, atomically and in order.
    async fn embed_texts(&self, texts: &[String]) -> Result<EmbeddingBatch>;

    /// The fixed dimensionality of vectors produced by this provider.
    fn dimension(&self) -> usize;

    /// Name/identifier of this provider.
    fn provider_name(&self) -> &str;
}

/// Convert f32 backend output to f16, optionally L2-normalizing each vector.
pub(crate) fn to_f16(embeddings: Vec<Vec<f32>>, normalize: bool) -> Vec<Vec<f16>> {
    embeddings
        .into_iter()
        .map(|embedding| {
            let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
            let scale = if normalize && norm > 0.0 { 1.0 / norm } else { 1.0 };
            embedding
                .into_iter()
                .map(|x| f16::from_f32(x * scale))
                .collect()
        })
        .collect()
}

/// Type alias for cached model entries (model, dimension).
type ModelCacheEntry = (Arc<Mutex<TextEmbedding>>, usize);

/// Global cache of initialized models, keyed by configuration hash.
static MODEL_CACHE: OnceLock<Mutex<HashMap<String, ModelCacheEntry>>> = OnceLock::new();

fn model_cache() -> &'static Mutex<HashMap<String, ModelCacheEntry>> {
    MODEL_CACHE.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Local embedding provider backed by a fastembed ONNX model.
#[derive(Clone)]
pub struct FastEmbedProvider {
    config: EmbedConfig,
    model: Option<Arc<Mutex<TextEmbedding>>>,
    dimension: usize,
}

impl std::fmt::Debug for FastEmbedProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FastEmbedProvider")
            .field("config", &self.config)
            .field("model", &self.model.is_some())
            .field("dimension", &self.dimension)
            .finish()
    }
}

impl FastEmbedProvider {
    /// Create an uninitialized provider. Call [`initialize`](Self::initialize)
    /// or use [`create`](Self::create) before embedding.
    pub fn new(config: EmbedConfig) -> Self {
        Self {
            config,
            model: None,
            dimension: 384,
        }
    }

    /// Create and initialize a provider in one step.
    pub async fn create(config: EmbedConfig) -> Result<Self> {
        let mut provider = Self::new(config);
        provider.initialize().await?;
        Ok(provider)
    }

    fn builtin_model(name: &str) -> Result<EmbeddingModel> {
        match name.to_ascii_lowercase().as_str() {
            "all-minilm-l6-v2" => Ok(EmbeddingModel::AllMiniLML6V2),
            "bge-small-en-v1.5" => Ok(EmbeddingModel::BGESmallENV15),
            other => Err(EmbedError::invalid_config(format!(
                "unknown embedding model: {other}"
            ))),
        }
    }

    /// Load the configured model, reusing a process-wide cache when the same
    /// configuration was loaded before.
    pub async fn initialize(&mut self) -> Result<()> {
        self.config.validate()?;
        let cache_key = self.cache_key();

        let cached = {
            let cache = model_cache().lock().unwrap();
            cache
                .get(&cache_key)
                .map(|(model, dim)| (Arc::clone(model), *dim))
        };
        if let Some((model, dimension)) = cached {
            tracing::debug!("using cached embedding model: {}", self.config.model_name);
            self.model = Some(model);
            self.dimension = dimension;
            return Ok(());
        }

        tracing::info!("loading embedding model: {}", self.config.model_name);
        let model_kind = Self::builtin_model(&self.config.model_name)?;

        let (model, dimension) =
            tokio::task::spawn_blocking(move || -> Result<(TextEmbedding, usize)> {
                let init_options =
                    InitOptions::new(model_kind).with_show_download_progress(false);
                let mut model = TextEmbedding::try_new(init_options)
                    .map_err(|e| EmbedError::External { source: e })?;

                // Probe the dimension with a throwaway embedding.
                let probe = model
                    .embed(vec!["dimension probe".to_string()], None)
                    .map_err(|e| EmbedError::External { source: e })?;
                let dimension = probe.first().map(|e| e.len()).unwrap_or(384);
                Ok((model, dimension))
            })
            .await??;

        tracing::info!(
            "embedding model loaded: {} ({} dimensions)",
            self.config.model_name,
            dimension
        );

        let model = Arc::new(Mutex::new(model));
        {
            let mut cache = model_cache().lock().unwrap();
            cache.insert(cache_key, (Arc::clone(&model), dimension));
        }
        self.model = Some(model);
        self.dimension = dimension;
        Ok(())
    }

    /// Deterministic cache key derived from the full configuration.
    fn cache_key(&self) -> String {
        let config_json =
            serde_json::to_string(&self.config).expect("config should always serialize");
        let mut hasher = FnvHasher::default();
        hasher.write(config_json.as_bytes());
        format!("{:x}", hasher.finish())
    }

    /// Clear the process-wide model cache.
    pub fn clear_cache() {
        model_cache().lock().unwrap().clear();
    }
}

#[async_trait]
impl EmbeddingProvider for FastEmbedProvider {
    async fn embed_text(&self, text: &str) -> Result<Vec<f16>> {
        let texts = vec![text.to_string()];
        let batch = self.embed_texts(&texts).await?;
        batch
            .vectors
            .into_iter()
            .next()
            .ok_or_else(|| EmbedError::invalid_config("no embedding generated for text"))
    }

    async fn embed_texts(&self, texts: &[String]) -> Result<EmbeddingBatch> {
        if texts.is_empty() {
            return Ok(EmbeddingBatch::new(vec![]));
        }

        let model = self.model.as_ref().ok_or_else(|| {
            EmbedError::invalid_config("model not initialized, call initialize() first")
        })?;

        tracing::debug!("embedding {} texts", texts.len());

        let mut vectors = Vec::with_capacity(texts.len());
        for (batch_start, sub_batch) in texts
            .chunks(self.config.batch_size)
            .enumerate()
            .map(|(i, c)| (i * self.config.batch_size, c))
        {
            let inputs = sub_batch.to_vec();
            let expected = inputs.len();
            let model = Arc::clone(model);

            let raw = tokio::task::spawn_blocking(move || -> Result<Vec<Vec<f32>>> {
                let mut guard = model.lock().unwrap();
                guard
                    .embed(inputs, None)
                    .map_err(|e| EmbedError::batch_failure(batch_start, e))
            })
            .await??;

            if raw.len() != expected {
                return Err(EmbedError::batch_failure(
                    batch_start + raw.len(),
                    anyhow::anyhow!("backend returned {} embeddings for {} inputs", raw.len(), expected),
                ));
            }
            vectors.extend(to_f16(raw, self.config.normalize));
        }

        for (i, vector) in vectors.iter().enumerate() {
            if vector.len() != self.dimension {
                return Err(EmbedError::batch_failure(
                    i,
                    anyhow::anyhow!(
                        "embedding has dimension {} but provider is configured for {}",
                        vector.len(),
                        self.dimension
                    ),
                ));
            }
        }

        Ok(EmbeddingBatch {
            vectors,
            dimension: self.dimension,
        })
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn provider_name(&self) -> &str {
        "fastembed"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedding_batch_infers_dimension() {
        let vectors = vec![
            vec![f16::from_f32(0.1), f16::from_f32(0.2), f16::from_f32(0.3)],
            vec![f16::from_f32(0.4), f16::from_f32(0.5), f16::from_f32(0.6)],
        ];
        let batch = EmbeddingBatch::new(vectors);

        assert_eq!(batch.len(), 2);
        assert_eq!(batch.dimension, 3);
        assert!(!batch.is_empty());
    }

    #[test]
    fn empty_batch_has_zero_dimension() {
        let batch = EmbeddingBatch::new(vec![]);
        assert!(batch.is_empty());
        assert_eq!(batch.dimension, 0);
    }

    #[test]
    fn to_f16_normalizes_to_unit_length() {
        let vectors = to_f16(vec![vec![3.0, 4.0]], true);
        let norm: f32 = vectors[0]
            .iter()
            .map(|x| x.to_f32() * x.to_f32())
            .sum::<f32>()
            .sqrt();
        assert!((norm - 1.0).abs() < 0.01);
    }

    #[test]
    fn to_f16_leaves_zero_vector_alone() {
        let vectors = to_f16(vec![vec![0.0, 0.0]], true);
        assert!(vectors[0].iter().all(|x| x.to_f32() == 0.0));
    }

    #[test]
    fn unknown_model_is_rejected() {
        assert!(FastEmbedProvider::builtin_model("modernbert-base").is_err());
        assert!(FastEmbedProvider::builtin_model("all-minilm-l6-v2").is_ok());
        assert!(FastEmbedProvider::builtin_model("All-MiniLM-L6-v2").is_ok());
    }

    #[test]
    fn cache_key_is_deterministic_per_config() {
        let a = FastEmbedProvider::new(EmbedConfig::default());
        let b = FastEmbedProvider::new(EmbedConfig::default());
        assert_eq!(a.cache_key(), b.cache_key());

        let c = FastEmbedProvider::new(EmbedConfig::new("bge-small-en-v1.5"));
        assert_ne!(a.cache_key(), c.cache_key());
    }

    #[tokio::test]
    #[ignore] // Downloads the model; run with: cargo test -- --ignored
    async fn embeds_with_real_model() -> Result<()> {
        let provider = FastEmbedProvider::create(EmbedConfig::default()).await?;
        assert_eq!(provider.dimension(), 384);

        let texts = vec![
            "incremental dbt model for orders".to_string(),
            "snowflake warehouse sizing".to_string(),
        ];
        let batch = provider.embed_texts(&texts).await?;
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.dimension, 384);

        let single = provider.embed_text(&texts[0]).await?;
        assert_eq!(single.len(), 384);
        let cosine: f32 = single
            .iter()
            .zip(batch.vectors[0].iter())
            .map(|(a, b)| a.to_f32() * b.to_f32())
            .sum();
        assert!(cosine > 0.99);
        Ok(())
    }
}
