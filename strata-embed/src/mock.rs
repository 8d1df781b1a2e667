//! Deterministic in-memory embedding provider for tests and examples.
//!
//! Vectors are seeded from an FNV hash of the input text, so identical text
//! always maps to an identical (normalized) vector and similarity search
//! behaves predictably without loading a model. An optional failure trigger
//! makes it possible to exercise the pipeline's batch-failure handling.

use crate::error::{EmbedError, Result};
use crate::provider::{EmbeddingBatch, EmbeddingProvider, to_f16};
use async_trait::async_trait;
use fnv::FnvHasher;
use half::f16;
use std::hash::Hasher;

/// Embedding provider producing deterministic seeded vectors.
#[derive(Debug, Clone)]
pub struct MockEmbeddingProvider {
    dimension: usize,
    fail_on: Option<String>,
}

impl MockEmbeddingProvider {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            fail_on: None,
        }
    }

    /// Make every batch containing `marker` fail with a
    /// [`EmbedError::BatchFailure`] at the offending index.
    pub fn failing_on(self, marker: impl Into<String>) -> Self {
        Self {
            fail_on: Some(marker.into()),
            ..self
        }
    }

    fn vector_for(&self, text: &str) -> Vec<f16> {
        let raw: Vec<f32> = (0..self.dimension)
            .map(|lane| {
                let mut hasher = FnvHasher::default();
                hasher.write(text.as_bytes());
                hasher.write_u64(lane as u64);
                let unit = hasher.finish() as f64 / u64::MAX as f64;
                (unit * 2.0 - 1.0) as f32
            })
            .collect();
        to_f16(vec![raw], true).into_iter().next().unwrap()
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbeddingProvider {
    async fn embed_text(&self, text: &str) -> Result<Vec<f16>> {
        let texts = vec![text.to_string()];
        let batch = self.embed_texts(&texts).await?;
        Ok(batch.vectors.into_iter().next().unwrap())
    }

    async fn embed_texts(&self, texts: &[String]) -> Result<EmbeddingBatch> {
        if let Some(marker) = &self.fail_on {
            if let Some(index) = texts.iter().position(|t| t.contains(marker)) {
                return Err(EmbedError::batch_failure(
                    index,
                    anyhow::anyhow!("mock failure triggered by marker {marker:?}"),
                ));
            }
        }

        let vectors = texts.iter().map(|t| self.vector_for(t)).collect();
        Ok(EmbeddingBatch {
            vectors,
            dimension: self.dimension,
        })
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn provider_name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn identical_text_embeds_identically() {
        let provider = MockEmbeddingProvider::new(32);
        let a = provider.embed_text("select * from orders").await.unwrap();
        let b = provider.embed_text("select * from orders").await.unwrap();
        let c = provider.embed_text("something else").await.unwrap();

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 32);
    }

    #[tokio::test]
    async fn batch_of_one_matches_single_call() {
        let provider = MockEmbeddingProvider::new(16);
        let texts = vec!["dbt run --select orders".to_string()];
        let batch = provider.embed_texts(&texts).await.unwrap();
        let single = provider.embed_text(&texts[0]).await.unwrap();

        assert_eq!(batch.vectors, vec![single]);
    }

    #[tokio::test]
    async fn batch_preserves_input_order() {
        let provider = MockEmbeddingProvider::new(16);
        let texts: Vec<String> = (0..5).map(|i| format!("text {i}")).collect();
        let batch = provider.embed_texts(&texts).await.unwrap();

        assert_eq!(batch.len(), 5);
        for (i, text) in texts.iter().enumerate() {
            let single = provider.embed_text(text).await.unwrap();
            assert_eq!(batch.vectors[i], single);
        }
    }

    #[tokio::test]
    async fn vectors_are_normalized() {
        let provider = MockEmbeddingProvider::new(64);
        let vector = provider.embed_text("normalize me").await.unwrap();
        let norm: f32 = vector
            .iter()
            .map(|x| x.to_f32() * x.to_f32())
            .sum::<f32>()
            .sqrt();
        assert!((norm - 1.0).abs() < 0.05);
    }

    #[tokio::test]
    async fn failure_marker_fails_whole_batch_with_index() {
        let provider = MockEmbeddingProvider::new(8).failing_on("poison");
        let texts = vec![
            "fine".to_string(),
            "contains poison pill".to_string(),
            "also fine".to_string(),
        ];

        let err = provider.embed_texts(&texts).await.unwrap_err();
        assert_eq!(err.failing_index(), Some(1));
    }
}
