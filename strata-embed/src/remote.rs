//! Hosted embedding backend speaking the OpenAI-compatible embeddings API.
//!
//! Network and auth details stay here: the pipeline only ever sees the
//! [`EmbeddingProvider`] capability. The endpoint does not advertise its
//! dimensionality, so the configuration declares it and every response is
//! checked against it.

use crate::error::{EmbedError, Result};
use crate::provider::{EmbeddingBatch, EmbeddingProvider, to_f16};
use async_trait::async_trait;
use half::f16;
use reqwest::Client;
use serde::{Deserialize, Serialize};

/// Configuration for an OpenAI-compatible embeddings endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteEmbedConfig {
    /// Base URL of the API, e.g. `https://api.openai.com/v1`.
    pub api_base: String,
    /// Bearer token for the API.
    pub api_key: String,
    /// Model name sent with each request.
    pub model_name: String,
    /// Dimensionality the endpoint is expected to return.
    pub dimension: usize,
    /// Whether to L2-normalize returned vectors.
    #[serde(default = "default_normalize")]
    pub normalize: bool,
}

fn default_normalize() -> bool {
    true
}

impl RemoteEmbedConfig {
    pub fn validate(&self) -> Result<()> {
        if self.api_base.is_empty() {
            return Err(EmbedError::invalid_config("api_base must not be empty"));
        }
        if self.model_name.is_empty() {
            return Err(EmbedError::invalid_config("model_name must not be empty"));
        }
        if self.dimension == 0 {
            return Err(EmbedError::invalid_config(
                "dimension must be greater than zero",
            ));
        }
        Ok(())
    }
}

#[derive(Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Deserialize)]
struct EmbeddingItem {
    index: usize,
    embedding: Vec<f32>,
}

/// Embedding provider backed by a hosted OpenAI-compatible endpoint.
#[derive(Debug, Clone)]
pub struct HttpEmbeddingProvider {
    config: RemoteEmbedConfig,
    client: Client,
}

impl HttpEmbeddingProvider {
    pub fn new(config: RemoteEmbedConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            client: Client::new(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/embeddings", self.config.api_base.trim_end_matches('/'))
    }
}

#[async_trait]
impl EmbeddingProvider for HttpEmbeddingProvider {
    async fn embed_text(&self, text: &str) -> Result<Vec<f16>> {
        let texts = vec![text.to_string()];
        let batch = self.embed_texts(&texts).await?;
        batch
            .vectors
            .into_iter()
            .next()
            .ok_or_else(|| EmbedError::batch_failure(0, anyhow::anyhow!("empty response")))
    }

    async fn embed_texts(&self, texts: &[String]) -> Result<EmbeddingBatch> {
        if texts.is_empty() {
            return Ok(EmbeddingBatch::new(vec![]));
        }

        tracing::debug!("requesting {} embeddings from {}", texts.len(), self.endpoint());

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.config.api_key)
            .json(&EmbeddingsRequest {
                model: &self.config.model_name,
                input: texts,
            })
            .send()
            .await?
            .error_for_status()?;

        let body: EmbeddingsResponse = response.json().await?;

        if body.data.len() != texts.len() {
            return Err(EmbedError::batch_failure(
                body.data.len().min(texts.len().saturating_sub(1)),
                anyhow::anyhow!(
                    "endpoint returned {} embeddings for {} inputs",
                    body.data.len(),
                    texts.len()
                ),
            ));
        }

        // The API may return items out of order; the index field is
        // authoritative.
        let mut ordered: Vec<Option<Vec<f32>>> = vec![None; texts.len()];
        for item in body.data {
            if item.index >= texts.len() {
                return Err(EmbedError::batch_failure(
                    texts.len() - 1,
                    anyhow::anyhow!("endpoint returned out-of-range index {}", item.index),
                ));
            }
            ordered[item.index] = Some(item.embedding);
        }

        let mut raw = Vec::with_capacity(texts.len());
        for (i, slot) in ordered.into_iter().enumerate() {
            let embedding = slot.ok_or_else(|| {
                EmbedError::batch_failure(i, anyhow::anyhow!("endpoint returned no embedding"))
            })?;
            if embedding.len() != self.config.dimension {
                return Err(EmbedError::batch_failure(
                    i,
                    anyhow::anyhow!(
                        "embedding has dimension {} but endpoint is configured for {}",
                        embedding.len(),
                        self.config.dimension
                    ),
                ));
            }
            raw.push(embedding);
        }

        Ok(EmbeddingBatch {
            vectors: to_f16(raw, self.config.normalize),
            dimension: self.config.dimension,
        })
    }

    fn dimension(&self) -> usize {
        self.config.dimension
    }

    fn provider_name(&self) -> &str {
        "openai-compatible"
    }
}
