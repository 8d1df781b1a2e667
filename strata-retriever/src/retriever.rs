//! The read path: embed a query, rank stored records, assemble context.
//!
//! [`Retriever`] owns an optional query cache keyed by `(query text, top_k)`.
//! Entries are tagged with the store's mutation generation at fill time, so
//! any upsert or delete invalidates the entire cache on the next lookup.
//! Partial invalidation would mean tracking which cached queries each record
//! affects; not worth it at this scale.

use crate::error::{PipelineError, Result};
use crate::storage::{ScoredRecord, VectorStore};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use strata_context::{AssembledContext, Passage};
use strata_embed::EmbeddingProvider;
use tracing::debug;

struct CachedQuery {
    generation: u64,
    results: Vec<ScoredRecord>,
}

/// Answers similarity queries against the vector store.
pub struct Retriever {
    provider: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    cache: Mutex<HashMap<(String, usize), CachedQuery>>,
}

impl std::fmt::Debug for Retriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Retriever").finish_non_exhaustive()
    }
}

impl Retriever {
    /// Build a retriever, failing with `InvalidConfiguration` when the
    /// provider and store disagree on dimensionality.
    pub fn new(
        provider: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStore>,
    ) -> Result<Self> {
        if provider.dimension() != store.dimension() {
            return Err(PipelineError::invalid_configuration(format!(
                "embedding provider '{}' produces {}-dimensional vectors but the store is configured for {}",
                provider.provider_name(),
                provider.dimension(),
                store.dimension()
            )));
        }
        Ok(Self {
            provider,
            store,
            cache: Mutex::new(HashMap::new()),
        })
    }

    /// Embed `query` and return the `top_k` most similar records, ranked by
    /// descending cosine similarity. An empty store yields an empty result;
    /// `top_k == 0` is an `InvalidArgument` error.
    pub async fn search(&self, query: &str, top_k: usize) -> Result<Vec<ScoredRecord>> {
        if top_k == 0 {
            return Err(PipelineError::invalid_argument(
                "top_k must be greater than zero",
            ));
        }

        let generation = self.store.generation();
        let key = (query.to_string(), top_k);
        {
            let cache = self.cache.lock().unwrap();
            if let Some(hit) = cache.get(&key) {
                if hit.generation == generation {
                    debug!("query cache hit for {query:?} (top_k {top_k})");
                    return Ok(hit.results.clone());
                }
            }
        }

        let embedding = self.provider.embed_text(query).await?;
        let results = self.store.query(&embedding, top_k).await?;
        debug!("query {query:?} matched {} records", results.len());

        self.cache.lock().unwrap().insert(
            key,
            CachedQuery {
                generation,
                results: results.clone(),
            },
        );
        Ok(results)
    }

    /// Assemble ranked results into a context string of at most `max_chars`
    /// characters, with provenance headers and citation ids.
    pub fn assemble_context(results: &[ScoredRecord], max_chars: usize) -> AssembledContext {
        let passages: Vec<Passage> = results
            .iter()
            .map(|scored| Passage {
                id: scored.record.id.clone(),
                source: scored.record.metadata.source_path.clone(),
                chunk_index: scored.record.metadata.chunk_index,
                text: scored.record.content.clone(),
            })
            .collect();
        strata_context::assemble(&passages, max_chars)
    }
}
