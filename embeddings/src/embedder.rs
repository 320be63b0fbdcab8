//! Resilient embedding front end.
//!
//! The `Embedder` tries each configured provider in order and falls back to
//! the deterministic [`LocalHashProvider`] when every provider fails or
//! returns a malformed vector. `embed` therefore always yields a vector of
//! the configured dimension.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::Embedding;
use crate::cache::EmbeddingCache;
use crate::error::{EmbeddingError, Result};
use crate::local::LocalHashProvider;
use crate::provider::{EmbeddingProvider, EmbeddingRequest};
use crate::similarity::normalize;

/// Turns text into fixed-length, unit-norm vectors.
pub struct Embedder {
    /// Providers tried in order.
    providers: Vec<Arc<dyn EmbeddingProvider>>,

    /// Last-resort provider.
    fallback: LocalHashProvider,

    /// Optional cache of provider results.
    cache: Option<EmbeddingCache>,

    /// Dimension every returned vector has.
    dimension: usize,
}

impl Embedder {
    /// Create an embedder that only uses the local fallback.
    pub fn new(dimension: usize) -> Self {
        Self {
            providers: Vec::new(),
            fallback: LocalHashProvider::new(dimension),
            cache: None,
            dimension,
        }
    }

    /// Append a provider to the chain.
    pub fn with_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.providers.push(provider);
        self
    }

    /// Cache provider results.
    pub fn with_cache(mut self, cache: EmbeddingCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Dimension of every vector this embedder returns.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Embed `text`. Never fails.
    pub async fn embed(&self, text: &str) -> Embedding {
        for provider in &self.providers {
            if !provider.is_available() {
                debug!("Skipping unavailable embedding provider: {}", provider.name());
                continue;
            }

            match self.embed_with(provider.as_ref(), text).await {
                Ok(embedding) => return embedding,
                Err(e) => warn!(
                    provider = provider.name(),
                    model = provider.default_model(),
                    "Embedding provider failed: {e}"
                ),
            }
        }

        if !self.providers.is_empty() {
            warn!("Falling back to local hash embedding");
        }
        self.fallback.embed_text(text)
    }

    /// Embed with one provider, consulting the cache first.
    async fn embed_with(&self, provider: &dyn EmbeddingProvider, text: &str) -> Result<Embedding> {
        let model = provider.default_model();

        if let Some(ref cache) = self.cache {
            if let Some(embedding) = cache.get(text, model).await {
                if embedding.len() == self.dimension {
                    debug!("Cache hit for embedding");
                    return Ok(embedding);
                }
            }
        }

        let request = EmbeddingRequest::new(text)
            .with_model(model)
            .with_dimensions(self.dimension);
        let mut embedding = provider.embed(request).await?.embedding;

        if embedding.len() != self.dimension {
            return Err(EmbeddingError::DimensionMismatch {
                expected: self.dimension,
                actual: embedding.len(),
            });
        }
        normalize(&mut embedding);

        if let Some(ref cache) = self.cache {
            if let Err(e) = cache.put(text, model, embedding.clone()).await {
                warn!("Failed to cache embedding: {e}");
            }
        }

        Ok(embedding)
    }
}
