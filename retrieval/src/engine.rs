//! Vector search over the knowledge base.

use std::sync::Arc;

use chrono::Utc;
use tracing::debug;

use pai_embeddings::{Embedder, rank_top_k};
use pai_memory::{KnowledgeItem, KnowledgeStore, Metadata};

use crate::error::Result;
use crate::types::{SearchHit, VectorSearchRequest, VectorSearchResult};

/// Default number of results.
pub const DEFAULT_TOP_K: usize = 5;

/// Default minimum similarity.
pub const DEFAULT_THRESHOLD: f32 = 0.5;

/// Semantic search engine.
///
/// Every search embeds the query and scores it against every candidate the
/// store yields. There is no index: cost grows linearly with the number of
/// stored items.
pub struct VectorSearchEngine {
    /// Query and content embedder.
    embedder: Arc<Embedder>,

    /// Source of candidates.
    store: Arc<dyn KnowledgeStore>,

    default_top_k: usize,
    default_threshold: f32,
}

impl VectorSearchEngine {
    pub fn new(embedder: Arc<Embedder>, store: Arc<dyn KnowledgeStore>) -> Self {
        Self {
            embedder,
            store,
            default_top_k: DEFAULT_TOP_K,
            default_threshold: DEFAULT_THRESHOLD,
        }
    }

    /// Override the values used when a request leaves them unset.
    pub fn with_defaults(mut self, top_k: usize, threshold: f32) -> Self {
        self.default_top_k = top_k;
        self.default_threshold = threshold;
        self
    }

    /// Rank stored items against `request.query`.
    ///
    /// An empty store, or no item clearing the threshold, yields an empty
    /// result.
    pub async fn search(&self, request: &VectorSearchRequest) -> Result<VectorSearchResult> {
        let top_k = request.top_k.unwrap_or(self.default_top_k);
        let threshold = request.threshold.unwrap_or(self.default_threshold);

        let query_embedding = self.embedder.embed(&request.query).await;
        let candidates = self.store.scan_all(request.category.as_deref()).await?;
        let scanned = candidates.len();

        let ranked = rank_top_k(
            &query_embedding,
            candidates,
            |item| item.embedding.as_slice(),
            top_k,
            threshold,
        )?;

        debug!(
            scanned,
            matched = ranked.len(),
            top_k,
            threshold,
            "Vector search complete"
        );

        Ok(VectorSearchResult {
            items: ranked
                .into_iter()
                .map(|scored| SearchHit {
                    item: scored.item,
                    similarity: scored.score,
                })
                .collect(),
        })
    }

    /// Build a knowledge item for `content`, timestamped now.
    ///
    /// The item is not stored; persisting it is up to the caller.
    pub async fn store_with_embedding(
        &self,
        id: impl Into<String>,
        category: impl Into<String>,
        content: impl Into<String>,
        metadata: Metadata,
    ) -> KnowledgeItem {
        let content = content.into();
        let embedding = self.embedder.embed(&content).await;

        KnowledgeItem {
            id: id.into(),
            category: category.into(),
            content,
            embedding,
            metadata,
            timestamp: Utc::now(),
        }
    }

    /// The embedder used for queries and content.
    pub fn embedder(&self) -> &Arc<Embedder> {
        &self.embedder
    }
}
