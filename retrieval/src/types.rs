//! Request and response shapes shared by the services.

use chrono::{DateTime, Utc};
use pai_memory::{KnowledgeItem, Metadata};
use serde::{Deserialize, Serialize};

/// A similarity search over the knowledge base.
///
/// Unset fields fall back to the engine's defaults. An explicit threshold of
/// `0.0` is honoured.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VectorSearchRequest {
    pub query: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_k: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f32>,
}

impl VectorSearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = Some(top_k);
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = Some(threshold);
        self
    }
}

/// One ranked match.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub item: KnowledgeItem,
    pub similarity: f32,
}

/// Ranked matches, best first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VectorSearchResult {
    pub items: Vec<SearchHit>,
}

impl VectorSearchResult {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// A knowledge item as returned to callers, without its embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeSummary {
    pub id: String,
    pub category: String,
    pub content: String,
    pub metadata: Metadata,
    pub timestamp: DateTime<Utc>,
}

impl From<KnowledgeItem> for KnowledgeSummary {
    fn from(item: KnowledgeItem) -> Self {
        Self {
            id: item.id,
            category: item.category,
            content: item.content,
            metadata: item.metadata,
            timestamp: item.timestamp,
        }
    }
}

/// A search match as returned to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResultEntry {
    #[serde(flatten)]
    pub item: KnowledgeSummary,
    pub similarity: f32,
}

impl From<SearchHit> for SearchResultEntry {
    fn from(hit: SearchHit) -> Self {
        Self {
            item: hit.item.into(),
            similarity: hit.similarity,
        }
    }
}

/// A chat turn from the user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub message: String,

    /// Continue this session; a new one is started when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,

    /// Add matching knowledge items as context.
    #[serde(default)]
    pub use_knowledge_base: bool,
}

impl ChatRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Default::default()
        }
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_knowledge_base(mut self, enabled: bool) -> Self {
        self.use_knowledge_base = enabled;
        self
    }
}

/// The assistant's reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub response: String,
    pub session_id: String,
    pub timestamp: DateTime<Utc>,
}
