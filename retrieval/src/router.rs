//! Action-routed memory requests.
//!
//! `store` and `retrieve` go to the stores directly; `search` goes through
//! the vector search engine.

use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use pai_memory::{ConversationMemory, ConversationMessage, KnowledgeStore, Metadata};

use crate::engine::VectorSearchEngine;
use crate::error::{Result, RetrievalError};
use crate::types::{KnowledgeSummary, SearchResultEntry, VectorSearchRequest};

/// Category used when a store request names none.
pub const DEFAULT_CATEGORY: &str = "general";

/// A memory-management request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum MemoryRequest {
    /// Embed and store content as a knowledge item.
    Store {
        #[serde(default)]
        content: String,
        #[serde(default)]
        category: Option<String>,
    },

    /// Fetch a conversation by session, or knowledge by category.
    Retrieve {
        #[serde(default)]
        session_id: Option<String>,
        #[serde(default)]
        category: Option<String>,
    },

    /// Similarity search.
    Search {
        #[serde(default)]
        query: String,
        #[serde(default)]
        top_k: Option<usize>,
        #[serde(default)]
        category: Option<String>,
        #[serde(default)]
        threshold: Option<f32>,
    },
}

impl MemoryRequest {
    /// Parse a JSON request body.
    pub fn from_json(body: &str) -> Result<Self> {
        if body.trim().is_empty() {
            return Err(RetrievalError::validation("Missing request body"));
        }
        serde_json::from_str(body)
            .map_err(|e| RetrievalError::validation(format!("Invalid request: {e}")))
    }
}

/// Outcome of a memory request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged, rename_all_fields = "camelCase")]
pub enum MemoryResponse {
    Stored {
        success: bool,
        id: String,
        message: String,
    },
    Conversation {
        session_id: String,
        messages: Vec<ConversationMessage>,
        count: usize,
    },
    Knowledge {
        category: String,
        items: Vec<KnowledgeSummary>,
        count: usize,
    },
    Search {
        query: String,
        results: Vec<SearchResultEntry>,
        count: usize,
    },
}

/// Dispatches [`MemoryRequest`]s.
pub struct MemoryRouter {
    knowledge: Arc<dyn KnowledgeStore>,
    conversations: Arc<dyn ConversationMemory>,
    engine: Arc<VectorSearchEngine>,
    history_limit: usize,
    category_limit: usize,
}

impl MemoryRouter {
    pub fn new(
        knowledge: Arc<dyn KnowledgeStore>,
        conversations: Arc<dyn ConversationMemory>,
        search: Arc<VectorSearchEngine>,
    ) -> Self {
        Self {
            knowledge,
            conversations,
            engine: search,
            history_limit: pai_memory::DEFAULT_HISTORY_LIMIT,
            category_limit: pai_memory::DEFAULT_CATEGORY_LIMIT,
        }
    }

    /// Bound the number of messages and items a retrieve returns.
    pub fn with_limits(mut self, history_limit: usize, category_limit: usize) -> Self {
        self.history_limit = history_limit;
        self.category_limit = category_limit;
        self
    }

    pub async fn handle(&self, request: MemoryRequest) -> Result<MemoryResponse> {
        match request {
            MemoryRequest::Store { content, category } => self.store(content, category).await,
            MemoryRequest::Retrieve {
                session_id,
                category,
            } => self.retrieve(session_id, category).await,
            MemoryRequest::Search {
                query,
                top_k,
                category,
                threshold,
            } => {
                let request = VectorSearchRequest {
                    query,
                    top_k,
                    category,
                    threshold,
                };
                self.search(request).await
            }
        }
    }

    async fn store(&self, content: String, category: Option<String>) -> Result<MemoryResponse> {
        if content.trim().is_empty() {
            return Err(RetrievalError::validation(
                "Content is required for store action",
            ));
        }

        let id = Uuid::new_v4().to_string();
        let category = category
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| DEFAULT_CATEGORY.to_string());

        let mut metadata = Metadata::new();
        metadata.insert("source".to_string(), "manual".into());
        metadata.insert(
            "createdAt".to_string(),
            Utc::now()
                .to_rfc3339_opts(SecondsFormat::Millis, true)
                .into(),
        );

        let item = self
            .engine
            .store_with_embedding(id.as_str(), category.as_str(), content, metadata)
            .await;
        self.knowledge.put(item).await?;

        info!("Stored knowledge item {id} in category {category}");

        Ok(MemoryResponse::Stored {
            success: true,
            id,
            message: "Content stored in long-term memory".to_string(),
        })
    }

    async fn retrieve(
        &self,
        session_id: Option<String>,
        category: Option<String>,
    ) -> Result<MemoryResponse> {
        if let Some(session_id) = session_id.filter(|s| !s.is_empty()) {
            let messages = self
                .conversations
                .get_recent(&session_id, self.history_limit)
                .await?;
            return Ok(MemoryResponse::Conversation {
                session_id,
                count: messages.len(),
                messages,
            });
        }

        if let Some(category) = category.filter(|c| !c.is_empty()) {
            let items: Vec<KnowledgeSummary> = self
                .knowledge
                .list_by_category(&category, self.category_limit)
                .await?
                .into_iter()
                .map(KnowledgeSummary::from)
                .collect();
            return Ok(MemoryResponse::Knowledge {
                category,
                count: items.len(),
                items,
            });
        }

        Err(RetrievalError::validation(
            "Either sessionId or category is required",
        ))
    }

    async fn search(&self, request: VectorSearchRequest) -> Result<MemoryResponse> {
        if request.query.trim().is_empty() {
            return Err(RetrievalError::validation(
                "Query is required for search action",
            ));
        }

        let results: Vec<SearchResultEntry> = self
            .engine
            .search(&request)
            .await?
            .items
            .into_iter()
            .map(SearchResultEntry::from)
            .collect();

        Ok(MemoryResponse::Search {
            query: request.query,
            count: results.len(),
            results,
        })
    }
}
