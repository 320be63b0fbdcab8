//! The assembled assistant.

use std::sync::Arc;

use chrono::TimeDelta;
use tracing::{info, warn};

use pai_embeddings::{Embedder, EmbeddingCache, HttpEmbeddingProvider};
use pai_memory::{
    AesGcmSealer, Clock, ConversationLog, ConversationMemory, KnowledgeBase, PassthroughSealer,
    Sealer, SystemClock,
};

use crate::chat::ChatService;
use crate::completion::{CompletionProvider, EchoCompletionProvider, HttpCompletionProvider};
use crate::config::{RetrievalConfig, read_secret};
use crate::engine::VectorSearchEngine;
use crate::error::{Result, RetrievalError, ServiceError};
use crate::router::{MemoryRequest, MemoryResponse, MemoryRouter};
use crate::types::{ChatRequest, ChatResponse, VectorSearchRequest, VectorSearchResult};

/// Personal assistant: knowledge base, conversation memory, search and chat
/// wired together.
///
/// Collaborators are built once from [`RetrievalConfig`] and shared by the
/// services. Every public operation returns a [`ServiceError`] that tells a
/// caller mistake apart from an internal fault.
pub struct Assistant {
    config: RetrievalConfig,
    knowledge: Arc<KnowledgeBase>,
    conversations: Arc<ConversationLog>,
    search: Arc<VectorSearchEngine>,
    chat: ChatService,
    router: MemoryRouter,
}

impl Assistant {
    /// Create a new assistant builder.
    pub fn builder() -> AssistantBuilder {
        AssistantBuilder::new()
    }

    /// Build an assistant from configuration with default collaborators.
    pub async fn new(config: RetrievalConfig) -> Result<Self> {
        AssistantBuilder::new().with_config(config).build().await
    }

    /// Run one chat turn.
    pub async fn chat(&self, request: ChatRequest) -> std::result::Result<ChatResponse, ServiceError> {
        self.chat.chat(request).await.map_err(ServiceError::from)
    }

    /// Handle a `store`, `retrieve` or `search` request.
    pub async fn handle(
        &self,
        request: MemoryRequest,
    ) -> std::result::Result<MemoryResponse, ServiceError> {
        self.router.handle(request).await.map_err(ServiceError::from)
    }

    /// Parse and handle a JSON memory request.
    pub async fn handle_json(&self, body: &str) -> std::result::Result<MemoryResponse, ServiceError> {
        let request = MemoryRequest::from_json(body)?;
        self.handle(request).await
    }

    /// Similarity search.
    pub async fn search(
        &self,
        request: VectorSearchRequest,
    ) -> std::result::Result<VectorSearchResult, ServiceError> {
        if request.query.trim().is_empty() {
            return Err(ServiceError::invalid_request("Query is required"));
        }
        self.search
            .search(&request)
            .await
            .map_err(ServiceError::from)
    }

    /// Remove expired conversation messages.
    pub async fn purge_expired(&self) -> std::result::Result<usize, ServiceError> {
        self.conversations
            .purge_expired()
            .await
            .map_err(|e| RetrievalError::from(e).into())
    }

    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    pub fn knowledge(&self) -> &Arc<KnowledgeBase> {
        &self.knowledge
    }

    pub fn conversations(&self) -> &Arc<ConversationLog> {
        &self.conversations
    }

    pub fn search_engine(&self) -> &Arc<VectorSearchEngine> {
        &self.search
    }
}

/// Builder for [`Assistant`].
///
/// Anything not supplied explicitly is derived from the configuration.
pub struct AssistantBuilder {
    config: RetrievalConfig,
    in_memory: bool,
    sealer: Option<Arc<dyn Sealer>>,
    clock: Option<Arc<dyn Clock>>,
    embedder: Option<Embedder>,
    completion: Option<Arc<dyn CompletionProvider>>,
}

impl AssistantBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            config: RetrievalConfig::default(),
            in_memory: false,
            sealer: None,
            clock: None,
            embedder: None,
            completion: None,
        }
    }

    /// Use `config` instead of the defaults.
    pub fn with_config(mut self, config: RetrievalConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the data directory.
    pub fn with_data_dir(mut self, dir: impl Into<std::path::PathBuf>) -> Self {
        self.config.data_dir = dir.into();
        self
    }

    /// Keep everything in memory instead of under the data directory.
    pub fn in_memory(mut self) -> Self {
        self.in_memory = true;
        self
    }

    /// Seal stored content with `sealer` instead of the configured one.
    pub fn with_sealer(mut self, sealer: Arc<dyn Sealer>) -> Self {
        self.sealer = Some(sealer);
        self
    }

    /// Use a different time source.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Use a prepared embedder instead of one built from the config.
    pub fn with_embedder(mut self, embedder: Embedder) -> Self {
        self.embedder = Some(embedder);
        self
    }

    /// Use a prepared completion provider.
    pub fn with_completion(mut self, completion: Arc<dyn CompletionProvider>) -> Self {
        self.completion = Some(completion);
        self
    }

    /// Build the assistant.
    pub async fn build(self) -> Result<Assistant> {
        info!("Initializing assistant");

        let config = self.config;
        let sealer = match self.sealer {
            Some(sealer) => sealer,
            None => sealer_from_config(&config)?,
        };
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let embedder = match self.embedder {
            Some(embedder) => embedder,
            None => embedder_from_config(&config, self.in_memory).await?,
        };
        let completion = self
            .completion
            .unwrap_or_else(|| completion_from_config(&config));

        let dimension = embedder.dimension();
        let retention = retention_from_config(&config)?;

        let (knowledge, conversations) = if self.in_memory {
            (
                KnowledgeBase::in_memory(sealer.clone(), dimension),
                ConversationLog::in_memory(sealer),
            )
        } else {
            (
                KnowledgeBase::open(config.knowledge_dir(), sealer.clone(), dimension).await?,
                ConversationLog::open(config.conversations_dir(), sealer).await?,
            )
        };
        let knowledge = Arc::new(knowledge);
        let conversations = Arc::new(
            conversations
                .with_clock(clock.clone())
                .with_retention(retention),
        );

        let search = Arc::new(
            VectorSearchEngine::new(Arc::new(embedder), knowledge.clone())
                .with_defaults(config.search.default_top_k, config.search.default_threshold),
        );
        let chat = ChatService::new(conversations.clone(), search.clone(), completion)
            .with_config(&config.chat)
            .with_clock(clock);
        let router = MemoryRouter::new(knowledge.clone(), conversations.clone(), search.clone())
            .with_limits(config.memory.history_limit, config.search.category_limit);

        info!("Assistant initialized");

        Ok(Assistant {
            config,
            knowledge,
            conversations,
            search,
            chat,
            router,
        })
    }
}

impl Default for AssistantBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn sealer_from_config(config: &RetrievalConfig) -> Result<Arc<dyn Sealer>> {
    let Some(ref key_env) = config.encryption.key_env else {
        warn!("Encryption disabled: stored content is not sealed");
        return Ok(Arc::new(PassthroughSealer));
    };

    let key = read_secret(Some(key_env))
        .ok_or_else(|| RetrievalError::Config(format!("encryption key variable {key_env} is not set")))?;
    let sealer = AesGcmSealer::from_base64_key(&key)
        .map_err(|e| RetrievalError::Config(format!("{key_env}: {e}")))?;
    Ok(Arc::new(sealer))
}

fn retention_from_config(config: &RetrievalConfig) -> Result<TimeDelta> {
    let hours = config.memory.retention_hours;
    TimeDelta::try_hours(hours)
        .filter(|retention| *retention > TimeDelta::zero())
        .ok_or_else(|| {
            RetrievalError::Config(format!(
                "retention_hours must be a positive number of hours, got {hours}"
            ))
        })
}

async fn embedder_from_config(config: &RetrievalConfig, in_memory: bool) -> Result<Embedder> {
    let settings = &config.embedding;
    let mut embedder = Embedder::new(settings.dimension);

    let Some(ref endpoint) = settings.endpoint else {
        info!("No embedding endpoint configured; using local embeddings");
        return Ok(embedder);
    };

    let api_key = read_secret(settings.api_key_env.as_deref());
    for model in &settings.models {
        let mut provider = HttpEmbeddingProvider::new(endpoint.as_str(), model.as_str(), settings.dimension);
        if let Some(ref key) = api_key {
            provider = provider.with_api_key(key.as_str());
        }
        embedder = embedder.with_provider(Arc::new(provider));
    }

    if settings.cache_enabled {
        let cache = if in_memory {
            EmbeddingCache::new(settings.cache_max_entries)
        } else {
            let dir = config.embedding_cache_dir();
            match EmbeddingCache::with_persistence(&dir, settings.cache_max_entries).await {
                Ok(cache) => cache,
                Err(e) => {
                    warn!("Embedding cache at {} unusable, starting empty: {e}", dir.display());
                    EmbeddingCache::new(settings.cache_max_entries)
                }
            }
        };
        embedder = embedder.with_cache(cache);
    }

    Ok(embedder)
}

fn completion_from_config(config: &RetrievalConfig) -> Arc<dyn CompletionProvider> {
    let Some(ref endpoint) = config.chat.endpoint else {
        warn!("No chat endpoint configured; replies are echoed");
        return Arc::new(EchoCompletionProvider);
    };

    let mut provider = HttpCompletionProvider::from_config(endpoint.as_str(), &config.chat);
    if let Some(key) = read_secret(config.chat.api_key_env.as_deref()) {
        provider = provider.with_api_key(key);
    }
    Arc::new(provider)
}
