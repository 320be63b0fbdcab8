//! # Personal Assistant Services
//!
//! This crate wires the knowledge base and conversation memory into the
//! assistant's services:
//!
//! - **Vector search**: semantic search over stored knowledge
//! - **Chat**: history-aware replies, optionally grounded in knowledge
//! - **Memory router**: `store` / `retrieve` / `search` requests
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                          Assistant                              │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐           │
//! │  │ ChatService  │  │ MemoryRouter │  │ Completion   │           │
//! │  └──────────────┘  └──────────────┘  │   Provider   │           │
//! │         │                │           └──────────────┘           │
//! │         └───────┬────────┘                                      │
//! │                 ▼                                               │
//! │        ┌──────────────────┐                                     │
//! │        │ VectorSearch     │──► Embedder (provider chain)        │
//! │        │ Engine           │                                     │
//! │        └──────────────────┘                                     │
//! │                 │                                               │
//! │                 ▼                                               │
//! │  ┌──────────────────┐  ┌──────────────────┐                     │
//! │  │  KnowledgeBase   │  │ ConversationLog  │                     │
//! │  └──────────────────┘  └──────────────────┘                     │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use pai_retrieval::{Assistant, ChatRequest, RetrievalConfig};
//!
//! let assistant = Assistant::new(RetrievalConfig::load("pai.toml")?).await?;
//!
//! let reply = assistant
//!     .chat(ChatRequest::new("What's my cat called?").with_knowledge_base(true))
//!     .await?;
//! ```

pub mod assistant;
pub mod chat;
pub mod completion;
pub mod config;
pub mod engine;
pub mod error;
pub mod router;
pub mod types;

pub use assistant::{Assistant, AssistantBuilder};
pub use chat::{ChatService, render_context};
pub use completion::{CompletionProvider, EchoCompletionProvider, HttpCompletionProvider};
pub use config::RetrievalConfig;
pub use engine::VectorSearchEngine;
pub use error::{ErrorKind, Result, RetrievalError, ServiceError};
pub use router::{MemoryRequest, MemoryResponse, MemoryRouter};
pub use types::{
    ChatRequest, ChatResponse, KnowledgeSummary, SearchHit, SearchResultEntry,
    VectorSearchRequest, VectorSearchResult,
};

// Re-export from dependencies for convenience
pub use pai_embeddings::{Embedder, EmbeddingProvider};
pub use pai_memory::{ConversationMessage, KnowledgeItem, Role};
