//! # Embeddings
//!
//! This crate turns text into fixed-length vectors and ranks knowledge
//! candidates against a query vector for the personal assistant.
//!
//! ## Features
//!
//! - **Embedding Generation**: Convert text to unit-length dense vectors
//! - **Provider Chain**: Try remote models in order, then fall back to a
//!   deterministic local embedding that never fails
//! - **Similarity Ranking**: Cosine scoring with threshold and top-k cutoff
//! - **Caching**: Optional caching of remote embeddings
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    Embeddings System                            │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  EmbeddingProvider* ──► Embedder ──► Embedding                  │
//! │       │                    │              │                     │
//! │       ▼                    ▼              ▼                     │
//! │  Http/LocalHash      EmbeddingCache   rank_top_k               │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod cache;
pub mod embedder;
pub mod error;
pub mod local;
pub mod provider;
pub mod similarity;

pub use cache::EmbeddingCache;
pub use embedder::Embedder;
pub use error::{EmbeddingError, Result};
pub use local::LocalHashProvider;
pub use provider::{EmbeddingProvider, EmbeddingRequest, EmbeddingResponse, HttpEmbeddingProvider};
pub use similarity::{ScoredItem, cosine_similarity, l2_norm, normalize, rank_top_k};

/// A dense vector embedding.
pub type Embedding = Vec<f32>;

/// Dimension of embeddings held by a store (Titan Embed Text v2).
pub const DEFAULT_DIMENSION: usize = 1024;
