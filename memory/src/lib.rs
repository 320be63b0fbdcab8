//! # Memory
//!
//! Storage for the personal assistant's two kinds of memory:
//!
//! - **Knowledge**: long-term items (content + embedding + metadata),
//!   listed by category or scanned in full for similarity search
//! - **Conversations**: short-term, per-session message logs that expire
//!   after a retention window
//!
//! Content crossing the persistence boundary is sealed by a [`Sealer`]
//! on the way in and unsealed on the way out.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        Memory System                            │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  KnowledgeItem ──► KnowledgeBase ──► {id}.json                 │
//! │  ConversationMessage ──► ConversationLog ──► {session}.json    │
//! │          │                     │                                │
//! │          ▼                     ▼                                │
//! │        Sealer                Clock                              │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod clock;
pub mod conversation;
pub mod error;
pub mod knowledge;
mod persist;
pub mod seal;

pub use clock::{Clock, ManualClock, SystemClock};
pub use conversation::{
    ConversationLog, ConversationMemory, ConversationMessage, DEFAULT_HISTORY_LIMIT,
    DEFAULT_RETENTION_HOURS, Role,
};
pub use error::{MemoryError, Result, SealError, StorageError};
pub use knowledge::{
    DEFAULT_CATEGORY_LIMIT, KnowledgeBase, KnowledgeItem, KnowledgeStore, Metadata,
};
pub use seal::{AesGcmSealer, PassthroughSealer, SealedBlob, Sealer};
