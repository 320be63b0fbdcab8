//! Long-term knowledge storage.
//!
//! A [`KnowledgeItem`] is immutable once stored; `put` with an existing id
//! overwrites it wholesale. There is no update or delete operation.
//!
//! Similarity search reads candidates through [`KnowledgeStore::scan_all`],
//! which is a full linear pass over the live items. No index narrows it: scan
//! cost is proportional to the number of stored items, and that is the main
//! scalability limit of the store.

use std::cmp::Reverse;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use pai_embeddings::Embedding;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::{MemoryError, Result};
use crate::persist;
use crate::seal::{SealedBlob, Sealer};

/// Default bound for [`KnowledgeStore::list_by_category`].
pub const DEFAULT_CATEGORY_LIMIT: usize = 20;

/// Free-form metadata attached to a knowledge item. Not interpreted here.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// A unit of long-term knowledge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeItem {
    /// Unique identifier.
    pub id: String,

    /// Label used for filtered retrieval.
    pub category: String,

    /// Original text. The embedding derives from it.
    pub content: String,

    /// Embedding of `content`.
    pub embedding: Embedding,

    /// Arbitrary metadata.
    pub metadata: Metadata,

    /// Creation time.
    pub timestamp: DateTime<Utc>,
}

/// Repository of knowledge items.
#[async_trait]
pub trait KnowledgeStore: Send + Sync {
    /// Insert or overwrite an item by id.
    async fn put(&self, item: KnowledgeItem) -> Result<()>;

    /// Fetch an item by id.
    async fn get(&self, id: &str) -> Result<Option<KnowledgeItem>>;

    /// Items in `category`, most recently created first, at most `limit`.
    async fn list_by_category(&self, category: &str, limit: usize) -> Result<Vec<KnowledgeItem>>;

    /// Every stored item, optionally restricted to one category, in scan
    /// order. Linear in the number of stored items.
    async fn scan_all(&self, category: Option<&str>) -> Result<Vec<KnowledgeItem>>;
}

/// Item as persisted: content and metadata sealed, embedding in the clear.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct KnowledgeRecord {
    id: String,
    category: String,
    sealed_content: SealedBlob,
    embedding: Embedding,
    sealed_metadata: SealedBlob,
    timestamp: DateTime<Utc>,
}

/// Knowledge store held in memory and optionally mirrored to one JSON file
/// per item under a root directory.
///
/// Scan order is insertion order; items reloaded from disk are ordered by
/// `(timestamp, id)`.
pub struct KnowledgeBase {
    /// Sealed records keyed by id, in scan order.
    records: RwLock<IndexMap<String, KnowledgeRecord>>,

    /// Directory for persisted records.
    root: Option<PathBuf>,

    /// Encryption capability for content and metadata.
    sealer: Arc<dyn Sealer>,

    /// Embedding length shared by every item.
    dimension: usize,
}

impl KnowledgeBase {
    /// Create a store that lives only in memory.
    pub fn in_memory(sealer: Arc<dyn Sealer>, dimension: usize) -> Self {
        Self {
            records: RwLock::new(IndexMap::new()),
            root: None,
            sealer,
            dimension,
        }
    }

    /// Open (or create) a store persisted under `root`.
    pub async fn open(
        root: impl AsRef<Path>,
        sealer: Arc<dyn Sealer>,
        dimension: usize,
    ) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        persist::ensure_dir(&root).await?;

        let mut loaded: Vec<KnowledgeRecord> = persist::read_all(&root).await?;
        loaded.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));

        let mut records = IndexMap::with_capacity(loaded.len());
        for record in loaded {
            if record.embedding.len() != dimension {
                return Err(MemoryError::DimensionMismatch {
                    expected: dimension,
                    actual: record.embedding.len(),
                });
            }
            records.insert(record.id.clone(), record);
        }

        info!("Loaded {} knowledge items", records.len());

        Ok(Self {
            records: RwLock::new(records),
            root: Some(root),
            sealer,
            dimension,
        })
    }

    /// Embedding dimension of this store.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Number of stored items.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// Whether the store holds no items.
    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    async fn seal(&self, item: KnowledgeItem) -> Result<KnowledgeRecord> {
        let metadata = serde_json::to_string(&item.metadata)?;
        Ok(KnowledgeRecord {
            sealed_content: self.sealer.seal(&item.content).await?,
            sealed_metadata: self.sealer.seal(&metadata).await?,
            id: item.id,
            category: item.category,
            embedding: item.embedding,
            timestamp: item.timestamp,
        })
    }

    async fn unseal(&self, record: KnowledgeRecord) -> Result<KnowledgeItem> {
        let content = self.sealer.unseal(&record.sealed_content).await?;
        let metadata = self.sealer.unseal(&record.sealed_metadata).await?;
        Ok(KnowledgeItem {
            id: record.id,
            category: record.category,
            content,
            embedding: record.embedding,
            metadata: serde_json::from_str(&metadata)?,
            timestamp: record.timestamp,
        })
    }

    async fn unseal_all(&self, records: Vec<KnowledgeRecord>) -> Result<Vec<KnowledgeItem>> {
        let mut items = Vec::with_capacity(records.len());
        for record in records {
            items.push(self.unseal(record).await?);
        }
        Ok(items)
    }
}

#[async_trait]
impl KnowledgeStore for KnowledgeBase {
    async fn put(&self, item: KnowledgeItem) -> Result<()> {
        if item.embedding.len() != self.dimension {
            return Err(MemoryError::DimensionMismatch {
                expected: self.dimension,
                actual: item.embedding.len(),
            });
        }

        let record = self.seal(item).await?;

        // Held across the write so disk and memory agree on the last writer.
        let mut records = self.records.write().await;

        // Durable first, so a failed write leaves no trace in memory.
        if let Some(ref root) = self.root {
            persist::write_json(&persist::record_path(root, &record.id), &record).await?;
        }

        debug!("Stored knowledge item: {}", record.id);
        records.insert(record.id.clone(), record);
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<KnowledgeItem>> {
        let record = self.records.read().await.get(id).cloned();
        match record {
            Some(record) => Ok(Some(self.unseal(record).await?)),
            None => Ok(None),
        }
    }

    async fn list_by_category(&self, category: &str, limit: usize) -> Result<Vec<KnowledgeItem>> {
        let mut matching: Vec<KnowledgeRecord> = self
            .records
            .read()
            .await
            .values()
            .filter(|r| r.category == category)
            .cloned()
            .collect();

        // Newest first; stable, so equal timestamps keep scan order.
        matching.sort_by_key(|r| Reverse(r.timestamp));
        matching.truncate(limit);

        self.unseal_all(matching).await
    }

    async fn scan_all(&self, category: Option<&str>) -> Result<Vec<KnowledgeItem>> {
        let records: Vec<KnowledgeRecord> = self
            .records
            .read()
            .await
            .values()
            .filter(|r| category.is_none_or(|c| r.category == c))
            .cloned()
            .collect();

        debug!("Scanning {} knowledge items", records.len());
        self.unseal_all(records).await
    }
}
