//! Embedding cache for remote providers.

use std::cmp::Reverse;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::Embedding;
use crate::error::{EmbeddingError, Result};

/// Cache entry for an embedding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    /// SHA-256 of model and text.
    pub key: String,

    /// The embedding vector.
    pub embedding: Embedding,

    /// Model used to generate the embedding.
    pub model: String,

    /// When the entry was created, in milliseconds since the epoch.
    pub created_at: i64,
}

/// Cache for embeddings to avoid redundant API calls.
///
/// A persistent cache keeps one small JSON file per entry under its
/// directory, so a miss writes only the new entry.
#[derive(Clone)]
pub struct EmbeddingCache {
    /// In-memory cache.
    cache: Arc<RwLock<HashMap<String, CacheEntry>>>,

    /// Directory for persistent cache entries.
    cache_dir: Option<PathBuf>,

    /// Maximum cache size.
    max_entries: usize,
}

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

impl EmbeddingCache {
    /// Create a new in-memory cache.
    pub fn new(max_entries: usize) -> Self {
        Self {
            cache: Arc::new(RwLock::new(HashMap::new())),
            cache_dir: None,
            max_entries,
        }
    }

    /// Create a cache persisted under `dir`. Entries that cannot be decoded
    /// are dropped with a warning.
    pub async fn with_persistence(dir: impl AsRef<Path>, max_entries: usize) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).await?;

        let cache = Self {
            cache: Arc::new(RwLock::new(HashMap::new())),
            cache_dir: Some(dir),
            max_entries,
        };
        cache.load().await?;

        Ok(cache)
    }

    /// Compute the lookup key. Stable across processes so persisted entries
    /// stay addressable.
    fn hash_key(text: &str, model: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(model.as_bytes());
        hasher.update([0u8]);
        hasher.update(text.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Get an embedding from the cache.
    pub async fn get(&self, text: &str, model: &str) -> Option<Embedding> {
        let key = Self::hash_key(text, model);
        let cache = self.cache.read().await;
        cache.get(&key).map(|e| e.embedding.clone())
    }

    /// Put an embedding in the cache.
    pub async fn put(&self, text: &str, model: &str, embedding: Embedding) -> Result<()> {
        if self.max_entries == 0 {
            return Ok(());
        }

        let key = Self::hash_key(text, model);
        let entry = CacheEntry {
            key: key.clone(),
            embedding,
            model: model.to_string(),
            created_at: chrono::Utc::now().timestamp_millis(),
        };

        let evicted = {
            let mut cache = self.cache.write().await;

            // Evict the oldest entry when full
            let mut evicted = None;
            if cache.len() >= self.max_entries && !cache.contains_key(&key) {
                if let Some(oldest_key) = cache
                    .iter()
                    .min_by_key(|(_, v)| v.created_at)
                    .map(|(k, _)| k.clone())
                {
                    cache.remove(&oldest_key);
                    evicted = Some(oldest_key);
                }
            }

            cache.insert(key, entry.clone());
            evicted
        };
        debug!("Cached embedding (model: {model})");

        if let Some(ref dir) = self.cache_dir {
            Self::save_entry(dir, &entry).await?;
            if let Some(oldest_key) = evicted {
                Self::remove_entry(dir, &oldest_key).await?;
            }
        }

        Ok(())
    }

    /// Number of cached embeddings.
    pub async fn len(&self) -> usize {
        self.cache.read().await.len()
    }

    /// Whether the cache holds no embeddings.
    pub async fn is_empty(&self) -> bool {
        self.cache.read().await.is_empty()
    }

    /// Clear the entire cache.
    pub async fn clear(&self) -> Result<()> {
        let keys: Vec<String> = self.cache.write().await.drain().map(|(k, _)| k).collect();
        if let Some(ref dir) = self.cache_dir {
            for key in &keys {
                Self::remove_entry(dir, key).await?;
            }
        }
        info!("Cleared embedding cache");
        Ok(())
    }

    fn entry_path(dir: &Path, key: &str) -> PathBuf {
        dir.join(format!("{key}.json"))
    }

    /// Write one entry through a temp file unique to this write.
    async fn save_entry(dir: &Path, entry: &CacheEntry) -> Result<()> {
        let content = serde_json::to_string(entry)?;
        let path = Self::entry_path(dir, &entry.key);
        let seq = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
        let temp_path = dir.join(format!("{}.{}-{seq}.tmp", entry.key, std::process::id()));

        fs::write(&temp_path, content).await?;
        if let Err(e) = fs::rename(&temp_path, &path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }
        Ok(())
    }

    async fn remove_entry(dir: &Path, key: &str) -> Result<()> {
        match fs::remove_file(Self::entry_path(dir, key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Load entries from disk, keeping the newest `max_entries`.
    async fn load(&self) -> Result<()> {
        let Some(ref dir) = self.cache_dir else {
            return Ok(());
        };

        let mut entries = Vec::new();
        let mut files = fs::read_dir(dir).await?;
        while let Some(file) = files.next_entry().await? {
            let path = file.path();
            if path.extension().is_none_or(|ext| ext != "json") {
                continue;
            }

            let decoded = fs::read_to_string(&path)
                .await
                .map_err(EmbeddingError::from)
                .and_then(|content| {
                    serde_json::from_str::<CacheEntry>(&content).map_err(EmbeddingError::from)
                });
            match decoded {
                Ok(entry) => entries.push(entry),
                Err(e) => {
                    warn!("Dropping unreadable cache entry {}: {e}", path.display());
                    let _ = fs::remove_file(&path).await;
                }
            }
        }

        entries.sort_by_key(|e| Reverse(e.created_at));
        for stale in entries.split_off(entries.len().min(self.max_entries)) {
            Self::remove_entry(dir, &stale.key).await?;
        }

        let mut cache = self.cache.write().await;
        for entry in entries {
            cache.insert(entry.key.clone(), entry);
        }

        info!("Loaded {} cache entries from disk", cache.len());
        Ok(())
    }
}
