//! Configuration for the assistant.
//!
//! Every field has a default, so a TOML file only needs the keys it wants
//! to change.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, RetrievalError};

/// Configuration for the assistant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Root for persisted knowledge, conversations and the embedding cache.
    pub data_dir: PathBuf,

    /// Embedding provider configuration.
    pub embedding: EmbeddingConfig,

    /// Search defaults.
    pub search: SearchConfig,

    /// Conversation memory configuration.
    pub memory: MemoryConfig,

    /// Chat configuration.
    pub chat: ChatConfig,

    /// Encryption at rest.
    pub encryption: EncryptionConfig,
}

impl RetrievalConfig {
    /// Create a new configuration with default values.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            embedding: EmbeddingConfig::default(),
            search: SearchConfig::default(),
            memory: MemoryConfig::default(),
            chat: ChatConfig::default(),
            encryption: EncryptionConfig::default(),
        }
    }

    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| RetrievalError::Config(format!("{}: {e}", path.display())))
    }

    /// Directory holding knowledge items.
    pub fn knowledge_dir(&self) -> PathBuf {
        self.data_dir.join("knowledge")
    }

    /// Directory holding conversation sessions.
    pub fn conversations_dir(&self) -> PathBuf {
        self.data_dir.join("conversations")
    }

    /// Directory holding cached embeddings, one file per entry.
    pub fn embedding_cache_dir(&self) -> PathBuf {
        self.data_dir.join("embedding-cache")
    }

    /// Set the embedding configuration.
    pub fn with_embedding(mut self, config: EmbeddingConfig) -> Self {
        self.embedding = config;
        self
    }

    /// Set the search configuration.
    pub fn with_search(mut self, config: SearchConfig) -> Self {
        self.search = config;
        self
    }

    /// Set the chat configuration.
    pub fn with_chat(mut self, config: ChatConfig) -> Self {
        self.chat = config;
        self
    }

    /// Read the sealing key from the named environment variable.
    pub fn with_encryption_key_env(mut self, name: impl Into<String>) -> Self {
        self.encryption.key_env = Some(name.into());
        self
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self::new(dirs::data_dir().unwrap_or_default().join("pai"))
    }
}

/// Configuration for the embedding provider chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Base URL of the embedding API. Without one only local embeddings are
    /// produced.
    pub endpoint: Option<String>,

    /// Environment variable holding the API key.
    pub api_key_env: Option<String>,

    /// Models tried in order.
    pub models: Vec<String>,

    /// Length of every embedding.
    pub dimension: usize,

    /// Whether to cache embeddings.
    pub cache_enabled: bool,

    /// Maximum cache size.
    pub cache_max_entries: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key_env: None,
            models: vec![
                "amazon.titan-embed-text-v2:0".to_string(),
                "amazon.titan-embed-text-v1".to_string(),
            ],
            dimension: pai_embeddings::DEFAULT_DIMENSION,
            cache_enabled: true,
            cache_max_entries: 10000,
        }
    }
}

/// Defaults applied to search requests that leave fields unset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub default_top_k: usize,

    /// Minimum similarity (-1.0 to 1.0).
    pub default_threshold: f32,

    /// Maximum items returned when retrieving by category.
    pub category_limit: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_top_k: 5,
            default_threshold: 0.5,
            category_limit: pai_memory::DEFAULT_CATEGORY_LIMIT,
        }
    }
}

/// Configuration for conversation memory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// How long messages stay readable.
    pub retention_hours: i64,

    /// Messages returned when retrieving a session.
    pub history_limit: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            retention_hours: pai_memory::DEFAULT_RETENTION_HOURS,
            history_limit: pai_memory::DEFAULT_HISTORY_LIMIT,
        }
    }
}

/// Configuration for chat completions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Base URL of the messages API. Without one replies are echoed.
    pub endpoint: Option<String>,

    /// Environment variable holding the API key.
    pub api_key_env: Option<String>,

    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,

    /// Prior messages passed to the completion.
    pub history_window: usize,

    /// Knowledge items added as context when requested.
    pub knowledge_top_k: usize,
    pub knowledge_threshold: f32,

    pub system_prompt: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key_env: None,
            model: "anthropic.claude-3-5-sonnet-20240620-v1:0".to_string(),
            max_tokens: 4096,
            temperature: 0.7,
            top_p: 0.9,
            history_window: 10,
            knowledge_top_k: 3,
            knowledge_threshold: 0.6,
            system_prompt: "You are a helpful personal AI assistant. You have access to the \
                            user's knowledge base and conversation history."
                .to_string(),
        }
    }
}

/// Encryption of stored content.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncryptionConfig {
    /// Environment variable holding a base64 32-byte key. Unset means
    /// content is stored unsealed.
    pub key_env: Option<String>,
}

/// Read a secret from the environment variable named by `env_name`.
pub(crate) fn read_secret(env_name: Option<&str>) -> Option<String> {
    let name = env_name?;
    std::env::var(name).ok().filter(|value| !value.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = RetrievalConfig::new("/tmp/pai");
        assert_eq!(config.knowledge_dir(), PathBuf::from("/tmp/pai/knowledge"));
        assert_eq!(config.conversations_dir(), PathBuf::from("/tmp/pai/conversations"));
        assert_eq!(config.embedding.dimension, 1024);
        assert_eq!(config.search.default_top_k, 5);
        assert_eq!(config.search.category_limit, 20);
        assert_eq!(config.memory.retention_hours, 24);
        assert_eq!(config.chat.history_window, 10);
        assert_eq!(config.encryption.key_env, None);
    }

    #[test]
    fn test_load_partial_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("pai.toml");
        std::fs::write(
            &path,
            r#"
data_dir = "/srv/pai"

[embedding]
endpoint = "http://localhost:9000"
dimension = 384

[search]
default_threshold = 0.25

[encryption]
key_env = "PAI_KEY"
"#,
        )
        .unwrap();

        let config = RetrievalConfig::load(&path).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/srv/pai"));
        assert_eq!(config.embedding.endpoint.as_deref(), Some("http://localhost:9000"));
        assert_eq!(config.embedding.dimension, 384);
        assert_eq!(config.embedding.models.len(), 2);
        assert_eq!(config.search.default_threshold, 0.25);
        assert_eq!(config.search.default_top_k, 5);
        assert_eq!(config.chat, ChatConfig::default());
        assert_eq!(config.encryption.key_env.as_deref(), Some("PAI_KEY"));
    }

    #[test]
    fn test_load_rejects_bad_toml() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("pai.toml");
        std::fs::write(&path, "search = 3").unwrap();

        assert!(matches!(
            RetrievalConfig::load(&path),
            Err(RetrievalError::Config(_))
        ));
    }

    #[test]
    fn test_read_secret_ignores_missing_variable() {
        assert_eq!(read_secret(None), None);
        assert_eq!(read_secret(Some("PAI_TEST_SURELY_UNSET_VARIABLE")), None);
    }
}
