//! Short-term conversation memory.
//!
//! Messages belong to exactly one session and expire a fixed retention
//! window after they were appended. Expiry is enforced at read time, so an
//! expired message is never returned even before [`ConversationMemory::purge_expired`]
//! physically removes it.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::{debug, info};

use crate::clock::{Clock, SystemClock};
use crate::error::Result;
use crate::persist;
use crate::seal::{SealedBlob, Sealer};

/// How long a message stays readable after it is appended.
pub const DEFAULT_RETENTION_HOURS: i64 = 24;

/// Default window for [`ConversationMemory::get_recent`].
pub const DEFAULT_HISTORY_LIMIT: usize = 50;

/// Author of a conversation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// A single message in a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl ConversationMessage {
    /// Message with an explicit role.
    pub fn new(role: Role, content: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp,
        }
    }

    /// Message written by the user.
    pub fn user(content: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self::new(Role::User, content, timestamp)
    }

    /// Reply produced by the assistant.
    pub fn assistant(content: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self::new(Role::Assistant, content, timestamp)
    }
}

/// Time-bounded message log keyed by session.
#[async_trait]
pub trait ConversationMemory: Send + Sync {
    /// Append a message to a session.
    async fn append(&self, session_id: &str, message: ConversationMessage) -> Result<()>;

    /// Append a batch of messages to a session, in order.
    async fn append_all(&self, session_id: &str, messages: Vec<ConversationMessage>) -> Result<()> {
        for message in messages {
            self.append(session_id, message).await?;
        }
        Ok(())
    }

    /// Up to `limit` most recent live messages of a session, oldest first.
    async fn get_recent(&self, session_id: &str, limit: usize)
    -> Result<Vec<ConversationMessage>>;

    /// Physically remove expired messages. Returns how many were removed.
    async fn purge_expired(&self) -> Result<usize>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredMessage {
    role: Role,
    sealed_content: SealedBlob,
    timestamp: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    /// Arrival sequence; orders messages with equal timestamps.
    seq: u64,
}

/// On-disk form of one session.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct SessionLog {
    session_id: String,
    messages: Vec<StoredMessage>,
}

/// Conversation memory held in memory and optionally mirrored to one JSON
/// file per session.
pub struct ConversationLog {
    sessions: RwLock<HashMap<String, Arc<Mutex<SessionLog>>>>,
    root: Option<PathBuf>,
    sealer: Arc<dyn Sealer>,
    clock: Arc<dyn Clock>,
    retention: TimeDelta,
    next_seq: AtomicU64,
}

impl ConversationLog {
    /// Create a log that lives only in memory.
    pub fn in_memory(sealer: Arc<dyn Sealer>) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            root: None,
            sealer,
            clock: Arc::new(SystemClock),
            retention: TimeDelta::hours(DEFAULT_RETENTION_HOURS),
            next_seq: AtomicU64::new(0),
        }
    }

    /// Open (or create) a log persisted under `root`.
    pub async fn open(root: impl AsRef<Path>, sealer: Arc<dyn Sealer>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        persist::ensure_dir(&root).await?;

        let loaded: Vec<SessionLog> = persist::read_all(&root).await?;
        let next_seq = loaded
            .iter()
            .flat_map(|s| s.messages.iter().map(|m| m.seq + 1))
            .max()
            .unwrap_or(0);

        info!("Loaded {} conversation sessions", loaded.len());

        let sessions = loaded
            .into_iter()
            .map(|log| (log.session_id.clone(), Arc::new(Mutex::new(log))))
            .collect();

        Ok(Self {
            sessions: RwLock::new(sessions),
            root: Some(root),
            sealer,
            clock: Arc::new(SystemClock),
            retention: TimeDelta::hours(DEFAULT_RETENTION_HOURS),
            next_seq: AtomicU64::new(next_seq),
        })
    }

    /// Use a different time source.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Use a different retention window.
    pub fn with_retention(mut self, retention: TimeDelta) -> Self {
        self.retention = retention;
        self
    }

    async fn session(&self, session_id: &str) -> Option<Arc<Mutex<SessionLog>>> {
        self.sessions.read().await.get(session_id).cloned()
    }

    async fn session_or_create(&self, session_id: &str) -> Arc<Mutex<SessionLog>> {
        if let Some(session) = self.session(session_id).await {
            return session;
        }
        self.sessions
            .write()
            .await
            .entry(session_id.to_string())
            .or_insert_with(|| {
                Arc::new(Mutex::new(SessionLog {
                    session_id: session_id.to_string(),
                    messages: Vec::new(),
                }))
            })
            .clone()
    }

    /// Lock a session that is still registered. A purge may drop an emptied
    /// session between lookup and lock; such a handle is discarded.
    async fn lock_live_session(&self, session_id: &str) -> OwnedMutexGuard<SessionLog> {
        loop {
            let session = self.session_or_create(session_id).await;
            let log = session.clone().lock_owned().await;
            let registered = self
                .sessions
                .read()
                .await
                .get(session_id)
                .is_some_and(|current| Arc::ptr_eq(current, &session));
            if registered {
                return log;
            }
            debug!("Session {session_id} was purged while waiting; retrying");
        }
    }

    async fn save(&self, log: &SessionLog) -> Result<()> {
        let Some(ref root) = self.root else {
            return Ok(());
        };
        let path = persist::record_path(root, &log.session_id);
        if log.messages.is_empty() {
            persist::remove(&path).await
        } else {
            persist::write_json(&path, log).await
        }
    }
}

#[async_trait]
impl ConversationMemory for ConversationLog {
    async fn append(&self, session_id: &str, message: ConversationMessage) -> Result<()> {
        let stored = StoredMessage {
            role: message.role,
            sealed_content: self.sealer.seal(&message.content).await?,
            timestamp: message.timestamp,
            expires_at: self.clock.now() + self.retention,
            seq: self.next_seq.fetch_add(1, Ordering::Relaxed),
        };

        let mut log = self.lock_live_session(session_id).await;
        log.messages.push(stored);

        if let Err(e) = self.save(&log).await {
            log.messages.pop();
            return Err(e);
        }

        debug!("Appended message to session {session_id}");
        Ok(())
    }

    async fn get_recent(
        &self,
        session_id: &str,
        limit: usize,
    ) -> Result<Vec<ConversationMessage>> {
        let Some(session) = self.session(session_id).await else {
            return Ok(Vec::new());
        };

        let now = self.clock.now();
        let mut live: Vec<StoredMessage> = session
            .lock()
            .await
            .messages
            .iter()
            .filter(|m| m.expires_at > now)
            .cloned()
            .collect();

        // Ordering is by timestamp, not arrival.
        live.sort_by_key(|m| (m.timestamp, m.seq));
        let skip = live.len().saturating_sub(limit);

        let mut messages = Vec::with_capacity(live.len() - skip);
        for stored in live.into_iter().skip(skip) {
            messages.push(ConversationMessage {
                role: stored.role,
                content: self.sealer.unseal(&stored.sealed_content).await?,
                timestamp: stored.timestamp,
            });
        }
        Ok(messages)
    }

    async fn purge_expired(&self) -> Result<usize> {
        let now = self.clock.now();
        let sessions: Vec<(String, Arc<Mutex<SessionLog>>)> = self
            .sessions
            .read()
            .await
            .iter()
            .map(|(id, s)| (id.clone(), s.clone()))
            .collect();

        let mut removed = 0;
        let mut emptied = Vec::new();
        for (session_id, session) in sessions {
            let mut log = session.lock().await;
            let before = log.messages.len();
            log.messages.retain(|m| m.expires_at > now);
            let purged = before - log.messages.len();
            if purged == 0 {
                continue;
            }

            self.save(&log).await?;
            removed += purged;
            if log.messages.is_empty() {
                emptied.push(session_id);
            }
        }

        if !emptied.is_empty() {
            let mut map = self.sessions.write().await;
            for session_id in emptied {
                // A concurrent append may have refilled it.
                let still_empty = match map.get(&session_id) {
                    Some(session) => session.try_lock().is_ok_and(|log| log.messages.is_empty()),
                    None => false,
                };
                if still_empty {
                    map.remove(&session_id);
                }
            }
        }

        if removed > 0 {
            info!("Purged {removed} expired messages");
        }
        Ok(removed)
    }
}
