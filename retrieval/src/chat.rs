//! Chat orchestration.
//!
//! A turn reads the session's recent history, optionally pulls matching
//! knowledge as context, asks the completion provider for a reply and
//! records both sides of the exchange.

use std::fmt::Write as _;
use std::sync::Arc;

use tracing::{debug, warn};
use uuid::Uuid;

use pai_memory::{Clock, ConversationMemory, ConversationMessage, SystemClock};

use crate::completion::CompletionProvider;
use crate::config::ChatConfig;
use crate::engine::VectorSearchEngine;
use crate::error::{Result, RetrievalError};
use crate::types::{ChatRequest, ChatResponse, SearchHit, VectorSearchRequest};

/// Reply used when the completion provider returns nothing.
pub const EMPTY_COMPLETION_REPLY: &str =
    "I apologize, but I was unable to generate a response. Please try again.";

/// Reply used when the completion provider fails.
pub const FAILED_COMPLETION_REPLY: &str = "I encountered an error while processing your request. \
     The language model service may be unavailable or misconfigured. Please try again later.";

/// Runs chat turns.
pub struct ChatService {
    memory: Arc<dyn ConversationMemory>,
    search: Arc<VectorSearchEngine>,
    completion: Arc<dyn CompletionProvider>,
    clock: Arc<dyn Clock>,

    /// Prior messages handed to the completion provider.
    history_window: usize,

    knowledge_top_k: usize,
    knowledge_threshold: f32,
}

impl ChatService {
    pub fn new(
        memory: Arc<dyn ConversationMemory>,
        search: Arc<VectorSearchEngine>,
        completion: Arc<dyn CompletionProvider>,
    ) -> Self {
        let defaults = ChatConfig::default();
        Self {
            memory,
            search,
            completion,
            clock: Arc::new(SystemClock),
            history_window: defaults.history_window,
            knowledge_top_k: defaults.knowledge_top_k,
            knowledge_threshold: defaults.knowledge_threshold,
        }
    }

    /// Apply the window and knowledge settings from `config`.
    pub fn with_config(mut self, config: &ChatConfig) -> Self {
        self.history_window = config.history_window;
        self.knowledge_top_k = config.knowledge_top_k;
        self.knowledge_threshold = config.knowledge_threshold;
        self
    }

    /// Use a different time source for message timestamps.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Run one chat turn.
    pub async fn chat(&self, request: ChatRequest) -> Result<ChatResponse> {
        if request.message.trim().is_empty() {
            return Err(RetrievalError::validation("Message is required"));
        }

        let session_id = request
            .session_id
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let received_at = self.clock.now();

        // History excludes the current message; it is passed separately.
        let history = self
            .memory
            .get_recent(&session_id, self.history_window)
            .await?;

        let context = if request.use_knowledge_base {
            let search = VectorSearchRequest::new(request.message.as_str())
                .with_top_k(self.knowledge_top_k)
                .with_threshold(self.knowledge_threshold);
            render_context(&self.search.search(&search).await?.items)
        } else {
            String::new()
        };

        debug!(
            "Chat turn in session {session_id} with {} history messages",
            history.len()
        );

        let reply = match self
            .completion
            .complete(&history, &context, &request.message)
            .await
        {
            Ok(text) if !text.trim().is_empty() => text,
            Ok(_) => {
                warn!("Completion provider {} returned no text", self.completion.name());
                EMPTY_COMPLETION_REPLY.to_string()
            }
            Err(e) => {
                warn!("Completion provider {} failed: {e}", self.completion.name());
                FAILED_COMPLETION_REPLY.to_string()
            }
        };

        let replied_at = self.clock.now().max(received_at);
        self.memory
            .append_all(
                &session_id,
                vec![
                    ConversationMessage::user(request.message, received_at),
                    ConversationMessage::assistant(reply.as_str(), replied_at),
                ],
            )
            .await?;

        Ok(ChatResponse {
            response: reply,
            session_id,
            timestamp: replied_at,
        })
    }
}

/// Render search hits as a numbered context block. No hits, no block.
pub fn render_context(hits: &[SearchHit]) -> String {
    if hits.is_empty() {
        return String::new();
    }

    let mut context = String::from("Relevant context from knowledge base:\n");
    for (idx, hit) in hits.iter().enumerate() {
        let _ = writeln!(
            context,
            "{}. {} (similarity: {:.2})",
            idx + 1,
            hit.item.content,
            hit.similarity
        );
    }
    context
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{TimeDelta, Utc};
    use pai_embeddings::Embedder;
    use pai_memory::{
        ConversationLog, KnowledgeBase, KnowledgeItem, KnowledgeStore, ManualClock, Metadata,
        PassthroughSealer, Role,
    };
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;

    const DIM: usize = 32;

    /// Records what it was asked and replies with a fixed outcome.
    struct RecordingProvider {
        reply: Option<String>,
        calls: Mutex<Vec<(Vec<ConversationMessage>, String, String)>>,
    }

    impl RecordingProvider {
        fn replying(reply: Option<&str>) -> Arc<Self> {
            Arc::new(Self {
                reply: reply.map(str::to_string),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn last_call(&self) -> (Vec<ConversationMessage>, String, String) {
            self.calls.lock().unwrap().last().cloned().unwrap()
        }
    }

    #[async_trait]
    impl CompletionProvider for RecordingProvider {
        fn name(&self) -> &str {
            "recording"
        }

        async fn complete(
            &self,
            history: &[ConversationMessage],
            context: &str,
            user_message: &str,
        ) -> Result<String> {
            self.calls.lock().unwrap().push((
                history.to_vec(),
                context.to_string(),
                user_message.to_string(),
            ));
            self.reply
                .clone()
                .ok_or_else(|| RetrievalError::Completion("boom".to_string()))
        }
    }

    struct Fixture {
        service: ChatService,
        memory: Arc<ConversationLog>,
        knowledge: Arc<KnowledgeBase>,
        search: Arc<VectorSearchEngine>,
    }

    fn fixture(provider: Arc<RecordingProvider>) -> Fixture {
        let memory = Arc::new(ConversationLog::in_memory(Arc::new(PassthroughSealer)));
        let knowledge = Arc::new(KnowledgeBase::in_memory(Arc::new(PassthroughSealer), DIM));
        let search = Arc::new(VectorSearchEngine::new(
            Arc::new(Embedder::new(DIM)),
            knowledge.clone(),
        ));
        let service = ChatService::new(memory.clone(), search.clone(), provider);
        Fixture {
            service,
            memory,
            knowledge,
            search,
        }
    }

    #[tokio::test]
    async fn test_empty_message_is_rejected() {
        let f = fixture(RecordingProvider::replying(Some("hi")));
        let result = f.service.chat(ChatRequest::new("   ")).await;
        assert!(matches!(result, Err(RetrievalError::Validation(_))));
    }

    #[tokio::test]
    async fn test_new_session_records_both_messages() {
        let provider = RecordingProvider::replying(Some("Hello!"));
        let f = fixture(provider.clone());

        let response = f.service.chat(ChatRequest::new("hi")).await.unwrap();
        assert_eq!(response.response, "Hello!");
        assert!(Uuid::parse_str(&response.session_id).is_ok());

        let stored = f.memory.get_recent(&response.session_id, 50).await.unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].role, Role::User);
        assert_eq!(stored[0].content, "hi");
        assert_eq!(stored[1].role, Role::Assistant);
        assert_eq!(stored[1].content, "Hello!");

        let (history, context, message) = provider.last_call();
        assert!(history.is_empty());
        assert_eq!(context, "");
        assert_eq!(message, "hi");
    }

    #[tokio::test]
    async fn test_history_window_is_applied() {
        let provider = RecordingProvider::replying(Some("ok"));
        let f = fixture(provider.clone());
        let start = Utc::now() - TimeDelta::minutes(10);
        let earlier = (0..12)
            .map(|i| ConversationMessage::user(format!("m{i}"), start + TimeDelta::seconds(i)))
            .collect();
        f.memory.append_all("s1", earlier).await.unwrap();

        f.service
            .chat(ChatRequest::new("latest").with_session("s1"))
            .await
            .unwrap();

        let (history, _, _) = provider.last_call();
        assert_eq!(history.len(), 10);
        assert_eq!(history[0].content, "m2");
        assert_eq!(history[9].content, "m11");
    }

    #[tokio::test]
    async fn test_failed_completion_uses_fallback_reply() {
        let f = fixture(RecordingProvider::replying(None));
        let response = f
            .service
            .chat(ChatRequest::new("hi").with_session("s1"))
            .await
            .unwrap();

        assert_eq!(response.response, FAILED_COMPLETION_REPLY);
        let stored = f.memory.get_recent("s1", 50).await.unwrap();
        assert_eq!(stored[1].content, FAILED_COMPLETION_REPLY);
    }

    #[tokio::test]
    async fn test_empty_completion_uses_fallback_reply() {
        let f = fixture(RecordingProvider::replying(Some("  ")));
        let response = f.service.chat(ChatRequest::new("hi")).await.unwrap();
        assert_eq!(response.response, EMPTY_COMPLETION_REPLY);
    }

    #[tokio::test]
    async fn test_knowledge_context_is_rendered() {
        let provider = RecordingProvider::replying(Some("ok"));
        let f = fixture(provider.clone());
        let item = f
            .search
            .store_with_embedding("k1", "pets", "my cat is called Miso", Metadata::new())
            .await;
        f.knowledge.put(item).await.unwrap();

        f.service
            .chat(ChatRequest::new("my cat is called Miso").with_knowledge_base(true))
            .await
            .unwrap();

        let (_, context, _) = provider.last_call();
        assert_eq!(
            context,
            "Relevant context from knowledge base:\n1. my cat is called Miso (similarity: 1.00)\n"
        );
    }

    #[tokio::test]
    async fn test_timestamps_come_from_clock() {
        let provider = RecordingProvider::replying(Some("ok"));
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let f = fixture(provider);
        let service = f.service.with_clock(clock.clone());

        let response = service.chat(ChatRequest::new("hi")).await.unwrap();
        assert_eq!(response.timestamp, clock.now());
    }

    #[test]
    fn test_render_context_numbering() {
        let item = |id: &str, content: &str| KnowledgeItem {
            id: id.to_string(),
            category: "general".to_string(),
            content: content.to_string(),
            embedding: Vec::new(),
            metadata: Metadata::new(),
            timestamp: Utc::now(),
        };
        let hits = vec![
            SearchHit {
                item: item("a", "likes tea"),
                similarity: 0.8731,
            },
            SearchHit {
                item: item("b", "lives in Oslo"),
                similarity: 0.6,
            },
        ];

        assert_eq!(
            render_context(&hits),
            "Relevant context from knowledge base:\n\
             1. likes tea (similarity: 0.87)\n\
             2. lives in Oslo (similarity: 0.60)\n"
        );
        assert_eq!(render_context(&[]), "");
    }
}
