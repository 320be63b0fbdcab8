//! Chat completion capability.

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info};

use pai_memory::{ConversationMessage, Role};

use crate::config::ChatConfig;
use crate::error::{Result, RetrievalError};

/// Generates the assistant's reply.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Provider name, for logs.
    fn name(&self) -> &str;

    /// Produce a reply to `user_message` given prior `history` and a
    /// knowledge `context` block (possibly empty).
    ///
    /// An empty string means the provider had nothing to say.
    async fn complete(
        &self,
        history: &[ConversationMessage],
        context: &str,
        user_message: &str,
    ) -> Result<String>;
}

/// Completion provider backed by an HTTP messages API.
///
/// Posts `{model, max_tokens, system, messages, temperature, top_p}` to
/// `{base_url}/messages` and reads the reply from `content[0].text`.
pub struct HttpCompletionProvider {
    /// API key, sent as a bearer token when present.
    api_key: Option<String>,

    /// API base URL.
    base_url: String,

    client: reqwest::Client,
    model: String,
    max_tokens: u32,
    temperature: f32,
    top_p: f32,
    system_prompt: String,
}

impl HttpCompletionProvider {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        let defaults = ChatConfig::default();
        Self {
            api_key: None,
            base_url: base_url.into(),
            client: reqwest::Client::new(),
            model: model.into(),
            max_tokens: defaults.max_tokens,
            temperature: defaults.temperature,
            top_p: defaults.top_p,
            system_prompt: defaults.system_prompt,
        }
    }

    /// Create a provider from chat configuration.
    pub fn from_config(base_url: impl Into<String>, config: &ChatConfig) -> Self {
        Self::new(base_url, config.model.clone())
            .with_sampling(config.max_tokens, config.temperature, config.top_p)
            .with_system_prompt(config.system_prompt.clone())
    }

    /// Set the API key.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Use a preconfigured HTTP client.
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    pub fn with_sampling(mut self, max_tokens: u32, temperature: f32, top_p: f32) -> Self {
        self.max_tokens = max_tokens;
        self.temperature = temperature;
        self.top_p = top_p;
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    fn request_body(&self, history: &[ConversationMessage], context: &str, user_message: &str) -> Value {
        let system = if context.is_empty() {
            self.system_prompt.clone()
        } else {
            format!("{}\n\n{context}", self.system_prompt)
        };

        let mut messages: Vec<Value> = history
            .iter()
            .filter(|m| m.role != Role::System)
            .map(|m| {
                let role = if m.role == Role::User { "user" } else { "assistant" };
                serde_json::json!({ "role": role, "content": m.content })
            })
            .collect();
        messages.push(serde_json::json!({ "role": "user", "content": user_message }));

        serde_json::json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "system": system,
            "messages": messages,
            "temperature": self.temperature,
            "top_p": self.top_p,
        })
    }
}

#[async_trait]
impl CompletionProvider for HttpCompletionProvider {
    fn name(&self) -> &str {
        "http"
    }

    async fn complete(
        &self,
        history: &[ConversationMessage],
        context: &str,
        user_message: &str,
    ) -> Result<String> {
        debug!(
            "Requesting completion with model {} and {} history messages",
            self.model,
            history.len()
        );

        let mut builder = self
            .client
            .post(format!("{}/messages", self.base_url.trim_end_matches('/')))
            .header("Content-Type", "application/json")
            .json(&self.request_body(history, context, user_message));
        if let Some(ref api_key) = self.api_key {
            builder = builder.header("Authorization", format!("Bearer {api_key}"));
        }

        let response = builder
            .send()
            .await
            .map_err(|e| RetrievalError::Completion(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(RetrievalError::Completion(format!("{status}: {error_text}")));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| RetrievalError::Completion(format!("invalid response body: {e}")))?;

        let text = body
            .pointer("/content/0/text")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        info!("Generated completion with model {}", self.model);
        Ok(text)
    }
}

/// Deterministic provider that repeats the user's message.
#[derive(Debug, Default, Clone, Copy)]
pub struct EchoCompletionProvider;

#[async_trait]
impl CompletionProvider for EchoCompletionProvider {
    fn name(&self) -> &str {
        "echo"
    }

    async fn complete(
        &self,
        _history: &[ConversationMessage],
        _context: &str,
        user_message: &str,
    ) -> Result<String> {
        Ok(format!("You said: {user_message}"))
    }
}
