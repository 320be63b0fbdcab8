//! Embedding providers.
//!
//! A provider is one remote (or local) model that turns text into a vector.
//! Providers may fail; the [`Embedder`](crate::Embedder) decides what to do
//! when they do.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::Embedding;
use crate::error::{EmbeddingError, Result};
use crate::similarity::normalize;

/// Request for generating embeddings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingRequest {
    /// Text to embed.
    pub text: String,

    /// Model to use (provider-specific).
    pub model: Option<String>,

    /// Dimensions for the output (if supported by provider).
    pub dimensions: Option<usize>,
}

impl EmbeddingRequest {
    /// Create a new embedding request.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            model: None,
            dimensions: None,
        }
    }

    /// Set the model to use.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set the output dimensions.
    pub fn with_dimensions(mut self, dimensions: usize) -> Self {
        self.dimensions = Some(dimensions);
        self
    }
}

/// Response from embedding generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingResponse {
    /// The generated embedding, normalized to unit length.
    pub embedding: Embedding,

    /// Model used to generate the embedding.
    pub model: String,

    /// Dimension of the embedding.
    pub dimension: usize,

    /// Token usage (if available).
    pub tokens_used: Option<u64>,
}

/// Trait for embedding providers.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Get the name of this provider.
    fn name(&self) -> &str;

    /// Get the default model for this provider.
    fn default_model(&self) -> &str;

    /// Get the embedding dimension this provider produces.
    fn dimension(&self) -> usize;

    /// Generate an embedding for the given text.
    async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse>;

    /// Check if the provider is usable (endpoint set, etc.).
    fn is_available(&self) -> bool;
}

/// Embedding provider backed by an HTTP embeddings endpoint.
///
/// The request body is `{"input", "model", "dimensions"}`. The vector is
/// read from a top-level `embedding` array or from `data[0].embedding`, so
/// both Titan-style and OpenAI-style responses are accepted.
pub struct HttpEmbeddingProvider {
    /// API key, sent as a bearer token when present.
    api_key: Option<String>,

    /// API base URL.
    base_url: String,

    /// HTTP client.
    client: reqwest::Client,

    /// Default model.
    model: String,

    /// Expected output dimension.
    dimension: usize,
}

impl HttpEmbeddingProvider {
    /// Create a new provider for the given endpoint and model.
    pub fn new(base_url: impl Into<String>, model: impl Into<String>, dimension: usize) -> Self {
        Self {
            api_key: None,
            base_url: base_url.into(),
            client: reqwest::Client::new(),
            model: model.into(),
            dimension,
        }
    }

    /// Set the API key.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Use a preconfigured HTTP client (timeouts, proxies).
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }
}

#[async_trait]
impl EmbeddingProvider for HttpEmbeddingProvider {
    fn name(&self) -> &str {
        "http"
    }

    fn default_model(&self) -> &str {
        &self.model
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse> {
        if !self.is_available() {
            return Err(EmbeddingError::ProviderNotConfigured);
        }

        let model = request.model.unwrap_or_else(|| self.model.clone());
        let dimensions = request.dimensions.unwrap_or(self.dimension);

        debug!("Generating embedding with model: {model}");

        let body = serde_json::json!({
            "input": request.text,
            "model": model,
            "dimensions": dimensions,
        });

        let mut builder = self
            .client
            .post(format!("{}/embeddings", self.base_url.trim_end_matches('/')))
            .header("Content-Type", "application/json")
            .json(&body);
        if let Some(ref api_key) = self.api_key {
            builder = builder.header("Authorization", format!("Bearer {api_key}"));
        }

        let response = builder.send().await?;

        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok())
                .unwrap_or(60);

            return Err(EmbeddingError::RateLimited {
                retry_after_secs: retry_after,
            });
        }

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::ApiRequest(format!(
                "{status}: {error_text}"
            )));
        }

        let body: Value = response.json().await?;
        let mut embedding = extract_embedding(&body)?;

        if embedding.len() != dimensions {
            return Err(EmbeddingError::DimensionMismatch {
                expected: dimensions,
                actual: embedding.len(),
            });
        }
        normalize(&mut embedding);

        let tokens_used = body
            .get("inputTextTokenCount")
            .or_else(|| body.pointer("/usage/total_tokens"))
            .and_then(Value::as_u64);

        info!("Generated embedding with {dimensions} dimensions");

        Ok(EmbeddingResponse {
            embedding,
            model,
            dimension: dimensions,
            tokens_used,
        })
    }

    fn is_available(&self) -> bool {
        !self.base_url.is_empty()
    }
}

/// Pull the embedding array out of a provider response body.
fn extract_embedding(body: &Value) -> Result<Embedding> {
    let field = body
        .get("embedding")
        .or_else(|| body.pointer("/data/0/embedding"))
        .ok_or_else(|| EmbeddingError::InvalidResponse("missing embedding field".to_string()))?;

    let values = field
        .as_array()
        .ok_or_else(|| EmbeddingError::InvalidResponse("embedding is not an array".to_string()))?;

    values
        .iter()
        .map(|v| {
            v.as_f64().map(|f| f as f32).ok_or_else(|| {
                EmbeddingError::InvalidResponse("embedding contains a non-number".to_string())
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_embedding_request() {
        let request = EmbeddingRequest::new("Hello world")
            .with_model("amazon.titan-embed-text-v2:0")
            .with_dimensions(512);

        assert_eq!(request.text, "Hello world");
        assert_eq!(
            request.model,
            Some("amazon.titan-embed-text-v2:0".to_string())
        );
        assert_eq!(request.dimensions, Some(512));
    }

    #[test]
    fn test_extract_titan_shape() {
        let body = serde_json::json!({ "embedding": [0.5, 0.5], "inputTextTokenCount": 2 });
        assert_eq!(extract_embedding(&body).unwrap(), vec![0.5, 0.5]);
    }

    #[test]
    fn test_extract_openai_shape() {
        let body = serde_json::json!({ "data": [{ "embedding": [1.0, 0.0], "index": 0 }] });
        assert_eq!(extract_embedding(&body).unwrap(), vec![1.0, 0.0]);
    }

    #[test]
    fn test_extract_rejects_malformed() {
        for body in [
            serde_json::json!({}),
            serde_json::json!({ "embedding": "nope" }),
            serde_json::json!({ "embedding": [1.0, "x"] }),
        ] {
            assert!(matches!(
                extract_embedding(&body),
                Err(EmbeddingError::InvalidResponse(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_http_provider_normalizes() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .and(header("Authorization", "Bearer secret"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "embedding": [3.0, 4.0] })),
            )
            .mount(&server)
            .await;

        let provider = HttpEmbeddingProvider::new(server.uri(), "test-model", 2).with_api_key("secret");
        let response = provider.embed(EmbeddingRequest::new("hi")).await.unwrap();

        assert_eq!(response.model, "test-model");
        assert_eq!(response.dimension, 2);
        assert!((response.embedding[0] - 0.6).abs() < 1e-6);
        assert!((response.embedding[1] - 0.8).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_http_provider_rejects_wrong_dimension() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "embedding": [1.0, 0.0, 0.0] })),
            )
            .mount(&server)
            .await;

        let provider = HttpEmbeddingProvider::new(server.uri(), "test-model", 2);
        let result = provider.embed(EmbeddingRequest::new("hi")).await;

        assert!(matches!(
            result,
            Err(EmbeddingError::DimensionMismatch {
                expected: 2,
                actual: 3
            })
        ));
    }

    #[tokio::test]
    async fn test_http_provider_rate_limited() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "7"))
            .mount(&server)
            .await;

        let provider = HttpEmbeddingProvider::new(server.uri(), "test-model", 2);
        let result = provider.embed(EmbeddingRequest::new("hi")).await;

        assert!(matches!(
            result,
            Err(EmbeddingError::RateLimited {
                retry_after_secs: 7
            })
        ));
    }

    #[tokio::test]
    async fn test_http_provider_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let provider = HttpEmbeddingProvider::new(server.uri(), "test-model", 2);
        let result = provider.embed(EmbeddingRequest::new("hi")).await;

        assert!(matches!(result, Err(EmbeddingError::ApiRequest(_))));
    }
}
