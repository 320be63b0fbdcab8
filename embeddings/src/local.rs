//! Deterministic local embedding.
//!
//! Each character's code point is divided by 1000 and accumulated into
//! bucket `char_index % dimension`; the result is L2-normalized. The same
//! text always produces the same vector, and the empty string produces the
//! zero vector.

use async_trait::async_trait;

use crate::Embedding;
use crate::error::Result;
use crate::provider::{EmbeddingProvider, EmbeddingRequest, EmbeddingResponse};
use crate::similarity::normalize;

const MODEL: &str = "char-bucket";

/// Last-resort embedding provider that needs no network and cannot fail.
#[derive(Debug, Clone)]
pub struct LocalHashProvider {
    dimension: usize,
}

impl LocalHashProvider {
    /// Create a provider producing vectors of `dimension` floats.
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    /// Embed `text` without going through the provider trait.
    pub fn embed_text(&self, text: &str) -> Embedding {
        let mut embedding = vec![0.0f32; self.dimension];
        if self.dimension == 0 {
            return embedding;
        }

        for (i, ch) in text.chars().enumerate() {
            embedding[i % self.dimension] += u32::from(ch) as f32 / 1000.0;
        }

        normalize(&mut embedding);
        embedding
    }
}

#[async_trait]
impl EmbeddingProvider for LocalHashProvider {
    fn name(&self) -> &str {
        "local-hash"
    }

    fn default_model(&self) -> &str {
        MODEL
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse> {
        let embedding = self.embed_text(&request.text);
        Ok(EmbeddingResponse {
            dimension: embedding.len(),
            embedding,
            model: MODEL.to_string(),
            tokens_used: None,
        })
    }

    fn is_available(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::similarity::l2_norm;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_deterministic() {
        let provider = LocalHashProvider::new(384);
        let a = provider.embed_text("This is a test sentence");
        let b = provider.embed_text("This is a test sentence");

        assert_eq!(a.len(), 384);
        let bits_a: Vec<u32> = a.iter().map(|x| x.to_bits()).collect();
        let bits_b: Vec<u32> = b.iter().map(|x| x.to_bits()).collect();
        assert_eq!(bits_a, bits_b);
    }

    #[test]
    fn test_unit_norm() {
        let provider = LocalHashProvider::new(1024);
        for text in ["Test normalization", "a", "héllo wörld ✓", "long ".repeat(500).as_str()] {
            let norm = l2_norm(&provider.embed_text(text));
            assert!((norm - 1.0).abs() < 1e-5, "norm {norm} for {text:?}");
        }
    }

    #[test]
    fn test_empty_text_is_zero_vector() {
        let provider = LocalHashProvider::new(16);
        assert_eq!(provider.embed_text(""), vec![0.0; 16]);
    }

    #[test]
    fn test_different_texts_differ() {
        let provider = LocalHashProvider::new(384);
        assert_ne!(
            provider.embed_text("First text"),
            provider.embed_text("Second text")
        );
    }

    #[test]
    fn test_buckets_wrap_around() {
        let provider = LocalHashProvider::new(2);
        // 'a' (97) lands in buckets 0 and 1, 'b' (98) wraps into bucket 0.
        let embedding = provider.embed_text("aab");
        let raw = [0.097f32 + 0.098, 0.097];
        let norm = l2_norm(&raw);
        assert!((embedding[0] - raw[0] / norm).abs() < 1e-6);
        assert!((embedding[1] - raw[1] / norm).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_provider_trait_matches_embed_text() {
        let provider = LocalHashProvider::new(8);
        let response = provider
            .embed(EmbeddingRequest::new("same text"))
            .await
            .unwrap();

        assert_eq!(response.embedding, provider.embed_text("same text"));
        assert_eq!(response.dimension, 8);
    }
}
