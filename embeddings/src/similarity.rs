//! Similarity computation and ranking for embeddings.
//!
//! Ranking is a linear pass over every candidate it is handed. There is no
//! approximate-nearest-neighbor structure here: cost grows with the number of
//! candidates, and callers that need sub-linear search must layer an index
//! above this module.

use std::cmp::Reverse;

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::error::{EmbeddingError, Result};

/// Compute the cosine similarity between two embeddings.
///
/// Returns a value between -1.0 and 1.0 (not clamped, so floating-point
/// drift may exceed the bounds by an epsilon), where:
/// - 1.0 means identical direction
/// - 0.0 means orthogonal vectors, or either vector has zero norm
/// - -1.0 means opposite vectors
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32> {
    let dot = dot_product(a, b)?;
    let magnitude_a = l2_norm(a);
    let magnitude_b = l2_norm(b);

    if magnitude_a == 0.0 || magnitude_b == 0.0 {
        return Ok(0.0);
    }

    Ok(dot / (magnitude_a * magnitude_b))
}

/// Compute the dot product between two embeddings.
pub fn dot_product(a: &[f32], b: &[f32]) -> Result<f32> {
    if a.len() != b.len() {
        return Err(EmbeddingError::DimensionMismatch {
            expected: a.len(),
            actual: b.len(),
        });
    }

    Ok(a.iter().zip(b.iter()).map(|(x, y)| x * y).sum())
}

/// Euclidean (L2) norm of a vector.
pub fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Normalize an embedding to unit length.
///
/// A zero vector is left unchanged.
pub fn normalize(embedding: &mut [f32]) {
    let magnitude = l2_norm(embedding);
    if magnitude > 0.0 {
        for x in embedding.iter_mut() {
            *x /= magnitude;
        }
    }
}

/// A candidate paired with its relevance score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredItem<T> {
    /// The ranked candidate.
    pub item: T,

    /// Cosine similarity against the query.
    pub score: f32,
}

/// Score every candidate against `query` and keep the best `top_k`.
///
/// Candidates scoring below `threshold` are discarded. The rest are ordered
/// by descending score; equal scores keep the order in which the candidates
/// were supplied.
pub fn rank_top_k<T, I, F>(
    query: &[f32],
    candidates: I,
    embedding_of: F,
    top_k: usize,
    threshold: f32,
) -> Result<Vec<ScoredItem<T>>>
where
    I: IntoIterator<Item = T>,
    F: Fn(&T) -> &[f32],
{
    let mut scored = Vec::new();

    for candidate in candidates {
        let score = cosine_similarity(query, embedding_of(&candidate))?;
        if score >= threshold {
            scored.push(ScoredItem {
                item: candidate,
                score,
            });
        }
    }

    // Stable sort, so ties fall back to scan order.
    scored.sort_by_key(|s| Reverse(OrderedFloat(s.score)));
    scored.truncate(top_k);

    Ok(scored)
}
