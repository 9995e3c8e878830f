use std::{
    collections::hash_map::DefaultHasher,
    hash::{Hash, Hasher},
};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Whether text is embedded as a search query or as a stored document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingMode {
    Query,
    Document,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryEmbedding {
    pub embedding: Vec<f32>,
    pub model: String,
    pub dimensions: usize,
}

/// Text to vector. `Ok(None)` means the provider is unavailable for this
/// input, which callers treat as "no contribution" rather than a failure.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn generate(
        &self,
        text: &str,
        mode: EmbeddingMode,
    ) -> Result<Option<QueryEmbedding>, AppError>;
}

/// Deterministic bag-of-tokens embedding. Needs no model download, which makes
/// it suitable for offline runs and tests.
#[derive(Debug, Clone)]
pub struct HashedEmbeddingProvider {
    dimension: usize,
}

impl HashedEmbeddingProvider {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }
}

#[async_trait]
impl EmbeddingProvider for HashedEmbeddingProvider {
    async fn generate(
        &self,
        text: &str,
        _mode: EmbeddingMode,
    ) -> Result<Option<QueryEmbedding>, AppError> {
        Ok(hashed_embedding(text, self.dimension).map(|embedding| QueryEmbedding {
            embedding,
            model: "hashed".to_string(),
            dimensions: self.dimension,
        }))
    }
}

fn hashed_embedding(text: &str, dimension: usize) -> Option<Vec<f32>> {
    let dim = dimension.max(1);
    let mut vector = vec![0.0f32; dim];

    let mut token_count = 0usize;
    for token in tokens(text) {
        token_count = token_count.saturating_add(1);
        if let Some(slot) = vector.get_mut(bucket(&token, dim)) {
            *slot += 1.0;
        }
    }

    if token_count == 0 {
        return None;
    }

    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for value in &mut vector {
            *value /= norm;
        }
    }

    Some(vector)
}

fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(str::to_ascii_lowercase)
}

#[allow(clippy::cast_possible_truncation)]
fn bucket(token: &str, dimension: usize) -> usize {
    let mut hasher = DefaultHasher::new();
    token.hash(&mut hasher);
    (hasher.finish() as usize) % dimension
}
