use crate::config::{EmbeddingBackend, EmbeddingConfig};
use crate::huggingface::HuggingFaceEmbedding;
use async_trait::async_trait;
use medrag_core::{MedragError, MedragResult};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;

/// Trait for computing text embeddings (vector representations).
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Compute the embedding vector for a single text.
    async fn embed(&self, text: &str) -> MedragResult<Vec<f32>>;

    /// Compute embeddings for a batch of texts, in input order.
    async fn embed_batch(&self, texts: &[&str]) -> MedragResult<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// Identifier of the model producing the vectors.
    fn model_id(&self) -> &str;

    /// Vector size, when known without calling the model.
    fn dimension(&self) -> Option<usize>;
}

/// Builds the provider selected by `config`.
pub fn embedder_from_config(config: &EmbeddingConfig) -> MedragResult<Arc<dyn EmbeddingProvider>> {
    let provider: Arc<dyn EmbeddingProvider> = match config.provider {
        EmbeddingBackend::HuggingFace => Arc::new(HuggingFaceEmbedding::new(config)?),
        EmbeddingBackend::Local => Arc::new(LocalEmbedding::new(config.dimension)),
    };
    Ok(provider)
}

// --- Feature-extraction response shapes ---

/// Raw output of a feature-extraction call.
///
/// Sentence-level models return one vector per input; token-level models
/// return one vector per token.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum FeatureExtractionOutput {
    /// `[f32; d]`
    Vector(Vec<f32>),
    /// `[[f32; d]; n]`
    Batch(Vec<Vec<f32>>),
    /// `[[[f32; d]; tokens]; n]`
    Tokens(Vec<Vec<Vec<f32>>>),
}

impl FeatureExtractionOutput {
    /// The one vector a single-input request should produce.
    ///
    /// A flat vector is used as-is and a one-row batch is unwrapped. Several
    /// rows or token-level output are rejected rather than guessed at.
    pub fn into_single(self) -> MedragResult<Vec<f32>> {
        let vector = match self {
            Self::Vector(v) => v,
            Self::Batch(mut rows) if rows.len() == 1 => rows.remove(0),
            Self::Batch(rows) => {
                return Err(MedragError::Embedding(format!(
                    "Expected a single embedding vector, got {} vectors",
                    rows.len()
                )))
            }
            Self::Tokens(_) => {
                return Err(MedragError::Embedding(
                    "Expected a sentence embedding, got token-level output; use a sentence-embedding model"
                        .to_string(),
                ))
            }
        };
        if vector.is_empty() {
            return Err(MedragError::Embedding("Provider returned an empty vector".to_string()));
        }
        Ok(vector)
    }

    /// One vector per input for a batch request of `expected` texts.
    pub fn into_batch(self, expected: usize) -> MedragResult<Vec<Vec<f32>>> {
        let rows = match self {
            Self::Batch(rows) => rows,
            Self::Vector(v) if expected == 1 => vec![v],
            Self::Vector(_) => {
                return Err(MedragError::Embedding(format!(
                    "Expected {expected} embedding vectors, got a single vector"
                )))
            }
            Self::Tokens(_) => {
                return Err(MedragError::Embedding(
                    "Expected sentence embeddings, got token-level output".to_string(),
                ))
            }
        };
        if rows.len() != expected {
            return Err(MedragError::Embedding(format!(
                "Expected {expected} embedding vectors, got {}",
                rows.len()
            )));
        }
        if rows.iter().any(Vec::is_empty) {
            return Err(MedragError::Embedding("Provider returned an empty vector".to_string()));
        }
        Ok(rows)
    }
}

// --- Local provider ---

/// Model id reported by [`LocalEmbedding`].
pub const LOCAL_MODEL_ID: &str = "local-hashed-bow";

/// Offline embedding: hashed term frequencies folded into a fixed-size,
/// L2-normalized vector. Deterministic, so local indexes built with it can be
/// queried with it later.
pub struct LocalEmbedding {
    dimension: usize,
}

impl LocalEmbedding {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }
}

impl Default for LocalEmbedding {
    fn default() -> Self {
        Self::new(384)
    }
}

#[async_trait]
impl EmbeddingProvider for LocalEmbedding {
    async fn embed(&self, text: &str) -> MedragResult<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(MedragError::Embedding("Cannot embed empty text".to_string()));
        }

        let mut vector = vec![0.0f32; self.dimension];
        let terms = term_frequencies(text);
        let total: f32 = terms.values().sum();
        if total == 0.0 {
            return Ok(vector);
        }

        // Each term lands in three buckets with decreasing weight.
        for (term, count) in &terms {
            let tf = count / total;
            for (salt, weight) in [(0u8, 1.0f32), (1, 0.7), (2, 0.5)] {
                let bucket = fnv1a(term.as_bytes(), salt) as usize % self.dimension;
                vector[bucket] += tf * weight;
            }
        }

        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        Ok(vector)
    }

    fn model_id(&self) -> &str {
        LOCAL_MODEL_ID
    }

    fn dimension(&self) -> Option<usize> {
        Some(self.dimension)
    }
}

fn term_frequencies(text: &str) -> HashMap<String, f32> {
    let mut freq: HashMap<String, f32> = HashMap::new();
    for term in text
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() > 1)
    {
        *freq.entry(term.to_string()).or_insert(0.0) += 1.0;
    }
    freq
}

/// FNV-1a over `data` followed by one salt byte.
fn fnv1a(data: &[u8], salt: u8) -> u32 {
    let mut hash: u32 = 2_166_136_261;
    for &byte in data.iter().chain(std::iter::once(&salt)) {
        hash ^= u32::from(byte);
        hash = hash.wrapping_mul(16_777_619);
    }
    hash
}
