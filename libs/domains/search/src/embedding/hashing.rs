use async_trait::async_trait;
use sha2::{Digest, Sha256};

use super::config::EmbeddingConfig;
use super::onnx::ensure_text;
use super::provider::EmbeddingProvider;
use crate::error::SearchResult;
use crate::models::Embedding;

/// Model-free embedding provider for development and tests.
///
/// Each lowercased word is hashed into one of `dimension` buckets with a
/// hash-derived sign (feature hashing). Texts sharing words get a positive
/// cosine similarity; identical texts get identical embeddings. Only the
/// first `max_sequence_length` words are used.
#[derive(Debug, Clone)]
pub struct HashingEmbeddingProvider {
    dimension: usize,
    max_sequence_length: usize,
}

impl HashingEmbeddingProvider {
    pub fn new(dimension: usize, max_sequence_length: usize) -> Self {
        Self {
            dimension,
            max_sequence_length,
        }
    }

    pub fn from_config(config: &EmbeddingConfig) -> Self {
        Self::new(config.dimension, config.max_sequence_length)
    }

    fn raw_vector(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];

        let tokens: Vec<String> = text
            .split_whitespace()
            .map(|word| {
                word.trim_matches(|c: char| !c.is_alphanumeric())
                    .to_lowercase()
            })
            .filter(|word| !word.is_empty())
            .take(self.max_sequence_length)
            .collect();

        for token in &tokens {
            self.accumulate(&mut vector, token);
        }

        // Punctuation-only input, or tokens that cancel out in a shared
        // bucket, fall back to hashing the whole text: one term is never zero.
        if vector.iter().all(|v| *v == 0.0) {
            self.accumulate(&mut vector, text.trim());
        }
        vector
    }

    fn accumulate(&self, vector: &mut [f32], token: &str) {
        let digest = Sha256::digest(token.as_bytes());
        let mut bucket_bytes = [0u8; 8];
        bucket_bytes.copy_from_slice(&digest[..8]);
        let bucket = (u64::from_le_bytes(bucket_bytes) % self.dimension as u64) as usize;
        let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
        vector[bucket] += sign;
    }
}

#[async_trait]
impl EmbeddingProvider for HashingEmbeddingProvider {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn max_sequence_length(&self) -> usize {
        self.max_sequence_length
    }

    async fn embed(&self, text: &str) -> SearchResult<Embedding> {
        ensure_text(text)?;
        Embedding::normalize(self.raw_vector(text), self.dimension)
    }
}
