use async_trait::async_trait;

use crate::error::SearchResult;
use crate::models::Embedding;

/// Turns text into unit-length embeddings of a fixed dimension.
///
/// Input longer than [`max_sequence_length`](Self::max_sequence_length)
/// tokens is truncated to its first `max_sequence_length` tokens, never
/// rejected.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Length of every embedding this provider returns.
    fn dimension(&self) -> usize;

    /// Token budget per input.
    fn max_sequence_length(&self) -> usize;

    /// Embed a single non-empty text.
    async fn embed(&self, text: &str) -> SearchResult<Embedding>;

    /// Embed several texts; the result is index-aligned with `texts`.
    ///
    /// Fails as a whole if any text fails.
    async fn embed_batch(&self, texts: &[String]) -> SearchResult<Vec<Embedding>> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for text in texts {
            embeddings.push(self.embed(text).await?);
        }
        Ok(embeddings)
    }
}
