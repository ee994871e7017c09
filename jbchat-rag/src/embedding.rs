//! Embedding provider trait and the offline hashing embedder.

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::error::{RagError, Result};

/// A provider that generates vector embeddings from text input.
///
/// Implementations wrap specific embedding backends (Gemini, OpenAI, etc.)
/// behind a unified async interface. The default [`embed_batch`](EmbeddingProvider::embed_batch)
/// implementation calls [`embed`](EmbeddingProvider::embed) sequentially;
/// backends that support native batching should override it.
///
/// The same provider must be used to build an index and to query it.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate an embedding vector for a single text input.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embedding vectors for a batch of text inputs, in input order.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// Return the dimensionality of embeddings produced by this provider.
    fn dimensions(&self) -> usize;

    /// Provider name for logs and errors.
    fn name(&self) -> &str {
        "embedding"
    }
}

/// Deterministic offline embedder based on feature hashing.
///
/// Each lowercase alphanumeric token is hashed with SHA-256 into one of
/// `dimensions` buckets with a hash-derived sign; the resulting vector is
/// L2-normalized. Texts sharing tokens therefore have positive cosine
/// similarity, which is enough for offline runs and tests.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimensions: usize,
}

impl HashingEmbedder {
    pub const DEFAULT_DIMENSIONS: usize = 384;

    pub fn new(dimensions: usize) -> Result<Self> {
        if dimensions == 0 {
            return Err(RagError::Config("hashing embedder needs at least one dimension".into()));
        }
        Ok(Self { dimensions })
    }

    fn embed_sync(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];
        for token in tokens(text) {
            let digest = Sha256::digest(token.as_bytes());
            let mut bucket_bytes = [0u8; 8];
            bucket_bytes.copy_from_slice(&digest[..8]);
            let bucket = (u64::from_le_bytes(bucket_bytes) % self.dimensions as u64) as usize;
            let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }
        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in &mut vector {
                *value /= norm;
            }
        }
        vector
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self { dimensions: Self::DEFAULT_DIMENSIONS }
    }
}

fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric()).filter(|t| !t.is_empty()).map(str::to_lowercase)
}

#[async_trait]
impl EmbeddingProvider for HashingEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed_sync(text))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_sync(t)).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        "hashing"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dot(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    #[tokio::test]
    async fn hashing_is_deterministic_and_normalized() {
        let embedder = HashingEmbedder::default();
        let a = embedder.embed("GRCh38 reference genes").await.unwrap();
        let b = embedder.embed("grch38 REFERENCE genes").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), HashingEmbedder::DEFAULT_DIMENSIONS);
        assert!((dot(&a, &a) - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn shared_tokens_score_higher_than_disjoint_text() {
        let embedder = HashingEmbedder::default();
        let query = embedder.embed("tracks for hg38").await.unwrap();
        let related = embedder.embed("hg38 gene tracks").await.unwrap();
        let unrelated = embedder.embed("installing the desktop application").await.unwrap();
        assert!(dot(&query, &related) > dot(&query, &unrelated));
    }

    #[tokio::test]
    async fn empty_text_is_zero_vector() {
        let embedder = HashingEmbedder::new(8).unwrap();
        assert_eq!(embedder.embed("  ").await.unwrap(), vec![0.0; 8]);
        assert!(HashingEmbedder::new(0).is_err());
    }
}
