//! In-memory vector index using cosine similarity.
//!
//! [`InMemoryVectorIndex`] keeps entries in a `Vec` behind a
//! `tokio::sync::RwLock`, so any number of queries can run concurrently once
//! the index is built.

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::document::ScoredChunk;
use crate::error::{RagError, Result};
use crate::vectorstore::{IndexEntry, VectorIndex};

/// An in-memory vector index using cosine similarity for search.
#[derive(Debug, Default)]
pub struct InMemoryVectorIndex {
    entries: RwLock<Vec<IndexEntry>>,
}

impl InMemoryVectorIndex {
    /// Create a new empty index.
    pub fn new() -> Self {
        Self::default()
    }
}

/// Compute cosine similarity between two vectors.
///
/// Returns 0.0 if either vector has zero magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[async_trait]
impl VectorIndex for InMemoryVectorIndex {
    async fn insert(&self, new_entries: Vec<IndexEntry>) -> Result<()> {
        let mut entries = self.entries.write().await;
        let expected = entries.first().or(new_entries.first()).map(|e| e.embedding.len());
        if let Some(dim) = expected {
            if let Some(bad) = new_entries.iter().find(|e| e.embedding.len() != dim) {
                return Err(RagError::IndexQuery(format!(
                    "chunk '{}' has {} dimensions, index expects {dim}",
                    bad.chunk.id,
                    bad.embedding.len()
                )));
            }
        }
        entries.extend(new_entries);
        entries.sort_by_key(|e| e.ordinal);
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.entries.write().await.clear();
        Ok(())
    }

    async fn search(&self, embedding: &[f32], top_k: usize) -> Result<Vec<ScoredChunk>> {
        let entries = self.entries.read().await;
        if let Some(first) = entries.first() {
            if first.embedding.len() != embedding.len() {
                return Err(RagError::IndexQuery(format!(
                    "query has {} dimensions, index expects {}",
                    embedding.len(),
                    first.embedding.len()
                )));
            }
        }

        // entries are kept in ordinal order and sort_by is stable
        let mut scored: Vec<(f32, &IndexEntry)> = entries
            .iter()
            .map(|entry| (cosine_similarity(&entry.embedding, embedding), entry))
            .collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_k);

        Ok(scored
            .into_iter()
            .map(|(score, entry)| ScoredChunk { chunk: entry.chunk.clone(), score })
            .collect())
    }

    async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{DocumentChunk, SourceKind};

    fn entry(id: &str, ordinal: usize, embedding: Vec<f32>) -> IndexEntry {
        let chunk = DocumentChunk::new(id, id, SourceKind::Documentation);
        IndexEntry { chunk, embedding, ordinal }
    }

    #[tokio::test]
    async fn ties_keep_ingestion_order() {
        let index = InMemoryVectorIndex::new();
        index
            .insert(vec![
                entry("c", 2, vec![1.0, 0.0]),
                entry("a", 0, vec![1.0, 0.0]),
                entry("b", 1, vec![1.0, 0.0]),
            ])
            .await
            .unwrap();
        let ids: Vec<String> =
            index.search(&[1.0, 0.0], 3).await.unwrap().into_iter().map(|r| r.chunk.id).collect();
        assert_eq!(ids, ["a", "b", "c"]);
    }

    #[tokio::test]
    async fn dimension_mismatch_is_an_index_error() {
        let index = InMemoryVectorIndex::new();
        index.insert(vec![entry("a", 0, vec![1.0, 0.0])]).await.unwrap();
        assert!(matches!(index.search(&[1.0], 1).await, Err(RagError::IndexQuery(_))));
        assert!(index.insert(vec![entry("b", 1, vec![1.0])]).await.is_err());
        assert_eq!(index.len().await, 1);
    }

    #[tokio::test]
    async fn clear_empties_the_index() {
        let index = InMemoryVectorIndex::new();
        index.insert(vec![entry("a", 0, vec![0.5, 0.5])]).await.unwrap();
        index.clear().await.unwrap();
        assert!(index.is_empty().await);
        assert!(index.search(&[1.0, 0.0], 4).await.unwrap().is_empty());
    }

    #[test]
    fn cosine_of_zero_vector_is_zero() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert!((cosine_similarity(&[1.0, 1.0], &[2.0, 2.0]) - 1.0).abs() < 1e-6);
    }
}
