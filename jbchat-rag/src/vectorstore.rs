//! Vector index trait for storing and searching chunk embeddings.

use async_trait::async_trait;

use crate::document::{DocumentChunk, ScoredChunk};
use crate::error::Result;

/// A chunk with its embedding and ingestion position.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexEntry {
    pub chunk: DocumentChunk,
    pub embedding: Vec<f32>,
    /// Position in ingestion order; breaks score ties.
    pub ordinal: usize,
}

/// A storage backend for chunk embeddings with similarity search.
///
/// # Example
///
/// ```rust,ignore
/// use jbchat_rag::{InMemoryVectorIndex, VectorIndex};
///
/// let index = InMemoryVectorIndex::new();
/// index.insert(entries).await?;
/// let results = index.search(&query_embedding, 4).await?;
/// ```
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Add entries. All embeddings must share one dimensionality.
    async fn insert(&self, entries: Vec<IndexEntry>) -> Result<()>;

    /// Remove every entry.
    async fn clear(&self) -> Result<()>;

    /// Search for the `top_k` most similar chunks to the given embedding.
    ///
    /// Returns results ordered by descending similarity score; equal scores
    /// keep ingestion order.
    async fn search(&self, embedding: &[f32], top_k: usize) -> Result<Vec<ScoredChunk>>;

    /// Number of stored entries.
    async fn len(&self) -> usize;

    async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
