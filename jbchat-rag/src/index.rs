//! Embedding and index service.
//!
//! [`IndexService`] embeds every chunk once and loads the vectors into a
//! [`VectorIndex`]; the resulting [`IndexHandle`] answers similarity queries
//! with the same embedding provider.
//!
//! # Example
//!
//! ```rust,ignore
//! use jbchat_rag::{HashingEmbedder, IndexService, RagConfig};
//!
//! let handle = IndexService::builder()
//!     .config(RagConfig::default())
//!     .embedding_provider(Arc::new(HashingEmbedder::default()))
//!     .build()?
//!     .build_index(report.chunks)
//!     .await?;
//! let results = handle.query("which tracks use hg38?", 4).await?;
//! ```

use std::sync::Arc;

use tracing::{debug, error, info};

use crate::config::RagConfig;
use crate::document::{DocumentChunk, RetrievalResult};
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::inmemory::InMemoryVectorIndex;
use crate::vectorstore::{IndexEntry, VectorIndex};

const DEFAULT_COLLECTION: &str = "jbchat";

/// Builds a searchable index from chunks. Construct one via
/// [`IndexService::builder()`].
pub struct IndexService {
    collection: String,
    config: RagConfig,
    embedding_provider: Arc<dyn EmbeddingProvider>,
    vector_index: Arc<dyn VectorIndex>,
}

impl IndexService {
    /// Create a new [`IndexServiceBuilder`].
    pub fn builder() -> IndexServiceBuilder {
        IndexServiceBuilder::default()
    }

    /// Return a reference to the configuration.
    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Embed `chunks` and load them into the index, replacing any previous
    /// content. Ordinals follow the order of `chunks`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Embedding`] if the provider fails or returns the
    /// wrong number of vectors, and [`RagError::IndexQuery`] if the index
    /// rejects the entries.
    pub async fn build_index(self, chunks: Vec<DocumentChunk>) -> Result<IndexHandle> {
        self.vector_index.clear().await?;

        let provider = self.embedding_provider.name().to_string();
        let mut ordinal = 0;
        for batch in chunks.chunks(self.config.embed_batch_size) {
            let texts: Vec<&str> = batch.iter().map(|c| c.text.as_str()).collect();
            let embeddings = self.embedding_provider.embed_batch(&texts).await.map_err(|e| {
                error!(collection = %self.collection, error = %e, "embedding failed during build");
                e
            })?;
            if embeddings.len() != batch.len() {
                error!(collection = %self.collection, "embedding count mismatch");
                return Err(RagError::Embedding {
                    provider,
                    message: format!(
                        "expected {} embeddings, got {}",
                        batch.len(),
                        embeddings.len()
                    ),
                });
            }

            let entries = batch
                .iter()
                .cloned()
                .zip(embeddings)
                .map(|(chunk, embedding)| {
                    let entry = IndexEntry { chunk, embedding, ordinal };
                    ordinal += 1;
                    entry
                })
                .collect();
            self.vector_index.insert(entries).await.map_err(|e| {
                error!(collection = %self.collection, error = %e, "insert failed during build");
                e
            })?;
            debug!(collection = %self.collection, batch_size = batch.len(), "indexed batch");
        }

        info!(
            collection = %self.collection,
            chunk_count = chunks.len(),
            provider = %provider,
            "index built"
        );

        Ok(IndexHandle {
            inner: Arc::new(HandleInner {
                collection: self.collection,
                config: self.config,
                embedding_provider: self.embedding_provider,
                vector_index: self.vector_index,
            }),
        })
    }
}

/// Builder for [`IndexService`].
#[derive(Default)]
pub struct IndexServiceBuilder {
    collection: Option<String>,
    config: Option<RagConfig>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    vector_index: Option<Arc<dyn VectorIndex>>,
}

impl IndexServiceBuilder {
    /// Name used in log fields.
    pub fn collection(mut self, name: impl Into<String>) -> Self {
        self.collection = Some(name.into());
        self
    }

    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    /// Defaults to a fresh [`InMemoryVectorIndex`].
    pub fn vector_index(mut self, index: Arc<dyn VectorIndex>) -> Self {
        self.vector_index = Some(index);
        self
    }

    /// # Errors
    ///
    /// Returns [`RagError::Config`] if no embedding provider was set.
    pub fn build(self) -> Result<IndexService> {
        let embedding_provider = self
            .embedding_provider
            .ok_or_else(|| RagError::Config("embedding_provider is required".to_string()))?;
        Ok(IndexService {
            collection: self.collection.unwrap_or_else(|| DEFAULT_COLLECTION.to_string()),
            config: self.config.unwrap_or_default(),
            embedding_provider,
            vector_index: self.vector_index.unwrap_or_else(|| Arc::new(InMemoryVectorIndex::new())),
        })
    }
}

struct HandleInner {
    collection: String,
    config: RagConfig,
    embedding_provider: Arc<dyn EmbeddingProvider>,
    vector_index: Arc<dyn VectorIndex>,
}

/// A built, read-only index. Cheap to clone and safe to query concurrently.
#[derive(Clone)]
pub struct IndexHandle {
    inner: Arc<HandleInner>,
}

impl IndexHandle {
    /// Default number of results, from [`RagConfig::top_k`].
    pub fn top_k(&self) -> usize {
        self.inner.config.top_k
    }

    /// Number of indexed chunks.
    pub async fn len(&self) -> usize {
        self.inner.vector_index.len().await
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Return the `k` chunks most similar to `text`, best first.
    ///
    /// Ties keep ingestion order; scores below the configured similarity
    /// threshold are dropped.
    pub async fn query(&self, text: &str, k: usize) -> Result<RetrievalResult> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let inner = &self.inner;
        let embedding = inner.embedding_provider.embed(text).await.map_err(|e| {
            error!(collection = %inner.collection, error = %e, "query embedding failed");
            e
        })?;
        let mut results = inner.vector_index.search(&embedding, k).await.map_err(|e| {
            error!(collection = %inner.collection, error = %e, "search failed");
            e
        })?;
        results.retain(|r| r.score >= inner.config.similarity_threshold);
        debug!(collection = %inner.collection, k, result_count = results.len(), "query done");
        Ok(results)
    }

    /// [`query`](Self::query) with the default `k`.
    pub async fn query_default(&self, text: &str) -> Result<RetrievalResult> {
        self.query(text, self.top_k()).await
    }
}
