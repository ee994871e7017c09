//! # jbchat-rag
//!
//! Ingestion, embedding and vector search for the jbchat assistant.
//!
//! ## Overview
//!
//! - [`DocumentIngestor`] turns [`SourceDescriptor`]s (a JSON file of track
//!   records, documentation URLs) into [`DocumentChunk`]s, tolerating failing
//!   sources.
//! - [`IndexService`] embeds the chunks with an [`EmbeddingProvider`] and
//!   loads them into a [`VectorIndex`].
//! - [`IndexHandle`] answers top-k cosine similarity queries.
//!
//! Embedding providers: [`OpenAIEmbeddingProvider`], [`GeminiEmbeddingProvider`]
//! and the offline [`HashingEmbedder`].

pub mod chunking;
pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod gemini;
mod http;
pub mod index;
pub mod ingest;
pub mod inmemory;
pub mod openai;
pub mod vectorstore;

pub use chunking::{Chunker, RecursiveChunker};
pub use config::{RagConfig, RagConfigBuilder};
pub use document::{DocumentChunk, RetrievalResult, ScoredChunk, SourceKind};
pub use embedding::{EmbeddingProvider, HashingEmbedder};
pub use error::{RagError, Result};
pub use gemini::GeminiEmbeddingProvider;
pub use index::{IndexHandle, IndexService, IndexServiceBuilder};
pub use ingest::{
    DEFAULT_DOCS_URL, DocumentIngestor, ExtractionRule, IngestReport, SourceDescriptor,
};
pub use inmemory::InMemoryVectorIndex;
pub use openai::OpenAIEmbeddingProvider;
pub use vectorstore::{IndexEntry, VectorIndex};
