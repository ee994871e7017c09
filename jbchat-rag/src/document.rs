//! Data types for chunks and search results.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Where a chunk came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// One record of a structured configuration file.
    TrackRecord,
    /// A passage of fetched documentation.
    Documentation,
}

impl SourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SourceKind::TrackRecord => "track_record",
            SourceKind::Documentation => "documentation",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An immutable unit of retrievable knowledge.
///
/// Created once at ingestion and owned by the index afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocumentChunk {
    /// Unique identifier: `records:<path>#<seq>` or `web:<url>#<index>`.
    pub id: String,
    /// The text that is embedded and shown to the model.
    pub text: String,
    pub source_kind: SourceKind,
    /// Provenance fields (`source`, `seq_num`, `track_id`, `chunk_index`, ...).
    pub metadata: BTreeMap<String, String>,
}

impl DocumentChunk {
    pub fn new(id: impl Into<String>, text: impl Into<String>, source_kind: SourceKind) -> Self {
        Self { id: id.into(), text: text.into(), source_kind, metadata: BTreeMap::new() }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// The `source` metadata field (file path or URL), or the empty string.
    pub fn source(&self) -> &str {
        self.metadata.get("source").map(String::as_str).unwrap_or_default()
    }
}

/// A retrieved [`DocumentChunk`] paired with its relevance score.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoredChunk {
    pub chunk: DocumentChunk,
    /// Cosine similarity to the query (higher is more relevant).
    pub score: f32,
}

/// Ordered results of one query, best first, at most `k` long.
pub type RetrievalResult = Vec<ScoredChunk>;
