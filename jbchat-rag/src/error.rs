//! Error types for the `jbchat-rag` crate.

use thiserror::Error;

/// Errors that can occur while ingesting, embedding or querying.
#[derive(Debug, Error)]
pub enum RagError {
    /// A source could not be read or fetched.
    #[error("Source unreachable ({location}): {message}")]
    SourceUnreachable {
        /// File path or URL of the source.
        location: String,
        /// A description of the failure.
        message: String,
    },

    /// A source was read but its content does not match the expected shape.
    #[error("Malformed source ({location}): {message}")]
    MalformedSource {
        /// File path or URL of the source.
        location: String,
        /// A description of the failure.
        message: String,
    },

    /// An error occurred during embedding generation.
    #[error("Embedding error ({provider}): {message}")]
    Embedding {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// The vector index rejected an insert or search.
    #[error("Index error: {0}")]
    IndexQuery(String),

    /// A configuration validation error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl RagError {
    /// The file path or URL a source error refers to, if any.
    pub fn location(&self) -> Option<&str> {
        match self {
            RagError::SourceUnreachable { location, .. }
            | RagError::MalformedSource { location, .. } => Some(location),
            _ => None,
        }
    }
}

/// A convenience result type for RAG operations.
pub type Result<T> = std::result::Result<T, RagError>;
