//! Error types for the `jbchat-agent` crate.

use jbchat_rag::RagError;
use thiserror::Error;

/// Errors raised while running a dialogue turn.
#[derive(Debug, Error)]
pub enum AgentError {
    /// The follow-up question could not be rewritten. The retriever recovers
    /// from this by falling back to the raw input.
    #[error("Rewrite error: {0}")]
    Rewrite(String),

    /// The model failed to produce a usable answer.
    #[error("Synthesis error: {0}")]
    Synthesis(String),

    /// The model kept requesting tools past the configured bound.
    #[error("Tool loop exceeded: more than {max} tool rounds")]
    ToolLoopExceeded {
        /// The configured maximum number of tool rounds.
        max: usize,
    },

    /// The consumer of a streamed turn went away.
    #[error("Stream aborted: the fragment consumer is gone")]
    StreamAborted,

    /// Retrieval against the index failed.
    #[error("Retrieval error: {0}")]
    Retrieval(#[from] RagError),

    /// A tool failed. Fed back to the model as a result string.
    #[error("Tool error ({name}): {message}")]
    Tool {
        /// The tool that failed.
        name: String,
        /// A description of the failure.
        message: String,
    },

    /// Invalid engine configuration.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl AgentError {
    pub(crate) fn tool(name: impl Into<String>, message: impl Into<String>) -> Self {
        AgentError::Tool { name: name.into(), message: message.into() }
    }
}

/// A convenience result type for agent operations.
pub type Result<T> = std::result::Result<T, AgentError>;
