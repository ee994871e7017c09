//! Error types for the `jbchat-model` crate.

use thiserror::Error;

/// Errors raised by chat-completion backends.
#[derive(Debug, Error)]
pub enum ModelError {
    /// The HTTP request could not be sent or its body could not be read.
    #[error("Request error ({provider}): {message}")]
    Request {
        /// The backend that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// The backend answered with a non-success status.
    #[error("API error ({provider}) {status}: {message}")]
    Api {
        /// The backend that produced the error.
        provider: String,
        /// HTTP status code.
        status: u16,
        /// Error detail extracted from the response body.
        message: String,
    },

    /// A streamed event could not be read or decoded.
    #[error("Stream error ({provider}): {message}")]
    Stream {
        /// The backend that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// Accumulated tool-call arguments were not a JSON object.
    #[error("Malformed tool call: {0}")]
    MalformedToolCall(String),

    /// Invalid client configuration (missing key, unknown provider, ...).
    #[error("Configuration error: {0}")]
    Config(String),

    /// A scripted mock model ran out of responses.
    #[error("Mock model script exhausted")]
    Exhausted,
}

/// A convenience result type for model operations.
pub type Result<T> = std::result::Result<T, ModelError>;
