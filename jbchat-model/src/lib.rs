//! # jbchat-model
//!
//! Streaming chat-completion clients for the jbchat assistant.
//!
//! ## Overview
//!
//! Every backend implements [`ChatModel`]: it streams [`ChatChunk`]s (text
//! deltas and tool-call fragments) and can gather them into a
//! [`ChatResponse`] with [`ChatModel::complete`].
//!
//! - [`OpenAIChatModel`] - OpenAI chat completions (and compatible servers)
//! - [`GeminiChatModel`] - Gemini `streamGenerateContent`
//! - [`MockChatModel`] - scripted replies for tests
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use jbchat_model::{
//!     ChatMessage, ChatModel, ChatRequest, GeminiChatModel, ModelConfig, ModelProvider,
//! };
//!
//! # async fn run() -> jbchat_model::Result<()> {
//! let provider = ModelProvider::Gemini;
//! let config = ModelConfig::new(provider.api_key_from_env()?, provider.default_chat_model());
//! let model = GeminiChatModel::new(config)?;
//! let request = ChatRequest::new(vec![ChatMessage::user("What is JBrowse?")]);
//! let response = model.complete(request).await?;
//! println!("{}", response.text);
//! # Ok(())
//! # }
//! ```

mod accumulate;
pub mod config;
pub mod error;
pub mod gemini;
pub mod http;
pub mod mock;
mod model;
pub mod openai;
pub mod types;

use std::sync::Arc;

pub use accumulate::ChunkAccumulator;
pub use config::{DEFAULT_TIMEOUT, ModelConfig, ModelProvider};
pub use error::{ModelError, Result};
pub use gemini::GeminiChatModel;
pub use mock::{MockChatModel, MockReply};
pub use model::{ChatModel, ChatStream};
pub use openai::OpenAIChatModel;
pub use types::{
    ChatChunk, ChatMessage, ChatRequest, ChatResponse, MessageRole, ToolInvocation, ToolSpec,
};

/// Build the hosted client for `provider`.
pub fn connect(provider: ModelProvider, config: ModelConfig) -> Result<Arc<dyn ChatModel>> {
    Ok(match provider {
        ModelProvider::OpenAI => Arc::new(OpenAIChatModel::new(config)?),
        ModelProvider::Gemini => Arc::new(GeminiChatModel::new(config)?),
    })
}
