//! Chat and embedding backends chosen once at startup.

use std::fmt;
use std::sync::Arc;

use jbchat_model::{ChatModel, ModelConfig, ModelProvider};
use jbchat_rag::{EmbeddingProvider, GeminiEmbeddingProvider, OpenAIEmbeddingProvider};
use tracing::info;

use crate::error::{AgentError, Result};

/// The matching chat model and embedder for one provider.
#[derive(Clone)]
pub struct Capabilities {
    pub provider: ModelProvider,
    pub chat: Arc<dyn ChatModel>,
    pub embedder: Arc<dyn EmbeddingProvider>,
}

impl Capabilities {
    pub fn new(
        provider: ModelProvider,
        chat: Arc<dyn ChatModel>,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Self {
        Self { provider, chat, embedder }
    }

    /// Build both backends from the provider's API key variable.
    pub fn from_env(provider: ModelProvider) -> Result<Self> {
        let api_key = provider.api_key_from_env().map_err(|e| AgentError::Config(e.to_string()))?;
        Self::with_api_key(provider, api_key)
    }

    pub fn with_api_key(provider: ModelProvider, api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        let config = ModelConfig::new(api_key.as_str(), provider.default_chat_model());
        let chat = jbchat_model::connect(provider, config)
            .map_err(|e| AgentError::Config(e.to_string()))?;
        let embedder: Arc<dyn EmbeddingProvider> = match provider {
            ModelProvider::OpenAI => Arc::new(OpenAIEmbeddingProvider::new(api_key)?),
            ModelProvider::Gemini => Arc::new(GeminiEmbeddingProvider::new(api_key)?),
        };
        info!(%provider, chat = chat.name(), embedder = embedder.name(), "capabilities ready");
        Ok(Self { provider, chat, embedder })
    }
}

impl fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Capabilities")
            .field("provider", &self.provider)
            .field("chat", &self.chat.name())
            .field("embedder", &self.embedder.name())
            .finish()
    }
}
