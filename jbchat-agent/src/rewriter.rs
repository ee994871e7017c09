//! Rewriting follow-up questions into standalone queries.

use std::sync::Arc;

use async_trait::async_trait;
use jbchat_model::{ChatMessage, ChatModel, ChatRequest};
use tracing::debug;

use crate::error::{AgentError, Result};
use crate::prompt::{CONTEXTUALIZE_PROMPT, history_messages};
use crate::session::Turn;

/// Turns `(history, new_input)` into a standalone question.
#[async_trait]
pub trait QueryRewriter: Send + Sync {
    /// With empty history the input is returned unchanged.
    async fn rewrite(&self, history: &[Turn], input: &str) -> Result<String>;
}

/// A [`QueryRewriter`] that asks the chat model.
pub struct ModelQueryRewriter {
    model: Arc<dyn ChatModel>,
    instruction: String,
}

impl ModelQueryRewriter {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model, instruction: CONTEXTUALIZE_PROMPT.to_string() }
    }

    pub fn with_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.instruction = instruction.into();
        self
    }
}

#[async_trait]
impl QueryRewriter for ModelQueryRewriter {
    async fn rewrite(&self, history: &[Turn], input: &str) -> Result<String> {
        if history.is_empty() {
            return Ok(input.to_string());
        }

        let mut messages = vec![ChatMessage::system(self.instruction.as_str())];
        messages.extend(history_messages(history));
        messages.push(ChatMessage::user(input));

        let response = self
            .model
            .complete(ChatRequest::new(messages))
            .await
            .map_err(|e| AgentError::Rewrite(e.to_string()))?;
        let standalone = response.text.trim();
        if standalone.is_empty() {
            return Err(AgentError::Rewrite("model returned an empty question".into()));
        }
        debug!(model = self.model.name(), standalone, "rewrote follow-up");
        Ok(standalone.to_string())
    }
}
