//! The chat-completion capability.

use std::pin::Pin;

use async_trait::async_trait;
use futures::{Stream, StreamExt};

use crate::accumulate::ChunkAccumulator;
use crate::error::Result;
use crate::types::{ChatChunk, ChatRequest, ChatResponse};

/// A boxed stream of response chunks.
pub type ChatStream = Pin<Box<dyn Stream<Item = Result<ChatChunk>> + Send>>;

/// A hosted (or scripted) chat-completion model.
///
/// Backends only implement [`stream`](ChatModel::stream); the gathered form
/// [`complete`](ChatModel::complete) is derived from it.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Model identifier, used in logs.
    fn name(&self) -> &str;

    /// Start a completion and return its incremental output.
    async fn stream(&self, request: ChatRequest) -> Result<ChatStream>;

    /// Run a completion to the end and return the gathered response.
    async fn complete(&self, request: ChatRequest) -> Result<ChatResponse> {
        let mut stream = self.stream(request).await?;
        let mut acc = ChunkAccumulator::new();
        while let Some(chunk) = stream.next().await {
            acc.push(&chunk?);
        }
        acc.finish()
    }
}
