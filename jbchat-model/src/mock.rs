//! A scripted [`ChatModel`] for tests and offline runs.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use futures::stream;
use serde_json::Value;

use crate::error::{ModelError, Result};
use crate::model::{ChatModel, ChatStream};
use crate::types::{ChatChunk, ChatRequest};

/// One scripted completion.
#[derive(Debug, Clone)]
pub enum MockReply {
    /// Stream these chunks, then end.
    Chunks(Vec<ChatChunk>),
    /// Fail before any chunk is produced.
    Fail(String),
    /// Stream these chunks, then fail mid-stream.
    FailAfter(Vec<ChatChunk>, String),
}

impl MockReply {
    /// A plain text answer delivered as a single chunk.
    pub fn text(text: impl Into<String>) -> Self {
        MockReply::Chunks(vec![ChatChunk::Text(text.into())])
    }

    /// A text answer delivered as several deltas.
    pub fn text_chunks<S: AsRef<str>>(parts: &[S]) -> Self {
        MockReply::Chunks(parts.iter().map(|p| ChatChunk::Text(p.as_ref().to_string())).collect())
    }

    /// A single tool call with whole arguments.
    pub fn tool_call(name: impl Into<String>, arguments: Value) -> Self {
        Self::tool_calls(vec![(name.into(), arguments)])
    }

    /// Several tool calls, indexed in order.
    pub fn tool_calls(calls: Vec<(String, Value)>) -> Self {
        MockReply::Chunks(
            calls
                .into_iter()
                .enumerate()
                .map(|(index, (name, arguments))| ChatChunk::ToolCall {
                    index,
                    id: Some(format!("call_{index}_{name}")),
                    name: Some(name),
                    arguments: arguments.to_string(),
                })
                .collect(),
        )
    }

    pub fn fail(message: impl Into<String>) -> Self {
        MockReply::Fail(message.into())
    }
}

/// Replays [`MockReply`] values in order and records every request.
///
/// Once the script is empty the model either repeats its fallback reply or
/// fails with [`ModelError::Exhausted`].
pub struct MockChatModel {
    name: String,
    script: Mutex<VecDeque<MockReply>>,
    fallback: Option<MockReply>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl MockChatModel {
    pub fn new(replies: impl IntoIterator<Item = MockReply>) -> Self {
        Self {
            name: "mock".to_string(),
            script: Mutex::new(replies.into_iter().collect()),
            fallback: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// A model that answers every request with `reply`.
    pub fn repeating(reply: MockReply) -> Self {
        Self { fallback: Some(reply), ..Self::new([]) }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Requests received so far, oldest first.
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Number of scripted replies not yet consumed.
    pub fn remaining(&self) -> usize {
        self.script.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    fn next_reply(&self) -> Option<MockReply> {
        let mut script = self.script.lock().unwrap_or_else(|e| e.into_inner());
        script.pop_front().or_else(|| self.fallback.clone())
    }
}

fn mock_error(message: String) -> ModelError {
    ModelError::Request { provider: "mock".into(), message }
}

#[async_trait]
impl ChatModel for MockChatModel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn stream(&self, request: ChatRequest) -> Result<ChatStream> {
        self.requests.lock().unwrap_or_else(|e| e.into_inner()).push(request);
        match self.next_reply().ok_or(ModelError::Exhausted)? {
            MockReply::Chunks(chunks) => Ok(Box::pin(stream::iter(chunks.into_iter().map(Ok)))),
            MockReply::Fail(message) => Err(mock_error(message)),
            MockReply::FailAfter(chunks, message) => {
                let failure = ModelError::Stream { provider: "mock".into(), message };
                let items = chunks.into_iter().map(Ok).chain(std::iter::once(Err(failure)));
                Ok(Box::pin(stream::iter(items.collect::<Vec<_>>())))
            }
        }
    }
}
