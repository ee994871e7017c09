//! Gathering of streamed chunks into a [`ChatResponse`].

use std::collections::BTreeMap;

use serde_json::Value;

use crate::error::{ModelError, Result};
use crate::types::{ChatChunk, ChatResponse, ToolInvocation};

#[derive(Debug, Default)]
struct PartialCall {
    id: Option<String>,
    name: String,
    arguments: String,
}

/// Merges chunks the way they arrive: text deltas are concatenated, tool-call
/// fragments are merged by index.
#[derive(Debug, Default)]
pub struct ChunkAccumulator {
    text: String,
    calls: BTreeMap<usize, PartialCall>,
}

impl ChunkAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &ChatChunk) {
        match chunk {
            ChatChunk::Text(delta) => self.text.push_str(delta),
            ChatChunk::ToolCall { index, id, name, arguments } => {
                let call = self.calls.entry(*index).or_default();
                if call.id.is_none() {
                    call.id = id.clone();
                }
                if let Some(name) = name {
                    call.name.push_str(name);
                }
                call.arguments.push_str(arguments);
            }
        }
    }

    /// Whether any tool-call fragment has been seen.
    pub fn has_tool_calls(&self) -> bool {
        !self.calls.is_empty()
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Finish accumulation, parsing tool-call arguments.
    ///
    /// Empty argument text is read as `{}`; anything that is not a JSON
    /// object is a [`ModelError::MalformedToolCall`].
    pub fn finish(self) -> Result<ChatResponse> {
        let mut tool_calls = Vec::with_capacity(self.calls.len());
        for (index, call) in self.calls {
            if call.name.is_empty() {
                let message = format!("tool call #{index} has no name");
                return Err(ModelError::MalformedToolCall(message));
            }
            let arguments = if call.arguments.trim().is_empty() {
                Value::Object(Default::default())
            } else {
                serde_json::from_str::<Value>(&call.arguments).map_err(|e| {
                    ModelError::MalformedToolCall(format!("arguments of '{}': {e}", call.name))
                })?
            };
            if !arguments.is_object() {
                return Err(ModelError::MalformedToolCall(format!(
                    "arguments of '{}' are not an object",
                    call.name
                )));
            }
            tool_calls.push(ToolInvocation {
                id: call.id.unwrap_or_else(|| format!("call_{index}")),
                name: call.name,
                arguments,
            });
        }
        Ok(ChatResponse { text: self.text, tool_calls })
    }
}
