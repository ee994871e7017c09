//! Incremental delivery of a dialogue turn.
//!
//! Model chunks pass through a [`FragmentBuffer`], which decides when text is
//! released, and come out as [`Fragment`]s in receipt order.

use std::pin::Pin;

use async_stream::stream;
use futures::Stream;
use jbchat_model::{ChatChunk, ToolInvocation};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{self, UnboundedSender};

use crate::dialogue::{DialogueEngine, TurnOutcome};
use crate::error::{AgentError, Result};

/// A piece of a streamed turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum Fragment {
    Text(String),
    ToolCalls(Vec<ToolInvocation>),
}

/// When buffered text is released.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlushPolicy {
    /// Hold text until a tool-call boundary or the end of the model output.
    #[default]
    Boundaries,
    /// Release every text delta as it arrives.
    Incremental,
}

/// A boxed stream of turn fragments.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<Fragment>> + Send>>;

/// Accumulates model chunks into fragments according to a [`FlushPolicy`].
#[derive(Debug, Default)]
pub struct FragmentBuffer {
    policy: FlushPolicy,
    text: String,
}

impl FragmentBuffer {
    pub fn new(policy: FlushPolicy) -> Self {
        Self { policy, text: String::new() }
    }

    pub fn policy(&self) -> FlushPolicy {
        self.policy
    }

    /// Feed one chunk; returns the fragments ready for delivery.
    pub fn push(&mut self, chunk: &ChatChunk) -> Vec<Fragment> {
        match chunk {
            ChatChunk::Text(delta) if delta.is_empty() => Vec::new(),
            ChatChunk::Text(delta) => match self.policy {
                FlushPolicy::Incremental => vec![Fragment::Text(delta.clone())],
                FlushPolicy::Boundaries => {
                    self.text.push_str(delta);
                    Vec::new()
                }
            },
            ChatChunk::ToolCall { .. } => self.flush_text().into_iter().collect(),
        }
    }

    /// End of model output: remaining text, then the completed tool calls.
    pub fn finish(&mut self, tool_calls: &[ToolInvocation]) -> Vec<Fragment> {
        let mut fragments: Vec<Fragment> = self.flush_text().into_iter().collect();
        if !tool_calls.is_empty() {
            fragments.push(Fragment::ToolCalls(tool_calls.to_vec()));
        }
        fragments
    }

    /// Drop buffered text without emitting it.
    pub fn reset(&mut self) {
        self.text.clear();
    }

    fn flush_text(&mut self) -> Option<Fragment> {
        (!self.text.is_empty()).then(|| Fragment::Text(std::mem::take(&mut self.text)))
    }
}

/// Receives the model output of each synthesis attempt.
pub(crate) trait ChunkObserver: Send {
    /// Returns how many fragments were delivered to the consumer.
    fn observe(&mut self, chunk: &ChatChunk) -> Result<usize>;

    /// The attempt completed with these tool calls (possibly none).
    fn complete(&mut self, tool_calls: &[ToolInvocation]) -> Result<usize>;

    /// The attempt failed and will be retried.
    fn reset(&mut self);
}

/// Observer for non-streamed turns.
pub(crate) struct Silent;

impl ChunkObserver for Silent {
    fn observe(&mut self, _chunk: &ChatChunk) -> Result<usize> {
        Ok(0)
    }

    fn complete(&mut self, _tool_calls: &[ToolInvocation]) -> Result<usize> {
        Ok(0)
    }

    fn reset(&mut self) {}
}

/// Observer that sends fragments down a channel.
pub(crate) struct FragmentEmitter {
    buffer: FragmentBuffer,
    sender: UnboundedSender<Fragment>,
}

impl FragmentEmitter {
    pub(crate) fn new(policy: FlushPolicy, sender: UnboundedSender<Fragment>) -> Self {
        Self { buffer: FragmentBuffer::new(policy), sender }
    }

    fn send_all(&self, fragments: Vec<Fragment>) -> Result<usize> {
        let count = fragments.len();
        for fragment in fragments {
            self.sender.send(fragment).map_err(|_| AgentError::StreamAborted)?;
        }
        Ok(count)
    }
}

impl ChunkObserver for FragmentEmitter {
    fn observe(&mut self, chunk: &ChatChunk) -> Result<usize> {
        if self.sender.is_closed() {
            return Err(AgentError::StreamAborted);
        }
        let fragments = self.buffer.push(chunk);
        self.send_all(fragments)
    }

    fn complete(&mut self, tool_calls: &[ToolInvocation]) -> Result<usize> {
        let fragments = self.buffer.finish(tool_calls);
        self.send_all(fragments)
    }

    fn reset(&mut self) {
        self.buffer.reset();
    }
}

impl DialogueEngine {
    /// Stream a turn as fragments.
    ///
    /// The stream is lazy: nothing runs until it is first polled, and the
    /// turn runs inside the consumer's task. The exchange is committed as
    /// soon as the turn completes, before the fragments still queued at that
    /// point are yielded. Dropping the stream while the turn is in flight
    /// abandons the model call and leaves history untouched.
    pub fn stream(&self, thread_id: impl Into<String>, input: impl Into<String>) -> FragmentStream {
        let engine = self.clone();
        let thread_id = thread_id.into();
        let input = input.into();
        let policy = self.config().flush_policy;

        Box::pin(stream! {
            let (sender, mut receiver) = mpsc::unbounded_channel();
            let mut emitter = FragmentEmitter::new(policy, sender);
            let turn = engine.prepare_turn(&thread_id, &input, &mut emitter);
            tokio::pin!(turn);

            let finished = loop {
                let next = tokio::select! {
                    biased;
                    Some(fragment) = receiver.recv() => Ok(fragment),
                    result = &mut turn => Err(result),
                };
                match next {
                    Ok(fragment) => yield Ok(fragment),
                    Err(result) => break result,
                }
            };
            // the turn is done; commit before handing out what is still queued
            let failure = match finished {
                Ok(prepared) => {
                    prepared.commit();
                    None
                }
                Err(e) => Some(e),
            };
            while let Ok(fragment) = receiver.try_recv() {
                yield Ok(fragment);
            }
            if let Some(e) = failure {
                yield Err(e);
            }
        })
    }

    /// Run a turn, sending fragments to `sender` as they become ready.
    ///
    /// Fails with [`AgentError::StreamAborted`] if the receiver is dropped
    /// before the turn completes; history is then left untouched.
    pub async fn stream_into(
        &self,
        thread_id: &str,
        input: &str,
        sender: UnboundedSender<Fragment>,
    ) -> Result<TurnOutcome> {
        let mut emitter = FragmentEmitter::new(self.config().flush_policy, sender);
        let prepared = self.prepare_turn(thread_id, input, &mut emitter).await?;
        Ok(prepared.commit())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tool_chunk() -> ChatChunk {
        ChatChunk::ToolCall {
            index: 0,
            id: None,
            name: Some("session_link".into()),
            arguments: String::new(),
        }
    }

    fn invocation() -> ToolInvocation {
        ToolInvocation { id: "call_0".into(), name: "session_link".into(), arguments: json!({}) }
    }

    #[test]
    fn boundaries_hold_text_until_tool_call() {
        let mut buffer = FragmentBuffer::new(FlushPolicy::Boundaries);
        assert!(buffer.push(&ChatChunk::Text("Let me ".into())).is_empty());
        assert!(buffer.push(&ChatChunk::Text("check.".into())).is_empty());
        assert_eq!(buffer.push(&tool_chunk()), vec![Fragment::Text("Let me check.".into())]);
        assert!(buffer.push(&tool_chunk()).is_empty());
        assert_eq!(buffer.finish(&[invocation()]), vec![Fragment::ToolCalls(vec![invocation()])]);
    }

    #[test]
    fn boundaries_flush_final_text_at_finish() {
        let mut buffer = FragmentBuffer::new(FlushPolicy::Boundaries);
        buffer.push(&ChatChunk::Text("a".into()));
        buffer.push(&ChatChunk::Text("b".into()));
        assert_eq!(buffer.finish(&[]), vec![Fragment::Text("ab".into())]);
        assert!(buffer.finish(&[]).is_empty());
    }

    #[test]
    fn incremental_emits_each_delta() {
        let mut buffer = FragmentBuffer::new(FlushPolicy::Incremental);
        assert_eq!(buffer.push(&ChatChunk::Text("a".into())), vec![Fragment::Text("a".into())]);
        assert_eq!(buffer.push(&ChatChunk::Text("b".into())), vec![Fragment::Text("b".into())]);
        assert!(buffer.push(&ChatChunk::Text(String::new())).is_empty());
        assert!(buffer.finish(&[]).is_empty());
    }

    #[test]
    fn reset_discards_buffered_text() {
        let mut buffer = FragmentBuffer::new(FlushPolicy::Boundaries);
        buffer.push(&ChatChunk::Text("partial".into()));
        buffer.reset();
        assert!(buffer.finish(&[]).is_empty());
    }

    #[test]
    fn emitter_reports_closed_channel() {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let mut emitter = FragmentEmitter::new(FlushPolicy::Incremental, tx);
        assert_eq!(emitter.observe(&ChatChunk::Text("x".into())).unwrap(), 1);
        drop(rx);
        let closed = emitter.observe(&ChatChunk::Text("y".into()));
        assert!(matches!(closed, Err(AgentError::StreamAborted)));
    }

    #[test]
    fn fragments_serialize_with_type_tag() {
        let value = serde_json::to_value(Fragment::Text("hi".into())).unwrap();
        assert_eq!(value, json!({"type": "text", "data": "hi"}));
    }
}
