//! Answer synthesis from retrieved context.

use std::sync::Arc;

use futures::StreamExt;
use jbchat_model::{
    ChatMessage, ChatModel, ChatRequest, ChatStream, ChunkAccumulator, ModelError, ToolInvocation,
    ToolSpec,
};
use tracing::{debug, error, warn};

use crate::error::{AgentError, Result};
use crate::prompt::{format_variables, history_messages, question_message};
use crate::session::Turn;
use crate::stream::{ChunkObserver, Silent};

/// What the model produced.
#[derive(Debug, Clone, PartialEq)]
pub enum AnswerOutcome {
    Final(String),
    ToolRequest(Vec<ToolInvocation>),
}

/// Everything one synthesis pass sees.
#[derive(Debug, Clone, Copy)]
pub struct SynthesisInput<'a> {
    pub history: &'a [Turn],
    pub question: &'a str,
    /// The formatted `<doc>` context block.
    pub context: &'a str,
    /// Tool calls and results of the current turn so far.
    pub exchange: &'a [ChatMessage],
}

enum AttemptError {
    Model(ModelError),
    Agent(AgentError),
}

/// Builds answer requests and runs them against the chat model.
pub struct AnswerSynthesizer {
    model: Arc<dyn ChatModel>,
    system_prompt: String,
    host: String,
    config_name: String,
    tools: Vec<ToolSpec>,
}

impl AnswerSynthesizer {
    pub fn new(
        model: Arc<dyn ChatModel>,
        system_prompt: impl Into<String>,
        host: impl Into<String>,
        config_name: impl Into<String>,
    ) -> Self {
        Self {
            model,
            system_prompt: system_prompt.into(),
            host: host.into(),
            config_name: config_name.into(),
            tools: Vec::new(),
        }
    }

    pub fn with_tools(mut self, tools: Vec<ToolSpec>) -> Self {
        self.tools = tools;
        self
    }

    /// `[system] + history + [user: context and question] + tool exchange`.
    pub fn build_request(&self, input: &SynthesisInput<'_>) -> ChatRequest {
        let variables = format_variables(&self.host, &self.config_name);
        let system = format!("{}{variables}", self.system_prompt);
        let mut messages = Vec::with_capacity(input.history.len() + input.exchange.len() + 2);
        messages.push(ChatMessage::system(system));
        messages.extend(history_messages(input.history));
        messages.push(question_message(input.context, input.question));
        messages.extend(input.exchange.iter().cloned());
        ChatRequest::new(messages).with_tools(self.tools.clone())
    }

    /// Run one synthesis pass to completion.
    pub async fn synthesize(&self, input: &SynthesisInput<'_>) -> Result<AnswerOutcome> {
        self.synthesize_observed(input, &mut Silent).await
    }

    /// The raw model stream for one pass, without retry.
    pub async fn synthesize_stream(&self, input: &SynthesisInput<'_>) -> Result<ChatStream> {
        self.model
            .stream(self.build_request(input))
            .await
            .map_err(|e| AgentError::Synthesis(e.to_string()))
    }

    /// Run a pass, showing every chunk to `observer`.
    ///
    /// A model failure is retried once, and only while the observer has not
    /// delivered anything.
    pub(crate) async fn synthesize_observed(
        &self,
        input: &SynthesisInput<'_>,
        observer: &mut dyn ChunkObserver,
    ) -> Result<AnswerOutcome> {
        let request = self.build_request(input);
        debug!(model = self.model.name(), messages = request.messages.len(), "synthesizing");

        let mut delivered = 0;
        let mut retried = false;
        loop {
            match self.attempt(request.clone(), observer, &mut delivered).await {
                Ok(outcome) => return Ok(outcome),
                Err(AttemptError::Agent(e)) => return Err(e),
                Err(AttemptError::Model(e)) if !retried && delivered == 0 => {
                    warn!(model = self.model.name(), error = %e, "synthesis failed, retrying once");
                    observer.reset();
                    retried = true;
                }
                Err(AttemptError::Model(e)) => {
                    error!(model = self.model.name(), error = %e, retried, "synthesis failed");
                    return Err(AgentError::Synthesis(e.to_string()));
                }
            }
        }
    }

    async fn attempt(
        &self,
        request: ChatRequest,
        observer: &mut dyn ChunkObserver,
        delivered: &mut usize,
    ) -> std::result::Result<AnswerOutcome, AttemptError> {
        let mut stream = self.model.stream(request).await.map_err(AttemptError::Model)?;
        let mut acc = ChunkAccumulator::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(AttemptError::Model)?;
            *delivered += observer.observe(&chunk).map_err(AttemptError::Agent)?;
            acc.push(&chunk);
        }

        let response =
            acc.finish().map_err(|e| AttemptError::Agent(AgentError::Synthesis(e.to_string())))?;
        if response.is_empty() {
            let empty = AgentError::Synthesis("model returned an empty answer".into());
            return Err(AttemptError::Agent(empty));
        }
        *delivered += observer.complete(&response.tool_calls).map_err(AttemptError::Agent)?;

        if response.tool_calls.is_empty() {
            Ok(AnswerOutcome::Final(response.text))
        } else {
            Ok(AnswerOutcome::ToolRequest(response.tool_calls))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jbchat_model::{ChatChunk, MessageRole, MockChatModel, MockReply};
    use serde_json::json;

    use crate::stream::{FlushPolicy, FragmentEmitter};

    fn synthesizer(model: Arc<MockChatModel>) -> AnswerSynthesizer {
        AnswerSynthesizer::new(
            model,
            "Answer from context.",
            "http://localhost:3000",
            "config.json",
        )
    }

    fn input<'a>(history: &'a [Turn], exchange: &'a [ChatMessage]) -> SynthesisInput<'a> {
        SynthesisInput {
            history,
            question: "what tracks?",
            context: "<doc id='0'>t1</doc>",
            exchange,
        }
    }

    #[test]
    fn request_layout() {
        let model = Arc::new(MockChatModel::new([]));
        let history = [Turn::human("hi"), Turn::ai("hello")];
        let call = ToolInvocation {
            id: "c1".into(),
            name: "search_knowledge".into(),
            arguments: json!({}),
        };
        let exchange = [
            ChatMessage::assistant_tool_calls("", vec![call.clone()]),
            ChatMessage::tool_result(&call, "r"),
        ];

        let request = synthesizer(model).build_request(&input(&history, &exchange));
        let roles: Vec<MessageRole> = request.messages.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            [
                MessageRole::System,
                MessageRole::User,
                MessageRole::Assistant,
                MessageRole::User,
                MessageRole::Assistant,
                MessageRole::Tool
            ]
        );
        let system = &request.messages[0].content;
        assert!(system.ends_with("HOST=http://localhost:3000\nCONFIG=config.json"));
        assert_eq!(
            request.messages[3].content,
            "Context: <doc id='0'>t1</doc>\nQuestion: what tracks?"
        );
    }

    #[tokio::test]
    async fn final_and_tool_outcomes() {
        let model = Arc::new(MockChatModel::new([
            MockReply::text("t1 and t2"),
            MockReply::tool_call("session_link", json!({"assembly": "hg38"})),
        ]));
        let synth = synthesizer(model);
        let first = synth.synthesize(&input(&[], &[])).await.unwrap();
        assert_eq!(first, AnswerOutcome::Final("t1 and t2".into()));
        let AnswerOutcome::ToolRequest(calls) = synth.synthesize(&input(&[], &[])).await.unwrap()
        else {
            panic!("expected a tool request");
        };
        assert_eq!(calls[0].name, "session_link");
    }

    #[tokio::test]
    async fn one_retry_after_model_failure() {
        let model = Arc::new(MockChatModel::new([MockReply::fail("503"), MockReply::text("ok")]));
        let outcome = synthesizer(model.clone()).synthesize(&input(&[], &[])).await.unwrap();
        assert_eq!(outcome, AnswerOutcome::Final("ok".into()));
        assert_eq!(model.requests().len(), 2);
    }

    #[tokio::test]
    async fn second_failure_is_a_synthesis_error() {
        let model = Arc::new(MockChatModel::new([
            MockReply::fail("503"),
            MockReply::fail("503"),
            MockReply::text("late"),
        ]));
        let result = synthesizer(model.clone()).synthesize(&input(&[], &[])).await;
        assert!(matches!(result, Err(AgentError::Synthesis(_))));
        assert_eq!(model.remaining(), 1);
    }

    #[tokio::test]
    async fn no_retry_once_fragments_were_delivered() {
        let model = Arc::new(MockChatModel::new([
            MockReply::FailAfter(vec![ChatChunk::Text("partial".into())], "reset".into()),
            MockReply::text("never used"),
        ]));
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let mut emitter = FragmentEmitter::new(FlushPolicy::Incremental, tx);
        let result =
            synthesizer(model.clone()).synthesize_observed(&input(&[], &[]), &mut emitter).await;
        assert!(matches!(result, Err(AgentError::Synthesis(_))));
        assert_eq!(model.remaining(), 1);
        assert!(rx.try_recv().is_ok());
    }

    #[tokio::test]
    async fn empty_and_malformed_outputs_are_rejected() {
        let model = Arc::new(MockChatModel::new([
            MockReply::text("  "),
            MockReply::Chunks(vec![ChatChunk::ToolCall {
                index: 0,
                id: None,
                name: Some("session_link".into()),
                arguments: "{not json".into(),
            }]),
        ]));
        let synth = synthesizer(model.clone());
        assert!(matches!(synth.synthesize(&input(&[], &[])).await, Err(AgentError::Synthesis(_))));
        assert!(matches!(synth.synthesize(&input(&[], &[])).await, Err(AgentError::Synthesis(_))));
        assert_eq!(model.requests().len(), 2);
    }
}
