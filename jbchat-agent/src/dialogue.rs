//! The dialogue state machine.
//!
//! A turn moves `Start -> Synthesizing -> (AwaitingTool -> Synthesizing)* -> Done`.
//! History is only written when a turn reaches `Done`; any error leaves the
//! conversation as it was.

use std::sync::Arc;

use jbchat_model::{ChatMessage, ChatModel, ToolInvocation};
use jbchat_rag::IndexHandle;
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, info, warn};

use crate::error::{AgentError, Result};
use crate::prompt::{CONTEXTUALIZE_PROMPT, SYSTEM_PROMPT, format_context};
use crate::retriever::Retriever;
use crate::rewriter::{ModelQueryRewriter, QueryRewriter};
use crate::session::{ConversationState, SessionRegistry, Turn};
use crate::stream::{ChunkObserver, FlushPolicy, Silent};
use crate::synthesizer::{AnswerOutcome, AnswerSynthesizer, SynthesisInput};
use crate::tools::{SearchKnowledgeTool, SessionLinkTool, ToolRegistry};

/// Default browser host.
pub const DEFAULT_HOST: &str = "http://localhost:3000";

/// Default configuration file name.
pub const DEFAULT_CONFIG_NAME: &str = "./config.json";

/// Default bound on tool rounds per turn.
pub const DEFAULT_MAX_TOOL_ITERATIONS: usize = 5;

/// Engine settings.
#[derive(Debug, Clone, PartialEq)]
pub struct DialogueConfig {
    pub system_prompt: String,
    pub contextualize_prompt: String,
    /// Browser host used in deep links and the prompt variables.
    pub host: String,
    /// Configuration file name used in deep links and the prompt variables.
    pub config_name: String,
    pub max_tool_iterations: usize,
    /// Overrides the index's `top_k` for turn retrieval.
    pub top_k: Option<usize>,
    pub flush_policy: FlushPolicy,
}

impl Default for DialogueConfig {
    fn default() -> Self {
        Self {
            system_prompt: SYSTEM_PROMPT.to_string(),
            contextualize_prompt: CONTEXTUALIZE_PROMPT.to_string(),
            host: DEFAULT_HOST.to_string(),
            config_name: DEFAULT_CONFIG_NAME.to_string(),
            max_tool_iterations: DEFAULT_MAX_TOOL_ITERATIONS,
            top_k: None,
            flush_policy: FlushPolicy::default(),
        }
    }
}

impl DialogueConfig {
    pub fn builder() -> DialogueConfigBuilder {
        DialogueConfigBuilder::default()
    }

    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(AgentError::Config("host must not be empty".into()));
        }
        if self.config_name.trim().is_empty() {
            return Err(AgentError::Config("config_name must not be empty".into()));
        }
        if self.top_k == Some(0) {
            return Err(AgentError::Config("top_k must be greater than zero".into()));
        }
        Ok(())
    }
}

/// Builder for [`DialogueConfig`].
#[derive(Debug, Clone, Default)]
pub struct DialogueConfigBuilder {
    config: DialogueConfig,
}

impl DialogueConfigBuilder {
    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = prompt.into();
        self
    }

    pub fn contextualize_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.contextualize_prompt = prompt.into();
        self
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    pub fn config_name(mut self, name: impl Into<String>) -> Self {
        self.config.config_name = name.into();
        self
    }

    pub fn max_tool_iterations(mut self, max: usize) -> Self {
        self.config.max_tool_iterations = max;
        self
    }

    pub fn top_k(mut self, k: usize) -> Self {
        self.config.top_k = Some(k);
        self
    }

    pub fn flush_policy(mut self, policy: FlushPolicy) -> Self {
        self.config.flush_policy = policy;
        self
    }

    pub fn build(self) -> Result<DialogueConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Where a turn is in its cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum DialogueState {
    Start,
    Synthesizing,
    /// The model asked for these tools.
    AwaitingTool(Vec<ToolInvocation>),
    /// The final answer.
    Done(String),
}

impl DialogueState {
    pub fn name(&self) -> &'static str {
        match self {
            DialogueState::Start => "start",
            DialogueState::Synthesizing => "synthesizing",
            DialogueState::AwaitingTool(_) => "awaiting_tool",
            DialogueState::Done(_) => "done",
        }
    }
}

/// Result of a completed turn.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnOutcome {
    pub answer: String,
    /// The text that was embedded for retrieval.
    pub query: String,
    /// Retrieved context followed by any tool results.
    pub context: String,
    pub tool_rounds: usize,
}

/// A turn that reached `Done` and still holds its session.
pub(crate) struct PreparedTurn {
    state: OwnedMutexGuard<ConversationState>,
    input: String,
    outcome: TurnOutcome,
}

impl PreparedTurn {
    /// Append the exchange to history and release the session.
    pub(crate) fn commit(self) -> TurnOutcome {
        let PreparedTurn { mut state, input, outcome } = self;
        state.commit(input, outcome.answer.clone());
        info!(
            thread_id = %state.thread_id,
            tool_rounds = outcome.tool_rounds,
            answer_len = outcome.answer.len(),
            history_len = state.history().len(),
            "turn done"
        );
        outcome
    }
}

struct EngineInner {
    config: DialogueConfig,
    retriever: Retriever,
    synthesizer: AnswerSynthesizer,
    tools: ToolRegistry,
    sessions: SessionRegistry,
}

/// Runs dialogue turns over a shared index.
///
/// Clones share sessions. Turns on one thread id run one at a time; different
/// thread ids run concurrently.
///
/// # Example
///
/// ```rust,ignore
/// let engine = DialogueEngine::builder().model(model).index(index).build()?;
/// let answer = engine.ask("thread-1", "what tracks are available for hg38?").await?;
/// ```
#[derive(Clone)]
pub struct DialogueEngine {
    inner: Arc<EngineInner>,
}

impl DialogueEngine {
    pub fn builder() -> DialogueEngineBuilder {
        DialogueEngineBuilder::default()
    }

    pub fn config(&self) -> &DialogueConfig {
        &self.inner.config
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.inner.sessions
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.inner.tools
    }

    /// Snapshot of a thread's history; empty for unknown threads.
    pub async fn history(&self, thread_id: &str) -> Vec<Turn> {
        self.inner.sessions.history(thread_id).await.unwrap_or_default()
    }

    /// Run one turn to completion.
    pub async fn run_turn(&self, thread_id: &str, input: &str) -> Result<TurnOutcome> {
        let prepared = self.prepare_turn(thread_id, input, &mut Silent).await?;
        Ok(prepared.commit())
    }

    /// Run one turn and return only the answer.
    pub async fn ask(&self, thread_id: &str, input: &str) -> Result<String> {
        Ok(self.run_turn(thread_id, input).await?.answer)
    }

    /// Run a turn up to `Done` without committing it.
    ///
    /// The session lock is held from acquisition until the returned
    /// [`PreparedTurn`] is committed or dropped.
    pub(crate) async fn prepare_turn(
        &self,
        thread_id: &str,
        input: &str,
        observer: &mut dyn ChunkObserver,
    ) -> Result<PreparedTurn> {
        let session = self.inner.sessions.acquire(thread_id).await;
        let mut state = session.lock_owned().await;
        state.touch();
        debug!(thread_id, history_len = state.history().len(), "turn started");

        match self.cycle(&mut state, input, observer).await {
            Ok(outcome) => Ok(PreparedTurn { state, input: input.to_string(), outcome }),
            Err(e) => {
                state.pending_context = None;
                warn!(thread_id, error = %e, "turn failed");
                Err(e)
            }
        }
    }

    async fn cycle(
        &self,
        state: &mut ConversationState,
        input: &str,
        observer: &mut dyn ChunkObserver,
    ) -> Result<TurnOutcome> {
        let inner = &*self.inner;
        let history = state.history().to_vec();
        let max = inner.config.max_tool_iterations;

        let mut phase = DialogueState::Start;
        let mut query = String::new();
        let mut context = String::new();
        let mut exchange: Vec<ChatMessage> = Vec::new();
        let mut tool_rounds = 0;

        let answer = loop {
            debug!(
                thread_id = %state.thread_id,
                state = phase.name(),
                tool_rounds,
                "dialogue step"
            );
            phase = match phase {
                DialogueState::Start => {
                    let retrieval = inner.retriever.retrieve(&history, input).await?;
                    context = format_context(&retrieval.results);
                    query = retrieval.query;
                    state.pending_context = Some(context.clone());
                    DialogueState::Synthesizing
                }
                DialogueState::Synthesizing => {
                    let request = SynthesisInput {
                        history: &history,
                        question: input,
                        context: &context,
                        exchange: &exchange,
                    };
                    match inner.synthesizer.synthesize_observed(&request, observer).await? {
                        AnswerOutcome::Final(answer) => DialogueState::Done(answer),
                        AnswerOutcome::ToolRequest(_) if tool_rounds >= max => {
                            return Err(AgentError::ToolLoopExceeded { max });
                        }
                        AnswerOutcome::ToolRequest(calls) => DialogueState::AwaitingTool(calls),
                    }
                }
                DialogueState::AwaitingTool(calls) => {
                    tool_rounds += 1;
                    exchange.push(ChatMessage::assistant_tool_calls("", calls.clone()));
                    for call in &calls {
                        let output = inner.tools.execute(call).await;
                        if let Some(pending) = state.pending_context.as_mut() {
                            let tag = format!("\n<tool name='{}'>{output}</tool>", call.name);
                            pending.push_str(&tag);
                        }
                        exchange.push(ChatMessage::tool_result(call, output));
                    }
                    DialogueState::Synthesizing
                }
                DialogueState::Done(answer) => break answer,
            };
        };

        Ok(TurnOutcome {
            answer,
            query,
            context: state.pending_context.clone().unwrap_or_default(),
            tool_rounds,
        })
    }
}

/// Builder for [`DialogueEngine`].
#[derive(Default)]
pub struct DialogueEngineBuilder {
    model: Option<Arc<dyn ChatModel>>,
    index: Option<IndexHandle>,
    config: Option<DialogueConfig>,
    rewriter: Option<Arc<dyn QueryRewriter>>,
    tools: Option<ToolRegistry>,
    sessions: Option<SessionRegistry>,
}

impl DialogueEngineBuilder {
    pub fn model(mut self, model: Arc<dyn ChatModel>) -> Self {
        self.model = Some(model);
        self
    }

    pub fn index(mut self, index: IndexHandle) -> Self {
        self.index = Some(index);
        self
    }

    pub fn config(mut self, config: DialogueConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Replace the model-backed rewriter.
    pub fn rewriter(mut self, rewriter: Arc<dyn QueryRewriter>) -> Self {
        self.rewriter = Some(rewriter);
        self
    }

    /// Replace the built-in `session_link` and `search_knowledge` tools.
    pub fn tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = Some(tools);
        self
    }

    /// Share sessions with another engine.
    pub fn sessions(mut self, sessions: SessionRegistry) -> Self {
        self.sessions = Some(sessions);
        self
    }

    pub fn build(self) -> Result<DialogueEngine> {
        let model =
            self.model.ok_or_else(|| AgentError::Config("a chat model is required".into()))?;
        let index = self.index.ok_or_else(|| AgentError::Config("an index is required".into()))?;
        let config = self.config.unwrap_or_default();
        config.validate()?;

        let rewriter = self.rewriter.unwrap_or_else(|| {
            Arc::new(
                ModelQueryRewriter::new(model.clone())
                    .with_instruction(config.contextualize_prompt.as_str()),
            )
        });
        let tools = self.tools.unwrap_or_else(|| {
            let link = SessionLinkTool::new(config.host.as_str(), config.config_name.as_str());
            ToolRegistry::new()
                .with_tool(Arc::new(link))
                .with_tool(Arc::new(SearchKnowledgeTool::new(index.clone())))
        });

        let mut retriever = Retriever::new(rewriter, index);
        if let Some(k) = config.top_k {
            retriever = retriever.with_top_k(k);
        }
        let synthesizer = AnswerSynthesizer::new(
            model.clone(),
            config.system_prompt.as_str(),
            config.host.as_str(),
            config.config_name.as_str(),
        )
        .with_tools(tools.specs());

        info!(
            model = model.name(),
            tools = ?tools.names(),
            max_tool_iterations = config.max_tool_iterations,
            "dialogue engine ready"
        );
        Ok(DialogueEngine {
            inner: Arc::new(EngineInner {
                config,
                retriever,
                synthesizer,
                tools,
                sessions: self.sessions.unwrap_or_default(),
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults() {
        let config = DialogueConfig::default();
        assert_eq!(config.max_tool_iterations, 5);
        assert_eq!(config.host, "http://localhost:3000");
        assert_eq!(config.flush_policy, FlushPolicy::Boundaries);
        assert!(config.top_k.is_none());
    }

    #[test]
    fn builder_validates() {
        assert!(DialogueConfig::builder().host("").build().is_err());
        assert!(DialogueConfig::builder().top_k(0).build().is_err());
        let config = DialogueConfig::builder()
            .host("https://jbrowse.example")
            .config_name("hg38.json")
            .max_tool_iterations(2)
            .flush_policy(FlushPolicy::Incremental)
            .build()
            .unwrap();
        assert_eq!(config.config_name, "hg38.json");
        assert_eq!(config.max_tool_iterations, 2);
    }

    #[test]
    fn engine_requires_model_and_index() {
        assert!(matches!(DialogueEngine::builder().build(), Err(AgentError::Config(_))));
    }

    #[test]
    fn state_names() {
        assert_eq!(DialogueState::Start.name(), "start");
        assert_eq!(DialogueState::AwaitingTool(Vec::new()).name(), "awaiting_tool");
        assert_eq!(DialogueState::Done(String::new()).name(), "done");
    }
}
