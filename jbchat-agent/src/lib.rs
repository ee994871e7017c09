//! # jbchat-agent
//!
//! The retrieval-augmented dialogue engine behind the jbchat assistant.
//!
//! ## Overview
//!
//! A [`DialogueEngine`] answers one user input per turn:
//!
//! 1. the [`Retriever`] rewrites follow-ups into standalone questions with a
//!    [`QueryRewriter`] and queries the index;
//! 2. the [`AnswerSynthesizer`] asks the chat model for an answer over the
//!    retrieved context;
//! 3. tool requests (`session_link`, `search_knowledge`) run through the
//!    [`ToolRegistry`] and their results go back to the model, up to
//!    [`DialogueConfig::max_tool_iterations`] rounds;
//! 4. the final answer is committed to the thread's history.
//!
//! Turns can also be streamed as [`Fragment`]s with [`DialogueEngine::stream`].
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! let engine = DialogueEngine::builder()
//!     .model(capabilities.chat.clone())
//!     .index(index)
//!     .config(DialogueConfig::builder().host("http://localhost:3000").build()?)
//!     .build()?;
//!
//! let answer = engine.ask("thread-1", "what tracks are available for hg38?").await?;
//! ```

pub mod capabilities;
pub mod deeplink;
pub mod dialogue;
pub mod error;
pub mod prompt;
pub mod retriever;
pub mod rewriter;
pub mod session;
pub mod stream;
pub mod synthesizer;
pub mod tools;

pub use capabilities::Capabilities;
pub use deeplink::{DeepLink, SessionSpec, SubView, ViewSpec, ViewType};
pub use dialogue::{
    DEFAULT_CONFIG_NAME, DEFAULT_HOST, DEFAULT_MAX_TOOL_ITERATIONS, DialogueConfig,
    DialogueConfigBuilder, DialogueEngine, DialogueEngineBuilder, DialogueState, TurnOutcome,
};
pub use error::{AgentError, Result};
pub use prompt::{CONTEXTUALIZE_PROMPT, SYSTEM_PROMPT};
pub use retriever::{Retrieval, Retriever};
pub use rewriter::{ModelQueryRewriter, QueryRewriter};
pub use session::{ConversationState, Role, SessionHandle, SessionRegistry, Turn};
pub use stream::{FlushPolicy, Fragment, FragmentBuffer, FragmentStream};
pub use synthesizer::{AnswerOutcome, AnswerSynthesizer, SynthesisInput};
pub use tools::{SearchKnowledgeTool, SessionLinkTool, Tool, ToolRegistry};
