//! Request, message and streaming chunk types shared by every backend.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The author of a [`ChatMessage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
    Tool,
}

/// A structured request from the model to run a named capability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocation {
    /// Backend-assigned call id, echoed back on the tool result message.
    pub id: String,
    /// Name of the tool to run.
    pub name: String,
    /// Arguments as a JSON object.
    pub arguments: Value,
}

/// One message of a chat request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
    /// Tool calls requested by an assistant message.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolInvocation>,
    /// For tool messages, the id of the call this message answers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    /// For tool messages, the name of the tool that produced the content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ChatMessage {
    fn with_role(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
            name: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::with_role(MessageRole::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::with_role(MessageRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::with_role(MessageRole::Assistant, content)
    }

    /// An assistant message that carries tool calls instead of (or beside) text.
    pub fn assistant_tool_calls(content: impl Into<String>, calls: Vec<ToolInvocation>) -> Self {
        Self { tool_calls: calls, ..Self::with_role(MessageRole::Assistant, content) }
    }

    /// The result of running `invocation`.
    pub fn tool_result(invocation: &ToolInvocation, content: impl Into<String>) -> Self {
        Self {
            tool_call_id: Some(invocation.id.clone()),
            name: Some(invocation.name.clone()),
            ..Self::with_role(MessageRole::Tool, content)
        }
    }
}

/// Declaration of a tool the model may call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    /// JSON schema of the arguments object.
    pub parameters: Value,
}

/// A chat-completion request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolSpec>,
}

impl ChatRequest {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self { messages, tools: Vec::new() }
    }

    pub fn with_tools(mut self, tools: Vec<ToolSpec>) -> Self {
        self.tools = tools;
        self
    }
}

/// One incremental piece of a streamed response, in receipt order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatChunk {
    /// A text delta.
    Text(String),
    /// A fragment of a tool call. Fragments sharing an `index` belong to the
    /// same call; `id` and `name` arrive on the first fragment, `arguments`
    /// is a slice of the JSON text.
    ToolCall { index: usize, id: Option<String>, name: Option<String>, arguments: String },
}

/// A fully gathered response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub text: String,
    pub tool_calls: Vec<ToolInvocation>,
}

impl ChatResponse {
    /// True when the model produced neither text nor tool calls.
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty() && self.tool_calls.is_empty()
    }
}
