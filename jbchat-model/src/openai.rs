//! OpenAI chat-completions client (also works with OpenAI-compatible servers).

use async_stream::stream;
use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::StreamExt;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

use crate::config::ModelConfig;
use crate::error::{ModelError, Result};
use crate::http::{check_response, client_for, request_error};
use crate::model::{ChatModel, ChatStream};
use crate::types::{ChatChunk, ChatMessage, ChatRequest, MessageRole};

const PROVIDER: &str = "OpenAI";

/// The public OpenAI API base.
pub const OPENAI_API_BASE: &str = "https://api.openai.com/v1";

/// A [`ChatModel`] backed by `/v1/chat/completions` with `stream: true`.
pub struct OpenAIChatModel {
    client: reqwest::Client,
    config: ModelConfig,
}

impl OpenAIChatModel {
    pub fn new(config: ModelConfig) -> Result<Self> {
        if config.api_key.is_empty() {
            return Err(ModelError::Config("OpenAI API key must not be empty".into()));
        }
        Ok(Self { client: client_for(PROVIDER, config.timeout)?, config })
    }

    /// Resolve the chat completions endpoint from the base URL.
    fn endpoint(&self) -> String {
        let base = self.config.base_url.as_deref().unwrap_or(OPENAI_API_BASE).trim_end_matches('/');
        if base.ends_with("/chat/completions") {
            base.to_string()
        } else if base.ends_with("/v1") {
            format!("{base}/chat/completions")
        } else {
            format!("{base}/v1/chat/completions")
        }
    }

    fn request_body(&self, request: &ChatRequest) -> Value {
        let messages: Vec<Value> = request.messages.iter().map(message_to_json).collect();
        let mut body = json!({
            "model": self.config.model,
            "messages": messages,
            "temperature": self.config.temperature,
            "stream": true,
        });
        if let Some(seed) = self.config.seed {
            body["seed"] = json!(seed);
        }
        if !request.tools.is_empty() {
            body["tools"] = request
                .tools
                .iter()
                .map(|tool| {
                    json!({
                        "type": "function",
                        "function": {
                            "name": tool.name,
                            "description": tool.description,
                            "parameters": tool.parameters,
                        }
                    })
                })
                .collect();
        }
        body
    }
}

fn message_to_json(message: &ChatMessage) -> Value {
    let role = match message.role {
        MessageRole::System => "system",
        MessageRole::User => "user",
        MessageRole::Assistant => "assistant",
        MessageRole::Tool => "tool",
    };
    let mut value = json!({ "role": role, "content": message.content });
    if !message.tool_calls.is_empty() {
        value["tool_calls"] = message
            .tool_calls
            .iter()
            .map(|call| {
                json!({
                    "id": call.id,
                    "type": "function",
                    "function": { "name": call.name, "arguments": call.arguments.to_string() },
                })
            })
            .collect();
    }
    if let Some(id) = &message.tool_call_id {
        value["tool_call_id"] = json!(id);
    }
    value
}

// ── streamed response types ────────────────────────────────────────

#[derive(Deserialize)]
struct StreamResponse {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: Delta,
}

#[derive(Deserialize, Default)]
struct Delta {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<ToolCallDelta>,
}

#[derive(Deserialize)]
struct ToolCallDelta {
    index: usize,
    id: Option<String>,
    function: Option<FunctionDelta>,
}

#[derive(Deserialize)]
struct FunctionDelta {
    name: Option<String>,
    arguments: Option<String>,
}

fn into_chunks(response: StreamResponse) -> Vec<ChatChunk> {
    let mut chunks = Vec::new();
    for choice in response.choices {
        if let Some(text) = choice.delta.content.filter(|t| !t.is_empty()) {
            chunks.push(ChatChunk::Text(text));
        }
        for call in choice.delta.tool_calls {
            let (name, arguments) = match call.function {
                Some(f) => (f.name, f.arguments.unwrap_or_default()),
                None => (None, String::new()),
            };
            chunks.push(ChatChunk::ToolCall { index: call.index, id: call.id, name, arguments });
        }
    }
    chunks
}

#[async_trait]
impl ChatModel for OpenAIChatModel {
    fn name(&self) -> &str {
        &self.config.model
    }

    async fn stream(&self, request: ChatRequest) -> Result<ChatStream> {
        debug!(
            provider = PROVIDER,
            model = %self.config.model,
            messages = request.messages.len(),
            tools = request.tools.len(),
            "starting chat completion"
        );

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.config.api_key)
            .json(&self.request_body(&request))
            .send()
            .await
            .map_err(|e| request_error(PROVIDER, e))?;
        let response = check_response(PROVIDER, response).await?;

        let mut events = response.bytes_stream().eventsource();
        let stream = stream! {
            while let Some(event) = events.next().await {
                let event = match event {
                    Ok(event) => event,
                    Err(e) => {
                        yield Err(ModelError::Stream {
                            provider: PROVIDER.into(),
                            message: e.to_string(),
                        });
                        return;
                    }
                };
                if event.data.trim() == "[DONE]" {
                    break;
                }
                match serde_json::from_str::<StreamResponse>(&event.data) {
                    Ok(parsed) => {
                        for chunk in into_chunks(parsed) {
                            yield Ok(chunk);
                        }
                    }
                    Err(e) => {
                        yield Err(ModelError::Stream {
                            provider: PROVIDER.into(),
                            message: format!("failed to decode event: {e}"),
                        });
                        return;
                    }
                }
            }
        };
        Ok(Box::pin(stream))
    }
}
