//! Gemini `streamGenerateContent` client.

use async_stream::stream;
use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::StreamExt;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, instrument};

use crate::config::ModelConfig;
use crate::error::{ModelError, Result};
use crate::http::{check_response, client_for, request_error};
use crate::model::{ChatModel, ChatStream};
use crate::types::{ChatChunk, ChatMessage, ChatRequest, MessageRole};

const PROVIDER: &str = "Gemini";

/// The public Generative Language API base.
pub const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com";

/// A [`ChatModel`] backed by the Gemini streaming endpoint.
pub struct GeminiChatModel {
    client: reqwest::Client,
    config: ModelConfig,
}

impl GeminiChatModel {
    pub fn new(config: ModelConfig) -> Result<Self> {
        if config.api_key.is_empty() {
            return Err(ModelError::Config("Gemini API key must not be empty".into()));
        }
        Ok(Self { client: client_for(PROVIDER, config.timeout)?, config })
    }

    fn endpoint(&self) -> String {
        let base = self.config.base_url.as_deref().unwrap_or(GEMINI_API_BASE).trim_end_matches('/');
        let model = self.config.model.trim_start_matches("models/");
        format!("{base}/v1beta/models/{model}:streamGenerateContent?alt=sse")
    }

    fn request_body(&self, request: &ChatRequest) -> Value {
        let system: Vec<&str> = request
            .messages
            .iter()
            .filter(|m| m.role == MessageRole::System)
            .map(|m| m.content.as_str())
            .collect();

        let mut generation_config = json!({ "temperature": self.config.temperature });
        if let Some(seed) = self.config.seed {
            generation_config["seed"] = json!(seed);
        }

        let mut body = json!({
            "contents": contents(&request.messages),
            "generationConfig": generation_config,
        });
        if !system.is_empty() {
            body["systemInstruction"] = json!({ "parts": [{ "text": system.join("\n\n") }] });
        }
        if !request.tools.is_empty() {
            let declarations: Vec<Value> = request
                .tools
                .iter()
                .map(|tool| {
                    json!({
                        "name": tool.name,
                        "description": tool.description,
                        "parameters": tool.parameters,
                    })
                })
                .collect();
            body["tools"] = json!([{ "functionDeclarations": declarations }]);
        }
        body
    }
}

/// Convert chat messages to Gemini `contents`.
///
/// System messages go to `systemInstruction` instead. Consecutive tool
/// results are merged into one `user` turn of `functionResponse` parts.
fn contents(messages: &[ChatMessage]) -> Vec<Value> {
    let mut out: Vec<Value> = Vec::new();
    let mut pending_responses: Vec<Value> = Vec::new();

    let flush = |out: &mut Vec<Value>, pending: &mut Vec<Value>| {
        if !pending.is_empty() {
            out.push(json!({ "role": "user", "parts": std::mem::take(pending) }));
        }
    };

    for message in messages {
        match message.role {
            MessageRole::System => {}
            MessageRole::Tool => pending_responses.push(json!({
                "functionResponse": {
                    "name": message.name.clone().unwrap_or_default(),
                    "response": { "content": message.content },
                }
            })),
            MessageRole::User => {
                flush(&mut out, &mut pending_responses);
                out.push(json!({ "role": "user", "parts": [{ "text": message.content }] }));
            }
            MessageRole::Assistant => {
                flush(&mut out, &mut pending_responses);
                let mut parts = Vec::new();
                if !message.content.is_empty() {
                    parts.push(json!({ "text": message.content }));
                }
                for call in &message.tool_calls {
                    parts.push(
                        json!({ "functionCall": { "name": call.name, "args": call.arguments } }),
                    );
                }
                if !parts.is_empty() {
                    out.push(json!({ "role": "model", "parts": parts }));
                }
            }
        }
    }
    flush(&mut out, &mut pending_responses);
    out
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    text: Option<String>,
    function_call: Option<FunctionCall>,
    #[serde(default)]
    thought: bool,
}

#[derive(Deserialize)]
struct FunctionCall {
    id: Option<String>,
    name: String,
    #[serde(default)]
    args: Value,
}

/// Gemini sends each function call whole, so every call becomes a single
/// fragment with its own index. `next_index` persists across events.
fn into_chunks(response: GenerateResponse, next_index: &mut usize) -> Vec<ChatChunk> {
    let mut chunks = Vec::new();
    let Some(candidate) = response.candidates.into_iter().next() else {
        return chunks;
    };
    for part in candidate.content.map(|c| c.parts).unwrap_or_default() {
        if part.thought {
            continue;
        }
        if let Some(text) = part.text.filter(|t| !t.is_empty()) {
            chunks.push(ChatChunk::Text(text));
        }
        if let Some(call) = part.function_call {
            let arguments = if call.args.is_null() { String::new() } else { call.args.to_string() };
            chunks.push(ChatChunk::ToolCall {
                index: *next_index,
                id: call.id,
                name: Some(call.name),
                arguments,
            });
            *next_index += 1;
        }
    }
    chunks
}

#[async_trait]
impl ChatModel for GeminiChatModel {
    fn name(&self) -> &str {
        &self.config.model
    }

    #[instrument(skip_all, fields(model = %self.config.model))]
    async fn stream(&self, request: ChatRequest) -> Result<ChatStream> {
        debug!(
            messages = request.messages.len(),
            tools = request.tools.len(),
            "streaming generate content"
        );

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.config.api_key)
            .json(&self.request_body(&request))
            .send()
            .await
            .map_err(|e| request_error(PROVIDER, e))?;
        let response = check_response(PROVIDER, response).await?;

        let mut events = response.bytes_stream().eventsource();
        let stream = stream! {
            let mut next_index = 0usize;
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
                if event.data.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<GenerateResponse>(&event.data) {
                    Ok(parsed) => {
                        for chunk in into_chunks(parsed, &mut next_index) {
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
