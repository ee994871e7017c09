//! Request and response bodies of the HTTP API.

use serde::{Deserialize, Serialize};

/// Thread used when a request names none.
pub const DEFAULT_THREAD_ID: &str = "default";

/// `POST /api/message` and `POST /api/message/stream` body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageRequest {
    pub message: MessageText,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
}

impl MessageRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self { message: MessageText { text: text.into() }, thread_id: None }
    }

    pub fn with_thread_id(mut self, thread_id: impl Into<String>) -> Self {
        self.thread_id = Some(thread_id.into());
        self
    }

    pub fn thread_id(&self) -> &str {
        self.thread_id.as_deref().filter(|id| !id.is_empty()).unwrap_or(DEFAULT_THREAD_ID)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageText {
    pub text: String,
}

/// `GET /health` body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub model: String,
    pub config: String,
    pub host: String,
    pub sessions: usize,
}

/// Data of an `error` stream event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub message: String,
}
