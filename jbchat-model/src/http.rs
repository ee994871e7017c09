//! HTTP plumbing shared by the hosted chat backends and the embedding
//! providers in `jbchat-rag`.

use std::time::Duration;

use reqwest::{Response, StatusCode};
use serde::Deserialize;
use tracing::error;

use crate::error::{ModelError, Result};

/// Upper bound on establishing a connection to a hosted API.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Build a client whose `read_timeout` bounds each wait for response bytes.
///
/// Streamed answers may take longer than `read_timeout` overall; only a
/// stalled connection is cut.
pub fn build_client(read_timeout: Duration) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .read_timeout(read_timeout)
        .build()
}

/// A non-success response, with the detail extracted from its body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiFailure {
    pub status: StatusCode,
    pub message: String,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

/// Pass successful responses through; otherwise read the body and pull out
/// the `error.message` field both OpenAI and Gemini use, falling back to
/// the raw body.
pub async fn ensure_success(response: Response) -> std::result::Result<Response, ApiFailure> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ApiFailure { status, message: error_message(body) })
}

fn error_message(body: String) -> String {
    match serde_json::from_str::<ErrorBody>(&body) {
        Ok(parsed) => parsed.error.message,
        Err(_) => body,
    }
}

pub(crate) fn client_for(provider: &str, timeout: Duration) -> Result<reqwest::Client> {
    build_client(timeout).map_err(|e| {
        ModelError::Config(format!("failed to create {provider} HTTP client: {e}"))
    })
}

pub(crate) fn request_error(provider: &str, err: reqwest::Error) -> ModelError {
    error!(provider, error = %err, "request failed");
    ModelError::Request { provider: provider.into(), message: format!("request failed: {err}") }
}

pub(crate) async fn check_response(provider: &str, response: Response) -> Result<Response> {
    ensure_success(response).await.map_err(|failure| {
        error!(provider, status = %failure.status, "API error");
        ModelError::Api {
            provider: provider.into(),
            status: failure.status.as_u16(),
            message: failure.message,
        }
    })
}
