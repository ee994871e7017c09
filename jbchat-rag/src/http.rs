//! Request plumbing for the hosted embedding providers.

use std::time::Duration;

use jbchat_model::http::{build_client, ensure_success};
use reqwest::RequestBuilder;
use serde::de::DeserializeOwned;
use tracing::error;

use crate::error::{RagError, Result};

/// Read timeout for embedding calls.
const EMBED_TIMEOUT: Duration = Duration::from_secs(60);

fn embedding_error(provider: &str, message: String) -> RagError {
    RagError::Embedding { provider: provider.to_string(), message }
}

pub(crate) fn client(provider: &str) -> Result<reqwest::Client> {
    build_client(EMBED_TIMEOUT)
        .map_err(|e| embedding_error(provider, format!("failed to create HTTP client: {e}")))
}

/// Send `request` and decode a JSON body, mapping every failure to
/// [`RagError::Embedding`].
pub(crate) async fn post_json<T: DeserializeOwned>(
    provider: &str,
    request: RequestBuilder,
) -> Result<T> {
    let response = request.send().await.map_err(|e| {
        error!(provider, error = %e, "embedding request failed");
        embedding_error(provider, format!("request failed: {e}"))
    })?;
    let response = ensure_success(response).await.map_err(|failure| {
        error!(provider, status = %failure.status, "embedding API error");
        embedding_error(provider, format!("API returned {}: {}", failure.status, failure.message))
    })?;
    response
        .json()
        .await
        .map_err(|e| embedding_error(provider, format!("failed to parse response: {e}")))
}

/// Fail unless the provider answered with one vector per input.
pub(crate) fn expect_count(provider: &str, expected: usize, got: usize) -> Result<()> {
    if expected == got {
        Ok(())
    } else {
        Err(embedding_error(provider, format!("expected {expected} embeddings, got {got}")))
    }
}
