//! Gemini embedding provider using the Generative Language REST API.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::http::{client, expect_count, post_json};

const PROVIDER: &str = "Gemini";

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com";

/// An [`EmbeddingProvider`] backed by `embedContent` / `batchEmbedContents`.
///
/// Single texts are embedded with the `RETRIEVAL_QUERY` task type, batches
/// with `RETRIEVAL_DOCUMENT`: the index embeds chunks in batches and queries
/// one at a time.
pub struct GeminiEmbeddingProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    dimensions: usize,
    output_dimensionality: Option<usize>,
}

impl GeminiEmbeddingProvider {
    /// Default embedding dimensions for `text-embedding-004`.
    const DEFAULT_DIMENSIONS: usize = 768;
    const DEFAULT_MODEL: &'static str = "text-embedding-004";

    /// Create a new provider using the given API key and the default
    /// `text-embedding-004` model.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(RagError::Config("Gemini API key must not be empty".into()));
        }
        Ok(Self {
            client: client(PROVIDER)?,
            api_key,
            base_url: GEMINI_API_BASE.into(),
            model: Self::DEFAULT_MODEL.into(),
            dimensions: Self::DEFAULT_DIMENSIONS,
            output_dimensionality: None,
        })
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into().trim_start_matches("models/").to_string();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the output dimensionality (truncates the embedding vector).
    pub fn with_output_dimensionality(mut self, dims: usize) -> Self {
        self.output_dimensionality = Some(dims);
        self.dimensions = dims;
        self
    }

    fn url(&self, method: &str) -> String {
        format!("{}/v1beta/models/{}:{method}", self.base_url, self.model)
    }

    fn content_request<'a>(
        &'a self,
        text: &'a str,
        task_type: &'static str,
    ) -> EmbedContentRequest<'a> {
        EmbedContentRequest {
            model: format!("models/{}", self.model),
            content: Content { parts: vec![Part { text }] },
            task_type,
            output_dimensionality: self.output_dimensionality,
        }
    }

    async fn post<T: DeserializeOwned>(&self, method: &str, body: &impl Serialize) -> Result<T> {
        let request =
            self.client.post(self.url(method)).header("x-goog-api-key", &self.api_key).json(body);
        post_json(PROVIDER, request).await
    }
}

// ── Gemini API request/response types ──────────────────────────────

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EmbedContentRequest<'a> {
    model: String,
    content: Content<'a>,
    task_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    output_dimensionality: Option<usize>,
}

#[derive(Serialize)]
struct BatchEmbedRequest<'a> {
    requests: Vec<EmbedContentRequest<'a>>,
}

#[derive(Deserialize)]
struct ContentEmbedding {
    values: Vec<f32>,
}

#[derive(Deserialize)]
struct EmbedContentResponse {
    embedding: ContentEmbedding,
}

#[derive(Deserialize)]
struct BatchEmbedResponse {
    #[serde(default)]
    embeddings: Vec<ContentEmbedding>,
}

#[async_trait]
impl EmbeddingProvider for GeminiEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        debug!(provider = PROVIDER, text_len = text.len(), "embedding single text");

        let body = self.content_request(text, "RETRIEVAL_QUERY");
        let response: EmbedContentResponse = self.post("embedContent", &body).await?;
        Ok(response.embedding.values)
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!(
            provider = PROVIDER,
            batch_size = texts.len(),
            model = %self.model,
            "embedding batch"
        );

        let body = BatchEmbedRequest {
            requests: texts.iter().map(|t| self.content_request(t, "RETRIEVAL_DOCUMENT")).collect(),
        };
        let response: BatchEmbedResponse = self.post("batchEmbedContents", &body).await?;
        expect_count(PROVIDER, texts.len(), response.embeddings.len())?;
        Ok(response.embeddings.into_iter().map(|e| e.values).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        PROVIDER
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_uses_model_resource_name_and_task_type() {
        let provider = GeminiEmbeddingProvider::new("key").unwrap().with_output_dimensionality(256);
        let request = provider.content_request("hello", "RETRIEVAL_QUERY");
        let body = serde_json::to_value(request).unwrap();
        assert_eq!(body["model"], "models/text-embedding-004");
        assert_eq!(body["taskType"], "RETRIEVAL_QUERY");
        assert_eq!(body["outputDimensionality"], 256);
        assert_eq!(body["content"]["parts"][0]["text"], "hello");
        assert_eq!(provider.dimensions(), 256);
    }

    #[test]
    fn urls_use_v1beta_model_methods() {
        let provider =
            GeminiEmbeddingProvider::new("key").unwrap().with_model("models/custom-embed");
        assert_eq!(
            provider.url("batchEmbedContents"),
            "https://generativelanguage.googleapis.com/v1beta/models/\
             custom-embed:batchEmbedContents"
        );
    }

    #[test]
    fn empty_key_is_rejected() {
        assert!(GeminiEmbeddingProvider::new("").is_err());
    }
}
