//! `/v1/embeddings` client.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::http::{client, expect_count, post_json};

const PROVIDER: &str = "OpenAI";

/// Embeds with `text-embedding-3-small` (1536 dimensions).
pub struct OpenAIEmbeddingProvider {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
}

impl OpenAIEmbeddingProvider {
    pub const MODEL: &'static str = "text-embedding-3-small";
    pub const DIMENSIONS: usize = 1536;

    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(RagError::Config("OpenAI API key must not be empty".into()));
        }
        Ok(Self { client: client(PROVIDER)?, api_key, endpoint: String::new() }
            .with_base_url("https://api.openai.com/v1"))
    }

    /// Point at an OpenAI-compatible server, e.g. `http://localhost:8080/v1`.
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.endpoint = format!("{}/embeddings", base_url.trim_end_matches('/'));
        self
    }
}

#[derive(Deserialize)]
struct EmbeddingList {
    data: Vec<IndexedEmbedding>,
}

#[derive(Deserialize)]
struct IndexedEmbedding {
    index: usize,
    embedding: Vec<f32>,
}

/// Put vectors back in input order; the API tags each with its input index.
fn by_input_order(data: Vec<IndexedEmbedding>, expected: usize) -> Result<Vec<Vec<f32>>> {
    expect_count(PROVIDER, expected, data.len())?;
    let mut slots: Vec<Option<Vec<f32>>> = vec![None; expected];
    for item in data {
        if let Some(slot) = slots.get_mut(item.index) {
            *slot = Some(item.embedding);
        }
    }
    slots
        .into_iter()
        .enumerate()
        .map(|(index, slot)| {
            slot.ok_or_else(|| RagError::Embedding {
                provider: PROVIDER.into(),
                message: format!("no embedding returned for input {index}"),
            })
        })
        .collect()
}

#[async_trait]
impl EmbeddingProvider for OpenAIEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let [vector] = <[Vec<f32>; 1]>::try_from(self.embed_batch(&[text]).await?)
            .map_err(|v| RagError::Embedding {
                provider: PROVIDER.into(),
                message: format!("expected 1 embedding, got {}", v.len()),
            })?;
        Ok(vector)
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        debug!(provider = PROVIDER, batch_size = texts.len(), "embedding batch");

        let request = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&json!({ "model": Self::MODEL, "input": texts }));
        let list: EmbeddingList = post_json(PROVIDER, request).await?;
        by_input_order(list.data, texts.len())
    }

    fn dimensions(&self) -> usize {
        Self::DIMENSIONS
    }

    fn name(&self) -> &str {
        PROVIDER
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(index: usize, value: f32) -> IndexedEmbedding {
        IndexedEmbedding { index, embedding: vec![value] }
    }

    #[test]
    fn vectors_follow_input_indices() {
        let ordered = by_input_order(vec![item(2, 2.0), item(0, 0.0), item(1, 1.0)], 3).unwrap();
        assert_eq!(ordered, vec![vec![0.0], vec![1.0], vec![2.0]]);
    }

    #[test]
    fn duplicate_or_missing_indices_are_rejected() {
        let err = by_input_order(vec![item(0, 0.0), item(0, 1.0)], 2).unwrap_err();
        assert!(err.to_string().contains("input 1"), "{err}");
        assert!(by_input_order(vec![item(0, 0.0)], 2).is_err());
    }

    #[test]
    fn empty_key_is_rejected() {
        assert!(matches!(OpenAIEmbeddingProvider::new(""), Err(RagError::Config(_))));
    }

    #[tokio::test]
    async fn empty_batch_makes_no_request() {
        let provider =
            OpenAIEmbeddingProvider::new("sk-test").unwrap().with_base_url("http://127.0.0.1:1/v1");
        assert!(provider.embed_batch(&[]).await.unwrap().is_empty());
    }
}
