//! History-aware retrieval.

use std::sync::Arc;

use jbchat_rag::{IndexHandle, RetrievalResult};
use tracing::{debug, warn};

use crate::error::Result;
use crate::rewriter::QueryRewriter;
use crate::session::Turn;

/// What was searched for and what came back.
#[derive(Debug, Clone)]
pub struct Retrieval {
    /// The text that was embedded.
    pub query: String,
    pub results: RetrievalResult,
    /// True when rewriting failed and the raw input was used instead.
    pub degraded: bool,
}

/// Queries the index, rewriting follow-ups first.
#[derive(Clone)]
pub struct Retriever {
    rewriter: Arc<dyn QueryRewriter>,
    index: IndexHandle,
    top_k: usize,
}

impl Retriever {
    pub fn new(rewriter: Arc<dyn QueryRewriter>, index: IndexHandle) -> Self {
        let top_k = index.top_k();
        Self { rewriter, index, top_k }
    }

    pub fn with_top_k(mut self, k: usize) -> Self {
        self.top_k = k;
        self
    }

    pub fn index(&self) -> &IndexHandle {
        &self.index
    }

    /// Retrieve context for `input`.
    ///
    /// Empty history queries with the input as is. Otherwise the input is
    /// rewritten, with one retry; if both attempts fail the raw input is used.
    pub async fn retrieve(&self, history: &[Turn], input: &str) -> Result<Retrieval> {
        let (query, degraded) = if history.is_empty() {
            (input.to_string(), false)
        } else {
            self.standalone_query(history, input).await
        };

        let results = self.index.query(&query, self.top_k).await?;
        debug!(query = %query, result_count = results.len(), degraded, "retrieved context");
        Ok(Retrieval { query, results, degraded })
    }

    async fn standalone_query(&self, history: &[Turn], input: &str) -> (String, bool) {
        let mut last_error = None;
        for attempt in 1..=2 {
            match self.rewriter.rewrite(history, input).await {
                Ok(query) => return (query, false),
                Err(e) => {
                    debug!(attempt, error = %e, "rewrite attempt failed");
                    last_error = Some(e);
                }
            }
        }
        if let Some(e) = last_error {
            warn!(error = %e, "rewrite failed twice, retrieving with the raw input");
        }
        (input.to_string(), true)
    }
}
