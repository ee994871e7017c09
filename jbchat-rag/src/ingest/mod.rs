//! Document ingestion: track records and documentation pages.
//!
//! A failing source never stops the others. [`DocumentIngestor::ingest`]
//! returns the chunks of every source that worked together with the errors
//! of those that did not.

mod records;
mod web;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

pub use records::ExtractionRule;

use crate::chunking::{Chunker, RecursiveChunker};
use crate::config::RagConfig;
use crate::document::DocumentChunk;
use crate::error::{RagError, Result};

/// Timeout for a single documentation fetch.
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// The default documentation site.
pub const DEFAULT_DOCS_URL: &str = "https://jbrowse.org/jb2/docs/";

/// Something to ingest.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceDescriptor {
    /// A local JSON file; every record selected by `rule` becomes one chunk.
    Records { path: PathBuf, rule: ExtractionRule },
    /// Documentation pages, fetched and split into passages.
    Web { urls: Vec<String> },
}

impl SourceDescriptor {
    pub fn records(path: impl Into<PathBuf>, rule: ExtractionRule) -> Self {
        SourceDescriptor::Records { path: path.into(), rule }
    }

    pub fn web<S: Into<String>>(urls: impl IntoIterator<Item = S>) -> Self {
        SourceDescriptor::Web { urls: urls.into_iter().map(Into::into).collect() }
    }
}

/// Outcome of an ingestion run.
#[derive(Debug, Default)]
pub struct IngestReport {
    /// Chunks of every successful source, in source order.
    pub chunks: Vec<DocumentChunk>,
    /// One error per failed source or URL.
    pub failures: Vec<RagError>,
}

impl IngestReport {
    /// True when every source was ingested.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Reads [`SourceDescriptor`]s into [`DocumentChunk`]s.
pub struct DocumentIngestor {
    client: reqwest::Client,
    chunker: Arc<dyn Chunker>,
}

impl DocumentIngestor {
    /// Create an ingestor that chunks documentation with a [`RecursiveChunker`]
    /// sized from `config`.
    pub fn new(config: &RagConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .user_agent(concat!("jbchat/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| RagError::Config(format!("failed to create HTTP client: {e}")))?;
        Ok(Self { client, chunker: Arc::new(RecursiveChunker::from_config(config)) })
    }

    /// Replace the documentation chunker.
    pub fn with_chunker(mut self, chunker: Arc<dyn Chunker>) -> Self {
        self.chunker = chunker;
        self
    }

    /// Ingest every source, tolerating individual failures.
    pub async fn ingest(&self, sources: &[SourceDescriptor]) -> IngestReport {
        let mut report = IngestReport::default();
        for source in sources {
            match source {
                SourceDescriptor::Records { path, rule } => {
                    match records::load_records(path, rule).await {
                        Ok(chunks) => {
                            info!(
                                source = %path.display(),
                                chunk_count = chunks.len(),
                                "ingested records"
                            );
                            report.chunks.extend(chunks);
                        }
                        Err(e) => {
                            warn!(source = %path.display(), error = %e, "skipping records source");
                            report.failures.push(e);
                        }
                    }
                }
                SourceDescriptor::Web { urls } => {
                    for url in urls {
                        match web::fetch_page(&self.client, url).await {
                            Ok(page) => {
                                let chunks = web::page_chunks(url, &page, self.chunker.as_ref());
                                info!(source = %url, chunk_count = chunks.len(), "ingested page");
                                report.chunks.extend(chunks);
                            }
                            Err(e) => {
                                warn!(source = %url, error = %e, "skipping web source");
                                report.failures.push(e);
                            }
                        }
                    }
                }
            }
        }
        info!(
            chunk_count = report.chunks.len(),
            failure_count = report.failures.len(),
            "ingestion finished"
        );
        report
    }
}
