//! Documentation pages fetched over HTTP.

use tracing::debug;

use crate::chunking::Chunker;
use crate::document::{DocumentChunk, SourceKind};
use crate::error::{RagError, Result};

/// Line width used when rendering HTML to text.
const TEXT_WIDTH: usize = 120;

/// A fetched page rendered to plain text.
pub(crate) struct Page {
    pub title: Option<String>,
    pub text: String,
}

pub(crate) async fn fetch_page(client: &reqwest::Client, url: &str) -> Result<Page> {
    let unreachable =
        |message: String| RagError::SourceUnreachable { location: url.to_string(), message };

    let response = client.get(url).send().await.map_err(|e| unreachable(e.to_string()))?;
    let status = response.status();
    if !status.is_success() {
        return Err(unreachable(format!("HTTP {status}")));
    }
    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();
    let body =
        response.bytes().await.map_err(|e| unreachable(format!("failed to read body: {e}")))?;
    debug!(url, %content_type, size = body.len(), "fetched page");

    if content_type.contains("html") {
        let raw = String::from_utf8_lossy(&body);
        let title = html_title(&raw);
        let text =
            html2text::from_read(&body[..], TEXT_WIDTH).map_err(|e| RagError::MalformedSource {
                location: url.to_string(),
                message: format!("failed to render HTML: {e}"),
            })?;
        Ok(Page { title, text })
    } else {
        Ok(Page { title: None, text: String::from_utf8_lossy(&body).into_owned() })
    }
}

/// Contents of the first `<title>` element, whitespace-collapsed.
fn html_title(html: &str) -> Option<String> {
    let lower = html.to_ascii_lowercase();
    let open = lower.find("<title")?;
    let start = open + lower[open..].find('>')? + 1;
    let end = start + lower[start..].find("</title>")?;
    let title = html[start..end].split_whitespace().collect::<Vec<_>>().join(" ");
    (!title.is_empty()).then_some(title)
}

/// Split a page into documentation chunks.
pub(crate) fn page_chunks(url: &str, page: &Page, chunker: &dyn Chunker) -> Vec<DocumentChunk> {
    chunker
        .split(&page.text)
        .into_iter()
        .enumerate()
        .map(|(i, text)| {
            let id = format!("web:{url}#{i}");
            let mut chunk = DocumentChunk::new(id, text, SourceKind::Documentation)
                .with_metadata("source", url)
                .with_metadata("chunk_index", i.to_string());
            if let Some(title) = &page.title {
                chunk = chunk.with_metadata("title", title.as_str());
            }
            chunk
        })
        .collect()
}
