//! Structured track records selected from a JSON file.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde_json::Value;
use tracing::debug;

use crate::document::{DocumentChunk, SourceKind};
use crate::error::{RagError, Result};

/// A jq-style path selecting an array of records, such as `.tracks[]`,
/// `.a.b[]` or `.[]` for a top-level array.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionRule {
    keys: Vec<String>,
}

impl ExtractionRule {
    /// The rule used for JBrowse configuration files.
    pub fn tracks() -> Self {
        Self { keys: vec!["tracks".to_string()] }
    }

    fn select<'a>(&self, root: &'a Value) -> Option<&'a Vec<Value>> {
        self.keys.iter().try_fold(root, |value, key| value.get(key))?.as_array()
    }
}

impl Default for ExtractionRule {
    fn default() -> Self {
        Self::tracks()
    }
}

impl FromStr for ExtractionRule {
    type Err = RagError;

    fn from_str(s: &str) -> Result<Self> {
        let rule = s.trim();
        let inner = rule
            .strip_prefix('.')
            .and_then(|r| r.strip_suffix("[]"))
            .ok_or_else(|| {
                RagError::Config(format!("extraction rule '{rule}' must look like '.key[]'"))
            })?;
        if inner.is_empty() {
            return Ok(Self { keys: Vec::new() });
        }
        let keys: Vec<String> = inner.split('.').map(str::to_string).collect();
        if keys.iter().any(|k| k.is_empty() || k.contains(['[', ']', ' '])) {
            return Err(RagError::Config(format!("extraction rule '{rule}' has an invalid key")));
        }
        Ok(Self { keys })
    }
}

impl fmt::Display for ExtractionRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, ".{}[]", self.keys.join("."))
    }
}

/// Read `path` and turn every record selected by `rule` into one chunk.
pub(crate) async fn load_records(path: &Path, rule: &ExtractionRule) -> Result<Vec<DocumentChunk>> {
    let location = path.display().to_string();
    let content = tokio::fs::read_to_string(path).await.map_err(|e| RagError::SourceUnreachable {
        location: location.clone(),
        message: e.to_string(),
    })?;
    let root: Value = serde_json::from_str(&content).map_err(|e| RagError::MalformedSource {
        location: location.clone(),
        message: format!("invalid JSON: {e}"),
    })?;
    let records = rule.select(&root).ok_or_else(|| RagError::MalformedSource {
        location: location.clone(),
        message: format!("'{rule}' does not resolve to an array"),
    })?;
    debug!(source = %location, record_count = records.len(), "selected records");

    records
        .iter()
        .enumerate()
        .map(|(i, record)| record_chunk(&location, i + 1, record))
        .collect()
}

fn record_chunk(location: &str, seq_num: usize, record: &Value) -> Result<DocumentChunk> {
    let text = serde_json::to_string(record).map_err(|e| RagError::MalformedSource {
        location: location.to_string(),
        message: format!("record {seq_num}: {e}"),
    })?;
    let id = format!("records:{location}#{seq_num}");
    let mut chunk = DocumentChunk::new(id, text, SourceKind::TrackRecord)
        .with_metadata("source", location)
        .with_metadata("seq_num", seq_num.to_string());

    if let Some(track_id) = record.get("trackId").and_then(Value::as_str) {
        chunk = chunk.with_metadata("track_id", track_id);
    }
    if let Some(assemblies) = record.get("assemblyNames").and_then(Value::as_array) {
        let names: Vec<&str> = assemblies.iter().filter_map(Value::as_str).collect();
        chunk = chunk.with_metadata("assembly", names.join(","));
    }
    for key in ["name", "type"] {
        if let Some(value) = record.get(key).and_then(Value::as_str) {
            chunk = chunk.with_metadata(key, value);
        }
    }
    Ok(chunk)
}
