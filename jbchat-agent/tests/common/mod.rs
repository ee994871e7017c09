#![allow(dead_code)]

use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_stream::stream;
use async_trait::async_trait;
use futures::StreamExt;
use jbchat_agent::{DialogueConfig, DialogueEngine, FlushPolicy};
use jbchat_model::{ChatModel, ChatRequest, ChatStream, MockChatModel, MockReply};
use jbchat_rag::{
    DocumentIngestor, ExtractionRule, HashingEmbedder, IndexHandle, IndexService, RagConfig,
    SourceDescriptor,
};
use serde_json::json;
use tempfile::NamedTempFile;
use tokio::sync::Notify;

/// Two hg38 track records, `t1` and `t2`.
pub fn records_file() -> NamedTempFile {
    let config = json!({
        "assemblies": [{"name": "hg38"}],
        "tracks": [
            {
                "type": "FeatureTrack",
                "trackId": "t1",
                "name": "hg38 genes track",
                "assemblyNames": ["hg38"]
            },
            {
                "type": "QuantitativeTrack",
                "trackId": "t2",
                "name": "hg38 coverage track",
                "assemblyNames": ["hg38"]
            },
        ]
    });
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{config}").unwrap();
    file
}

pub async fn track_index() -> IndexHandle {
    let file = records_file();
    let ingestor = DocumentIngestor::new(&RagConfig::default()).unwrap();
    let source = SourceDescriptor::records(file.path(), ExtractionRule::tracks());
    let report = ingestor.ingest(&[source]).await;
    assert!(report.is_complete());

    IndexService::builder()
        .collection("tracks")
        .embedding_provider(Arc::new(HashingEmbedder::default()))
        .build()
        .unwrap()
        .build_index(report.chunks)
        .await
        .unwrap()
}

pub async fn engine(model: Arc<MockChatModel>, config: DialogueConfig) -> DialogueEngine {
    DialogueEngine::builder()
        .model(model)
        .index(track_index().await)
        .config(config)
        .build()
        .unwrap()
}

pub async fn scripted(replies: Vec<MockReply>) -> (Arc<MockChatModel>, DialogueEngine) {
    let model = Arc::new(MockChatModel::new(replies));
    let engine = engine(model.clone(), DialogueConfig::default()).await;
    (model, engine)
}

pub async fn scripted_incremental(replies: Vec<MockReply>) -> (Arc<MockChatModel>, DialogueEngine) {
    let model = Arc::new(MockChatModel::new(replies));
    let config = DialogueConfig::builder().flush_policy(FlushPolicy::Incremental).build().unwrap();
    let engine = engine(model.clone(), config).await;
    (model, engine)
}

/// A scripted model whose first reply pauses after its first chunk until
/// [`release`](GatedModel::release) is called. Later replies run freely.
pub struct GatedModel {
    inner: MockChatModel,
    gate: Arc<Notify>,
    armed: AtomicBool,
}

impl GatedModel {
    pub fn new(replies: Vec<MockReply>) -> Self {
        Self {
            inner: MockChatModel::new(replies),
            gate: Arc::new(Notify::new()),
            armed: AtomicBool::new(true),
        }
    }

    pub fn release(&self) {
        self.gate.notify_one();
    }
}

#[async_trait]
impl ChatModel for GatedModel {
    fn name(&self) -> &str {
        "gated"
    }

    async fn stream(&self, request: ChatRequest) -> jbchat_model::Result<ChatStream> {
        let mut inner = self.inner.stream(request).await?;
        if !self.armed.swap(false, Ordering::SeqCst) {
            return Ok(inner);
        }
        let gate = self.gate.clone();
        Ok(Box::pin(stream! {
            if let Some(first) = inner.next().await {
                yield first;
            }
            gate.notified().await;
            while let Some(item) = inner.next().await {
                yield item;
            }
        }))
    }
}

pub async fn gated_incremental(replies: Vec<MockReply>) -> (Arc<GatedModel>, DialogueEngine) {
    let model = Arc::new(GatedModel::new(replies));
    let config = DialogueConfig::builder().flush_policy(FlushPolicy::Incremental).build().unwrap();
    let engine = DialogueEngine::builder()
        .model(model.clone())
        .index(track_index().await)
        .config(config)
        .build()
        .unwrap();
    (model, engine)
}
