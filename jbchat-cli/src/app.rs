//! Startup: ingest sources, build the index, assemble the engine.

use anyhow::{Context, bail};
use jbchat_agent::{Capabilities, DialogueEngine};
use jbchat_rag::{DocumentIngestor, IndexService};
use tracing::{info, warn};

use crate::settings::Settings;

/// Everything a running assistant needs.
pub struct App {
    pub settings: Settings,
    pub capabilities: Capabilities,
    pub engine: DialogueEngine,
}

impl App {
    /// Chat model name, for `/health`.
    pub fn model_name(&self) -> String {
        self.capabilities.chat.name().to_string()
    }
}

/// Ingest every source, embed the chunks and build the dialogue engine.
///
/// Sources that fail are logged and skipped; startup only fails when nothing
/// at all could be ingested.
pub async fn bootstrap(settings: Settings, capabilities: Capabilities) -> anyhow::Result<App> {
    let rag_config = settings.rag_config().context("invalid retrieval settings")?;

    info!(
        config = %settings.config_name(),
        docs = settings.docs.len(),
        provider = %capabilities.provider,
        "ingesting sources"
    );
    let ingestor = DocumentIngestor::new(&rag_config)?;
    let report = ingestor.ingest(&settings.sources()).await;
    for failure in &report.failures {
        warn!(location = failure.location().unwrap_or("-"), error = %failure, "source skipped");
    }
    if report.chunks.is_empty() {
        bail!("nothing could be ingested from {} or the documentation", settings.config_name());
    }

    let index = IndexService::builder()
        .collection("jbchat")
        .config(rag_config)
        .embedding_provider(capabilities.embedder.clone())
        .build()?
        .build_index(report.chunks)
        .await
        .context("failed to build the index")?;

    let engine = DialogueEngine::builder()
        .model(capabilities.chat.clone())
        .index(index)
        .config(settings.dialogue_config()?)
        .build()?;

    Ok(App { settings, capabilities, engine })
}
