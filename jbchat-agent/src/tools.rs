//! Tools the model may call during a dialogue turn.

use std::sync::Arc;

use async_trait::async_trait;
use jbchat_model::{ToolInvocation, ToolSpec};
use jbchat_rag::IndexHandle;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::deeplink::{DeepLink, SessionSpec, ViewType};
use crate::error::{AgentError, Result};
use crate::prompt::format_context;

/// A capability the model can invoke by name.
///
/// # Example
///
/// ```rust,ignore
/// let registry = ToolRegistry::new().with_tool(Arc::new(SessionLinkTool::new(host, config)));
/// let output = registry.execute(&invocation).await;
/// ```
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON schema of the arguments object.
    fn parameters_schema(&self) -> Value;

    /// Run the tool; the returned text is sent back to the model.
    async fn execute(&self, args: Value) -> Result<String>;

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

/// Tools available to a dialogue engine, in declaration order.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a tool, replacing one with the same name.
    pub fn with_tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.register(tool);
        self
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.retain(|t| t.name() != tool.name());
        self.tools.push(tool);
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.iter().find(|t| t.name() == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Declarations sent with every answer request.
    pub fn specs(&self) -> Vec<ToolSpec> {
        self.tools.iter().map(|t| t.spec()).collect()
    }

    /// Run `invocation`. Unknown tools and tool failures become an error
    /// text for the model instead of failing the turn.
    pub async fn execute(&self, invocation: &ToolInvocation) -> String {
        let Some(tool) = self.get(&invocation.name) else {
            warn!(tool.name = %invocation.name, "model requested an unknown tool");
            let available = self.names().join(", ");
            return format!(
                "Error: unknown tool '{}'. Available tools: {available}",
                invocation.name
            );
        };
        match tool.execute(invocation.arguments.clone()).await {
            Ok(output) => {
                debug!(tool.name = %invocation.name, output_len = output.len(), "tool finished");
                output
            }
            Err(e) => {
                warn!(tool.name = %invocation.name, error = %e, "tool failed");
                format!("Error: {e}")
            }
        }
    }
}

fn parse_args<T: for<'de> Deserialize<'de>>(tool: &str, args: Value) -> Result<T> {
    serde_json::from_value(args)
        .map_err(|e| AgentError::tool(tool, format!("invalid arguments: {e}")))
}

/// Builds a browser deep link for tracks on an assembly.
pub struct SessionLinkTool {
    host: String,
    config_name: String,
}

impl SessionLinkTool {
    pub const NAME: &'static str = "session_link";

    pub fn new(host: impl Into<String>, config_name: impl Into<String>) -> Self {
        Self { host: host.into(), config_name: config_name.into() }
    }
}

#[derive(Deserialize)]
struct SessionLinkArgs {
    assembly: Option<String>,
    #[serde(default)]
    assemblies: Vec<String>,
    #[serde(default)]
    tracks: Vec<String>,
    loc: Option<String>,
    view_type: Option<String>,
}

impl SessionLinkArgs {
    fn into_spec(self) -> Result<SessionSpec> {
        let view_type = match self.view_type.as_deref() {
            Some(v) => v.parse()?,
            None => ViewType::default(),
        };
        let mut assemblies = self.assemblies;
        if let Some(assembly) = self.assembly {
            assemblies.insert(0, assembly);
        }
        let loc = self.loc.filter(|l| !l.trim().is_empty());

        match view_type {
            ViewType::LinearSyntenyView => {
                let [first, second, ..] = assemblies.as_slice() else {
                    return Err(AgentError::tool(
                        SessionLinkTool::NAME,
                        "LinearSyntenyView needs two assemblies",
                    ));
                };
                Ok(SessionSpec::synteny([first.clone(), second.clone()], loc, self.tracks))
            }
            other => {
                let assembly = assemblies.into_iter().next().ok_or_else(|| {
                    AgentError::tool(SessionLinkTool::NAME, "an assembly is required")
                })?;
                Ok(SessionSpec::view(other, assembly, loc, self.tracks))
            }
        }
    }
}

#[async_trait]
impl Tool for SessionLinkTool {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn description(&self) -> &str {
        "Build a URL that opens the user's JBrowse 2 session showing the given tracks. \
         Call only when the question references tracks and the answer is confident."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "assembly": {
                    "type": "string",
                    "description": "Assembly name of the tracks, e.g. hg38"
                },
                "assemblies": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Two assembly names, only for LinearSyntenyView"
                },
                "tracks": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "trackId values"
                },
                "loc": {
                    "type": "string",
                    "description": "Location or gene, e.g. chr1:100-200 or TP53"
                },
                "view_type": {
                    "type": "string",
                    "enum": ViewType::ALL.iter().map(|v| v.as_str()).collect::<Vec<_>>(),
                }
            },
            "required": ["tracks"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String> {
        let spec = parse_args::<SessionLinkArgs>(Self::NAME, args)?.into_spec()?;
        DeepLink::session(&self.host, &self.config_name, &spec)
    }
}

/// Runs a further similarity search over the knowledge index.
pub struct SearchKnowledgeTool {
    index: IndexHandle,
}

impl SearchKnowledgeTool {
    pub const NAME: &'static str = "search_knowledge";

    pub fn new(index: IndexHandle) -> Self {
        Self { index }
    }
}

#[derive(Deserialize)]
struct SearchArgs {
    query: String,
    k: Option<usize>,
}

#[async_trait]
impl Tool for SearchKnowledgeTool {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn description(&self) -> &str {
        "Search the user's track configuration and the JBrowse documentation \
         for passages relevant to a query."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "What to look for" },
                "k": { "type": "integer", "description": "Number of passages to return" }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String> {
        let args: SearchArgs = parse_args(Self::NAME, args)?;
        let k = args.k.unwrap_or_else(|| self.index.top_k()).max(1);
        let results = self.index.query(&args.query, k).await?;
        if results.is_empty() {
            return Ok("No matching passages.".to_string());
        }
        Ok(format_context(&results))
    }
}
