pub mod image;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{Result, VisionError};
use crate::image::ImageOptions;
use crate::llm::VisionBackend;

/// Output from a tool execution.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ToolOutput {
    pub success: bool,
    pub output: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl ToolOutput {
    pub fn error(output: impl Into<String>) -> Self {
        Self {
            success: false,
            output: output.into(),
            metadata: None,
        }
    }

    pub fn ok_with_meta(output: impl Into<String>, meta: serde_json::Value) -> Self {
        Self {
            success: true,
            output: output.into(),
            metadata: Some(meta),
        }
    }
}

/// Shared context passed to tools during execution. Built once at startup
/// from [`Config`](crate::config::Config); tools never read the environment.
pub struct ToolContext {
    /// Used for downloading images given as URLs.
    pub http_client: reqwest::Client,
    pub vision: Arc<dyn VisionBackend>,
    pub image: ImageOptions,
    /// Model used when a call does not pass `model`.
    pub default_model: String,
}

/// The trait all tools implement.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique name of the tool (e.g. "image_analysis").
    fn name(&self) -> &str;

    /// Human-readable description shown to the MCP client.
    fn description(&self) -> &str;

    /// JSON Schema describing the tool's parameters.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Execute the tool with the given parameters.
    async fn execute(&self, params: serde_json::Value, ctx: &ToolContext) -> Result<ToolOutput>;
}

/// Registry of all available tools.
pub struct ToolRegistry {
    tools: HashMap<String, Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Registry holding the three vision tools.
    pub fn with_vision_tools() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(image::ImageAnalysisTool));
        registry.register(Box::new(image::ExtractTextTool));
        registry.register(Box::new(image::CompareImagesTool));
        registry
    }

    /// Register a tool. Panics on duplicate names.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        let name = tool.name().to_string();
        assert!(
            !self.tools.contains_key(&name),
            "duplicate tool name: {name}"
        );
        self.tools.insert(name, tool);
    }

    /// List all registered tools as (name, description) pairs.
    pub fn list(&self) -> Vec<(&str, &str)> {
        let mut items: Vec<_> = self
            .tools
            .values()
            .map(|t| (t.name(), t.description()))
            .collect();
        items.sort_by_key(|(name, _)| *name);
        items
    }

    /// All registered tools, sorted by name.
    pub fn tools(&self) -> Vec<&dyn Tool> {
        let mut tools: Vec<&dyn Tool> = self.tools.values().map(|t| t.as_ref()).collect();
        tools.sort_by(|a, b| a.name().cmp(b.name()));
        tools
    }

    /// Execute a tool by name.
    pub async fn execute(
        &self,
        name: &str,
        params: serde_json::Value,
        ctx: &ToolContext,
    ) -> Result<ToolOutput> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| VisionError::ToolNotFound(name.to_string()))?;
        tool.execute(params, ctx).await
    }

    /// Number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }
}
