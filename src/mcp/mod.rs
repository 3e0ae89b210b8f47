//! MCP server over stdio, built on `rmcp`.
//!
//! Only the tools surface is exposed: `tools/list` and `tools/call` are
//! answered from the [`ToolRegistry`]. Stdout carries protocol frames
//! exclusively; all logging goes to stderr.

use std::sync::Arc;

use rmcp::model::{
    CallToolRequestParam, CallToolResult, Content, ErrorData, Implementation, JsonObject,
    ListToolsResult, PaginatedRequestParam, ProtocolVersion, ServerCapabilities, ServerInfo,
    Tool as ToolDefinition,
};
use rmcp::service::RequestContext;
use rmcp::{RoleServer, ServerHandler, ServiceExt};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{Result, VisionError};
use crate::tools::{Tool, ToolContext, ToolRegistry};

/// Identity reported to clients from `initialize`.
#[derive(Debug, Clone)]
pub struct ServerIdentity {
    pub name: String,
    pub version: String,
    pub instructions: String,
}

pub struct McpServer {
    identity: ServerIdentity,
    registry: ToolRegistry,
    ctx: ToolContext,
}

impl McpServer {
    pub fn new(identity: ServerIdentity, registry: ToolRegistry, ctx: ToolContext) -> Self {
        Self {
            identity,
            registry,
            ctx,
        }
    }

    /// Serve stdin/stdout until the client disconnects.
    pub async fn run_stdio(self) -> Result<()> {
        info!(
            server = %self.identity.name,
            tools = self.registry.len(),
            "MCP server listening on stdio"
        );

        let service = self
            .serve(rmcp::transport::stdio())
            .await
            .map_err(|e| VisionError::Transport(format!("MCP initialization failed: {e}")))?;

        let reason = service
            .waiting()
            .await
            .map_err(|e| VisionError::Transport(format!("MCP service stopped: {e}")))?;

        info!(?reason, "MCP session closed");
        Ok(())
    }

    /// The registry's tools as MCP definitions, sorted by name.
    pub fn tool_definitions(&self) -> Vec<ToolDefinition> {
        self.registry.tools().into_iter().map(definition).collect()
    }

    /// Run one tool call. Tool failures become results flagged `isError` so
    /// the model can read them; only an unknown tool is a protocol error.
    pub async fn call(
        &self,
        request: CallToolRequestParam,
    ) -> std::result::Result<CallToolResult, ErrorData> {
        let name: &str = &request.name;
        let arguments = Value::Object(request.arguments.unwrap_or_default());

        info!(tool = name, "tool call");

        match self.registry.execute(name, arguments, &self.ctx).await {
            Ok(output) if output.success => {
                if let Some(meta) = &output.metadata {
                    debug!(tool = name, %meta, "tool succeeded");
                }
                Ok(CallToolResult::success(vec![Content::text(output.output)]))
            }
            Ok(output) => {
                warn!(tool = name, error = %output.output, "tool reported failure");
                Ok(CallToolResult::error(vec![Content::text(output.output)]))
            }
            Err(VisionError::ToolNotFound(unknown)) => Err(ErrorData::invalid_params(
                format!("Unknown tool: {unknown}"),
                None,
            )),
            Err(e) => {
                warn!(tool = name, error = %e, "tool call failed");
                Ok(CallToolResult::error(vec![Content::text(e.to_string())]))
            }
        }
    }
}

fn definition(tool: &dyn Tool) -> ToolDefinition {
    let schema = match tool.parameters_schema() {
        Value::Object(map) => map,
        _ => JsonObject::new(),
    };
    ToolDefinition::new(
        tool.name().to_string(),
        tool.description().to_string(),
        Arc::new(schema),
    )
}

impl ServerHandler for McpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: self.identity.name.clone(),
                version: self.identity.version.clone(),
                ..Default::default()
            },
            instructions: Some(self.identity.instructions.clone()),
        }
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> std::result::Result<ListToolsResult, ErrorData> {
        Ok(ListToolsResult::with_all_items(self.tool_definitions()))
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> std::result::Result<CallToolResult, ErrorData> {
        self.call(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::testing::{RecordingBackend, test_ctx};
    use serde_json::json;

    fn server(backend: Arc<RecordingBackend>) -> McpServer {
        McpServer::new(
            ServerIdentity {
                name: "OpenVision".into(),
                version: "0.1.0".into(),
                instructions: "Vision analysis tool for images using OpenRouter".into(),
            },
            ToolRegistry::with_vision_tools(),
            test_ctx(backend),
        )
    }

    fn call_request(name: &str, arguments: Value) -> CallToolRequestParam {
        CallToolRequestParam {
            name: name.to_string().into(),
            arguments: arguments.as_object().cloned(),
        }
    }

    #[test]
    fn info_advertises_tools() {
        let info = server(RecordingBackend::answering("unused")).get_info();
        assert_eq!(info.server_info.name, "OpenVision");
        assert_eq!(info.protocol_version, ProtocolVersion::V_2024_11_05);
        assert!(info.capabilities.tools.is_some());
        assert_eq!(
            info.instructions.as_deref(),
            Some("Vision analysis tool for images using OpenRouter")
        );
    }

    #[test]
    fn definitions_are_sorted_with_schemas() {
        let defs = server(RecordingBackend::answering("unused")).tool_definitions();
        let names: Vec<_> = defs.iter().map(|d| &*d.name).collect();
        assert_eq!(names, vec!["compare_images", "extract_text", "image_analysis"]);

        let json = serde_json::to_value(&defs[2]).unwrap();
        assert_eq!(json["inputSchema"]["type"], "object");
        assert_eq!(json["inputSchema"]["required"], json!(["image"]));
    }

    #[tokio::test]
    async fn successful_call_returns_text() {
        let backend = RecordingBackend::answering("Two red apples.");
        let s = server(backend.clone());
        let result = s
            .call(call_request("image_analysis", json!({"image": "SGVsbG8gV29ybGQ="})))
            .await
            .unwrap();

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["isError"], false);
        assert_eq!(json["content"][0]["type"], "text");
        assert_eq!(json["content"][0]["text"], "Two red apples.");
        assert_eq!(backend.recorded().len(), 1);
    }

    #[tokio::test]
    async fn image_failure_is_a_tool_error() {
        let s = server(RecordingBackend::answering("unused"));
        let result = s
            .call(call_request("image_analysis", json!({"image": "data:image/png,raw"})))
            .await
            .unwrap();

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["isError"], true);
        let text = json["content"][0]["text"].as_str().unwrap();
        assert!(text.starts_with("Failed to process image:"));
    }

    #[tokio::test]
    async fn remote_failure_is_a_tool_error() {
        let s = server(RecordingBackend::failing(402, "insufficient credits"));
        let result = s
            .call(call_request("image_analysis", json!({"image": "SGVsbG8gV29ybGQ="})))
            .await
            .unwrap();

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["isError"], true);
        assert_eq!(
            json["content"][0]["text"],
            "OpenRouter API error (402): insufficient credits"
        );
    }

    #[tokio::test]
    async fn missing_arguments_reach_the_tool() {
        let s = server(RecordingBackend::answering("unused"));
        let result = s
            .call(CallToolRequestParam {
                name: "image_analysis".into(),
                arguments: None,
            })
            .await
            .unwrap();

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["isError"], true);
        assert_eq!(json["content"][0]["text"], "image is required");
    }

    #[tokio::test]
    async fn unknown_tool_is_invalid_params() {
        let s = server(RecordingBackend::answering("unused"));
        let err = s
            .call(call_request("describe", json!({})))
            .await
            .unwrap_err();

        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["code"], -32602);
        assert_eq!(json["message"], "Unknown tool: describe");
    }

    #[tokio::test]
    async fn serves_a_client_over_a_byte_stream() {
        let (server_io, client_io) = tokio::io::duplex(64 * 1024);
        let backend = RecordingBackend::answering("A bar chart.");
        let s = server(backend.clone());
        tokio::spawn(async move {
            if let Ok(running) = s.serve(server_io).await {
                let _ = running.waiting().await;
            }
        });

        let client = ().serve(client_io).await.unwrap();

        let info = client.peer_info().unwrap();
        assert_eq!(info.server_info.name, "OpenVision");

        let tools = client.list_all_tools().await.unwrap();
        assert_eq!(tools.len(), 3);

        let result = client
            .call_tool(call_request(
                "extract_text",
                json!({"image": "data:image/png;base64,iVBORw0KGgo="}),
            ))
            .await
            .unwrap();
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["content"][0]["text"], "A bar chart.");
        assert_eq!(backend.recorded()[0].images[0].mime_type, "image/png");

        client.cancel().await.unwrap();
    }
}
