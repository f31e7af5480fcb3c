//! MCP server exposing the gateway tools over stdio.
//!
//! Successful calls return the payload as JSON text. Failures are returned as
//! tool errors whose text is a [`WireToolError`], so the calling side can
//! recover the error kind and upstream status.

use std::sync::Arc;

use agent_core::{ToolCall, ToolErrorKind, ToolOutcome};
use rmcp::model::{
    CallToolRequestParams, CallToolResult, Content, ListToolsResult, PaginatedRequestParams,
    ServerCapabilities, ServerInfo, Tool,
};
use rmcp::service::RequestContext;
use rmcp::{ErrorData, RoleServer, ServerHandler};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::svckit::{GatewayTool, ToolGateway};

/// Error text carried by a failed MCP tool call
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireToolError {
    pub kind: ToolErrorKind,
    pub message: String,
    #[serde(default)]
    pub status: Option<u16>,
}

impl WireToolError {
    /// Parse error text produced by this server; `None` for any other text
    pub fn parse(text: &str) -> Option<Self> {
        serde_json::from_str(text).ok()
    }
}

#[derive(Clone)]
pub struct CouchDbMcpServer {
    gateway: Arc<ToolGateway>,
}

impl CouchDbMcpServer {
    pub const fn new(gateway: Arc<ToolGateway>) -> Self {
        Self { gateway }
    }

    fn descriptors() -> Vec<Tool> {
        GatewayTool::ALL
            .into_iter()
            .map(|tool| {
                let schema = match tool.schema().input_schema() {
                    Value::Object(map) => map,
                    _ => serde_json::Map::new(),
                };
                Tool::new(tool.name(), tool.description(), Arc::new(schema))
            })
            .collect()
    }

    async fn run(&self, name: &str, arguments: serde_json::Map<String, Value>) -> CallToolResult {
        let result = self.gateway.call(&ToolCall::new(name, arguments)).await;

        match result.outcome {
            ToolOutcome::Ok { payload } => {
                let text = serde_json::to_string(&payload).unwrap_or_else(|_| payload.to_string());
                CallToolResult::success(vec![Content::text(text)])
            }
            ToolOutcome::Err {
                kind,
                message,
                upstream_status,
            } => {
                let wire = WireToolError {
                    kind,
                    message,
                    status: upstream_status,
                };
                let text = serde_json::to_string(&wire).unwrap_or_else(|_| wire.message.clone());
                CallToolResult::error(vec![Content::text(text)])
            }
        }
    }
}

impl ServerHandler for CouchDbMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            instructions: Some(
                "Read-only access to a CouchDB server: list databases, inspect a database, \
                 fetch documents, page through _all_docs and run Mango queries."
                    .into(),
            ),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, ErrorData> {
        Ok(ListToolsResult::with_all_items(Self::descriptors()))
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParams,
        _context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, ErrorData> {
        tracing::info!(tool = %request.name, "tool call");
        let arguments = request.arguments.unwrap_or_default();
        Ok(self.run(&request.name, arguments).await)
    }
}
