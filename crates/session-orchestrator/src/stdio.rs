//! MCP providers spawned as child processes
//!
//! The child gets the provider's resolved credentials in its environment and
//! speaks MCP over stdin/stdout. Dropping the connection kills the child.

use async_trait::async_trait;
use rmcp::model::{CallToolRequestParams, CallToolResult, RawContent};
use rmcp::service::RunningService;
use rmcp::transport::TokioChildProcess;
use rmcp::{RoleClient, ServiceExt};
use serde_json::{Map, Value};
use tokio::process::Command;

use agent_core::{ToolErrorKind, ToolResult, ToolSchema};
use couchdb_gateway::WireToolError;

use crate::credentials::ResolvedCredentials;
use crate::error::{ConfigError, ProviderError};
use crate::provider::{ProviderConnection, ProviderConnector};

/// Launches an MCP server binary and talks to it over stdio
#[derive(Clone, Debug)]
pub struct StdioConnector {
    program: String,
    args: Vec<String>,
}

impl StdioConnector {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Split a command line on whitespace: program first, then arguments
    pub fn from_command_line(line: &str) -> Result<Self, ConfigError> {
        let mut parts = line.split_whitespace().map(str::to_string);
        let program = parts
            .next()
            .ok_or_else(|| ConfigError::Invalid("empty provider command".into()))?;
        Ok(Self::new(program, parts.collect()))
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }
}

#[async_trait]
impl ProviderConnector for StdioConnector {
    async fn open(
        &self,
        provider: &str,
        credentials: &ResolvedCredentials,
    ) -> Result<Box<dyn ProviderConnection>, ProviderError> {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .envs(credentials.iter())
            .kill_on_drop(true);

        let transport = TokioChildProcess::new(command).map_err(|e| ProviderError::Launch {
            command: self.describe(),
            cause: e.to_string(),
        })?;

        let service = ()
            .serve(transport)
            .await
            .map_err(|e| ProviderError::Handshake(e.to_string()))?;

        let tools = match service.list_tools(Default::default()).await {
            Ok(listed) => listed.tools.iter().map(to_schema).collect::<Vec<_>>(),
            Err(e) => {
                let _ = service.cancel().await;
                return Err(ProviderError::Handshake(format!("tools/list failed: {e}")));
            }
        };

        tracing::info!(provider, command = %self.describe(), tools = tools.len(), "MCP provider connected");
        Ok(Box::new(McpConnection { service, tools }))
    }

    fn describe(&self) -> String {
        if self.args.is_empty() {
            self.program.clone()
        } else {
            format!("{} {}", self.program, self.args.join(" "))
        }
    }
}

fn to_schema(tool: &rmcp::model::Tool) -> ToolSchema {
    ToolSchema::from_json_schema(
        tool.name.to_string(),
        tool.description.as_deref().unwrap_or_default(),
        &tool.input_schema,
    )
}

/// Running MCP client session
pub struct McpConnection {
    service: RunningService<RoleClient, ()>,
    tools: Vec<ToolSchema>,
}

#[async_trait]
impl ProviderConnection for McpConnection {
    fn tools(&self) -> Vec<ToolSchema> {
        self.tools.clone()
    }

    async fn call(
        &self,
        tool: &str,
        arguments: Map<String, Value>,
    ) -> Result<ToolResult, ProviderError> {
        let result = self
            .service
            .call_tool(CallToolRequestParams {
                meta: None,
                name: tool.to_string().into(),
                arguments: Some(arguments),
                task: None,
            })
            .await
            .map_err(|e| ProviderError::Call(e.to_string()))?;

        Ok(convert_result(tool, result))
    }

    async fn close(self: Box<Self>) -> Result<(), ProviderError> {
        let Self { service, .. } = *self;
        service
            .cancel()
            .await
            .map(|_| ())
            .map_err(|e| ProviderError::Close(e.to_string()))
    }
}

/// Fold an MCP tool result into a [`ToolResult`]
///
/// Error text in the gateway's wire format keeps its category; any other
/// error text is a plain `tool_error`.
pub fn convert_result(tool: &str, result: CallToolResult) -> ToolResult {
    let text = result
        .content
        .iter()
        .filter_map(|content| match &content.raw {
            RawContent::Text(t) => Some(t.text.as_str()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("\n");

    if result.is_error.unwrap_or(false) {
        return match WireToolError::parse(&text) {
            Some(wire) => {
                let failed = ToolResult::failure(tool, wire.kind, wire.message);
                match wire.status {
                    Some(status) => failed.with_upstream_status(status),
                    None => failed,
                }
            }
            None => ToolResult::failure(tool, ToolErrorKind::ToolError, text),
        };
    }

    let payload = result
        .structured_content
        .unwrap_or_else(|| serde_json::from_str(&text).unwrap_or(Value::String(text)));
    ToolResult::success(tool, payload)
}
