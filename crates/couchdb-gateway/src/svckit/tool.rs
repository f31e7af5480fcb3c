//! CouchDB tools for the agent tool registry

use std::sync::Arc;

use agent_core::{Result as CoreResult, Tool, ToolCall, ToolResult, ToolSchema};
use async_trait::async_trait;

use super::gateway::ToolGateway;
use super::ops::GatewayTool;

/// One gateway operation exposed as an `agent_core::Tool`
pub struct CouchTool {
    tool: GatewayTool,
    gateway: Arc<ToolGateway>,
}

impl CouchTool {
    pub const fn new(tool: GatewayTool, gateway: Arc<ToolGateway>) -> Self {
        Self { tool, gateway }
    }
}

#[async_trait]
impl Tool for CouchTool {
    fn schema(&self) -> ToolSchema {
        self.tool.schema()
    }

    async fn execute(&self, call: &ToolCall) -> CoreResult<ToolResult> {
        Ok(self.gateway.call(call).await)
    }
}

/// All five tools sharing one gateway
pub fn couch_tools(gateway: &Arc<ToolGateway>) -> Vec<Arc<dyn Tool>> {
    GatewayTool::ALL
        .into_iter()
        .map(|tool| Arc::new(CouchTool::new(tool, gateway.clone())) as Arc<dyn Tool>)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MockDbClient;
    use crate::svckit::GatewayLimits;
    use agent_core::{ToolErrorKind, ToolRegistry};
    use serde_json::{Map, json};

    #[tokio::test]
    async fn test_registry_dispatch_through_gateway() {
        let client = Arc::new(MockDbClient::new().with_json("/_all_dbs", json!(["users"])));
        let gateway = Arc::new(ToolGateway::new(client, GatewayLimits::default()));

        let mut registry = ToolRegistry::new();
        for tool in couch_tools(&gateway) {
            registry.try_register(tool).unwrap();
        }
        assert_eq!(registry.len(), 5);

        let ok = registry
            .dispatch(&ToolCall::new("list_databases", Map::new()))
            .await;
        assert_eq!(ok.payload(), Some(&json!(["users"])));

        let missing = registry
            .dispatch(&ToolCall::new("db_info", Map::new()))
            .await;
        assert_eq!(missing.error_kind(), Some(ToolErrorKind::InvalidArguments));
    }
}
