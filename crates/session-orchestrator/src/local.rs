//! In-process CouchDB provider
//!
//! Same tool surface as the `couchdb-mcp` binary, without a child process.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use agent_core::{ToolCall, ToolRegistry, ToolResult, ToolSchema};
use couchdb_gateway::{CouchConfig, DbClient, GatewayLimits, HttpDbClient, ToolGateway, couch_tools};

use crate::credentials::ResolvedCredentials;
use crate::error::ProviderError;
use crate::provider::{ProviderConnection, ProviderConnector};

#[derive(Clone, Default)]
pub struct GatewayConnector {
    fixed: Option<(Arc<dyn DbClient>, GatewayLimits)>,
}

impl GatewayConnector {
    /// Build an HTTP client from the resolved `COUCHDB_*` credentials
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a prepared client instead of reading credentials
    pub fn with_client(client: Arc<dyn DbClient>, limits: GatewayLimits) -> Self {
        Self {
            fixed: Some((client, limits)),
        }
    }
}

#[async_trait]
impl ProviderConnector for GatewayConnector {
    async fn open(
        &self,
        provider: &str,
        credentials: &ResolvedCredentials,
    ) -> Result<Box<dyn ProviderConnection>, ProviderError> {
        let gateway = match &self.fixed {
            Some((client, limits)) => ToolGateway::new(client.clone(), *limits),
            None => {
                let config = CouchConfig::from_lookup(|key| credentials.get(key).map(str::to_string))
                    .map_err(|e| ProviderError::Handshake(e.to_string()))?;
                let client = HttpDbClient::new(&config)
                    .map_err(|e| ProviderError::Handshake(e.to_string()))?;
                ToolGateway::from_config(Arc::new(client), &config)
            }
        };

        tracing::info!(provider, max_limit = gateway.limits().max_limit, "in-process CouchDB gateway ready");

        let mut registry = ToolRegistry::new();
        for tool in couch_tools(&Arc::new(gateway)) {
            registry
                .try_register(tool)
                .map_err(|e| ProviderError::Handshake(e.to_string()))?;
        }
        Ok(Box::new(GatewayConnection { registry }))
    }

    fn describe(&self) -> String {
        "in-process couchdb gateway".into()
    }
}

struct GatewayConnection {
    registry: ToolRegistry,
}

#[async_trait]
impl ProviderConnection for GatewayConnection {
    fn tools(&self) -> Vec<ToolSchema> {
        self.registry.schemas()
    }

    async fn call(
        &self,
        tool: &str,
        arguments: Map<String, Value>,
    ) -> Result<ToolResult, ProviderError> {
        Ok(self.registry.dispatch(&ToolCall::new(tool, arguments)).await)
    }

    async fn close(self: Box<Self>) -> Result<(), ProviderError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_core::ToolErrorKind;
    use couchdb_gateway::MockDbClient;
    use serde_json::json;

    #[tokio::test]
    async fn test_mock_backed_gateway_answers() {
        let client = Arc::new(MockDbClient::new().with_json("/_all_dbs", json!(["users"])));
        let connector = GatewayConnector::with_client(client, GatewayLimits::default());

        let conn = connector
            .open("couchdb", &ResolvedCredentials::default())
            .await
            .unwrap();
        assert_eq!(conn.tools().len(), 5);

        let result = conn.call("list_databases", Map::new()).await.unwrap();
        assert_eq!(result.payload(), Some(&json!(["users"])));

        let unknown = conn.call("delete_document", Map::new()).await.unwrap();
        assert_eq!(unknown.error_kind(), Some(ToolErrorKind::UnknownTool));

        let missing_db = conn.call("db_info", Map::new()).await.unwrap();
        assert_eq!(missing_db.error_kind(), Some(ToolErrorKind::InvalidArguments));
        conn.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_missing_url_fails_open() {
        let err = GatewayConnector::new()
            .open("couchdb", &ResolvedCredentials::default())
            .await
            .err()
            .unwrap();
        assert!(err.to_string().contains("COUCHDB_URL"));
    }
}
