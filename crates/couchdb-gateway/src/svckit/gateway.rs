//! Tool Gateway
//!
//! Maps validated operations onto the client and shapes the outcome into the
//! tool contract. `execute` is the only place that talks to the client.

use std::sync::Arc;

use agent_core::{ToolCall, ToolErrorKind, ToolResult};
use serde_json::Value;

use super::ops::{GatewayLimits, GatewayOp, GatewayTool};
use crate::client::DbClient;
use crate::config::CouchConfig;
use crate::error::Result;
use crate::refs::{DbPath, FindPath, QueryParams};

pub struct ToolGateway {
    client: Arc<dyn DbClient>,
    limits: GatewayLimits,
}

impl ToolGateway {
    pub fn new(client: Arc<dyn DbClient>, limits: GatewayLimits) -> Self {
        Self { client, limits }
    }

    pub fn from_config(client: Arc<dyn DbClient>, config: &CouchConfig) -> Self {
        Self::new(
            client,
            GatewayLimits {
                max_limit: config.max_limit,
            },
        )
    }

    pub const fn limits(&self) -> GatewayLimits {
        self.limits
    }

    /// Handle one tool call. Never fails; errors come back inside the result.
    pub async fn call(&self, call: &ToolCall) -> ToolResult {
        let result = self.call_inner(call).await;
        match &call.id {
            Some(id) => result.with_id(id.clone()),
            None => result,
        }
    }

    async fn call_inner(&self, call: &ToolCall) -> ToolResult {
        let Some(tool) = GatewayTool::from_name(&call.name) else {
            tracing::warn!(tool = %call.name, "unknown gateway tool requested");
            return ToolResult::failure(
                &call.name,
                ToolErrorKind::UnknownTool,
                format!("unknown tool: {}", call.name),
            );
        };

        let op = match GatewayOp::parse(tool, &call.arguments, self.limits) {
            Ok(op) => op,
            Err(e) => {
                tracing::debug!(tool = tool.name(), error = %e, "rejected arguments");
                return e.into_tool_result(tool.name());
            }
        };

        match self.execute(&op).await {
            Ok(payload) => {
                tracing::debug!(tool = tool.name(), "gateway call succeeded");
                ToolResult::success(tool.name(), payload)
            }
            Err(e) => {
                tracing::warn!(tool = tool.name(), error = %e, "gateway call failed");
                e.into_tool_result(tool.name())
            }
        }
    }

    /// Run a validated operation against the database
    pub async fn execute(&self, op: &GatewayOp) -> Result<Value> {
        match op {
            GatewayOp::ListDatabases => self.client.get(&DbPath::AllDbs, &QueryParams::new()).await,
            GatewayOp::DbInfo { db } => {
                self.client
                    .get(&DbPath::Database(db.clone()), &QueryParams::new())
                    .await
            }
            GatewayOp::GetDocument {
                db,
                doc_id,
                include_attachments,
                include_revs,
            } => {
                let mut query = QueryParams::new();
                if *include_attachments {
                    query.push("attachments", "true");
                }
                if *include_revs {
                    query.push("revs", "true");
                }
                self.client
                    .get(&DbPath::Document(db.clone(), doc_id.clone()), &query)
                    .await
            }
            GatewayOp::ListDocuments {
                db,
                include_docs,
                limit,
                skip,
                startkey,
                endkey,
            } => {
                let mut query = QueryParams::new();
                query.push("limit", limit.to_string());
                query.push("skip", skip.to_string());
                query.push("include_docs", if *include_docs { "true" } else { "false" });
                if let Some(key) = startkey {
                    query.push("startkey", key.to_string());
                }
                if let Some(key) = endkey {
                    query.push("endkey", key.to_string());
                }
                self.client.get(&DbPath::AllDocs(db.clone()), &query).await
            }
            GatewayOp::MangoFind { db, query } => {
                self.client
                    .post_read(&FindPath(db.clone()), &query.to_body())
                    .await
            }
        }
    }
}
