//! Provider Tool Adapter
//!
//! Exposes each provider-native tool in the session registry as
//! `{provider}__{tool}`. The native name is kept for the call itself.

use std::sync::Arc;

use async_trait::async_trait;

use agent_core::{Result as CoreResult, Tool, ToolCall, ToolResult, ToolSchema};

use crate::provider::ProviderHandle;

const NAMESPACE_SEPARATOR: &str = "__";

/// Namespaced name the model sees
pub fn namespaced(provider: &str, tool: &str) -> String {
    format!("{provider}{NAMESPACE_SEPARATOR}{tool}")
}

/// Adapter routing one namespaced tool to its provider
pub struct ProviderTool {
    handle: ProviderHandle,
    native_name: String,
    schema: ToolSchema,
}

impl ProviderTool {
    pub fn new(handle: ProviderHandle, native: ToolSchema) -> Self {
        let exposed = namespaced(handle.name(), &native.name);
        Self {
            native_name: native.name.clone(),
            schema: native.with_name(exposed),
            handle,
        }
    }

    pub fn provider(&self) -> &str {
        self.handle.name()
    }

    pub fn native_name(&self) -> &str {
        &self.native_name
    }
}

#[async_trait]
impl Tool for ProviderTool {
    fn schema(&self) -> ToolSchema {
        self.schema.clone()
    }

    async fn execute(&self, call: &ToolCall) -> CoreResult<ToolResult> {
        let mut result = self
            .handle
            .call(&self.native_name, call.arguments.clone())
            .await;

        result.name.clone_from(&self.schema.name);
        if let Some(id) = &call.id {
            result = result.with_id(id.clone());
        }
        Ok(result)
    }
}

/// Every tool of one provider, ready for registration
pub fn provider_tools(handle: &ProviderHandle) -> Vec<Arc<dyn Tool>> {
    handle
        .tools()
        .iter()
        .cloned()
        .map(|schema| Arc::new(ProviderTool::new(handle.clone(), schema)) as Arc<dyn Tool>)
        .collect()
}
