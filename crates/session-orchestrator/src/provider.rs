//! Provider connections
//!
//! A [`ProviderSpec`] says how to reach a provider; opening it yields a
//! [`ProviderConnection`], which the session wraps in a [`ProviderHandle`].
//! The handle is shared by every tool the provider exposes and is closed
//! exactly once by the session.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::RwLock;

use agent_core::{ToolErrorKind, ToolResult, ToolSchema};

use crate::credentials::{CredentialRequirement, ResolvedCredentials};
use crate::error::ProviderError;

/// A live connection to one tool provider
#[async_trait]
pub trait ProviderConnection: Send + Sync {
    /// Tools under their provider-native names
    fn tools(&self) -> Vec<ToolSchema>;

    /// Invoke a native tool. `Err` means the connection itself failed;
    /// tool-level failures come back as a failed [`ToolResult`].
    async fn call(
        &self,
        tool: &str,
        arguments: Map<String, Value>,
    ) -> Result<ToolResult, ProviderError>;

    async fn close(self: Box<Self>) -> Result<(), ProviderError>;
}

/// Knows how to open one kind of provider
#[async_trait]
pub trait ProviderConnector: Send + Sync {
    async fn open(
        &self,
        provider: &str,
        credentials: &ResolvedCredentials,
    ) -> Result<Box<dyn ProviderConnection>, ProviderError>;

    /// Short description for logs
    fn describe(&self) -> String;
}

/// Static description of a provider a session may acquire
#[derive(Clone)]
pub struct ProviderSpec {
    pub name: String,
    pub requirements: Vec<CredentialRequirement>,
    pub connector: Arc<dyn ProviderConnector>,
}

impl ProviderSpec {
    pub fn new(name: impl Into<String>, connector: Arc<dyn ProviderConnector>) -> Self {
        Self {
            name: name.into(),
            requirements: Vec::new(),
            connector,
        }
    }

    #[must_use]
    pub fn requires(mut self, requirement: CredentialRequirement) -> Self {
        self.requirements.push(requirement);
        self
    }
}

impl fmt::Debug for ProviderSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderSpec")
            .field("name", &self.name)
            .field("requirements", &self.requirements)
            .field("connector", &self.connector.describe())
            .finish()
    }
}

struct HandleInner {
    name: String,
    tools: Vec<ToolSchema>,
    connection: RwLock<Option<Box<dyn ProviderConnection>>>,
    gaps: Mutex<Vec<String>>,
}

/// Shared handle to an open provider
///
/// Calls hold a read lock for their duration, so `close` waits for in-flight
/// calls and every call after it sees `provider_closed`.
#[derive(Clone)]
pub struct ProviderHandle {
    inner: Arc<HandleInner>,
}

impl fmt::Debug for ProviderHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderHandle")
            .field("name", &self.inner.name)
            .field("tools", &self.inner.tools.len())
            .finish_non_exhaustive()
    }
}

impl ProviderHandle {
    pub fn new(name: impl Into<String>, connection: Box<dyn ProviderConnection>) -> Self {
        let tools = connection.tools();
        Self {
            inner: Arc::new(HandleInner {
                name: name.into(),
                tools,
                connection: RwLock::new(Some(connection)),
                gaps: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Native tool schemas captured when the provider opened
    pub fn tools(&self) -> &[ToolSchema] {
        &self.inner.tools
    }

    pub async fn is_open(&self) -> bool {
        self.inner.connection.read().await.is_some()
    }

    /// Call a native tool; never fails, connection problems become results
    pub async fn call(&self, tool: &str, arguments: Map<String, Value>) -> ToolResult {
        let guard = self.inner.connection.read().await;
        let Some(connection) = guard.as_ref() else {
            return ToolResult::failure(
                tool,
                ToolErrorKind::ProviderClosed,
                format!("provider '{}' is closed", self.inner.name),
            );
        };

        let result = match connection.call(tool, arguments).await {
            Ok(result) => result,
            Err(err) => {
                tracing::warn!(provider = %self.inner.name, tool, error = %err, "provider call failed");
                ToolResult::failure(tool, ToolErrorKind::ProviderError, err.to_string())
            }
        };

        if result.is_source_failure() {
            self.record_gap(tool, result.error_message().unwrap_or("unavailable"));
        }
        result
    }

    /// Close the connection; later calls are no-ops
    pub async fn close(&self) -> Result<(), ProviderError> {
        let connection = self.inner.connection.write().await.take();
        match connection {
            Some(connection) => connection.close().await,
            None => Ok(()),
        }
    }

    /// Data sources that failed at the source level during the session
    pub fn source_gaps(&self) -> Vec<String> {
        self.inner
            .gaps
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn record_gap(&self, tool: &str, message: &str) {
        let entry = format!("{} ({tool}): {message}", self.inner.name);
        let mut gaps = self.inner.gaps.lock().unwrap_or_else(PoisonError::into_inner);
        if !gaps.contains(&entry) {
            gaps.push(entry);
        }
    }
}
