//! Tool System
//!
//! Tool contract shared by the reasoning loop and every tool provider.
//! Tools are registered at runtime and invoked by the reasoning loop through
//! [`ToolRegistry::dispatch`], which never fails: every problem is folded
//! into the returned [`ToolResult`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use std::fmt::{self, Write as _};
use std::sync::Arc;

use crate::error::{AgentError, Result};

/// Tool call request from the LLM
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Tool identifier
    #[serde(alias = "tool")]
    pub name: String,

    /// Arguments as key-value pairs
    #[serde(default)]
    pub arguments: Map<String, Value>,

    /// Optional call ID for tracking
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl ToolCall {
    pub fn new(name: impl Into<String>, arguments: Map<String, Value>) -> Self {
        Self {
            name: name.into(),
            arguments,
            id: None,
        }
    }

    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

/// Machine-readable category of a failed tool call
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolErrorKind {
    /// The database (or another upstream) answered with an error or was unreachable
    GatewayError,
    /// Arguments were missing, mistyped or out of range
    InvalidArguments,
    /// No tool with that name is registered
    UnknownTool,
    /// The provider connection failed while serving the call
    ProviderError,
    /// The provider owning the tool has already been closed
    ProviderClosed,
    /// The tool ran and reported a failure of its own
    ToolError,
}

impl ToolErrorKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::GatewayError => "gateway_error",
            Self::InvalidArguments => "invalid_arguments",
            Self::UnknownTool => "unknown_tool",
            Self::ProviderError => "provider_error",
            Self::ProviderClosed => "provider_closed",
            Self::ToolError => "tool_error",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "gateway_error" => Self::GatewayError,
            "invalid_arguments" => Self::InvalidArguments,
            "unknown_tool" => Self::UnknownTool,
            "provider_error" => Self::ProviderError,
            "provider_closed" => Self::ProviderClosed,
            "tool_error" => Self::ToolError,
            _ => return None,
        })
    }
}

impl fmt::Display for ToolErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Either a JSON payload or a categorized error; never both.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ToolOutcome {
    Ok {
        payload: Value,
    },
    Err {
        kind: ToolErrorKind,
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        upstream_status: Option<u16>,
    },
}

/// Result from tool execution
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    /// Tool that was called
    pub name: String,

    /// Call ID (if provided in request)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(flatten)]
    pub outcome: ToolOutcome,
}

impl ToolResult {
    pub fn success(name: impl Into<String>, payload: Value) -> Self {
        Self {
            name: name.into(),
            id: None,
            outcome: ToolOutcome::Ok { payload },
        }
    }

    pub fn failure(name: impl Into<String>, kind: ToolErrorKind, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: None,
            outcome: ToolOutcome::Err {
                kind,
                message: message.into(),
                upstream_status: None,
            },
        }
    }

    /// Attach the upstream HTTP status to a failure. No-op on success.
    #[must_use]
    pub fn with_upstream_status(mut self, status: u16) -> Self {
        if let ToolOutcome::Err {
            upstream_status, ..
        } = &mut self.outcome
        {
            *upstream_status = Some(status);
        }
        self
    }

    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub const fn is_ok(&self) -> bool {
        matches!(self.outcome, ToolOutcome::Ok { .. })
    }

    pub const fn payload(&self) -> Option<&Value> {
        match &self.outcome {
            ToolOutcome::Ok { payload } => Some(payload),
            ToolOutcome::Err { .. } => None,
        }
    }

    pub const fn error_kind(&self) -> Option<ToolErrorKind> {
        match &self.outcome {
            ToolOutcome::Ok { .. } => None,
            ToolOutcome::Err { kind, .. } => Some(*kind),
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match &self.outcome {
            ToolOutcome::Ok { .. } => None,
            ToolOutcome::Err { message, .. } => Some(message),
        }
    }

    /// True when the failure means a data source could not be consulted at all,
    /// as opposed to the source answering "no such thing".
    pub const fn is_source_failure(&self) -> bool {
        match &self.outcome {
            ToolOutcome::Ok { .. } => false,
            ToolOutcome::Err {
                kind: ToolErrorKind::ProviderError | ToolErrorKind::ProviderClosed,
                ..
            } => true,
            ToolOutcome::Err {
                kind: ToolErrorKind::GatewayError,
                upstream_status,
                ..
            } => match upstream_status {
                None => true,
                Some(status) => *status >= 500,
            },
            ToolOutcome::Err { .. } => false,
        }
    }

    /// Text fed back to the model.
    pub fn render(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            format!(
                "{{\"name\":{:?},\"status\":\"err\",\"kind\":\"tool_error\",\"message\":{:?}}}",
                self.name,
                e.to_string()
            )
        })
    }
}

/// Parameter definition for tool schema
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParameterSchema {
    /// Parameter name
    pub name: String,

    /// JSON Schema type (string, integer, boolean, object, array)
    #[serde(rename = "type")]
    pub param_type: String,

    /// Human-readable description
    pub description: String,

    /// Whether this parameter is required
    #[serde(default)]
    pub required: bool,

    /// Default value if not provided
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,

    /// Enum of allowed values
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<Value>>,
}

impl ParameterSchema {
    pub fn required(
        name: impl Into<String>,
        param_type: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            param_type: param_type.into(),
            description: description.into(),
            required: true,
            default: None,
            enum_values: None,
        }
    }

    pub fn optional(
        name: impl Into<String>,
        param_type: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            required: false,
            ..Self::required(name, param_type, description)
        }
    }

    #[must_use]
    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    fn property(&self) -> Value {
        let mut prop = Map::new();
        if self.param_type != "any" {
            prop.insert("type".into(), Value::String(self.param_type.clone()));
        }
        prop.insert("description".into(), Value::String(self.description.clone()));
        if let Some(default) = &self.default {
            prop.insert("default".into(), default.clone());
        }
        if let Some(values) = &self.enum_values {
            prop.insert("enum".into(), Value::Array(values.clone()));
        }
        Value::Object(prop)
    }
}

/// Tool definition schema (for LLM function calling)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolSchema {
    /// Unique tool identifier
    pub name: String,

    /// Human-readable description (shown to LLM)
    pub description: String,

    /// Parameter definitions
    pub parameters: Vec<ParameterSchema>,

    /// Category for grouping
    #[serde(default)]
    pub category: Option<String>,

    /// Whether tool has side effects
    #[serde(default)]
    pub has_side_effects: bool,
}

impl ToolSchema {
    /// JSON Schema object describing the arguments.
    pub fn input_schema(&self) -> Value {
        let properties: Map<String, Value> = self
            .parameters
            .iter()
            .map(|p| (p.name.clone(), p.property()))
            .collect();
        let required: Vec<Value> = self
            .parameters
            .iter()
            .filter(|p| p.required)
            .map(|p| Value::String(p.name.clone()))
            .collect();

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
            "additionalProperties": false,
        })
    }

    /// Rebuild a schema from a JSON Schema object received over the wire.
    pub fn from_json_schema(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: &Map<String, Value>,
    ) -> Self {
        let required: Vec<&str> = input_schema
            .get("required")
            .and_then(Value::as_array)
            .map(|names| names.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();

        let parameters = input_schema
            .get("properties")
            .and_then(Value::as_object)
            .map(|props| {
                props
                    .iter()
                    .map(|(pname, prop)| ParameterSchema {
                        name: pname.clone(),
                        param_type: json_type_of(prop),
                        description: prop
                            .get("description")
                            .and_then(Value::as_str)
                            .unwrap_or_default()
                            .to_string(),
                        required: required.contains(&pname.as_str()),
                        default: prop.get("default").cloned(),
                        enum_values: prop.get("enum").and_then(Value::as_array).cloned(),
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self {
            name: name.into(),
            description: description.into(),
            parameters,
            category: None,
            has_side_effects: false,
        }
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

fn json_type_of(prop: &Value) -> String {
    match prop.get("type") {
        Some(Value::String(t)) => t.clone(),
        Some(Value::Array(types)) => types
            .iter()
            .filter_map(Value::as_str)
            .find(|t| *t != "null")
            .unwrap_or("any")
            .to_string(),
        _ => "any".into(),
    }
}

/// Tool trait - implement to add new capabilities
#[async_trait]
pub trait Tool: Send + Sync {
    /// Get the tool's schema for LLM function calling
    fn schema(&self) -> ToolSchema;

    /// Execute the tool with given arguments
    async fn execute(&self, call: &ToolCall) -> Result<ToolResult>;

    /// Validate arguments before execution (optional)
    fn validate(&self, call: &ToolCall) -> Result<()> {
        let schema = self.schema();

        for param in &schema.parameters {
            let present = call
                .arguments
                .get(&param.name)
                .is_some_and(|v| !v.is_null());
            if param.required && !present {
                return Err(AgentError::ToolValidation(format!(
                    "Missing required parameter: {}",
                    param.name
                )));
            }
        }

        Ok(())
    }
}

/// Registry for available tools
#[derive(Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new tool, replacing any tool of the same name
    pub fn register<T: Tool + 'static>(&mut self, tool: T) {
        self.register_boxed(Arc::new(tool));
    }

    /// Register a shared tool, replacing any tool of the same name
    pub fn register_boxed(&mut self, tool: Arc<dyn Tool>) {
        let schema = tool.schema();
        self.tools.insert(schema.name, tool);
    }

    /// Register a shared tool, refusing to shadow an existing name
    pub fn try_register(&mut self, tool: Arc<dyn Tool>) -> Result<()> {
        let name = tool.schema().name;
        if self.tools.contains_key(&name) {
            return Err(AgentError::DuplicateTool(name));
        }
        self.tools.insert(name, tool);
        Ok(())
    }

    /// Get a tool by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Execute a tool call, propagating lookup and validation errors
    pub async fn execute(&self, call: &ToolCall) -> Result<ToolResult> {
        let tool = self
            .get(&call.name)
            .ok_or_else(|| AgentError::ToolNotFound(call.name.clone()))?;

        tool.validate(call)?;
        tool.execute(call).await
    }

    /// Execute a tool call, folding every failure into the result
    pub async fn dispatch(&self, call: &ToolCall) -> ToolResult {
        let result = match self.execute(call).await {
            Ok(result) => result,
            Err(err) => {
                tracing::debug!(tool = %call.name, error = %err, "tool call failed");
                let kind = match &err {
                    AgentError::ToolNotFound(_) => ToolErrorKind::UnknownTool,
                    AgentError::ToolValidation(_) => ToolErrorKind::InvalidArguments,
                    AgentError::ProviderUnavailable(_) | AgentError::Io(_) => {
                        ToolErrorKind::ProviderError
                    }
                    _ => ToolErrorKind::ToolError,
                };
                ToolResult::failure(&call.name, kind, err.to_string())
            }
        };

        match (&call.id, &result.id) {
            (Some(id), None) => result.with_id(id.clone()),
            _ => result,
        }
    }

    /// Get all tool schemas (for system prompt generation), sorted by name
    pub fn schemas(&self) -> Vec<ToolSchema> {
        self.tools.values().map(|t| t.schema()).collect()
    }

    /// Get tool names, sorted
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(String::as_str).collect()
    }

    /// Number of registered tools
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Generate system prompt section describing available tools
    pub fn generate_prompt_section(&self) -> String {
        let mut prompt = String::from("## Available Tools\n\n");
        prompt.push_str("You can use the following tools by responding with a JSON block:\n\n");
        prompt.push_str(
            "```tool\n{\"tool\": \"tool_name\", \"arguments\": {\"arg\": \"value\"}}\n```\n\n",
        );
        prompt.push_str(
            "Several tool blocks in one reply are run together. \
             Reply without any tool block once you have the final answer.\n\n",
        );

        for schema in self.schemas() {
            let _ = writeln!(prompt, "### {}", schema.name);
            let _ = writeln!(prompt, "{}", schema.description);

            if !schema.parameters.is_empty() {
                prompt.push_str("**Parameters:**\n");
                for param in &schema.parameters {
                    let required = if param.required { " (required)" } else { "" };
                    let _ = writeln!(
                        prompt,
                        "- `{}` ({}){}: {}",
                        param.name, param.param_type, required, param.description
                    );
                }
            }
            prompt.push('\n');
        }

        prompt
    }
}
