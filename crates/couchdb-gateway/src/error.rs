//! Error Types for the CouchDB gateway

use agent_core::{ToolErrorKind, ToolResult};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, GatewayError>;

#[derive(Error, Debug)]
pub enum GatewayError {
    /// CouchDB answered with a non-2xx status
    #[error("{status} {reason}: {body}")]
    Upstream {
        status: u16,
        reason: String,
        body: String,
    },

    /// Connection, DNS, TLS, timeout or body decoding failure
    #[error("transport error: {cause}")]
    Transport { cause: String },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl GatewayError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Fold into the tool contract, keeping the upstream status when there is one
    pub fn into_tool_result(self, tool: &str) -> ToolResult {
        match self {
            Self::Upstream { status, .. } => {
                ToolResult::failure(tool, ToolErrorKind::GatewayError, self.to_string())
                    .with_upstream_status(status)
            }
            Self::Transport { .. } => {
                ToolResult::failure(tool, ToolErrorKind::GatewayError, self.to_string())
            }
            Self::InvalidArgument(message) => {
                ToolResult::failure(tool, ToolErrorKind::InvalidArguments, message)
            }
            Self::UnknownTool(_) => {
                ToolResult::failure(tool, ToolErrorKind::UnknownTool, self.to_string())
            }
            Self::Config(_) => ToolResult::failure(tool, ToolErrorKind::ToolError, self.to_string()),
        }
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        let cause = if err.is_timeout() {
            format!("request timed out: {err}")
        } else if err.is_connect() {
            format!("connection failed: {err}")
        } else if err.is_decode() {
            format!("invalid JSON from CouchDB: {err}")
        } else {
            err.to_string()
        };
        Self::Transport { cause }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_message_starts_with_status() {
        let err = GatewayError::Upstream {
            status: 404,
            reason: "Not Found".into(),
            body: r#"{"error":"not_found","reason":"missing"}"#.into(),
        };
        let result = err.into_tool_result("get_document");
        assert_eq!(result.error_kind(), Some(ToolErrorKind::GatewayError));
        assert!(result.error_message().unwrap().starts_with("404 Not Found"));
        assert!(!result.is_source_failure());
    }

    #[test]
    fn test_transport_is_source_failure() {
        let err = GatewayError::Transport {
            cause: "connection refused".into(),
        };
        assert!(err.into_tool_result("list_databases").is_source_failure());
    }
}
