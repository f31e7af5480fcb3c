//! Error Types for sessions and providers

use std::time::Duration;

use thiserror::Error;

use crate::orchestrator::SessionPhase;

pub type Result<T> = std::result::Result<T, SessionError>;

/// Problems found before any provider is touched
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("environment variable {variable} is required for {purpose} (provider '{provider}')")]
    MissingCredential {
        provider: String,
        variable: String,
        purpose: String,
    },

    #[error("provider '{0}' is listed more than once")]
    DuplicateProvider(String),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Failures of one provider connection
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to launch '{command}': {cause}")]
    Launch { command: String, cause: String },

    #[error("handshake failed: {0}")]
    Handshake(String),

    #[error("no connection after {0:?}")]
    ConnectTimeout(Duration),

    #[error("call failed: {0}")]
    Call(String),

    #[error("provider is closed")]
    Closed,

    #[error("close failed: {0}")]
    Close(String),
}

/// A provider that could not be released cleanly
#[derive(Error, Debug)]
#[error("failed to close provider '{provider}': {source}")]
pub struct TeardownError {
    pub provider: String,
    #[source]
    pub source: ProviderError,
}

#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A provider failed to open; everything opened before it was closed again
    #[error("provider '{provider}' failed to open: {source}")]
    Acquisition {
        provider: String,
        #[source]
        source: ProviderError,
        rollback_failures: Vec<TeardownError>,
    },

    #[error("operation not allowed while the session is {0:?}")]
    InvalidPhase(SessionPhase),

    #[error("could not assemble the tool surface: {0}")]
    ToolSurface(String),

    #[error("session aborted while {0:?}")]
    Aborted(SessionPhase),
}

impl SessionError {
    /// Name of the provider an acquisition failure refers to
    pub fn provider(&self) -> Option<&str> {
        match self {
            Self::Acquisition { provider, .. } => Some(provider),
            Self::Config(ConfigError::MissingCredential { provider, .. }) => Some(provider),
            _ => None,
        }
    }
}
