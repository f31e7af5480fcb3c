//! # session-orchestrator
//!
//! Runs one SupportOps investigation: opens the tool providers a session
//! needs, hands their combined tools to an agent runtime under a turn cap,
//! and releases every provider again on the way out.
//!
//! ```text
//!   ProviderSpec ──▶ SessionOrchestrator::acquire ──▶ ProviderHandle ×N
//!                                                       │
//!   AgentRuntime ◀── ToolRegistry ({provider}__{tool}) ◀┘
//!        │
//!        ▼
//!   SessionOutcome { InvestigationReport, Verdict, teardown errors }
//! ```

pub mod catalog;
pub mod credentials;
pub mod error;
pub mod local;
pub mod orchestrator;
pub mod prompt;
pub mod provider;
pub mod report;
pub mod stdio;
pub mod tool_adapter;

pub use catalog::{CatalogOptions, standard_specs};
pub use credentials::{CredentialRequirement, CredentialStore, ResolvedCredentials, preflight};
pub use error::{ConfigError, ProviderError, Result, SessionError, TeardownError};
pub use local::GatewayConnector;
pub use orchestrator::{
    SessionConfig, SessionOrchestrator, SessionOutcome, SessionPhase, SessionStatus,
};
pub use prompt::SUPPORTOPS_PROMPT;
pub use provider::{ProviderConnection, ProviderConnector, ProviderHandle, ProviderSpec};
pub use report::{Confidence, InvestigationReport, Verdict};
pub use stdio::StdioConnector;
pub use tool_adapter::{ProviderTool, namespaced};
