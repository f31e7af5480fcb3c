//! # agent-core
//!
//! Tool contract and bounded reasoning loop shared by every SupportOps crate.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                           Agent                              │
//! │  ┌─────────────┐   ┌──────────────┐   ┌──────────────────┐   │
//! │  │  Reasoning  │   │ ToolRegistry │   │   LlmProvider    │   │
//! │  │ loop (turn  │──▶│  dispatch()  │   │    (Strategy)    │   │
//! │  │    cap)     │   └──────┬───────┘   └──────────────────┘   │
//! │  └─────────────┘          │                                  │
//! └───────────────────────────┼──────────────────────────────────┘
//!                             ▼
//!                 Tool impls (gateway tools, provider adapters)
//! ```
//!
//! A tool call never raises: whatever goes wrong while dispatching it comes
//! back as a [`ToolResult`] carrying a [`ToolOutcome::Err`], so the reasoning
//! loop can feed it back to the model.

pub mod error;
pub mod message;
pub mod provider;
pub mod reasoning;
pub mod tool;

pub use error::{AgentError, Result};
pub use message::{Conversation, Message, Role};
pub use provider::LlmProvider;
pub use reasoning::{Agent, AgentBuilder, AgentConfig, AgentRuntime, RunOutcome, RunStatus};
pub use tool::{
    ParameterSchema, Tool, ToolCall, ToolErrorKind, ToolOutcome, ToolRegistry, ToolResult,
    ToolSchema,
};
