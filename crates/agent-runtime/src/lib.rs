//! # agent-runtime
//!
//! Model backends for the SupportOps reasoning loop.
//!
//! ## Providers
//!
//! - **OpenAI** (default): any OpenAI-compatible chat-completions endpoint
//! - **Ollama**: local inference via Ollama
//!
//! ## Usage
//!
//! ```rust,ignore
//! use agent_runtime::RuntimeConfig;
//!
//! let backend = RuntimeConfig::from_env()?.build()?;
//! let agent = AgentBuilder::new()
//!     .provider(backend.provider)
//!     .model(backend.model)
//!     .build()?;
//! ```

pub mod config;

#[cfg(feature = "ollama")]
pub mod ollama;

#[cfg(feature = "openai")]
pub mod openai;

pub use config::{Backend, ConfiguredBackend, RuntimeConfig};

#[cfg(feature = "ollama")]
pub use ollama::OllamaProvider;

#[cfg(feature = "openai")]
pub use openai::OpenAiProvider;
