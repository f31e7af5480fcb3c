//! Backend selection from the environment.

use std::str::FromStr;
use std::sync::Arc;

use agent_core::{AgentError, LlmProvider, Result};

/// Which model backend drives the reasoning loop
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Backend {
    OpenAi,
    Ollama,
}

impl FromStr for Backend {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "ollama" => Ok(Self::Ollama),
            other => Err(AgentError::Config(format!(
                "unknown AGENT_BACKEND '{other}' (expected 'openai' or 'ollama')"
            ))),
        }
    }
}

/// A ready-to-use provider plus the model it should be asked for
pub struct ConfiguredBackend {
    pub provider: Arc<dyn LlmProvider>,
    pub model: String,
}

impl std::fmt::Debug for ConfiguredBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfiguredBackend")
            .field("provider", &self.provider.name())
            .field("model", &self.model)
            .finish()
    }
}

/// Runtime configuration, read once at startup
#[derive(Clone, Copy, Debug)]
pub struct RuntimeConfig {
    pub backend: Backend,
}

impl RuntimeConfig {
    pub fn from_env() -> Result<Self> {
        let backend = std::env::var("AGENT_BACKEND")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map_or(Ok(Backend::OpenAi), |v| v.parse())?;
        Ok(Self { backend })
    }

    /// Build the selected backend from its environment variables
    pub fn build(&self) -> Result<ConfiguredBackend> {
        match self.backend {
            #[cfg(feature = "openai")]
            Backend::OpenAi => {
                let provider = crate::openai::OpenAiProvider::from_env()?;
                let model = provider.config().model.clone();
                Ok(ConfiguredBackend {
                    provider: Arc::new(provider),
                    model,
                })
            }
            #[cfg(feature = "ollama")]
            Backend::Ollama => {
                let provider = crate::ollama::OllamaProvider::from_env();
                let model = provider.config().model.clone();
                Ok(ConfiguredBackend {
                    provider: Arc::new(provider),
                    model,
                })
            }
            #[allow(unreachable_patterns)]
            other => Err(AgentError::Config(format!(
                "backend {other:?} is not compiled into this build"
            ))),
        }
    }
}

#[cfg_attr(not(feature = "ollama"), allow(dead_code))]
pub(crate) fn env_or(key: &str, default: &str) -> String {
    lookup_or(|k| std::env::var(k).ok(), key, default)
}

pub(crate) fn lookup_or(
    lookup: impl Fn(&str) -> Option<String>,
    key: &str,
    default: &str,
) -> String {
    lookup(key)
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}
