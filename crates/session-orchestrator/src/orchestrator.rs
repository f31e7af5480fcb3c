//! Session Orchestrator
//!
//! ```text
//!   Idle ──▶ Acquiring ──▶ Ready ──▶ Running ──▶ Closing ──▶ Closed
//!                │                                  ▲
//!                └──── failure: reverse rollback ───┘
//! ```
//!
//! Providers are opened one at a time in declaration order. If one fails,
//! everything opened before it is closed in reverse order and no later
//! provider is touched. Once a session has acquired its providers, teardown
//! always runs, whatever the agent run did.

use std::collections::BTreeSet;
use std::time::Duration;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use agent_core::{AgentRuntime, RunStatus, ToolRegistry};

use crate::credentials::CredentialStore;
use crate::error::{ConfigError, ProviderError, Result, SessionError, TeardownError};
use crate::provider::{ProviderHandle, ProviderSpec};
use crate::report::{self, InvestigationReport, Verdict};
use crate::tool_adapter::provider_tools;

pub const DEFAULT_MAX_TURNS: usize = 8;
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Idle,
    Acquiring,
    Ready,
    Running,
    Closing,
    Closed,
}

/// How the agent part of a session ended
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Completed,
    TurnCapExceeded,
    RuntimeFailed,
    Aborted,
}

#[derive(Clone, Debug)]
pub struct SessionConfig {
    pub max_turns: usize,
    /// Upper bound for opening one provider
    pub connect_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_turns: DEFAULT_MAX_TURNS,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

/// Everything a finished session reports
#[derive(Debug)]
pub struct SessionOutcome {
    pub session_id: Uuid,
    pub status: SessionStatus,
    pub final_output: Option<String>,
    pub report: InvestigationReport,
    pub verdict: Verdict,
    pub turns: usize,
    pub source_gaps: Vec<String>,
    pub runtime_error: Option<String>,
    pub teardown_errors: Vec<TeardownError>,
}

impl SessionOutcome {
    /// True when the agent produced a final answer
    pub fn answered(&self) -> bool {
        self.status == SessionStatus::Completed && self.final_output.is_some()
    }
}

enum OpenFailure {
    Provider(ProviderError),
    Aborted,
}

/// Owns the provider handles of one session
pub struct SessionOrchestrator {
    id: Uuid,
    config: SessionConfig,
    credentials: CredentialStore,
    cancel: CancellationToken,
    phase: SessionPhase,
    handles: Vec<ProviderHandle>,
}

impl SessionOrchestrator {
    pub fn new(config: SessionConfig, credentials: CredentialStore) -> Self {
        Self {
            id: Uuid::new_v4(),
            config,
            credentials,
            cancel: CancellationToken::new(),
            phase: SessionPhase::Idle,
            handles: Vec::new(),
        }
    }

    /// Abort the session when `token` is cancelled
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub const fn id(&self) -> Uuid {
        self.id
    }

    pub const fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub const fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Names of the providers currently held, in acquisition order
    pub fn providers(&self) -> Vec<&str> {
        self.handles.iter().map(ProviderHandle::name).collect()
    }

    /// Open every provider in order, or none of them
    pub async fn acquire(&mut self, specs: &[ProviderSpec]) -> Result<()> {
        if self.phase != SessionPhase::Idle {
            return Err(SessionError::InvalidPhase(self.phase));
        }

        let mut seen = BTreeSet::new();
        if let Some(dup) = specs.iter().find(|s| !seen.insert(s.name.as_str())) {
            return Err(ConfigError::DuplicateProvider(dup.name.clone()).into());
        }

        self.phase = SessionPhase::Acquiring;
        tracing::info!(session = %self.id, providers = specs.len(), "acquiring providers");

        for spec in specs {
            match self.open_one(spec).await {
                Ok(handle) => {
                    tracing::info!(session = %self.id, provider = %spec.name, tools = handle.tools().len(), "provider opened");
                    self.handles.push(handle);
                }
                Err(failure) => {
                    let rollback_failures = self.release_all().await;
                    self.phase = SessionPhase::Closed;
                    return Err(match failure {
                        OpenFailure::Aborted => {
                            tracing::warn!(session = %self.id, provider = %spec.name, "aborted during acquisition");
                            SessionError::Aborted(SessionPhase::Acquiring)
                        }
                        OpenFailure::Provider(source) => {
                            tracing::error!(session = %self.id, provider = %spec.name, error = %source, "provider failed to open");
                            SessionError::Acquisition {
                                provider: spec.name.clone(),
                                source,
                                rollback_failures,
                            }
                        }
                    });
                }
            }
        }

        self.phase = SessionPhase::Ready;
        Ok(())
    }

    async fn open_one(&self, spec: &ProviderSpec) -> std::result::Result<ProviderHandle, OpenFailure> {
        if self.cancel.is_cancelled() {
            return Err(OpenFailure::Aborted);
        }

        let credentials = self
            .credentials
            .resolve(&spec.name, &spec.requirements)
            .map_err(|e| OpenFailure::Provider(e.into()))?;

        tracing::debug!(provider = %spec.name, connector = %spec.connector.describe(), "opening provider");
        let timeout = self.config.connect_timeout;
        let connection = tokio::select! {
            biased;
            () = self.cancel.cancelled() => return Err(OpenFailure::Aborted),
            opened = tokio::time::timeout(timeout, spec.connector.open(&spec.name, &credentials)) => match opened {
                Ok(Ok(connection)) => connection,
                Ok(Err(e)) => return Err(OpenFailure::Provider(e)),
                Err(_) => return Err(OpenFailure::Provider(ProviderError::ConnectTimeout(timeout))),
            },
        };

        Ok(ProviderHandle::new(spec.name.clone(), connection))
    }

    /// Union of every provider's tools under namespaced names
    pub fn tool_surface(&self) -> Result<ToolRegistry> {
        if self.phase != SessionPhase::Ready {
            return Err(SessionError::InvalidPhase(self.phase));
        }

        let mut registry = ToolRegistry::new();
        for handle in &self.handles {
            for tool in provider_tools(handle) {
                registry
                    .try_register(tool)
                    .map_err(|e| SessionError::ToolSurface(e.to_string()))?;
            }
        }
        Ok(registry)
    }

    /// Run the agent against the acquired providers, then tear down
    ///
    /// Teardown happens on every path out of this method once the session
    /// is `Ready`.
    pub async fn run(&mut self, runtime: &dyn AgentRuntime, goal: &str) -> Result<SessionOutcome> {
        let registry = match self.tool_surface() {
            Ok(registry) => registry,
            Err(err) => {
                if self.phase == SessionPhase::Ready {
                    self.teardown().await;
                }
                return Err(err);
            }
        };

        self.phase = SessionPhase::Running;
        tracing::info!(session = %self.id, tools = registry.len(), max_turns = self.config.max_turns, "session running");

        let run = tokio::select! {
            biased;
            () = self.cancel.cancelled() => None,
            result = runtime.run(goal, &registry, self.config.max_turns) => Some(result),
        };
        drop(registry);

        let (status, final_output, turns, runtime_error, partial) = match run {
            None => {
                tracing::warn!(session = %self.id, "session aborted while running");
                (SessionStatus::Aborted, None, 0, None, Vec::new())
            }
            Some(Ok(outcome)) => {
                let (status, partial) = match outcome.status {
                    RunStatus::Completed => (SessionStatus::Completed, Vec::new()),
                    RunStatus::TurnCapExceeded => (
                        SessionStatus::TurnCapExceeded,
                        report::partial_findings(
                            outcome.last_response.as_deref(),
                            &outcome.tool_results,
                        ),
                    ),
                };
                (status, outcome.final_output, outcome.turns, None, partial)
            }
            Some(Err(err)) => {
                tracing::error!(session = %self.id, error = %err, "agent runtime failed");
                (SessionStatus::RuntimeFailed, None, 0, Some(err.to_string()), Vec::new())
            }
        };

        let source_gaps: Vec<String> = self
            .handles
            .iter()
            .flat_map(ProviderHandle::source_gaps)
            .collect();

        let teardown_errors = self.teardown().await;

        let (mut report, verdict) = report::assess(
            goal,
            status,
            final_output.as_deref(),
            turns,
            &source_gaps,
            runtime_error.as_deref(),
        );
        if !partial.is_empty() {
            report.mark_incomplete(partial);
        }

        tracing::info!(session = %self.id, ?status, %verdict, turns, gaps = source_gaps.len(), "session finished");

        Ok(SessionOutcome {
            session_id: self.id,
            status,
            final_output,
            report,
            verdict,
            turns,
            source_gaps,
            runtime_error,
            teardown_errors,
        })
    }

    /// Acquire, run and release in one call
    pub async fn execute(
        &mut self,
        specs: &[ProviderSpec],
        runtime: &dyn AgentRuntime,
        goal: &str,
    ) -> Result<SessionOutcome> {
        self.acquire(specs).await?;
        self.run(runtime, goal).await
    }

    /// Close every held provider in reverse order
    pub async fn teardown(&mut self) -> Vec<TeardownError> {
        if self.phase == SessionPhase::Closed {
            return Vec::new();
        }
        self.phase = SessionPhase::Closing;
        let errors = self.release_all().await;
        self.phase = SessionPhase::Closed;
        tracing::info!(session = %self.id, failures = errors.len(), "session closed");
        errors
    }

    async fn release_all(&mut self) -> Vec<TeardownError> {
        let mut errors = Vec::new();
        let timeout = self.config.connect_timeout;

        while let Some(handle) = self.handles.pop() {
            let closed = match tokio::time::timeout(timeout, handle.close()).await {
                Ok(result) => result,
                Err(_) => Err(ProviderError::Close(format!("no response after {timeout:?}"))),
            };
            match closed {
                Ok(()) => tracing::debug!(provider = %handle.name(), "provider closed"),
                Err(source) => {
                    tracing::warn!(provider = %handle.name(), error = %source, "provider close failed");
                    errors.push(TeardownError {
                        provider: handle.name().to_string(),
                        source,
                    });
                }
            }
        }

        errors
    }
}
