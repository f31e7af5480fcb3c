//! Acquisition, rollback and teardown with fake providers and a scripted runtime.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use agent_core::{
    AgentError, AgentRuntime, RunOutcome, RunStatus, ToolCall, ToolErrorKind, ToolRegistry,
    ToolResult, ToolSchema,
};
use async_trait::async_trait;
use couchdb_gateway::{GatewayLimits, MockDbClient};
use serde_json::{Map, Value, json};
use session_orchestrator::{
    Confidence, CredentialRequirement, CredentialStore, GatewayConnector, ProviderConnection,
    ProviderConnector, ProviderError, ProviderSpec, ResolvedCredentials, SessionConfig,
    SessionError, SessionOrchestrator, SessionPhase, SessionStatus, Verdict,
};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

type Log = Arc<Mutex<Vec<String>>>;

fn events(log: &Log) -> Vec<String> {
    log.lock().unwrap().clone()
}

#[derive(Clone, Copy, Default)]
enum Behaviour {
    #[default]
    Healthy,
    FailOpen,
    HangOpen,
    FailClose,
    BrokenCalls,
}

struct FakeConnector {
    log: Log,
    behaviour: Behaviour,
}

#[async_trait]
impl ProviderConnector for FakeConnector {
    async fn open(
        &self,
        provider: &str,
        _credentials: &ResolvedCredentials,
    ) -> Result<Box<dyn ProviderConnection>, ProviderError> {
        match self.behaviour {
            Behaviour::FailOpen => {
                self.log.lock().unwrap().push(format!("open-failed:{provider}"));
                return Err(ProviderError::Handshake("server exited".into()));
            }
            Behaviour::HangOpen => {
                tokio::time::sleep(Duration::from_secs(30)).await;
            }
            _ => {}
        }
        self.log.lock().unwrap().push(format!("open:{provider}"));
        Ok(Box::new(FakeConnection {
            provider: provider.to_string(),
            log: self.log.clone(),
            behaviour: self.behaviour,
        }))
    }

    fn describe(&self) -> String {
        "fake".into()
    }
}

struct FakeConnection {
    provider: String,
    log: Log,
    behaviour: Behaviour,
}

#[async_trait]
impl ProviderConnection for FakeConnection {
    fn tools(&self) -> Vec<ToolSchema> {
        vec![ToolSchema::from_json_schema("lookup", "Look up a customer", &Map::new())]
    }

    async fn call(
        &self,
        tool: &str,
        _arguments: Map<String, Value>,
    ) -> Result<ToolResult, ProviderError> {
        self.log
            .lock()
            .unwrap()
            .push(format!("call:{}:{tool}", self.provider));
        if matches!(self.behaviour, Behaviour::BrokenCalls) {
            return Err(ProviderError::Call("connection reset".into()));
        }
        Ok(ToolResult::success(tool, json!({"provider": self.provider})))
    }

    async fn close(self: Box<Self>) -> Result<(), ProviderError> {
        self.log.lock().unwrap().push(format!("close:{}", self.provider));
        if matches!(self.behaviour, Behaviour::FailClose) {
            return Err(ProviderError::Close("broken pipe".into()));
        }
        Ok(())
    }
}

fn fake(name: &str, log: &Log, behaviour: Behaviour) -> ProviderSpec {
    ProviderSpec::new(
        name,
        Arc::new(FakeConnector {
            log: log.clone(),
            behaviour,
        }),
    )
}

const REPORT: &str = r#"{"customer": {"name_or_id": "cus_123", "status": "active"}, "issues": [], "next_steps": [], "open_questions": [], "confidence": "high"}"#;

/// Calls the given tools in one turn, then answers or keeps going
struct ScriptedRuntime {
    calls: Vec<&'static str>,
    answer: Option<&'static str>,
    fail: bool,
}

impl ScriptedRuntime {
    fn answering(calls: Vec<&'static str>) -> Self {
        Self {
            calls,
            answer: Some(REPORT),
            fail: false,
        }
    }
}

#[async_trait]
impl AgentRuntime for ScriptedRuntime {
    async fn run(
        &self,
        _goal: &str,
        tools: &ToolRegistry,
        max_turns: usize,
    ) -> agent_core::Result<RunOutcome> {
        if self.fail {
            return Err(AgentError::ProviderUnavailable("model endpoint down".into()));
        }

        let mut tool_results = Vec::new();
        for name in &self.calls {
            tool_results.push(tools.dispatch(&ToolCall::new(*name, Map::new())).await);
        }

        Ok(match self.answer {
            Some(answer) => RunOutcome {
                status: RunStatus::Completed,
                final_output: Some(answer.into()),
                last_response: Some(answer.into()),
                turns: 2,
                tool_results,
            },
            None => RunOutcome {
                status: RunStatus::TurnCapExceeded,
                final_output: None,
                last_response: Some(
                    "Stripe shows the subscription past_due.\n```tool\n{\"tool\": \"zendesk__lookup\"}\n```"
                        .into(),
                ),
                turns: max_turns,
                tool_results,
            },
        })
    }
}

/// Calls one tool, then never answers
struct StallingRuntime {
    started: Arc<Notify>,
}

#[async_trait]
impl AgentRuntime for StallingRuntime {
    async fn run(
        &self,
        _goal: &str,
        tools: &ToolRegistry,
        _max_turns: usize,
    ) -> agent_core::Result<RunOutcome> {
        tools
            .dispatch(&ToolCall::new("stripe__lookup", Map::new()))
            .await;
        self.started.notify_one();
        std::future::pending().await
    }
}

fn session() -> SessionOrchestrator {
    SessionOrchestrator::new(SessionConfig::default(), CredentialStore::default())
}

#[tokio::test]
async fn test_full_session_closes_in_reverse_order() {
    let log = Log::default();
    let specs = [
        fake("couchdb", &log, Behaviour::Healthy),
        fake("stripe", &log, Behaviour::Healthy),
        fake("zendesk", &log, Behaviour::Healthy),
    ];
    let runtime = ScriptedRuntime::answering(vec!["stripe__lookup", "zendesk__lookup"]);

    let mut session = session();
    let outcome = session.execute(&specs, &runtime, "cus_123 lost premium").await.unwrap();

    assert_eq!(outcome.status, SessionStatus::Completed);
    assert_eq!(outcome.verdict, Verdict::NoIssueFound);
    assert!(outcome.answered());
    assert!(outcome.teardown_errors.is_empty());
    assert_eq!(session.phase(), SessionPhase::Closed);

    assert_eq!(
        events(&log),
        [
            "open:couchdb",
            "open:stripe",
            "open:zendesk",
            "call:stripe:lookup",
            "call:zendesk:lookup",
            "close:zendesk",
            "close:stripe",
            "close:couchdb",
        ]
    );
}

#[tokio::test]
async fn test_failed_open_rolls_back_and_stops() {
    let log = Log::default();
    let specs = [
        fake("couchdb", &log, Behaviour::Healthy),
        fake("stripe", &log, Behaviour::Healthy),
        fake("zendesk", &log, Behaviour::FailOpen),
        fake("jira", &log, Behaviour::Healthy),
    ];

    let mut session = session();
    let err = session.acquire(&specs).await.unwrap_err();

    assert_eq!(err.provider(), Some("zendesk"));
    assert!(matches!(err, SessionError::Acquisition { .. }));
    assert_eq!(
        events(&log),
        [
            "open:couchdb",
            "open:stripe",
            "open-failed:zendesk",
            "close:stripe",
            "close:couchdb",
        ]
    );
    assert_eq!(session.phase(), SessionPhase::Closed);
}

#[tokio::test]
async fn test_missing_credential_rolls_back_earlier_providers() {
    let log = Log::default();
    let specs = [
        fake("couchdb", &log, Behaviour::Healthy),
        fake("stripe", &log, Behaviour::Healthy).requires(CredentialRequirement::required(
            "STRIPE_API_KEY",
            "authenticating with Stripe",
        )),
        fake("zendesk", &log, Behaviour::Healthy),
    ];
    let store = CredentialStore::from_pairs([("ZENDESK_API_TOKEN", "tok")]);

    let mut session = SessionOrchestrator::new(SessionConfig::default(), store);
    let err = session.acquire(&specs).await.unwrap_err();

    assert_eq!(err.provider(), Some("stripe"));
    assert!(err.to_string().contains("stripe"));
    assert_eq!(events(&log), ["open:couchdb", "close:couchdb"]);
}

#[tokio::test]
async fn test_close_count_matches_open_count_despite_close_failure() {
    let log = Log::default();
    let specs = [
        fake("couchdb", &log, Behaviour::Healthy),
        fake("stripe", &log, Behaviour::FailClose),
        fake("zendesk", &log, Behaviour::Healthy),
    ];
    let runtime = ScriptedRuntime::answering(vec![]);

    let outcome = session().execute(&specs, &runtime, "cus_123").await.unwrap();

    let log = events(&log);
    let opens = log.iter().filter(|e| e.starts_with("open:")).count();
    let closes = log.iter().filter(|e| e.starts_with("close:")).count();
    assert_eq!(opens, 3);
    assert_eq!(closes, opens);

    assert_eq!(outcome.teardown_errors.len(), 1);
    assert_eq!(outcome.teardown_errors[0].provider, "stripe");
    assert_eq!(outcome.status, SessionStatus::Completed);
}

#[tokio::test]
async fn test_turn_cap_gives_low_confidence_report() {
    let log = Log::default();
    let specs = [fake("stripe", &log, Behaviour::Healthy)];
    let runtime = ScriptedRuntime {
        calls: vec!["stripe__lookup"],
        answer: None,
        fail: false,
    };

    let outcome = session().execute(&specs, &runtime, "cus_123").await.unwrap();

    assert_eq!(outcome.status, SessionStatus::TurnCapExceeded);
    assert_eq!(outcome.turns, session_orchestrator::orchestrator::DEFAULT_MAX_TURNS);
    assert_eq!(outcome.verdict, Verdict::Incomplete);
    assert_eq!(outcome.report.confidence, Confidence::Low);
    assert!(!outcome.answered());
    assert_eq!(events(&log).last().map(String::as_str), Some("close:stripe"));

    let questions = &outcome.report.open_questions;
    assert!(questions[0].contains("turn limit"));
    assert!(questions.iter().any(|q| q.contains("stripe__lookup")));
    assert!(questions.iter().any(|q| q.contains("past_due")));
}

#[tokio::test]
async fn test_runtime_failure_still_tears_down() {
    let log = Log::default();
    let specs = [
        fake("couchdb", &log, Behaviour::Healthy),
        fake("stripe", &log, Behaviour::Healthy),
    ];
    let runtime = ScriptedRuntime {
        calls: vec![],
        answer: None,
        fail: true,
    };

    let outcome = session().execute(&specs, &runtime, "cus_123").await.unwrap();

    assert_eq!(outcome.status, SessionStatus::RuntimeFailed);
    assert_eq!(outcome.verdict, Verdict::Incomplete);
    assert!(outcome.runtime_error.unwrap().contains("model endpoint down"));
    assert_eq!(
        events(&log),
        ["open:couchdb", "open:stripe", "close:stripe", "close:couchdb"]
    );
}

#[tokio::test]
async fn test_connection_failure_becomes_source_gap() {
    let log = Log::default();
    let specs = [
        fake("couchdb", &log, Behaviour::Healthy),
        fake("zendesk", &log, Behaviour::BrokenCalls),
    ];
    let runtime = ScriptedRuntime::answering(vec!["couchdb__lookup", "zendesk__lookup"]);

    let outcome = session().execute(&specs, &runtime, "cus_123").await.unwrap();

    assert_eq!(outcome.status, SessionStatus::Completed);
    assert_eq!(outcome.verdict, Verdict::Incomplete);
    assert_eq!(outcome.source_gaps.len(), 1);
    assert!(outcome.source_gaps[0].starts_with("zendesk"));
    assert!(
        outcome
            .report
            .open_questions
            .iter()
            .any(|q| q.contains("zendesk"))
    );
}

#[tokio::test]
async fn test_tools_after_close_report_provider_closed() {
    let log = Log::default();
    let specs = [fake("stripe", &log, Behaviour::Healthy)];

    let mut session = session();
    session.acquire(&specs).await.unwrap();
    let registry = session.tool_surface().unwrap();
    assert_eq!(registry.names(), ["stripe__lookup"]);

    let errors = session.teardown().await;
    assert!(errors.is_empty());

    let result = registry
        .dispatch(&ToolCall::new("stripe__lookup", Map::new()))
        .await;
    assert_eq!(result.error_kind(), Some(ToolErrorKind::ProviderClosed));
    assert!(!events(&log).iter().any(|e| e.starts_with("call:")));
}

#[tokio::test]
async fn test_connect_timeout_is_acquisition_error() {
    let log = Log::default();
    let specs = [
        fake("couchdb", &log, Behaviour::Healthy),
        fake("stripe", &log, Behaviour::HangOpen),
    ];
    let config = SessionConfig {
        connect_timeout: Duration::from_millis(50),
        ..SessionConfig::default()
    };

    let mut session = SessionOrchestrator::new(config, CredentialStore::default());
    let err = session.acquire(&specs).await.unwrap_err();

    match err {
        SessionError::Acquisition {
            provider, source, ..
        } => {
            assert_eq!(provider, "stripe");
            assert!(matches!(source, ProviderError::ConnectTimeout(_)));
        }
        other => panic!("expected acquisition error, got {other:?}"),
    }
    assert_eq!(events(&log), ["open:couchdb", "close:couchdb"]);
}

#[tokio::test]
async fn test_abort_before_run_tears_down() {
    let log = Log::default();
    let specs = [
        fake("couchdb", &log, Behaviour::Healthy),
        fake("stripe", &log, Behaviour::Healthy),
    ];
    let token = CancellationToken::new();
    let mut session = session().with_cancellation(token.clone());

    session.acquire(&specs).await.unwrap();
    token.cancel();
    let outcome = session
        .run(&ScriptedRuntime::answering(vec![]), "cus_123")
        .await
        .unwrap();

    assert_eq!(outcome.status, SessionStatus::Aborted);
    assert_eq!(outcome.verdict, Verdict::Incomplete);
    assert_eq!(
        events(&log),
        ["open:couchdb", "open:stripe", "close:stripe", "close:couchdb"]
    );
}

#[tokio::test]
async fn test_abort_while_agent_is_working_tears_down() {
    let log = Log::default();
    let specs = [
        fake("couchdb", &log, Behaviour::Healthy),
        fake("stripe", &log, Behaviour::Healthy),
    ];
    let token = CancellationToken::new();
    let started = Arc::new(Notify::new());
    let runtime = StallingRuntime {
        started: started.clone(),
    };

    let mut session = session().with_cancellation(token.clone());
    session.acquire(&specs).await.unwrap();

    let (outcome, ()) = tokio::join!(session.run(&runtime, "cus_123"), async {
        started.notified().await;
        token.cancel();
    });
    let outcome = outcome.unwrap();

    assert_eq!(outcome.status, SessionStatus::Aborted);
    assert_eq!(outcome.verdict, Verdict::Incomplete);
    assert!(outcome.final_output.is_none());
    assert!(!outcome.answered());
    assert_eq!(session.phase(), SessionPhase::Closed);
    assert_eq!(
        events(&log),
        [
            "open:couchdb",
            "open:stripe",
            "call:stripe:lookup",
            "close:stripe",
            "close:couchdb",
        ]
    );
}

#[tokio::test]
async fn test_abort_during_acquisition_opens_nothing_more() {
    let log = Log::default();
    let specs = [fake("couchdb", &log, Behaviour::Healthy)];
    let token = CancellationToken::new();
    token.cancel();

    let mut session = session().with_cancellation(token);
    let err = session.acquire(&specs).await.unwrap_err();

    assert!(matches!(err, SessionError::Aborted(SessionPhase::Acquiring)));
    assert!(events(&log).is_empty());
}

#[tokio::test]
async fn test_duplicate_providers_rejected_before_opening() {
    let log = Log::default();
    let specs = [
        fake("stripe", &log, Behaviour::Healthy),
        fake("stripe", &log, Behaviour::Healthy),
    ];

    let err = session().acquire(&specs).await.unwrap_err();
    assert!(matches!(err, SessionError::Config(_)));
    assert!(events(&log).is_empty());
}

#[tokio::test]
async fn test_acquire_twice_is_invalid_phase() {
    let log = Log::default();
    let specs = [fake("stripe", &log, Behaviour::Healthy)];

    let mut session = session();
    session.acquire(&specs).await.unwrap();
    let err = session.acquire(&specs).await.unwrap_err();
    assert!(matches!(err, SessionError::InvalidPhase(SessionPhase::Ready)));
    session.teardown().await;
}

#[tokio::test]
async fn test_in_process_couchdb_through_session() {
    let client = Arc::new(
        MockDbClient::new()
            .with_json("/_all_dbs", json!(["users", "orders"]))
            .with_status("/users/user%3Aalice", 404, r#"{"error":"not_found"}"#),
    );
    let specs = [ProviderSpec::new(
        "couchdb",
        Arc::new(GatewayConnector::with_client(client, GatewayLimits::default())),
    )];

    let mut session = session();
    session.acquire(&specs).await.unwrap();
    let registry = session.tool_surface().unwrap();
    assert_eq!(registry.len(), 5);

    let listed = registry
        .dispatch(&ToolCall::new("couchdb__list_databases", Map::new()))
        .await;
    assert_eq!(listed.payload(), Some(&json!(["users", "orders"])));

    let mut args = Map::new();
    args.insert("db".into(), json!("users"));
    args.insert("doc_id".into(), json!("user:alice"));
    let missing = registry
        .dispatch(&ToolCall::new("couchdb__get_document", args))
        .await;
    assert_eq!(missing.error_kind(), Some(ToolErrorKind::GatewayError));
    assert!(missing.error_message().unwrap().starts_with("404"));

    assert!(session.teardown().await.is_empty());
}
