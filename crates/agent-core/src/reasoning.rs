//! Reasoning Loop
//!
//! ReAct-style loop: the model reasons, requests tools, reads their results
//! and eventually answers. A turn is one model completion plus the tool calls
//! it requested. The loop is bounded by a hard turn cap and reports hitting it
//! as an outcome, not an error.

use async_trait::async_trait;
use futures::future::join_all;
use serde::Serialize;
use std::sync::Arc;

use crate::error::{AgentError, Result};
use crate::message::{Conversation, Message};
use crate::provider::{GenerationOptions, LlmProvider};
use crate::tool::{ToolCall, ToolErrorKind, ToolRegistry, ToolResult};

/// Agent configuration
#[derive(Clone, Debug)]
pub struct AgentConfig {
    /// System prompt template
    pub system_prompt: String,

    pub generation: GenerationOptions,

    /// Whether to append tool descriptions to system prompt
    pub inject_tool_descriptions: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.into(),
            generation: GenerationOptions::default(),
            inject_tool_descriptions: true,
        }
    }
}

const DEFAULT_SYSTEM_PROMPT: &str = r#"You are a careful assistant with read-only tools.

When you need to use a tool, respond with a JSON block in this exact format:
```tool
{"tool": "tool_name", "arguments": {"arg1": "value1"}}
```

After receiving tool results, synthesize them into your answer.
If you can answer directly without tools, do so."#;

const TOOL_BLOCK_START: &str = "```tool";
const TOOL_BLOCK_END: &str = "```";

/// How a run ended
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// The model produced a reply without tool calls
    Completed,
    /// The turn cap was reached while the model still wanted tools
    TurnCapExceeded,
}

/// Result of one bounded agent run
#[derive(Clone, Debug)]
pub struct RunOutcome {
    pub status: RunStatus,
    /// Final answer; present only when `status` is `Completed`
    pub final_output: Option<String>,
    /// Last model reply, whatever it was
    pub last_response: Option<String>,
    pub turns: usize,
    /// Every tool result, in the order they were fed back
    pub tool_results: Vec<ToolResult>,
}

impl RunOutcome {
    pub const fn completed(&self) -> bool {
        matches!(self.status, RunStatus::Completed)
    }
}

/// Boundary between a session and whatever drives the conversation.
///
/// Receives the goal, the tool surface and a hard turn cap; returns the final
/// answer or a turn-cap outcome. Only model or transport failures are `Err`.
#[async_trait]
pub trait AgentRuntime: Send + Sync {
    async fn run(&self, goal: &str, tools: &ToolRegistry, max_turns: usize)
    -> Result<RunOutcome>;
}

/// The main Agent struct
pub struct Agent {
    provider: Arc<dyn LlmProvider>,
    config: AgentConfig,
}

impl Agent {
    pub fn new(provider: Arc<dyn LlmProvider>, config: AgentConfig) -> Self {
        Self { provider, config }
    }

    pub fn with_defaults(provider: Arc<dyn LlmProvider>) -> Self {
        Self::new(provider, AgentConfig::default())
    }

    /// Build the full system prompt including tool descriptions
    fn build_system_prompt(&self, tools: &ToolRegistry) -> String {
        let mut prompt = self.config.system_prompt.clone();

        if self.config.inject_tool_descriptions && !tools.is_empty() {
            prompt.push_str("\n\n");
            prompt.push_str(&tools.generate_prompt_section());
        }

        prompt
    }

    /// Run the loop over an existing conversation
    pub async fn run_conversation(
        &self,
        conversation: &mut Conversation,
        tools: &ToolRegistry,
        max_turns: usize,
    ) -> Result<RunOutcome> {
        let mut tool_results = Vec::new();
        let mut last_response = None;

        for turn in 1..=max_turns {
            conversation.truncate_to_fit();

            let completion = self
                .provider
                .complete(conversation.messages(), &self.config.generation)
                .await?;
            let content = completion.content;
            conversation.push(Message::assistant(content.clone()));

            let requested = parse_tool_calls(&content);
            if requested.is_empty() {
                tracing::debug!(turn, "model produced final answer");
                return Ok(RunOutcome {
                    status: RunStatus::Completed,
                    final_output: Some(content.clone()),
                    last_response: Some(content),
                    turns: turn,
                    tool_results,
                });
            }

            tracing::debug!(turn, calls = requested.len(), "dispatching tool calls");
            let results = join_all(requested.iter().map(|parsed| async move {
                match parsed {
                    Ok(call) => tools.dispatch(call).await,
                    Err(reason) => ToolResult::failure(
                        "tool",
                        ToolErrorKind::InvalidArguments,
                        format!("could not parse tool call: {reason}"),
                    ),
                }
            }))
            .await;

            for result in results {
                conversation.push(Message::tool(result.render(), result.id.clone()));
                tool_results.push(result);
            }
            last_response = Some(content);
        }

        tracing::warn!(max_turns, "turn cap reached before a final answer");
        Ok(RunOutcome {
            status: RunStatus::TurnCapExceeded,
            final_output: None,
            last_response,
            turns: max_turns,
            tool_results,
        })
    }

    /// Get configuration
    pub const fn config(&self) -> &AgentConfig {
        &self.config
    }
}

#[async_trait]
impl AgentRuntime for Agent {
    async fn run(
        &self,
        goal: &str,
        tools: &ToolRegistry,
        max_turns: usize,
    ) -> Result<RunOutcome> {
        tracing::info!(
            backend = self.provider.name(),
            tools = tools.len(),
            max_turns,
            "starting agent run"
        );
        let mut conversation = Conversation::with_system_prompt(self.build_system_prompt(tools));
        conversation.push(Message::user(goal));
        self.run_conversation(&mut conversation, tools, max_turns)
            .await
    }
}

/// Extract every ```tool block from a model reply. Falls back to a bare JSON
/// object with a "tool" key when no fenced block is present. Malformed blocks
/// come back as `Err` so the model can be told.
fn parse_tool_calls(content: &str) -> Vec<std::result::Result<ToolCall, String>> {
    let mut calls = Vec::new();
    let mut rest = content;

    while let Some(start_idx) = rest.find(TOOL_BLOCK_START) {
        let after_marker = &rest[start_idx + TOOL_BLOCK_START.len()..];
        let Some(end_idx) = after_marker.find(TOOL_BLOCK_END) else {
            calls.push(Err("unterminated tool block".to_string()));
            break;
        };
        let json_str = after_marker[..end_idx].trim();
        calls.push(
            serde_json::from_str::<ToolCall>(json_str)
                .map(with_call_id)
                .map_err(|e| e.to_string()),
        );
        rest = &after_marker[end_idx + TOOL_BLOCK_END.len()..];
    }

    if calls.is_empty()
        && let Some(call) = parse_inline_tool_call(content)
    {
        calls.push(Ok(with_call_id(call)));
    }

    calls
}

fn parse_inline_tool_call(content: &str) -> Option<ToolCall> {
    if !content.contains(r#""tool""#) {
        return None;
    }

    let start = content.find('{')?;
    let end = content.rfind('}')?;
    if end <= start {
        return None;
    }

    serde_json::from_str::<ToolCall>(&content[start..=end]).ok()
}

fn with_call_id(mut call: ToolCall) -> ToolCall {
    if call.id.is_none() {
        call.id = Some(uuid::Uuid::new_v4().to_string());
    }
    call
}

/// Builder for Agent configuration
#[derive(Default)]
pub struct AgentBuilder {
    provider: Option<Arc<dyn LlmProvider>>,
    config: AgentConfig,
}

impl AgentBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn provider(mut self, provider: Arc<dyn LlmProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    #[must_use]
    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = prompt.into();
        self
    }

    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.generation.model = model.into();
        self
    }

    #[must_use]
    pub const fn temperature(mut self, temp: f32) -> Self {
        self.config.generation.temperature = temp;
        self
    }

    pub fn build(self) -> Result<Agent> {
        let provider = self
            .provider
            .ok_or_else(|| AgentError::Config("Provider is required".into()))?;

        Ok(Agent::new(provider, self.config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::Completion;
    use crate::tool::{ParameterSchema, Tool, ToolSchema};
    use serde_json::json;
    use std::sync::Mutex;

    /// Replays canned replies, then repeats the last one.
    struct ScriptedProvider {
        replies: Mutex<Vec<String>>,
        seen: Mutex<Vec<usize>>,
    }

    impl ScriptedProvider {
        fn new(replies: &[&str]) -> Arc<Self> {
            let mut replies: Vec<String> = replies.iter().map(ToString::to_string).collect();
            replies.reverse();
            Arc::new(Self {
                replies: Mutex::new(replies),
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(true)
        }

        async fn complete(
            &self,
            messages: &[Message],
            _options: &GenerationOptions,
        ) -> Result<Completion> {
            self.seen.lock().unwrap().push(messages.len());
            let mut replies = self.replies.lock().unwrap();
            let content = if replies.len() > 1 {
                replies.pop().unwrap()
            } else {
                replies.last().cloned().unwrap_or_default()
            };
            Ok(Completion {
                content,
                model: "scripted".into(),
                usage: None,
                truncated: false,
                finish_reason: None,
            })
        }
    }

    struct LookupTool;

    #[async_trait]
    impl Tool for LookupTool {
        fn schema(&self) -> ToolSchema {
            ToolSchema {
                name: "lookup".into(),
                description: "Look up a customer".into(),
                parameters: vec![ParameterSchema::required("id", "string", "Customer id")],
                category: None,
                has_side_effects: false,
            }
        }

        async fn execute(&self, call: &ToolCall) -> Result<ToolResult> {
            Ok(ToolResult::success(
                "lookup",
                json!({"id": call.arguments["id"], "status": "active"}),
            ))
        }
    }

    fn registry() -> ToolRegistry {
        let mut tools = ToolRegistry::new();
        tools.register(LookupTool);
        tools
    }

    #[test]
    fn test_parse_multiple_tool_blocks() {
        let content = r#"Checking both.
```tool
{"tool": "lookup", "arguments": {"id": "alice"}}
```
and
```tool
{"tool": "lookup", "arguments": {"id": "bob"}}
```"#;
        let calls = parse_tool_calls(content);
        assert_eq!(calls.len(), 2);
        let second = calls[1].as_ref().unwrap();
        assert_eq!(second.arguments["id"], "bob");
        assert!(second.id.is_some());
    }

    #[test]
    fn test_parse_plain_answer_has_no_calls() {
        let answer = r#"{"customer": {"name_or_id": "alice"}, "issues": [], "confidence": "high"}"#;
        assert!(parse_tool_calls(answer).is_empty());
    }

    #[test]
    fn test_parse_malformed_block_reports_error() {
        let calls = parse_tool_calls("```tool\n{not json}\n```");
        assert_eq!(calls.len(), 1);
        assert!(calls[0].is_err());
    }

    #[tokio::test]
    async fn test_tool_then_answer() {
        let provider = ScriptedProvider::new(&[
            "```tool\n{\"tool\": \"lookup\", \"arguments\": {\"id\": \"alice\"}}\n```",
            "Alice is active.",
        ]);
        let agent = Agent::with_defaults(provider.clone());

        let outcome = agent.run("check alice", &registry(), 4).await.unwrap();

        assert_eq!(outcome.status, RunStatus::Completed);
        assert_eq!(outcome.final_output.as_deref(), Some("Alice is active."));
        assert_eq!(outcome.turns, 2);
        assert_eq!(outcome.tool_results.len(), 1);
        assert!(outcome.tool_results[0].is_ok());
        // system + goal, then + assistant + tool result
        assert_eq!(*provider.seen.lock().unwrap(), vec![2, 4]);
    }

    #[tokio::test]
    async fn test_turn_cap_is_an_outcome() {
        let provider = ScriptedProvider::new(&[
            "```tool\n{\"tool\": \"lookup\", \"arguments\": {\"id\": \"alice\"}}\n```",
        ]);
        let agent = Agent::with_defaults(provider);

        let outcome = agent.run("loop forever", &registry(), 3).await.unwrap();

        assert_eq!(outcome.status, RunStatus::TurnCapExceeded);
        assert!(outcome.final_output.is_none());
        assert_eq!(outcome.turns, 3);
        assert_eq!(outcome.tool_results.len(), 3);
    }

    #[tokio::test]
    async fn test_unknown_tool_is_fed_back() {
        let provider = ScriptedProvider::new(&[
            "```tool\n{\"tool\": \"delete_everything\", \"arguments\": {}}\n```",
            "Could not do that.",
        ]);
        let agent = AgentBuilder::new().provider(provider).build().unwrap();

        let outcome = agent.run("try it", &registry(), 4).await.unwrap();

        assert!(outcome.completed());
        assert_eq!(
            outcome.tool_results[0].error_kind(),
            Some(ToolErrorKind::UnknownTool)
        );
    }

    #[test]
    fn test_builder_requires_provider() {
        assert!(matches!(
            AgentBuilder::new().build(),
            Err(AgentError::Config(_))
        ));
    }
}
