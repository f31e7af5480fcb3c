//! Investigation report and verdict
//!
//! The agent is asked to answer with a JSON report. Whatever it actually
//! returns, the session always ends with a well-formed report; gaps in the
//! investigation show up as low confidence and open questions.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use agent_core::ToolResult;

use crate::orchestrator::SessionStatus;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        })
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerRef {
    #[serde(default)]
    pub name_or_id: String,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub description: String,
    #[serde(default)]
    pub impact: String,
    #[serde(default)]
    pub data_sources: Vec<String>,
}

/// Structured answer of a SupportOps investigation
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvestigationReport {
    #[serde(default)]
    pub customer: CustomerRef,
    #[serde(default)]
    pub issues: Vec<Issue>,
    #[serde(default)]
    pub next_steps: Vec<String>,
    #[serde(default)]
    pub open_questions: Vec<String>,
    pub confidence: Confidence,
}

/// What the investigation concluded
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    NoIssueFound,
    IssueFound,
    Incomplete,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::NoIssueFound => "no issue found",
            Self::IssueFound => "issue found",
            Self::Incomplete => "investigation incomplete",
        })
    }
}

impl InvestigationReport {
    /// Parse a report from the model's answer
    ///
    /// Accepts the bare JSON, a fenced code block, or the outermost `{...}`
    /// inside surrounding prose.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        Self::from_json(text)
            .or_else(|| fenced_block(text).and_then(Self::from_json))
            .or_else(|| {
                let start = text.find('{')?;
                let end = text.rfind('}')?;
                (start < end).then(|| &text[start..=end]).and_then(Self::from_json)
            })
    }

    fn from_json(candidate: &str) -> Option<Self> {
        let value: Value = serde_json::from_str(candidate.trim()).ok()?;
        // Require the one field that marks this as a report rather than any JSON object
        value.get("confidence")?;
        serde_json::from_value(value).ok()
    }

    /// Low-confidence report for an investigation that produced no usable answer
    pub fn incomplete(subject: &str, reason: impl Into<String>) -> Self {
        Self {
            customer: CustomerRef {
                name_or_id: excerpt(subject, 80),
                status: None,
            },
            issues: Vec::new(),
            next_steps: Vec::new(),
            open_questions: vec![reason.into()],
            confidence: Confidence::Low,
        }
    }

    /// Downgrade to low confidence and record why
    pub fn mark_incomplete(&mut self, reasons: impl IntoIterator<Item = String>) {
        self.confidence = Confidence::Low;
        for reason in reasons {
            if !self.open_questions.contains(&reason) {
                self.open_questions.push(reason);
            }
        }
    }

    pub fn to_json_pretty(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".into())
    }
}

fn fenced_block(text: &str) -> Option<&str> {
    let open = text.find("```")?;
    let after = &text[open + 3..];
    let body_start = after.find('\n')? + 1;
    let body = &after[body_start..];
    let close = body.find("```")?;
    Some(&body[..close])
}

fn excerpt(text: &str, max: usize) -> String {
    let text = text.trim();
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max).collect();
        format!("{cut}...")
    }
}

/// What a run had found when the turn limit cut it off
///
/// Names the tools that answered and keeps the model's last reply, so the
/// report still carries the partial investigation.
pub fn partial_findings(last_response: Option<&str>, tool_results: &[ToolResult]) -> Vec<String> {
    let mut answered: Vec<&str> = Vec::new();
    for result in tool_results.iter().filter(|r| r.is_ok()) {
        if !answered.contains(&result.name.as_str()) {
            answered.push(&result.name);
        }
    }

    let mut notes = Vec::new();
    if !answered.is_empty() {
        notes.push(format!("Data gathered before the turn limit: {}", answered.join(", ")));
    }
    if let Some(reply) = last_response.filter(|r| !r.trim().is_empty()) {
        notes.push(format!("Last reasoning before the turn limit: {}", excerpt(reply, 500)));
    }
    notes
}

/// Build the final report and verdict for a finished session
pub fn assess(
    goal: &str,
    status: SessionStatus,
    final_output: Option<&str>,
    turns: usize,
    source_gaps: &[String],
    failure: Option<&str>,
) -> (InvestigationReport, Verdict) {
    let gap_notes = source_gaps
        .iter()
        .map(|gap| format!("Data source unavailable: {gap}"));

    let mut report = match (status, final_output) {
        (SessionStatus::Completed, Some(answer)) => match InvestigationReport::parse(answer) {
            Some(report) => report,
            None => {
                let mut report = InvestigationReport::incomplete(
                    goal,
                    format!("The answer was not in the expected report format: {answer}"),
                );
                report.mark_incomplete(gap_notes);
                return (report, Verdict::Incomplete);
            }
        },
        (SessionStatus::Completed, None) => {
            InvestigationReport::incomplete(goal, "The agent finished without an answer.")
        }
        (SessionStatus::TurnCapExceeded, _) => InvestigationReport::incomplete(
            goal,
            format!("Investigation stopped at the turn limit ({turns} turns) before a final answer."),
        ),
        (SessionStatus::RuntimeFailed, _) => InvestigationReport::incomplete(
            goal,
            format!(
                "The agent runtime failed: {}",
                failure.unwrap_or("unknown error")
            ),
        ),
        (SessionStatus::Aborted, _) => {
            InvestigationReport::incomplete(goal, "The investigation was aborted.")
        }
    };

    let answered = matches!(status, SessionStatus::Completed) && final_output.is_some();
    if !answered || !source_gaps.is_empty() {
        report.mark_incomplete(gap_notes);
        return (report, Verdict::Incomplete);
    }

    let verdict = if report.issues.is_empty() {
        Verdict::NoIssueFound
    } else {
        Verdict::IssueFound
    };
    (report, verdict)
}
