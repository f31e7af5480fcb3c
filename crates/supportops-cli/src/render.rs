//! Output rendering

use std::fmt::Write;

use serde_json::{Value, json};
use session_orchestrator::SessionOutcome;

/// Human-readable summary
pub fn human(outcome: &SessionOutcome) -> String {
    let mut out = String::from("\n--- Agent Output ---\n");
    match &outcome.final_output {
        Some(answer) => out.push_str(answer.trim_end()),
        None => out.push_str(&outcome.report.to_json_pretty()),
    }
    out.push_str("\n\n");

    let _ = writeln!(
        out,
        "Verdict: {} (confidence: {}, {} turns)",
        outcome.verdict, outcome.report.confidence, outcome.turns
    );

    if !outcome.source_gaps.is_empty() {
        out.push_str("Data sources unavailable:\n");
        for gap in &outcome.source_gaps {
            let _ = writeln!(out, "  - {gap}");
        }
    }

    if let Some(err) = &outcome.runtime_error {
        let _ = writeln!(out, "Agent error: {err}");
    }

    if !outcome.teardown_errors.is_empty() {
        out.push_str("Providers not closed cleanly:\n");
        for err in &outcome.teardown_errors {
            let _ = writeln!(out, "  - {err}");
        }
    }

    out
}

/// Verdict, unavailable sources and the report fields in one JSON object
pub fn json(outcome: &SessionOutcome) -> String {
    let mut doc = json!({
        "verdict": outcome.verdict,
        "source_gaps": outcome.source_gaps,
    });
    if let (Value::Object(doc), Ok(Value::Object(report))) =
        (&mut doc, serde_json::to_value(&outcome.report))
    {
        doc.extend(report);
    }
    serde_json::to_string_pretty(&doc).unwrap_or_else(|_| "{}".into())
}
