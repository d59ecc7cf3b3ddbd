use serde::Serialize;
use serde_json::json;

use crate::state::SessionSummary;
use crate::types::{ContractResult, PatternEvent, TradeOutcome};

fn report_line(kind: &str, data: impl Serialize) {
    let line = json!({
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "event": kind,
        "data": data,
    });
    println!("{line}");
}

/// Emit a detected pattern as a single JSON line to stdout.
pub fn report_pattern(event: &PatternEvent, pattern_count: u64) {
    report_line("pattern", json!({ "pattern": event, "pattern_count": pattern_count }));
}

/// Emit a scoring-mode outcome as a single JSON line to stdout.
pub fn report_outcome(outcome: &TradeOutcome, points_after: i64) {
    report_line("outcome", json!({ "outcome": outcome, "points_after": points_after }));
}

/// Emit a settled live contract as a single JSON line to stdout.
pub fn report_contract(contract: &ContractResult, balance: Option<f64>) {
    report_line("contract", json!({ "contract": contract, "balance": balance }));
}

/// Emit the session summary as pretty-printed JSON to stdout.
pub fn report_exit_summary(summary: &SessionSummary) {
    if let Ok(text) = serde_json::to_string_pretty(summary) {
        println!("{text}");
    }
}
