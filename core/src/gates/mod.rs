pub mod alignment;
pub mod authenticity;
pub mod determinism;
pub mod evidence_quality;
pub mod grounding;
pub mod parity;
pub mod rubric_compliance;

use serde::{Deserialize, Serialize};

/// Gate verdict state machine: a report starts evaluating and lands on
/// exactly one of these. SKIPPED always carries a recorded reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateReport {
    pub gate: String,
    pub doc_id: String,
    #[serde(default)]
    pub theme: Option<String>,
    pub verdict: Verdict,
    #[serde(default)]
    pub skip_reason: Option<String>,
    pub diagnostics: serde_json::Value,
}

impl GateReport {
    pub fn pass(gate: &str, doc_id: &str, diagnostics: serde_json::Value) -> Self {
        Self {
            gate: gate.to_string(),
            doc_id: doc_id.to_string(),
            theme: None,
            verdict: Verdict::Pass,
            skip_reason: None,
            diagnostics,
        }
    }

    pub fn fail(gate: &str, doc_id: &str, diagnostics: serde_json::Value) -> Self {
        Self {
            verdict: Verdict::Fail,
            ..Self::pass(gate, doc_id, diagnostics)
        }
    }

    pub fn skipped(gate: &str, doc_id: &str, reason: &str) -> Self {
        Self {
            verdict: Verdict::Skipped,
            skip_reason: Some(reason.to_string()),
            ..Self::pass(gate, doc_id, serde_json::Value::Null)
        }
    }

    pub fn with_theme(mut self, theme: &str) -> Self {
        self.theme = Some(theme.to_string());
        self
    }
}

/// A run passes iff every mandatory gate passed for every non-skipped
/// document. SKIPPED does not contribute to PASS but is not a FAIL.
pub fn overall_verdict(reports: &[GateReport]) -> Verdict {
    if reports.iter().any(|r| r.verdict == Verdict::Fail) {
        return Verdict::Fail;
    }
    if reports.iter().all(|r| r.verdict == Verdict::Skipped) && !reports.is_empty() {
        return Verdict::Skipped;
    }
    Verdict::Pass
}
