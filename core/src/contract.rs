use crate::config::RunConfig;
use crate::error::CoreResult;
use crate::gates::{overall_verdict, GateReport, Verdict};
use crate::store::write_canonical_json;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Per-document gate verdict artifact. Failing runs still emit this with
/// actionable diagnostics; it is the machine-readable contract consumers read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputContract {
    pub doc_id: String,
    /// "ok" | "blocked" | "skipped"
    pub status: String,
    pub verdict: Verdict,
    pub gates: Vec<GateReport>,
    pub failing_gates: Vec<String>,
    pub skip_reasons: Vec<String>,
    pub generated_at: String,
}

pub fn build_output_contract(
    config: &RunConfig,
    doc_id: &str,
    gates: Vec<GateReport>,
) -> OutputContract {
    let verdict = overall_verdict(&gates);
    let status = match verdict {
        Verdict::Pass => "ok",
        Verdict::Fail => "blocked",
        Verdict::Skipped => "skipped",
    };
    let mut failing_gates: Vec<String> = gates
        .iter()
        .filter(|g| g.verdict == Verdict::Fail)
        .map(|g| match &g.theme {
            Some(theme) => format!("{}:{}", g.gate, theme),
            None => g.gate.clone(),
        })
        .collect();
    failing_gates.sort();
    let mut skip_reasons: Vec<String> = gates
        .iter()
        .filter_map(|g| g.skip_reason.clone())
        .collect();
    skip_reasons.sort();
    skip_reasons.dedup();

    OutputContract {
        doc_id: doc_id.to_string(),
        status: status.to_string(),
        verdict,
        gates,
        failing_gates,
        skip_reasons,
        generated_at: config.now(),
    }
}

pub fn write_output_contract(doc_dir: &Path, contract: &OutputContract) -> CoreResult<()> {
    write_canonical_json(&doc_dir.join("output_contract.json"), contract)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatrixContract {
    /// "ok" | "blocked"
    pub matrix_status: String,
    pub document_count: usize,
    pub blocking_documents: Vec<String>,
    pub skipped_documents: Vec<String>,
    pub generated_at: String,
}

/// Top-level aggregation across the document matrix: blocked iff any
/// document's contract is blocked. Skipped documents are listed but do not
/// block.
pub fn aggregate_matrix_contract(
    config: &RunConfig,
    contracts: &[OutputContract],
) -> MatrixContract {
    let mut blocking: Vec<String> = contracts
        .iter()
        .filter(|c| c.status == "blocked")
        .map(|c| c.doc_id.clone())
        .collect();
    blocking.sort();
    let mut skipped: Vec<String> = contracts
        .iter()
        .filter(|c| c.status == "skipped")
        .map(|c| c.doc_id.clone())
        .collect();
    skipped.sort();

    MatrixContract {
        matrix_status: if blocking.is_empty() { "ok" } else { "blocked" }.to_string(),
        document_count: contracts.len(),
        blocking_documents: blocking,
        skipped_documents: skipped,
        generated_at: config.now(),
    }
}

pub fn write_matrix_contract(artifacts_root: &Path, contract: &MatrixContract) -> CoreResult<()> {
    write_canonical_json(&artifacts_root.join("matrix_contract.json"), contract)
}
