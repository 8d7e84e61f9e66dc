use crate::determinism::harness::DeterminismReport;
use crate::gates::GateReport;
use serde_json::json;
use std::collections::BTreeSet;

pub const GATE: &str = "determinism";

/// PASS iff all harness run hashes are identical. Diagnostics carry every
/// distinct hash and, when comparable, the first differing byte offset.
pub fn determinism_gate(report: &DeterminismReport) -> GateReport {
    let distinct: BTreeSet<&String> = report.all_hashes.iter().collect();
    let diagnostics = json!({
        "total_runs": report.total_runs,
        "distinct_hashes": distinct.iter().collect::<Vec<_>>(),
        "first_divergence_byte": report.first_divergence_byte,
        "seed": report.seed,
        "hash_seed": report.hash_seed,
    });
    if report.identical && distinct.len() == 1 {
        GateReport::pass(GATE, &report.doc_id, diagnostics)
    } else {
        GateReport::fail(GATE, &report.doc_id, diagnostics)
    }
}
