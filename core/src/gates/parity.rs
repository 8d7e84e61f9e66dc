use crate::gates::GateReport;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeSet;

pub const GATE: &str = "parity";

/// Dual parity check between the evidence set and the fused retrieval top-K.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParityResult {
    pub subset_ok: bool,
    pub fused_nonempty_or_no_evidence: bool,
    pub passed: bool,
    pub missing_ids: Vec<String>,
    pub coverage: f64,
    pub evidence_count: usize,
    pub retrieval_count: usize,
}

/// Subset gate: every evidence chunk must come from retrieval. Nonempty
/// guard: evidence with an empty retrieval is a failure, so an empty/empty
/// pair cannot pass by accident of vacuous subset truth.
pub fn parity_result(evidence_ids: &[String], fused_topk_ids: &[String]) -> ParityResult {
    let ev_set: BTreeSet<&str> = evidence_ids
        .iter()
        .map(String::as_str)
        .filter(|s| !s.is_empty())
        .collect();
    let top_set: BTreeSet<&str> = fused_topk_ids
        .iter()
        .map(String::as_str)
        .filter(|s| !s.is_empty())
        .collect();

    let missing: Vec<String> = ev_set
        .difference(&top_set)
        .map(|s| s.to_string())
        .collect();
    let subset_ok = missing.is_empty();
    let fused_nonempty_or_no_evidence = !top_set.is_empty() || ev_set.is_empty();

    let coverage = if ev_set.is_empty() {
        1.0
    } else {
        let valid = ev_set.intersection(&top_set).count();
        round4(valid as f64 / ev_set.len() as f64)
    };

    ParityResult {
        subset_ok,
        fused_nonempty_or_no_evidence,
        passed: subset_ok && fused_nonempty_or_no_evidence,
        missing_ids: missing,
        coverage,
        evidence_count: ev_set.len(),
        retrieval_count: top_set.len(),
    }
}

pub fn parity_gate(
    doc_id: &str,
    theme: &str,
    evidence_ids: &[String],
    fused_topk_ids: &[String],
) -> GateReport {
    let result = parity_result(evidence_ids, fused_topk_ids);
    let diagnostics = json!({
        "subset_ok": result.subset_ok,
        "fused_nonempty_or_no_evidence": result.fused_nonempty_or_no_evidence,
        "missing_ids": result.missing_ids,
        "coverage": result.coverage,
        "evidence_count": result.evidence_count,
        "retrieval_count": result.retrieval_count,
    });
    let report = if result.passed {
        GateReport::pass(GATE, doc_id, diagnostics)
    } else {
        GateReport::fail(GATE, doc_id, diagnostics)
    };
    report.with_theme(theme)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParitySummary {
    pub total_checks: usize,
    pub passed: usize,
    pub failed: usize,
    pub pass_rate: f64,
    pub total_violations: usize,
    pub avg_coverage: f64,
    pub subset_failures: usize,
    pub nonempty_guard_failures: usize,
}

/// Aggregates parity results across themes/documents for reporting.
pub fn parity_summary(results: &[ParityResult]) -> ParitySummary {
    let total = results.len();
    let passed = results.iter().filter(|r| r.passed).count();
    let total_violations = results.iter().map(|r| r.missing_ids.len()).sum();
    let avg_coverage = if total > 0 {
        round4(results.iter().map(|r| r.coverage).sum::<f64>() / total as f64)
    } else {
        0.0
    };
    ParitySummary {
        total_checks: total,
        passed,
        failed: total - passed,
        pass_rate: if total > 0 {
            round4(passed as f64 / total as f64)
        } else {
            0.0
        },
        total_violations,
        avg_coverage,
        subset_failures: results.iter().filter(|r| !r.subset_ok).count(),
        nonempty_guard_failures: results
            .iter()
            .filter(|r| !r.fused_nonempty_or_no_evidence)
            .count(),
    }
}

fn round4(x: f64) -> f64 {
    (x * 10_000.0).round() / 10_000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gates::Verdict;

    fn ids(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn subset_passes_with_full_coverage() {
        let r = parity_result(&ids(&["a", "b"]), &ids(&["a", "b", "c", "d"]));
        assert!(r.passed);
        assert!(r.subset_ok);
        assert_eq!(r.coverage, 1.0);
        assert!(r.missing_ids.is_empty());
    }

    #[test]
    fn missing_evidence_fails_subset_and_reports_sorted_ids() {
        let r = parity_result(&ids(&["y", "a", "x"]), &ids(&["a", "b", "c"]));
        assert!(!r.passed);
        assert!(!r.subset_ok);
        assert!(r.fused_nonempty_or_no_evidence);
        assert_eq!(r.missing_ids, ids(&["x", "y"]));
        assert_eq!(r.coverage, 0.3333);
    }

    #[test]
    fn nonempty_guard_blocks_evidence_without_retrieval() {
        let r = parity_result(&ids(&["a", "b"]), &[]);
        assert!(!r.passed);
        assert!(r.subset_ok);
        assert!(!r.fused_nonempty_or_no_evidence);
        assert_eq!(r.coverage, 0.0);
    }

    #[test]
    fn empty_evidence_passes_vacuously() {
        let both_empty = parity_result(&[], &[]);
        assert!(both_empty.passed);
        assert_eq!(both_empty.coverage, 1.0);

        let empty_evidence = parity_result(&[], &ids(&["a"]));
        assert!(empty_evidence.passed);
    }

    #[test]
    fn gate_report_carries_theme_and_diagnostics() {
        let gate = parity_gate("demo_2023", "GHG", &ids(&["a"]), &[]);
        assert_eq!(gate.verdict, Verdict::Fail);
        assert_eq!(gate.theme.as_deref(), Some("GHG"));
        assert_eq!(gate.diagnostics["fused_nonempty_or_no_evidence"], false);
    }

    #[test]
    fn summary_counts_gate_specific_failures() {
        let results = vec![
            parity_result(&ids(&["a"]), &ids(&["a", "b"])),
            parity_result(&ids(&["x"]), &ids(&["a"])),
            parity_result(&ids(&["a"]), &[]),
        ];
        let summary = parity_summary(&results);
        assert_eq!(summary.total_checks, 3);
        assert_eq!(summary.passed, 1);
        assert_eq!(summary.failed, 2);
        assert_eq!(summary.subset_failures, 1);
        assert_eq!(summary.nonempty_guard_failures, 1);
        assert_eq!(summary.total_violations, 1);
    }
}
