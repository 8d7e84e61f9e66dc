use crate::gates::GateReport;
use crate::model::Evidence;
use serde_json::json;
use std::collections::{BTreeMap, BTreeSet};

pub const GATE: &str = "evidence_quality";

pub const EVIDENCE_PAGE_MIN_DISTINCT: usize = 3;
pub const EVIDENCE_PER_PAGE_CAP: usize = 5;
pub const DOC_LENGTH_THRESHOLD: u32 = 10;
pub const MIN_SPAN_SHORT_DOCS: u32 = 3;
pub const MIN_SPAN_LONG_DOCS: u32 = 5;

/// Adaptive span requirement: documents of 10+ pages must spread evidence
/// across a span of at least 5 pages; shorter documents need 3.
pub fn min_span_for_doc(total_pages: u32) -> u32 {
    if total_pages >= DOC_LENGTH_THRESHOLD {
        MIN_SPAN_LONG_DOCS
    } else {
        MIN_SPAN_SHORT_DOCS
    }
}

/// Caps evidence per page, preserving retrieval rank order within each page.
pub fn cap_per_page(items: &[Evidence], max_per_page: usize) -> Vec<Evidence> {
    let mut taken: BTreeMap<Option<u32>, usize> = BTreeMap::new();
    let mut out = Vec::new();
    for item in items {
        let count = taken.entry(item.page).or_insert(0);
        if *count < max_per_page {
            *count += 1;
            out.push(item.clone());
        }
    }
    out
}

/// Per-theme evidence quality: after per-page trimming, evidence must cover
/// at least 3 distinct positive pages and span at least the adaptive
/// threshold. Trimming happens before evaluation. A waiver is recorded in the
/// diagnostics but never changes the raw verdict.
pub fn evidence_quality_gate(
    doc_id: &str,
    theme: &str,
    evidence: &[Evidence],
    total_pages: u32,
    waiver: bool,
) -> GateReport {
    let trimmed = cap_per_page(evidence, EVIDENCE_PER_PAGE_CAP);

    let pages: BTreeSet<u32> = trimmed
        .iter()
        .filter_map(|e| e.page)
        .filter(|p| *p > 0)
        .collect();
    let distinct_pages = pages.len();
    let page_span = if distinct_pages >= 2 {
        pages.iter().max().unwrap_or(&0) - pages.iter().min().unwrap_or(&0)
    } else {
        0
    };
    let min_span_required = min_span_for_doc(total_pages);

    let gate_min_distinct = distinct_pages >= EVIDENCE_PAGE_MIN_DISTINCT;
    let gate_min_span = page_span >= min_span_required;

    let mut failing: Vec<&str> = Vec::new();
    if !gate_min_distinct {
        failing.push("min_distinct");
    }
    if !gate_min_span {
        failing.push("min_span");
    }

    let diagnostics = json!({
        "distinct_pages": distinct_pages,
        "page_span": page_span,
        "min_span_required": min_span_required,
        "total_pages": total_pages,
        "items_before_cap": evidence.len(),
        "items_after_cap": trimmed.len(),
        "per_page_cap": EVIDENCE_PER_PAGE_CAP,
        "failing_gates": failing,
        "gates": {
            "min_distinct": gate_min_distinct,
            "min_span": gate_min_span,
        },
        "waiver": waiver,
    });

    let report = if gate_min_distinct && gate_min_span {
        GateReport::pass(GATE, doc_id, diagnostics)
    } else {
        GateReport::fail(GATE, doc_id, diagnostics)
    };
    report.with_theme(theme)
}
