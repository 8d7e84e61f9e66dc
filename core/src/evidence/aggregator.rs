use crate::determinism::hash::sha256_hex;
use crate::evidence::themes::canonical_theme_code;
use crate::model::{Evidence, Finding};
use std::collections::BTreeMap;

pub const DEFAULT_MIN_PER_THEME: usize = 2;
pub const MAX_EXTRACT_WORDS: usize = 30;
const SENTENCE_CUT_MIN_WORDS: usize = 20;

/// Source priority for deterministic selection: SEC EDGAR (most
/// authoritative), then CDP, then PDF/IR extractions. Data, not code paths.
const SOURCE_PRIORITY: &[(&str, u32)] = &[
    ("sec_edgar", 1),
    ("cdp", 2),
    ("cdp_climate_change", 2),
    ("pdf", 3),
    ("company_ir", 3),
    ("local", 3),
];

fn source_priority(source_id: &str) -> u32 {
    SOURCE_PRIORITY
        .iter()
        .find(|(s, _)| *s == source_id)
        .map(|(_, p)| *p)
        .unwrap_or(99)
}

/// Selects evidence from findings with full provenance: bucket findings by
/// canonical theme, order by source priority, keep the top `min_per_theme`
/// (fewer only if fewer exist), and truncate each quote to 30 words at a
/// sentence boundary.
pub fn select_evidence(findings: &[Finding], min_per_theme: usize) -> Vec<Evidence> {
    if findings.is_empty() {
        return Vec::new();
    }

    let mut by_theme: BTreeMap<String, Vec<&Finding>> = BTreeMap::new();
    for finding in findings {
        by_theme
            .entry(canonical_theme_code(&finding.theme))
            .or_default()
            .push(finding);
    }

    let mut evidence = Vec::new();
    for (theme_code, mut theme_findings) in by_theme {
        theme_findings.sort_by_key(|f| source_priority(&f.source_id));
        let take = min_per_theme.min(theme_findings.len());
        for (idx, finding) in theme_findings.into_iter().take(take).enumerate() {
            evidence.push(evidence_record(finding, &theme_code, idx + 1));
        }
    }
    evidence
}

fn evidence_record(finding: &Finding, theme_code: &str, sequence: usize) -> Evidence {
    let extract_30w = truncate_to_30_words(&finding.text);
    let src_prefix: String = finding.source_id.chars().take(3).collect();
    Evidence {
        evidence_id: format!("ev-{}-{}-{:03}", theme_code, src_prefix, sequence),
        doc_id: finding.doc_id.clone(),
        theme_code: theme_code.to_string(),
        sha256: sha256_hex(extract_30w.as_bytes()),
        extract_30w,
        page: finding.page,
        span_start: finding.char_start,
        span_end: finding.char_end,
        org_id: finding.org_id.clone(),
        year: finding.year,
        source_id: finding.source_id.clone(),
        chunk_id: finding.chunk_id.clone(),
    }
}

/// 30-word truncation:
/// text of ≤30 words passes through; otherwise the first 30 words are kept
/// and cut at the last sentence terminator when it falls after word 20, else
/// cut hard at word 30 with an ellipsis.
pub fn truncate_to_30_words(text: &str) -> String {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.len() <= MAX_EXTRACT_WORDS {
        return text.trim().to_string();
    }

    let truncated = words[..MAX_EXTRACT_WORDS].join(" ");
    let last_boundary = ['.', '!', '?']
        .iter()
        .filter_map(|b| truncated.rfind(*b))
        .max();

    let min_cut = words[..SENTENCE_CUT_MIN_WORDS].join(" ").len();
    match last_boundary {
        Some(pos) if pos > min_cut => truncated[..=pos].trim().to_string(),
        _ => format!("{}...", truncated.trim_end()),
    }
}

/// Evidence grouped by theme code, e.g. for per-theme gate evaluation.
pub fn evidence_by_theme(evidence: &[Evidence]) -> BTreeMap<String, Vec<Evidence>> {
    let mut grouped: BTreeMap<String, Vec<Evidence>> = BTreeMap::new();
    for ev in evidence {
        grouped
            .entry(ev.theme_code.clone())
            .or_default()
            .push(ev.clone());
    }
    grouped
}
