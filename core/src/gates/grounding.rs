use crate::gates::GateReport;
use crate::model::{Chunk, Evidence};
use serde_json::json;
use std::collections::BTreeMap;

pub const GATE: &str = "evidence_grounding";

const EVIDENCE_PREVIEW_CHARS: usize = 80;
const CHUNK_PREVIEW_CHARS: usize = 200;

fn normalize(text: &str, case_fold: bool) -> String {
    let joined = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if case_fold {
        joined.to_lowercase()
    } else {
        joined
    }
}

fn preview(text: &str, chars: usize) -> String {
    text.chars().take(chars).collect()
}

/// Every evidence quote must be grounded in the committed silver table: the
/// referenced chunk must exist, the quote text (whitespace-normalized, case
/// folded when configured) must be substring-present in the chunk text, and
/// page numbers must agree when both sides carry one.
pub fn grounding_gate(
    doc_id: &str,
    evidence: &[Evidence],
    silver: &[Chunk],
    case_fold: bool,
) -> GateReport {
    let by_id: BTreeMap<&str, &Chunk> =
        silver.iter().map(|c| (c.chunk_id.as_str(), c)).collect();

    let mut mismatches = Vec::new();
    for ev in evidence {
        let Some(chunk_id) = ev.chunk_id.as_deref() else {
            mismatches.push(json!({
                "evidence_id": ev.evidence_id,
                "reason": "missing_chunk_reference",
            }));
            continue;
        };
        let Some(chunk) = by_id.get(chunk_id) else {
            mismatches.push(json!({
                "evidence_id": ev.evidence_id,
                "chunk_id": chunk_id,
                "reason": "chunk_not_in_silver",
            }));
            continue;
        };
        if chunk.doc_id != ev.doc_id {
            mismatches.push(json!({
                "evidence_id": ev.evidence_id,
                "chunk_id": chunk_id,
                "reason": "doc_id_mismatch",
                "evidence_doc_id": ev.doc_id,
                "chunk_doc_id": chunk.doc_id,
            }));
            continue;
        }

        // The ellipsis added by the 30-word hard cut is not source text.
        let quote = ev.extract_30w.trim_end_matches("...");
        let quote_norm = normalize(quote, case_fold);
        let chunk_norm = normalize(&chunk.text, case_fold);
        if !chunk_norm.contains(&quote_norm) {
            mismatches.push(json!({
                "evidence_id": ev.evidence_id,
                "chunk_id": chunk_id,
                "reason": "text_not_in_chunk",
                "evidence_preview": preview(&quote_norm, EVIDENCE_PREVIEW_CHARS),
                "chunk_preview": preview(&chunk_norm, CHUNK_PREVIEW_CHARS),
            }));
            continue;
        }

        if let (Some(ev_page), Some(chunk_page)) = (ev.page, chunk.page) {
            if ev_page != chunk_page {
                mismatches.push(json!({
                    "evidence_id": ev.evidence_id,
                    "chunk_id": chunk_id,
                    "reason": "page_mismatch",
                    "evidence_page": ev_page,
                    "chunk_page": chunk_page,
                }));
            }
        }
    }

    let diagnostics = json!({
        "evidence_count": evidence.len(),
        "silver_chunk_count": silver.len(),
        "case_fold": case_fold,
        "mismatches": mismatches,
    });
    if diagnostics["mismatches"].as_array().map(|m| m.is_empty()).unwrap_or(false) {
        GateReport::pass(GATE, doc_id, diagnostics)
    } else {
        GateReport::fail(GATE, doc_id, diagnostics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::determinism::hash::sha256_hex;
    use crate::gates::Verdict;
    use crate::model::SCHEMA_VERSION;

    fn silver_chunk(text: &str) -> Chunk {
        Chunk {
            chunk_id: "demo_2023_p4_c0".to_string(),
            evidence_id: "GHG:demo_2023_p4_c0".to_string(),
            doc_id: "demo_2023".to_string(),
            org_id: "demo".to_string(),
            year: 2023,
            theme: "GHG".to_string(),
            page: Some(4),
            section: None,
            text: text.to_string(),
            char_start: 0,
            char_end: text.len(),
            sha256: sha256_hex(text.as_bytes()),
            source_url: None,
            provider: "local".to_string(),
            doc_hash: sha256_hex(b"doc"),
            quality: 1.0,
            suspect: false,
            schema_version: SCHEMA_VERSION,
            created_at: "2025-10-28T06:00:00Z".to_string(),
        }
    }

    fn evidence(extract: &str, page: Option<u32>) -> Evidence {
        Evidence {
            evidence_id: "ev-GHG-loc-001".to_string(),
            doc_id: "demo_2023".to_string(),
            theme_code: "GHG".to_string(),
            sha256: sha256_hex(extract.as_bytes()),
            extract_30w: extract.to_string(),
            page,
            span_start: 0,
            span_end: extract.len(),
            org_id: "demo".to_string(),
            year: 2023,
            source_id: "local".to_string(),
            chunk_id: Some("demo_2023_p4_c0".to_string()),
        }
    }

    const CHUNK_TEXT: &str =
        "In fiscal year 2023, total carbon emissions were 13.9 million metric tons of CO2e.";

    #[test]
    fn grounded_quote_passes() {
        let silver = vec![silver_chunk(CHUNK_TEXT)];
        let ev = vec![evidence("total carbon  emissions were 13.9 million", Some(4))];
        let gate = grounding_gate("demo_2023", &ev, &silver, false);
        assert_eq!(gate.verdict, Verdict::Pass);
    }

    #[test]
    fn single_character_drift_fails_and_cites_previews() {
        let silver = vec![silver_chunk(CHUNK_TEXT)];
        let ev = vec![evidence("total carbon emissions were 13.8 million", Some(4))];
        let gate = grounding_gate("demo_2023", &ev, &silver, false);
        assert_eq!(gate.verdict, Verdict::Fail);
        let mismatch = &gate.diagnostics["mismatches"][0];
        assert_eq!(mismatch["reason"], "text_not_in_chunk");
        let ev_preview = mismatch["evidence_preview"].as_str().unwrap();
        assert!(ev_preview.chars().count() <= 80);
        assert!(mismatch["chunk_preview"].as_str().unwrap().chars().count() <= 200);
    }

    #[test]
    fn page_mismatch_fails_when_both_present() {
        let silver = vec![silver_chunk(CHUNK_TEXT)];
        let ev = vec![evidence("total carbon emissions were 13.9 million", Some(7))];
        let gate = grounding_gate("demo_2023", &ev, &silver, false);
        assert_eq!(gate.verdict, Verdict::Fail);
        assert_eq!(gate.diagnostics["mismatches"][0]["reason"], "page_mismatch");
    }

    #[test]
    fn absent_page_on_evidence_skips_page_check() {
        let silver = vec![silver_chunk(CHUNK_TEXT)];
        let ev = vec![evidence("total carbon emissions were 13.9 million", None)];
        let gate = grounding_gate("demo_2023", &ev, &silver, false);
        assert_eq!(gate.verdict, Verdict::Pass);
    }

    #[test]
    fn unknown_chunk_fails() {
        let silver: Vec<Chunk> = Vec::new();
        let ev = vec![evidence("anything", Some(1))];
        let gate = grounding_gate("demo_2023", &ev, &silver, false);
        assert_eq!(gate.verdict, Verdict::Fail);
        assert_eq!(
            gate.diagnostics["mismatches"][0]["reason"],
            "chunk_not_in_silver"
        );
    }

    #[test]
    fn case_folding_is_honored_when_configured() {
        let silver = vec![silver_chunk(CHUNK_TEXT)];
        let ev = vec![evidence("TOTAL CARBON EMISSIONS were 13.9 million", Some(4))];
        assert_eq!(
            grounding_gate("demo_2023", &ev, &silver, false).verdict,
            Verdict::Fail
        );
        assert_eq!(
            grounding_gate("demo_2023", &ev, &silver, true).verdict,
            Verdict::Pass
        );
    }
}
