use crate::gates::GateReport;
use crate::rubric::Rubric;
use crate::score::DocScore;
use serde_json::json;

pub const GATE: &str = "rubric_compliance";

/// Per-theme rubric compliance over a scoring output: every rubric theme must
/// be present, every present score must be numeric and inside the declared
/// stage range, and every scored theme must cite at least the rubric's
/// `evidence_min_per_stage_claim` evidence items.
pub fn rubric_compliance_gate(rubric: &Rubric, doc: &DocScore) -> Vec<GateReport> {
    let evidence_min = rubric.scoring_rules.evidence_min_per_stage_claim;
    let mut reports = Vec::new();

    for theme in &rubric.themes {
        let report = match doc.theme_score(&theme.code) {
            None => GateReport::fail(
                GATE,
                &doc.doc_id,
                json!({"reason": "theme_missing_from_output"}),
            ),
            Some(score) => {
                let evidence_count = score.evidence.len();
                match score.stage {
                    None => GateReport::fail(
                        GATE,
                        &doc.doc_id,
                        json!({
                            "reason": "score_nullified",
                            "nullification": score.reason,
                            "evidence_count": evidence_count,
                            "evidence_min": evidence_min,
                        }),
                    ),
                    Some(stage) if !rubric.stage_in_range(stage) => GateReport::fail(
                        GATE,
                        &doc.doc_id,
                        json!({
                            "reason": "stage_out_of_range",
                            "stage": stage,
                            "stage_convention": rubric.stage_convention,
                        }),
                    ),
                    Some(stage) if evidence_count < evidence_min => GateReport::fail(
                        GATE,
                        &doc.doc_id,
                        json!({
                            "reason": "insufficient_evidence_citations",
                            "stage": stage,
                            "evidence_count": evidence_count,
                            "evidence_min": evidence_min,
                        }),
                    ),
                    Some(stage) => GateReport::pass(
                        GATE,
                        &doc.doc_id,
                        json!({
                            "stage": stage,
                            "evidence_count": evidence_count,
                            "evidence_min": evidence_min,
                        }),
                    ),
                }
            }
        };
        reports.push(report.with_theme(&theme.code));
    }
    reports
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::determinism::hash::sha256_hex;
    use crate::gates::Verdict;
    use crate::model::Evidence;
    use crate::rubric::builtin_rubric;
    use crate::score::{enforce_evidence_min_per_theme, DocScore, ThemeScore};

    fn evidence(theme: &str, seq: usize) -> Evidence {
        let text = format!("{} quote {}", theme, seq);
        Evidence {
            evidence_id: format!("ev-{}-loc-{:03}", theme, seq),
            doc_id: "demo_2023".to_string(),
            theme_code: theme.to_string(),
            sha256: sha256_hex(text.as_bytes()),
            extract_30w: text,
            page: Some(seq as u32),
            span_start: 0,
            span_end: 8,
            org_id: "demo".to_string(),
            year: 2023,
            source_id: "local".to_string(),
            chunk_id: None,
        }
    }

    fn doc_with_counts(counts: &[(&str, usize)]) -> DocScore {
        let scores = counts
            .iter()
            .map(|(theme, n)| ThemeScore {
                theme: theme.to_string(),
                stage: Some(*n as f64),
                reason: None,
                evidence: (0..*n).map(|i| evidence(theme, i)).collect(),
            })
            .collect();
        DocScore {
            company: "demo".to_string(),
            year: 2023,
            doc_id: "demo_2023".to_string(),
            scores,
        }
    }

    fn full_counts(n: usize) -> Vec<(&'static str, usize)> {
        vec![
            ("TSP", n),
            ("OSP", n),
            ("DM", n),
            ("GHG", n),
            ("RD", n),
            ("EI", n),
            ("RMM", n),
        ]
    }

    #[test]
    fn complete_output_passes_all_themes() {
        let rubric = builtin_rubric();
        let doc = doc_with_counts(&full_counts(2));
        let reports = rubric_compliance_gate(&rubric, &doc);
        assert_eq!(reports.len(), 7);
        assert!(reports.iter().all(|r| r.verdict == Verdict::Pass));
    }

    #[test]
    fn missing_theme_fails_that_theme() {
        let rubric = builtin_rubric();
        let mut doc = doc_with_counts(&full_counts(2));
        doc.scores.retain(|s| s.theme != "RMM");
        let reports = rubric_compliance_gate(&rubric, &doc);
        let rmm = reports.iter().find(|r| r.theme.as_deref() == Some("RMM")).unwrap();
        assert_eq!(rmm.verdict, Verdict::Fail);
        assert_eq!(rmm.diagnostics["reason"], "theme_missing_from_output");
    }

    #[test]
    fn nullified_theme_fails_with_its_reason() {
        let rubric = builtin_rubric();
        let mut counts = full_counts(2);
        counts[0] = ("TSP", 1);
        let doc = enforce_evidence_min_per_theme(doc_with_counts(&counts), 2);
        let reports = rubric_compliance_gate(&rubric, &doc);
        let tsp = reports.iter().find(|r| r.theme.as_deref() == Some("TSP")).unwrap();
        assert_eq!(tsp.verdict, Verdict::Fail);
        assert_eq!(tsp.diagnostics["reason"], "score_nullified");
        assert_eq!(
            tsp.diagnostics["nullification"],
            "insufficient_evidence(1<2)"
        );
    }

    #[test]
    fn stage_out_of_range_fails() {
        let rubric = builtin_rubric();
        let mut doc = doc_with_counts(&full_counts(2));
        doc.scores[0].stage = Some(5.0);
        let reports = rubric_compliance_gate(&rubric, &doc);
        assert_eq!(reports[0].verdict, Verdict::Fail);
        assert_eq!(reports[0].diagnostics["reason"], "stage_out_of_range");
    }

    #[test]
    fn scored_theme_with_too_few_citations_fails() {
        let rubric = builtin_rubric();
        let mut doc = doc_with_counts(&full_counts(2));
        doc.scores[3].evidence.truncate(1);
        let reports = rubric_compliance_gate(&rubric, &doc);
        let ghg = reports.iter().find(|r| r.theme.as_deref() == Some("GHG")).unwrap();
        assert_eq!(ghg.verdict, Verdict::Fail);
        assert_eq!(
            ghg.diagnostics["reason"],
            "insufficient_evidence_citations"
        );
    }
}
