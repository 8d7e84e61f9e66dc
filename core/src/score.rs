use crate::error::CoreResult;
use crate::evidence::aggregator::evidence_by_theme;
use crate::evidence::themes::THEME_CODES;
use crate::model::Evidence;
use crate::rubric::{Rubric, STAGE_MAX};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThemeScore {
    pub theme: String,
    /// None when the score was nullified; `reason` says why.
    pub stage: Option<f64>,
    #[serde(default)]
    pub reason: Option<String>,
    pub evidence: Vec<Evidence>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocScore {
    pub company: String,
    pub year: i32,
    pub doc_id: String,
    pub scores: Vec<ThemeScore>,
}

impl DocScore {
    pub fn theme_score(&self, theme: &str) -> Option<&ThemeScore> {
        self.scores.iter().find(|s| s.theme == theme)
    }
}

/// The maturity scorer proper is an external collaborator: a pure function of
/// (evidence, rubric). The pipeline only depends on this seam.
pub trait ScoringModel {
    fn score(
        &self,
        rubric: &Rubric,
        org_id: &str,
        year: i32,
        doc_id: &str,
        evidence: &[Evidence],
    ) -> CoreResult<DocScore>;
}

/// Offline stand-in scorer: stage = evidence count clamped to the rubric's
/// stage range. Pure and deterministic, which is all the data plane needs.
#[derive(Default)]
pub struct EvidenceCountModel;

impl ScoringModel for EvidenceCountModel {
    fn score(
        &self,
        _rubric: &Rubric,
        org_id: &str,
        year: i32,
        doc_id: &str,
        evidence: &[Evidence],
    ) -> CoreResult<DocScore> {
        let grouped = evidence_by_theme(evidence);
        let scores = THEME_CODES
            .iter()
            .map(|code| {
                let theme_evidence = grouped.get(*code).cloned().unwrap_or_default();
                let stage = (theme_evidence.len() as f64).min(STAGE_MAX);
                ThemeScore {
                    theme: code.to_string(),
                    stage: Some(stage),
                    reason: None,
                    evidence: theme_evidence,
                }
            })
            .collect();
        Ok(DocScore {
            company: org_id.to_string(),
            year,
            doc_id: doc_id.to_string(),
            scores,
        })
    }
}

/// Evidence-first guard: a theme scored with fewer than `evidence_min`
/// supporting quotes is nullified with a machine-readable reason. Pure
/// function; returns a new score set.
pub fn enforce_evidence_min_per_theme(doc: DocScore, evidence_min: usize) -> DocScore {
    let DocScore {
        company,
        year,
        doc_id,
        scores,
    } = doc;
    let scores = scores
        .into_iter()
        .map(|mut s| {
            let count = s.evidence.len();
            if count < evidence_min {
                s.stage = None;
                s.reason = Some(format!("insufficient_evidence({}<{})", count, evidence_min));
            }
            s
        })
        .collect();
    DocScore {
        company,
        year,
        doc_id,
        scores,
    }
}
