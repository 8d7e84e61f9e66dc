use crate::error::{CoreError, CoreResult};
use crate::evidence::themes::THEME_CODES;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Stage keys are fixed to the "0"–"4" convention at load time; documents
/// using any other convention are rejected rather than reinterpreted.
pub const STAGE_KEYS: [&str; 5] = ["0", "1", "2", "3", "4"];
pub const STAGE_MIN: f64 = 0.0;
pub const STAGE_MAX: f64 = 4.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Theme {
    pub code: String,
    pub name: String,
    pub stages: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringRules {
    pub evidence_min_per_stage_claim: usize,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rubric {
    pub version: String,
    pub themes: Vec<Theme>,
    pub scoring_rules: ScoringRules,
    /// Recorded at load time; always "0-4".
    #[serde(default = "default_stage_convention")]
    pub stage_convention: String,
}

fn default_stage_convention() -> String {
    "0-4".to_string()
}

impl Rubric {
    pub fn theme(&self, code: &str) -> Option<&Theme> {
        self.themes.iter().find(|t| t.code == code)
    }

    pub fn stage_in_range(&self, stage: f64) -> bool {
        (STAGE_MIN..=STAGE_MAX).contains(&stage)
    }
}

pub fn load_rubric(path: &Path) -> CoreResult<Rubric> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| CoreError::InputMissing(format!("rubric {}: {}", path.display(), e)))?;
    let mut rubric: Rubric = serde_json::from_str(&text)
        .map_err(|e| CoreError::Config(format!("rubric {}: {}", path.display(), e)))?;
    rubric.stage_convention = default_stage_convention();
    validate_rubric(&rubric)?;
    Ok(rubric)
}

pub fn validate_rubric(rubric: &Rubric) -> CoreResult<()> {
    if rubric.themes.len() != THEME_CODES.len() {
        return Err(CoreError::Config(format!(
            "rubric must declare exactly {} themes, got {}",
            THEME_CODES.len(),
            rubric.themes.len()
        )));
    }
    for code in THEME_CODES {
        if rubric.theme(code).is_none() {
            return Err(CoreError::Config(format!("rubric missing theme {}", code)));
        }
    }
    for theme in &rubric.themes {
        let keys: Vec<&str> = theme.stages.keys().map(String::as_str).collect();
        if keys != STAGE_KEYS {
            return Err(CoreError::Config(format!(
                "theme {} must declare exactly stages {:?}, got {:?}",
                theme.code, STAGE_KEYS, keys
            )));
        }
    }
    if rubric.scoring_rules.evidence_min_per_stage_claim == 0 {
        return Err(CoreError::Config(
            "scoring_rules.evidence_min_per_stage_claim must be >= 1".to_string(),
        ));
    }
    Ok(())
}

/// A complete in-memory rubric used by tests and the self-audit binary.
pub fn builtin_rubric() -> Rubric {
    let theme_names: &[(&str, &str)] = &[
        ("TSP", "Target Setting & Planning"),
        ("OSP", "Operational Structure & Processes"),
        ("DM", "Data Maturity"),
        ("GHG", "GHG Accounting"),
        ("RD", "Reporting & Disclosure"),
        ("EI", "Energy Intelligence"),
        ("RMM", "Risk Management & Mitigation"),
    ];
    let themes = theme_names
        .iter()
        .map(|(code, name)| {
            let stages = STAGE_KEYS
                .iter()
                .map(|k| {
                    (
                        k.to_string(),
                        serde_json::json!({"descriptor": format!("{} stage {}", name, k)}),
                    )
                })
                .collect();
            Theme {
                code: code.to_string(),
                name: name.to_string(),
                stages,
            }
        })
        .collect();
    Rubric {
        version: "v3".to_string(),
        themes,
        scoring_rules: ScoringRules {
            evidence_min_per_stage_claim: 2,
            extra: BTreeMap::new(),
        },
        stage_convention: default_stage_convention(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_rubric_is_valid() {
        let rubric = builtin_rubric();
        validate_rubric(&rubric).unwrap();
        assert_eq!(rubric.themes.len(), 7);
        assert_eq!(rubric.stage_convention, "0-4");
    }

    #[test]
    fn missing_theme_is_config_error() {
        let mut rubric = builtin_rubric();
        rubric.themes.retain(|t| t.code != "RMM");
        assert!(matches!(
            validate_rubric(&rubric),
            Err(CoreError::Config(_))
        ));
    }

    #[test]
    fn five_stage_keys_are_required() {
        let mut rubric = builtin_rubric();
        rubric.themes[0].stages.remove("4");
        assert!(validate_rubric(&rubric).is_err());

        let mut rubric = builtin_rubric();
        rubric.themes[0]
            .stages
            .insert("5".to_string(), serde_json::json!({"descriptor": "extra"}));
        assert!(validate_rubric(&rubric).is_err());
    }

    #[test]
    fn rubric_round_trips_through_json() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("rubric.json");
        let bytes = serde_json::to_vec(&builtin_rubric()).unwrap();
        std::fs::write(&path, bytes).unwrap();
        let loaded = load_rubric(&path).unwrap();
        assert_eq!(loaded.version, "v3");
        assert_eq!(loaded.scoring_rules.evidence_min_per_stage_claim, 2);
    }
}
