use crate::config::RunConfig;
use crate::determinism::harness::DeterminismReport;
use crate::determinism::json_canonical::to_canonical_bytes;
use crate::error::CoreResult;
use crate::gates::parity::ParityResult;
use crate::model::Evidence;
use crate::store::{read_json, write_atomic, write_canonical_json};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const SUMMARY_COLUMNS: [&str; 6] =
    ["company", "year", "doc_id", "theme", "stage", "evidence_count"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThemeAudit {
    pub evidence: Vec<Evidence>,
    pub fused_topk_ids: Vec<String>,
    pub parity: ParityResult,
}

/// Per-document evidence audit, written under pipeline_validation/ and later
/// bundled into the gold export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceAudit {
    pub doc_id: String,
    pub org_id: String,
    pub year: i32,
    pub total_pages: u32,
    pub themes: BTreeMap<String, ThemeAudit>,
}

pub fn write_pipeline_validation(
    doc_dir: &Path,
    audit: &EvidenceAudit,
) -> CoreResult<()> {
    let dir = doc_dir.join("pipeline_validation");
    write_canonical_json(&dir.join("evidence_audit.json"), audit)?;

    // Compact parity demo: per theme, the retrieval top-K against the
    // evidence ids actually cited.
    let demo: BTreeMap<&String, Value> = audit
        .themes
        .iter()
        .map(|(theme, t)| {
            (
                theme,
                serde_json::json!({
                    "fused_topk_ids": t.fused_topk_ids,
                    "evidence_ids": t.evidence.iter()
                        .filter_map(|e| e.chunk_id.clone())
                        .collect::<Vec<_>>(),
                    "parity": t.parity,
                }),
            )
        })
        .collect();
    write_canonical_json(&dir.join("demo_topk_vs_evidence.json"), &demo)
}

#[derive(Debug, Clone)]
pub struct GoldBundle {
    pub scores_jsonl: PathBuf,
    pub evidence_bundle: PathBuf,
    pub summary_csv: PathBuf,
    pub index_html: PathBuf,
    pub success_pin: PathBuf,
}

/// Rebuilds the deployable gold-lite bundle from committed matrix artifacts:
/// scores.jsonl, evidence_bundle.json, summary.csv, index.html and the
/// release reproducibility pin.
pub fn refresh_gold_bundle(config: &RunConfig, artifacts_root: &Path) -> CoreResult<GoldBundle> {
    let gold_dir = artifacts_root.join("gold_demo");
    std::fs::create_dir_all(&gold_dir)?;
    let matrix_root = artifacts_root.join("matrix");
    let doc_dirs = sorted_dirs(&matrix_root)?;

    // scores.jsonl: one object per document, from the first baseline run.
    let mut scores_lines: Vec<Value> = Vec::new();
    for doc_dir in &doc_dirs {
        let output = doc_dir.join("baseline").join("run_1").join("output.json");
        if output.exists() {
            scores_lines.push(read_json(&output)?);
        }
    }
    let scores_jsonl = gold_dir.join("scores.jsonl");
    let mut jsonl_bytes = Vec::new();
    for line in &scores_lines {
        jsonl_bytes.extend_from_slice(&to_canonical_bytes(line)?);
        jsonl_bytes.push(b'\n');
    }
    write_atomic(&scores_jsonl, &jsonl_bytes)?;

    // evidence_bundle.json: concatenated audits with their origin path.
    let mut bundle: Vec<Value> = Vec::new();
    for doc_dir in &doc_dirs {
        let audit_path = doc_dir.join("pipeline_validation").join("evidence_audit.json");
        if audit_path.exists() {
            let mut audit: Value = read_json(&audit_path)?;
            if let Some(obj) = audit.as_object_mut() {
                obj.insert(
                    "_source".to_string(),
                    Value::String(relative_to(&audit_path, artifacts_root)),
                );
            }
            bundle.push(audit);
        }
    }
    let evidence_bundle = gold_dir.join("evidence_bundle.json");
    write_canonical_json(&evidence_bundle, &bundle)?;

    // summary.csv: stable column order tabular flattening.
    let summary_csv = gold_dir.join("summary.csv");
    write_atomic(&summary_csv, &render_summary_csv(&scores_lines)?)?;

    // index.html: human landing page.
    let index_html = gold_dir.join("index.html");
    write_atomic(&index_html, render_index_html(config, &scores_lines).as_bytes())?;

    // SUCCESS_PIN.json: the canonical "did this release reproduce" artifact.
    let mut pins: Vec<DeterminismReport> = Vec::new();
    for doc_dir in &doc_dirs {
        let report_path = doc_dir.join("baseline").join("determinism_report.json");
        if report_path.exists() {
            pins.push(read_json(&report_path)?);
        }
    }
    let all_identical = !pins.is_empty() && pins.iter().all(|p| p.identical);
    let success_pin_doc = serde_json::json!({
        "generated_at": config.now(),
        "environment": {
            "seed": config.seed,
            "hash_seed": config.hash_seed,
            "offline_replay": config.offline_replay,
            "fixed_time": config.fixed_time,
        },
        "determinism_pins": pins,
        "total_documents": pins.len(),
        "all_identical": all_identical,
    });
    let qa_dir = artifacts_root.join("qa");
    let success_pin = qa_dir.join("SUCCESS_PIN.json");
    write_canonical_json(&success_pin, &success_pin_doc)?;

    tracing::info!(
        documents = scores_lines.len(),
        all_identical,
        "gold-lite bundle refreshed"
    );

    Ok(GoldBundle {
        scores_jsonl,
        evidence_bundle,
        summary_csv,
        index_html,
        success_pin,
    })
}

fn render_summary_csv(scores_lines: &[Value]) -> CoreResult<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(SUMMARY_COLUMNS)?;
    for output in scores_lines {
        let company = output["company"].as_str().unwrap_or("");
        let year = output["year"].as_i64().map(|y| y.to_string()).unwrap_or_default();
        let doc_id = output["doc_id"].as_str().unwrap_or("");
        if let Some(scores) = output["scores"].as_array() {
            for score in scores {
                let theme = score["theme"].as_str().unwrap_or("");
                let stage = format_stage(score.get("stage"));
                let evidence_count = score["evidence"]
                    .as_array()
                    .map(|e| e.len())
                    .unwrap_or(0)
                    .to_string();
                writer.write_record([
                    company,
                    year.as_str(),
                    doc_id,
                    theme,
                    stage.as_str(),
                    evidence_count.as_str(),
                ])?;
            }
        }
    }
    writer
        .into_inner()
        .map_err(|e| crate::error::CoreError::InvalidInput(format!("csv flush: {}", e)))
}

fn format_stage(stage: Option<&Value>) -> String {
    match stage.and_then(|s| s.as_f64()) {
        Some(v) if v.fract() == 0.0 => format!("{}", v as i64),
        Some(v) => format!("{}", v),
        None => String::new(),
    }
}

fn render_index_html(config: &RunConfig, scores_lines: &[Value]) -> String {
    let mut items = String::new();
    for output in scores_lines {
        let doc_id = output["doc_id"].as_str().unwrap_or("unknown");
        items.push_str(&format!("    <li>{}</li>\n", doc_id));
    }
    if items.is_empty() {
        items.push_str("    <li>No scored documents yet</li>\n");
    }
    format!(
        "<!DOCTYPE html>\n<html>\n<head><title>ESG Evidence Pipeline - Gold Bundle</title></head>\n\
         <body>\n  <h1>Gold-Lite Export</h1>\n  <h2>Documents</h2>\n  <ul>\n{}\
         \n  </ul>\n  <h2>Artifacts</h2>\n  <ul>\n    <li>scores.jsonl</li>\n    \
         <li>evidence_bundle.json</li>\n    <li>summary.csv</li>\n  </ul>\n  \
         <p><small>Generated: {}</small></p>\n</body>\n</html>\n",
        items,
        config.now()
    )
}

fn sorted_dirs(root: &Path) -> CoreResult<Vec<PathBuf>> {
    if !root.exists() {
        return Ok(Vec::new());
    }
    let mut dirs = Vec::new();
    for entry in std::fs::read_dir(root)? {
        let entry = entry?;
        if entry.path().is_dir() {
            dirs.push(entry.path());
        }
    }
    dirs.sort();
    Ok(dirs)
}

fn relative_to(path: &Path, root: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .into_owned()
}
