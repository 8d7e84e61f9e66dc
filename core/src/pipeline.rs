use crate::acquire::http::HttpFetcher;
use crate::acquire::Acquirer;
use crate::catalog::{OrgCatalog, OrgEntry};
use crate::config::RunConfig;
use crate::contract::{
    aggregate_matrix_contract, build_output_contract, write_matrix_contract,
    write_output_contract, MatrixContract, OutputContract,
};
use crate::determinism::harness::{run_n_times, DeterminismReport};
use crate::error::{CoreError, CoreResult};
use crate::evidence::aggregator::{evidence_by_theme, select_evidence};
use crate::evidence::themes::{tag_theme, theme_query, THEME_CODES};
use crate::extract::chunker::{ChunkOptions, DocMeta};
use crate::extract::extract;
use crate::gates::alignment::alignment_gate;
use crate::gates::authenticity::authenticity_gate;
use crate::gates::determinism::determinism_gate;
use crate::gates::evidence_quality::{cap_per_page, evidence_quality_gate, EVIDENCE_PER_PAGE_CAP};
use crate::gates::grounding::grounding_gate;
use crate::gates::parity::{parity_gate, parity_result};
use crate::gates::rubric_compliance::rubric_compliance_gate;
use crate::gates::GateReport;
use crate::gold::{refresh_gold_bundle, write_pipeline_validation, EvidenceAudit, ThemeAudit};
use crate::index::embedder::HashTfEmbedder;
use crate::index::enriched::build_index;
use crate::model::{AcquisitionRecord, Chunk, Evidence, Finding, PartitionManifest};
use crate::retrieve::fusion::retrieve;
use crate::rubric::Rubric;
use crate::score::{enforce_evidence_min_per_theme, DocScore, ScoringModel};
use crate::store::{bronze, silver};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub chunk_options: ChunkOptions,
    /// Selection budget per theme; must be at least the rubric's evidence
    /// minimum, and large enough to satisfy the page-spread gate.
    pub evidence_per_theme: usize,
    pub top_k: usize,
    pub runs: u32,
    pub case_fold_grounding: bool,
    pub authenticity_scan_root: Option<PathBuf>,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            chunk_options: ChunkOptions::default(),
            evidence_per_theme: 6,
            top_k: 10,
            runs: 3,
            case_fold_grounding: false,
            authenticity_scan_root: None,
        }
    }
}

/// Extracts an acquired raw document into page-tagged chunks, tags each chunk
/// with a theme, and writes one bronze partition per theme.
pub fn ingest_document(
    config: &RunConfig,
    data_root: &Path,
    org: &OrgEntry,
    record: &AcquisitionRecord,
    opts: &PipelineOptions,
) -> CoreResult<Vec<PartitionManifest>> {
    let meta = DocMeta {
        doc_id: org.doc_id(),
        org_id: org.org_id.clone(),
        year: org.year,
        provider: record.provider.clone(),
        source_url: Some(record.source_url.clone()),
        doc_hash: record.sha256.clone(),
    };
    let chunks = extract(
        config,
        Path::new(&record.local_path),
        &meta,
        &opts.chunk_options,
    )?;

    let mut by_theme: BTreeMap<&'static str, Vec<Chunk>> = BTreeMap::new();
    for chunk in chunks {
        if let Some(theme) = tag_theme(&chunk.text) {
            by_theme.entry(theme).or_default().push(chunk);
        }
    }
    if by_theme.is_empty() {
        return Err(CoreError::InputMissing(format!(
            "no themed content extracted from {}",
            record.local_path
        )));
    }

    let mut manifests = Vec::new();
    for (theme, chunks) in by_theme {
        manifests.push(bronze::write_partition(
            config,
            data_root,
            &org.org_id,
            org.year,
            theme,
            &chunks,
            vec![record.sha256.clone()],
            true,
        )?);
    }
    Ok(manifests)
}

/// Everything one Silver→Gold computation produces for a document.
pub struct DocRunArtifacts {
    pub output: Value,
    pub evidence: Vec<Evidence>,
    pub audit: EvidenceAudit,
    pub doc_score: DocScore,
    pub silver: Vec<Chunk>,
    pub total_pages: u32,
}

/// The Silver→Gold portion for one document: consolidate bronze, build the
/// enriched index, retrieve per theme, select and trim evidence, score, and
/// assemble the run output. Fully deterministic under offline replay.
pub fn silver_to_gold(
    config: &RunConfig,
    data_root: &Path,
    org: &OrgEntry,
    rubric: &Rubric,
    scorer: &dyn ScoringModel,
    opts: &PipelineOptions,
) -> CoreResult<DocRunArtifacts> {
    let doc_id = org.doc_id();
    let silver_output = silver::consolidate(config, data_root, &org.org_id, org.year, true)?;
    let silver_dir = silver::silver_dir(data_root, &org.org_id, org.year);
    let rows = silver::load_silver(&silver_dir, &org.org_id, org.year)?;

    let embedder = HashTfEmbedder::default();
    let index = build_index(config, &rows, &embedder)?;
    let by_chunk_id: BTreeMap<&str, &Chunk> =
        rows.iter().map(|c| (c.chunk_id.as_str(), c)).collect();
    let total_pages = rows.iter().filter_map(|c| c.page).max().unwrap_or(1);

    let mut findings: Vec<Finding> = Vec::new();
    let mut topk_by_theme: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for code in THEME_CODES {
        let result = retrieve(
            &index,
            &embedder,
            Some(org.org_id.as_str()),
            Some(code),
            &theme_query(code),
            opts.top_k,
            config.strict_retrieval,
        )?;
        let ids = result.chunk_ids();
        for (rank, chunk_id) in ids.iter().enumerate() {
            if let Some(chunk) = by_chunk_id.get(chunk_id.as_str()) {
                findings.push(Finding {
                    finding_id: format!("{}-{}-{:03}", code, doc_id, rank),
                    text: chunk.text.clone(),
                    theme: code.to_string(),
                    source_id: chunk.provider.clone(),
                    doc_id: chunk.doc_id.clone(),
                    page: chunk.page,
                    char_start: chunk.char_start,
                    char_end: chunk.char_end,
                    entities: Vec::new(),
                    frameworks: Vec::new(),
                    org_id: chunk.org_id.clone(),
                    year: chunk.year,
                    chunk_id: Some(chunk.chunk_id.clone()),
                });
            }
        }
        topk_by_theme.insert(code.to_string(), ids);
    }

    // Selection, then the per-page cap; trimming precedes gate evaluation.
    let selected = select_evidence(&findings, opts.evidence_per_theme);
    let mut evidence: Vec<Evidence> = Vec::new();
    let mut themes: BTreeMap<String, ThemeAudit> = BTreeMap::new();
    for (theme, theme_evidence) in evidence_by_theme(&selected) {
        let trimmed = cap_per_page(&theme_evidence, EVIDENCE_PER_PAGE_CAP);
        let topk = topk_by_theme.get(&theme).cloned().unwrap_or_default();
        let evidence_ids: Vec<String> =
            trimmed.iter().filter_map(|e| e.chunk_id.clone()).collect();
        themes.insert(
            theme.clone(),
            ThemeAudit {
                evidence: trimmed.clone(),
                parity: parity_result(&evidence_ids, &topk),
                fused_topk_ids: topk,
            },
        );
        evidence.extend(trimmed);
    }
    crate::model::validate_evidence(&evidence)?;

    let scored = scorer.score(rubric, &org.org_id, org.year, &doc_id, &evidence)?;
    let doc_score = enforce_evidence_min_per_theme(
        scored,
        rubric.scoring_rules.evidence_min_per_stage_claim,
    );

    let mut output = serde_json::to_value(&doc_score)?;
    if let Some(obj) = output.as_object_mut() {
        obj.insert(
            "data_hash".to_string(),
            Value::String(silver_output.manifest.data_hash.clone()),
        );
        obj.insert(
            "rubric_version".to_string(),
            Value::String(rubric.version.clone()),
        );
    }

    let audit = EvidenceAudit {
        doc_id: doc_id.clone(),
        org_id: org.org_id.clone(),
        year: org.year,
        total_pages,
        themes,
    };

    Ok(DocRunArtifacts {
        output,
        evidence,
        audit,
        doc_score,
        silver: rows,
        total_pages,
    })
}

pub struct MatrixDocResult {
    pub determinism: DeterminismReport,
    pub contract: OutputContract,
    pub artifacts: DocRunArtifacts,
}

/// Runs the full per-document matrix: the determinism harness around the
/// Silver→Gold stage, the validation artifacts, and every gate, ending in the
/// document's output contract.
pub fn run_document_matrix(
    config: &RunConfig,
    data_root: &Path,
    artifacts_root: &Path,
    org: &OrgEntry,
    rubric: &Rubric,
    scorer: &dyn ScoringModel,
    pdf_path: Option<&Path>,
    opts: &PipelineOptions,
) -> CoreResult<MatrixDocResult> {
    let doc_id = org.doc_id();
    let doc_dir = artifacts_root.join("matrix").join(&doc_id);
    let baseline_dir = doc_dir.join("baseline");
    std::fs::create_dir_all(&baseline_dir)?;

    let determinism = run_n_times(config, &doc_id, &baseline_dir, opts.runs, |_, _| {
        silver_to_gold(config, data_root, org, rubric, scorer, opts).map(|a| a.output)
    })?;

    let artifacts = silver_to_gold(config, data_root, org, rubric, scorer, opts)?;
    write_pipeline_validation(&doc_dir, &artifacts.audit)?;

    let mut gates: Vec<GateReport> = Vec::new();
    gates.push(determinism_gate(&determinism));
    for (theme, audit) in &artifacts.audit.themes {
        gates.push(evidence_quality_gate(
            &doc_id,
            theme,
            &audit.evidence,
            artifacts.total_pages,
            false,
        ));
        let evidence_ids: Vec<String> = audit
            .evidence
            .iter()
            .filter_map(|e| e.chunk_id.clone())
            .collect();
        gates.push(parity_gate(
            &doc_id,
            theme,
            &evidence_ids,
            &audit.fused_topk_ids,
        ));
    }
    gates.push(grounding_gate(
        &doc_id,
        &artifacts.evidence,
        &artifacts.silver,
        opts.case_fold_grounding,
    ));
    gates.push(alignment_gate(config, &doc_id, &artifacts.evidence, pdf_path));
    gates.push(authenticity_gate(
        &doc_id,
        opts.authenticity_scan_root.as_deref(),
    ));
    gates.extend(rubric_compliance_gate(rubric, &artifacts.doc_score));

    let contract = build_output_contract(config, &doc_id, gates);
    write_output_contract(&doc_dir, &contract)?;

    Ok(MatrixDocResult {
        determinism,
        contract,
        artifacts,
    })
}

/// End-to-end driver over the org catalog: acquire, ingest, run the matrix
/// per document, aggregate the matrix contract, refresh the gold bundle.
/// Transport and missing-input failures skip the document with a recorded
/// reason; config and authenticity failures abort the run.
pub fn run_full_pipeline(
    config: &RunConfig,
    data_root: &Path,
    artifacts_root: &Path,
    catalog: &OrgCatalog,
    rubric: &Rubric,
    scorer: &dyn ScoringModel,
    fetcher: Box<dyn HttpFetcher>,
    opts: &PipelineOptions,
) -> CoreResult<MatrixContract> {
    let mut acquirer = Acquirer::new(config, fetcher);
    let raw_dir = data_root.join("raw");
    let mut contracts: Vec<OutputContract> = Vec::new();

    for org in &catalog.orgs {
        let doc_id = org.doc_id();
        let result = process_document(
            config,
            data_root,
            artifacts_root,
            org,
            rubric,
            scorer,
            &mut acquirer,
            &raw_dir,
            opts,
        );
        match result {
            Ok(contract) => contracts.push(contract),
            Err(e @ (CoreError::Config(_) | CoreError::Authenticity(_))) => return Err(e),
            Err(e @ (CoreError::InputMissing(_) | CoreError::Transport(_))) => {
                tracing::warn!(doc_id = %doc_id, reason = %e, "document skipped");
                let skipped = build_output_contract(
                    config,
                    &doc_id,
                    vec![GateReport::skipped("pipeline", &doc_id, &e.to_string())],
                );
                let doc_dir = artifacts_root.join("matrix").join(&doc_id);
                std::fs::create_dir_all(&doc_dir)?;
                write_output_contract(&doc_dir, &skipped)?;
                contracts.push(skipped);
            }
            Err(e) => return Err(e),
        }
    }

    let matrix = aggregate_matrix_contract(config, &contracts);
    write_matrix_contract(artifacts_root, &matrix)?;
    refresh_gold_bundle(config, artifacts_root)?;
    Ok(matrix)
}

#[allow(clippy::too_many_arguments)]
fn process_document(
    config: &RunConfig,
    data_root: &Path,
    artifacts_root: &Path,
    org: &OrgEntry,
    rubric: &Rubric,
    scorer: &dyn ScoringModel,
    acquirer: &mut Acquirer,
    raw_dir: &Path,
    opts: &PipelineOptions,
) -> CoreResult<OutputContract> {
    let record = acquirer.acquire(org, raw_dir)?;
    ingest_document(config, data_root, org, &record, opts)?;
    let pdf_path = if record.local_path.ends_with(".pdf") {
        Some(PathBuf::from(&record.local_path))
    } else {
        None
    };
    let result = run_document_matrix(
        config,
        data_root,
        artifacts_root,
        org,
        rubric,
        scorer,
        pdf_path.as_deref(),
        opts,
    )?;
    Ok(result.contract)
}
