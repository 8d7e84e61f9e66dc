use esg_core::catalog::{OrgEntry, Provider};
use esg_core::config::RunConfig;
use esg_core::determinism::hash::sha256_hex;
use esg_core::gates::Verdict;
use esg_core::model::{Chunk, SCHEMA_VERSION};
use esg_core::pipeline::{run_document_matrix, PipelineOptions};
use esg_core::rubric::builtin_rubric;
use esg_core::score::EvidenceCountModel;
use esg_core::store::bronze;
use std::path::{Path, PathBuf};

const ORG_ID: &str = "selfaudit";
const YEAR: i32 = 2025;

// Deterministic self-audit: builds a small synthetic corpus, runs the
// Silver->Gold matrix twice, asserts byte-identical outputs, and prints every
// gate with its verdict. Exits non-zero on any gate failure or divergence.
fn main() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let data_root = tmp.path().join("data");
    let config = RunConfig::replay_fixture(tmp.path());

    seed_bronze(&config, &data_root);

    let org = OrgEntry {
        org_id: ORG_ID.to_string(),
        year: YEAR,
        provider: Provider::Local,
        pdf_path: None,
        source_url: None,
    };
    let rubric = builtin_rubric();
    let scan_root = Path::new("core").join("src");
    let opts = PipelineOptions {
        authenticity_scan_root: Some(scan_root),
        ..PipelineOptions::default()
    };

    let artifacts_a = tmp.path().join("artifacts_a");
    let artifacts_b = tmp.path().join("artifacts_b");
    let result_a = run_document_matrix(
        &config,
        &data_root,
        &artifacts_a,
        &org,
        &rubric,
        &EvidenceCountModel,
        None,
        &opts,
    )
    .expect("matrix run a");
    let result_b = run_document_matrix(
        &config,
        &data_root,
        &artifacts_b,
        &org,
        &rubric,
        &EvidenceCountModel,
        None,
        &opts,
    )
    .expect("matrix run b");

    // Consecutive runs over identical inputs must be byte-identical.
    let doc_id = format!("{}_{}", ORG_ID, YEAR);
    let output_a = read_run_output(&artifacts_a, &doc_id);
    let output_b = read_run_output(&artifacts_b, &doc_id);
    if output_a != output_b {
        eprintln!("EXPORT_BYTE_STABILITY FAIL (run outputs differ)");
        std::process::exit(1);
    }
    if !result_a.determinism.identical || !result_b.determinism.identical {
        eprintln!(
            "DETERMINISM FAIL (hashes: {:?})",
            result_a.determinism.all_hashes
        );
        std::process::exit(1);
    }

    println!(
        "MATRIX {} status={} data_runs={}",
        doc_id, result_a.contract.status, result_a.determinism.total_runs
    );
    for gate in &result_a.contract.gates {
        let theme = gate.theme.as_deref().unwrap_or("-");
        println!(
            "GATE {} theme={} {}{}",
            gate.gate,
            theme,
            verdict_str(&gate.verdict),
            gate.skip_reason
                .as_deref()
                .map(|r| format!(" ({})", r))
                .unwrap_or_default()
        );
    }

    if result_a.contract.status == "blocked" {
        std::process::exit(1);
    }
}

fn seed_bronze(config: &RunConfig, data_root: &Path) {
    // Three short chunks per theme, spread across pages 2/5/9 so the
    // evidence-quality spread requirements hold for a 9-page document.
    let theme_texts: &[(&str, [&str; 3])] = &[
        (
            "TSP",
            [
                "We set a net-zero target for 2050 validated against science based targets.",
                "Interim target: halve emissions by 2030 under our transition plan.",
                "Target coverage extends to every operating region.",
            ],
        ),
        (
            "OSP",
            [
                "The board retains oversight of sustainability through a dedicated committee.",
                "Management responsibility for climate sits with the operations committee.",
                "Governance reviews occur quarterly at board level.",
            ],
        ),
        (
            "DM",
            [
                "Data quality controls cover our measurement methodology end to end.",
                "The emissions baseline was restated using the refined methodology.",
                "Measurement systems are audited for data quality annually.",
            ],
        ),
        (
            "GHG",
            [
                "Scope 1 and scope 2 emissions fell seven percent year over year.",
                "Scope 3 emissions dominate our carbon footprint.",
                "Total CO2 emissions were 13.9 million metric tons.",
            ],
        ),
        (
            "RD",
            [
                "Our disclosure aligns with TCFD and GRI standards.",
                "We report annually through the CDP climate change questionnaire.",
                "The sustainability report covers SASB metrics.",
            ],
        ),
        (
            "EI",
            [
                "Renewable energy purchases reached nineteen gigawatts.",
                "Energy efficiency projects saved 2.8 petajoules.",
                "Solar and wind capacity grew across our portfolio.",
            ],
        ),
        (
            "RMM",
            [
                "Climate risk assessments inform our mitigation planning.",
                "Resilience investments target flood-exposed sites.",
                "Adaptation plans cover every major facility.",
            ],
        ),
    ];

    let doc_id = format!("{}_{}", ORG_ID, YEAR);
    let doc_hash = sha256_hex(b"selfaudit corpus");
    let pages: [u32; 3] = [2, 5, 9];
    let mut seq = 0usize;
    for (theme, texts) in theme_texts {
        let chunks: Vec<Chunk> = texts
            .iter()
            .zip(pages.iter())
            .map(|(text, page)| {
                let chunk = Chunk {
                    chunk_id: Chunk::chunk_id_for(&doc_id, *page, seq),
                    evidence_id: String::new(),
                    doc_id: doc_id.clone(),
                    org_id: ORG_ID.to_string(),
                    year: YEAR,
                    theme: String::new(),
                    page: Some(*page),
                    section: None,
                    text: text.to_string(),
                    char_start: 0,
                    char_end: text.len(),
                    sha256: sha256_hex(text.as_bytes()),
                    source_url: None,
                    provider: "local".to_string(),
                    doc_hash: doc_hash.clone(),
                    quality: 1.0,
                    suspect: false,
                    schema_version: SCHEMA_VERSION,
                    created_at: config.now(),
                };
                seq += 1;
                chunk
            })
            .collect();
        bronze::write_partition(
            config,
            data_root,
            ORG_ID,
            YEAR,
            theme,
            &chunks,
            vec![doc_hash.clone()],
            true,
        )
        .expect("seed bronze partition");
    }
}

fn read_run_output(artifacts_root: &Path, doc_id: &str) -> Vec<u8> {
    let path: PathBuf = artifacts_root
        .join("matrix")
        .join(doc_id)
        .join("baseline")
        .join("run_1")
        .join("output.json");
    std::fs::read(&path).expect("run output")
}

fn verdict_str(v: &Verdict) -> &'static str {
    match v {
        Verdict::Pass => "PASS",
        Verdict::Fail => "FAIL",
        Verdict::Skipped => "SKIPPED",
    }
}
