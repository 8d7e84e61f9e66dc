use crate::config::RunConfig;
use crate::determinism::hash::sha256_hex;
use crate::determinism::json_canonical::to_canonical_bytes;
use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeterminismReport {
    pub doc_id: String,
    pub total_runs: u32,
    pub seed: u64,
    pub hash_seed: u64,
    pub all_hashes: Vec<String>,
    pub unique_output_hashes: usize,
    pub identical: bool,
    /// Byte offset where the first two distinct payloads diverge, when comparable.
    pub first_divergence_byte: Option<usize>,
}

/// Executes the Silver→Gold portion of the pipeline `n` times into sibling
/// `run_{i}` directories and verifies the canonicalized outputs hash
/// identically. The stage closure receives the isolated run directory and the
/// 1-based run index, and returns the run's output document.
pub fn run_n_times<F>(
    config: &RunConfig,
    doc_id: &str,
    baseline_dir: &Path,
    n: u32,
    stage: F,
) -> CoreResult<DeterminismReport>
where
    F: Fn(&Path, u32) -> CoreResult<Value>,
{
    if n == 0 {
        return Err(CoreError::InvalidInput(
            "determinism harness requires n >= 1".to_string(),
        ));
    }
    if !config.offline_replay {
        tracing::warn!(
            doc_id,
            "determinism harness running without offline replay; timestamps will differ"
        );
    }

    let mut payloads: Vec<Vec<u8>> = Vec::with_capacity(n as usize);
    let mut all_hashes: Vec<String> = Vec::with_capacity(n as usize);

    for i in 1..=n {
        let run_dir = baseline_dir.join(format!("run_{}", i));
        std::fs::create_dir_all(&run_dir)?;
        let output = stage(&run_dir, i)?;
        let bytes = to_canonical_bytes(&output)?;
        std::fs::write(run_dir.join("output.json"), &bytes)?;
        all_hashes.push(sha256_hex(&bytes));
        payloads.push(bytes);
    }

    let distinct: BTreeSet<&String> = all_hashes.iter().collect();
    let identical = distinct.len() == 1;
    let first_divergence_byte = if identical {
        None
    } else {
        first_divergence(&payloads)
    };

    let report = DeterminismReport {
        doc_id: doc_id.to_string(),
        total_runs: n,
        seed: config.seed,
        hash_seed: config.hash_seed,
        unique_output_hashes: distinct.len(),
        all_hashes,
        identical,
        first_divergence_byte,
    };

    let report_bytes = to_canonical_bytes(&report)?;
    std::fs::write(baseline_dir.join("determinism_report.json"), report_bytes)?;

    Ok(report)
}

fn first_divergence(payloads: &[Vec<u8>]) -> Option<usize> {
    let first = payloads.first()?;
    for other in payloads.iter().skip(1) {
        if other == first {
            continue;
        }
        let idx = first
            .iter()
            .zip(other.iter())
            .position(|(a, b)| a != b)
            .unwrap_or_else(|| first.len().min(other.len()));
        return Some(idx);
    }
    None
}
