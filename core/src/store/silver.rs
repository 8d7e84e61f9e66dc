use crate::config::RunConfig;
use crate::determinism::hash::canonical_sha256;
use crate::error::{CoreError, CoreResult};
use crate::model::{Chunk, SilverManifest, SCHEMA_VERSION};
use crate::store::{bronze, columnar, read_json, write_canonical_json, write_jsonl};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

pub const MANIFEST_FILE: &str = "ingestion_manifest.json";

#[derive(Debug, Clone)]
pub struct SilverOutput {
    pub columnar_path: PathBuf,
    pub jsonl_path: PathBuf,
    pub manifest: SilverManifest,
}

pub fn silver_dir(data_root: &Path, org_id: &str, year: i32) -> PathBuf {
    data_root
        .join("silver")
        .join(format!("org_id={}", org_id))
        .join(format!("year={}", year))
}

/// Merges every theme bronze partition for (org, year) into one consolidated
/// chunk table. Partitions are read in sorted path order and the whole table
/// is re-sorted by (evidence_id, chunk_id) to erase read order. The canonical
/// JSON hash of the sorted rows is the silver artifact's identity.
pub fn consolidate(
    config: &RunConfig,
    data_root: &Path,
    org_id: &str,
    year: i32,
    overwrite: bool,
) -> CoreResult<SilverOutput> {
    let partitions = bronze::list_theme_partitions(data_root, org_id, year)?;
    let mut rows: Vec<Chunk> = Vec::new();
    for dir in &partitions {
        match bronze::load_partition(dir) {
            Ok(mut part) => rows.append(&mut part),
            Err(e) => {
                tracing::warn!(partition = %dir.display(), error = %e, "skipping theme partition");
            }
        }
    }
    if rows.is_empty() {
        return Err(CoreError::InputMissing(format!(
            "no_bronze_data: org_id={} year={}",
            org_id, year
        )));
    }

    rows.sort_by(|a, b| {
        a.evidence_id
            .cmp(&b.evidence_id)
            .then_with(|| a.chunk_id.cmp(&b.chunk_id))
    });

    let dir = silver_dir(data_root, org_id, year);
    let doc_id = format!("{}_{}", org_id, year);
    let columnar_path = dir.join(format!("{}_chunks.columns.json", doc_id));
    let jsonl_path = dir.join(format!("{}_chunks.jsonl", doc_id));
    if columnar_path.exists() && !overwrite {
        return Err(CoreError::InvalidInput(format!(
            "silver table exists (pass overwrite to replace): {}",
            columnar_path.display()
        )));
    }
    if overwrite {
        for stale in [&columnar_path, &jsonl_path] {
            if stale.exists() {
                std::fs::remove_file(stale)?;
            }
        }
        let stale_manifest = dir.join(MANIFEST_FILE);
        if stale_manifest.exists() {
            std::fs::remove_file(&stale_manifest)?;
        }
    }

    let themes: BTreeSet<String> = rows.iter().map(|r| r.theme.clone()).collect();
    let manifest = SilverManifest {
        org_id: org_id.to_string(),
        year,
        record_count: rows.len(),
        schema_version: SCHEMA_VERSION,
        themes: themes.into_iter().collect(),
        data_hash: canonical_sha256(&rows)?,
        columnar_file: format!("{}_chunks.columns.json", doc_id),
        jsonl_file: format!("{}_chunks.jsonl", doc_id),
        source_layer: "bronze".to_string(),
        transformation: "bronze_to_silver_consolidation".to_string(),
        created_at: config.now(),
    };

    columnar::write_columns(&columnar_path, &rows)?;
    write_jsonl(&jsonl_path, &rows)?;
    write_canonical_json(&dir.join(MANIFEST_FILE), &manifest)?;

    tracing::info!(
        org_id,
        year,
        rows = manifest.record_count,
        data_hash = %manifest.data_hash,
        "silver table committed"
    );

    Ok(SilverOutput {
        columnar_path,
        jsonl_path,
        manifest,
    })
}

/// Loads a committed silver table, re-verifying the manifest hash and every
/// chunk hash. Corruption is an integrity error and is never healed.
pub fn load_silver(dir: &Path, org_id: &str, year: i32) -> CoreResult<Vec<Chunk>> {
    let manifest_path = dir.join(MANIFEST_FILE);
    if !manifest_path.exists() {
        return Err(CoreError::Integrity(format!(
            "silver manifest absent: {}",
            manifest_path.display()
        )));
    }
    let manifest: SilverManifest = read_json(&manifest_path)?;
    let rows = columnar::read_columns(&dir.join(&manifest.columnar_file))?;
    let actual = canonical_sha256(&rows)?;
    if actual != manifest.data_hash {
        return Err(CoreError::Integrity(format!(
            "silver {}_{} data_hash mismatch (stored {}, computed {})",
            org_id, year, manifest.data_hash, actual
        )));
    }
    for row in &rows {
        row.verify_sha256()?;
    }
    Ok(rows)
}
