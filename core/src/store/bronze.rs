use crate::config::RunConfig;
use crate::determinism::hash::canonical_sha256;
use crate::error::{CoreError, CoreResult};
use crate::model::{Chunk, PartitionManifest, SCHEMA_VERSION};
use crate::store::{columnar, read_json, write_canonical_json, write_jsonl};
use std::path::{Path, PathBuf};

pub const DATA_FILE: &str = "part-00000.columns.json";
pub const JSONL_FILE: &str = "part-00000.jsonl";
pub const MANIFEST_FILE: &str = "partition_manifest.json";

pub fn partition_dir(data_root: &Path, org_id: &str, year: i32, theme: &str) -> PathBuf {
    data_root
        .join("bronze")
        .join(format!("org_id={}", org_id))
        .join(format!("year={}", year))
        .join(format!("theme={}", theme))
}

/// Writes one immutable bronze partition. The partition materializes in a
/// temp directory and renames into place after data and manifest are flushed,
/// so it is either fully present or absent. Re-writing requires `overwrite`.
pub fn write_partition(
    config: &RunConfig,
    data_root: &Path,
    org_id: &str,
    year: i32,
    theme: &str,
    chunks: &[Chunk],
    source_sha256: Vec<String>,
    overwrite: bool,
) -> CoreResult<PartitionManifest> {
    let target = partition_dir(data_root, org_id, year, theme);
    if target.exists() {
        if !overwrite {
            return Err(CoreError::InvalidInput(format!(
                "bronze partition exists (pass overwrite to replace): {}",
                target.display()
            )));
        }
        std::fs::remove_dir_all(&target)?;
    }

    // Theme assignment and the silver sort key happen here, once.
    let mut rows: Vec<Chunk> = chunks.to_vec();
    for row in &mut rows {
        row.theme = theme.to_string();
        row.evidence_id = format!("{}:{}", theme, row.chunk_id);
    }
    rows.sort_by(|a, b| {
        a.evidence_id
            .cmp(&b.evidence_id)
            .then_with(|| a.chunk_id.cmp(&b.chunk_id))
    });

    let parent = target
        .parent()
        .ok_or_else(|| CoreError::InvalidInput("bronze partition has no parent".into()))?;
    std::fs::create_dir_all(parent)?;
    let tmp = parent.join(format!(".tmp-theme={}", theme));
    std::fs::create_dir(&tmp).map_err(|e| {
        CoreError::Integrity(format!(
            "concurrent writer detected at {}: {}",
            tmp.display(),
            e
        ))
    })?;

    let manifest = PartitionManifest {
        org_id: org_id.to_string(),
        year,
        theme: theme.to_string(),
        row_count: rows.len(),
        schema_version: SCHEMA_VERSION,
        source_sha256,
        partition_sha256: canonical_sha256(&rows)?,
        created_at: config.now(),
    };

    columnar::write_columns(&tmp.join(DATA_FILE), &rows)?;
    write_jsonl(&tmp.join(JSONL_FILE), &rows)?;
    write_canonical_json(&tmp.join(MANIFEST_FILE), &manifest)?;

    std::fs::rename(&tmp, &target)?;
    tracing::info!(
        org_id,
        year,
        theme,
        rows = manifest.row_count,
        "bronze partition committed"
    );
    Ok(manifest)
}

/// Loads a partition, verifying the manifest exists, the stored partition
/// hash matches the rows, and every chunk hash matches its text.
pub fn load_partition(dir: &Path) -> CoreResult<Vec<Chunk>> {
    let manifest_path = dir.join(MANIFEST_FILE);
    if !manifest_path.exists() {
        return Err(CoreError::Integrity(format!(
            "partition manifest absent: {}",
            manifest_path.display()
        )));
    }
    let manifest: PartitionManifest = read_json(&manifest_path)?;
    let rows = columnar::read_columns(&dir.join(DATA_FILE))?;
    if rows.len() != manifest.row_count {
        return Err(CoreError::Integrity(format!(
            "partition {} row count {} != manifest {}",
            dir.display(),
            rows.len(),
            manifest.row_count
        )));
    }
    let actual = canonical_sha256(&rows)?;
    if actual != manifest.partition_sha256 {
        return Err(CoreError::Integrity(format!(
            "partition {} hash mismatch (stored {}, computed {})",
            dir.display(),
            manifest.partition_sha256,
            actual
        )));
    }
    for row in &rows {
        row.verify_sha256()?;
    }
    Ok(rows)
}

/// Canonical enumeration of theme partitions: stable sorted path order, never
/// filesystem iteration order.
pub fn list_theme_partitions(
    data_root: &Path,
    org_id: &str,
    year: i32,
) -> CoreResult<Vec<PathBuf>> {
    let year_dir = data_root
        .join("bronze")
        .join(format!("org_id={}", org_id))
        .join(format!("year={}", year));
    if !year_dir.exists() {
        return Ok(Vec::new());
    }
    let mut partitions = Vec::new();
    for entry in std::fs::read_dir(&year_dir)? {
        let entry = entry?;
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().into_owned();
        if path.is_dir() && name.starts_with("theme=") {
            partitions.push(path);
        }
    }
    partitions.sort();
    Ok(partitions)
}
