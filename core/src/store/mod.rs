pub mod bronze;
pub mod columnar;
pub mod locator;
pub mod silver;

use crate::determinism::json_canonical::to_canonical_bytes;
use crate::error::{CoreError, CoreResult};
use serde::Serialize;
use std::io::Write;
use std::path::Path;

/// Atomic-or-absent file write: bytes land in a unique temp path and move into
/// place only after a flush. A pre-existing temp path means a concurrent
/// writer to the same artifact, which is a programming error.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> CoreResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("part");
    let mut f = std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&tmp)
        .map_err(|e| {
            CoreError::Integrity(format!(
                "concurrent writer detected at {}: {}",
                tmp.display(),
                e
            ))
        })?;
    f.write_all(bytes)?;
    f.flush()?;
    drop(f);
    std::fs::rename(&tmp, path)?;
    Ok(())
}

pub fn write_canonical_json<T: Serialize>(path: &Path, value: &T) -> CoreResult<()> {
    let bytes = to_canonical_bytes(value)?;
    write_atomic(path, &bytes)
}

/// Newline-delimited JSON for manual inspection; one canonical row per line.
pub fn write_jsonl<T: Serialize>(path: &Path, rows: &[T]) -> CoreResult<()> {
    let mut out = Vec::new();
    for row in rows {
        out.extend_from_slice(&to_canonical_bytes(row)?);
        out.push(b'\n');
    }
    write_atomic(path, &out)
}

pub fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> CoreResult<T> {
    let bytes = std::fs::read(path)
        .map_err(|e| CoreError::InputMissing(format!("{}: {}", path.display(), e)))?;
    Ok(serde_json::from_slice(&bytes)?)
}
