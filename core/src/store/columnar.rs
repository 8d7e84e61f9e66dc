use crate::error::{CoreError, CoreResult};
use crate::model::Chunk;
use crate::store::write_atomic;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;

// The chunk tables are stored column-major (one array per field, sorted
// column order) next to a row-wise JSONL mirror. Partition-addressable and
// streamable; the concrete columnar format is an implementation choice.

pub fn write_columns(path: &Path, chunks: &[Chunk]) -> CoreResult<()> {
    let mut columns: BTreeMap<String, Vec<Value>> = BTreeMap::new();
    for chunk in chunks {
        let row = serde_json::to_value(chunk)?;
        let obj = row
            .as_object()
            .ok_or_else(|| CoreError::InvalidInput("chunk did not serialize to object".into()))?;
        for (k, v) in obj {
            columns.entry(k.clone()).or_default().push(v.clone());
        }
    }
    let doc = serde_json::json!({
        "format": "columns_v1",
        "row_count": chunks.len(),
        "columns": columns,
    });
    let bytes = crate::determinism::json_canonical::to_canonical_bytes(&doc)?;
    write_atomic(path, &bytes)
}

pub fn read_columns(path: &Path) -> CoreResult<Vec<Chunk>> {
    let bytes = std::fs::read(path)
        .map_err(|e| CoreError::InputMissing(format!("{}: {}", path.display(), e)))?;
    let doc: Value = serde_json::from_slice(&bytes)?;
    let row_count = doc
        .get("row_count")
        .and_then(|v| v.as_u64())
        .ok_or_else(|| CoreError::Integrity(format!("{}: missing row_count", path.display())))?
        as usize;
    let columns = doc
        .get("columns")
        .and_then(|v| v.as_object())
        .ok_or_else(|| CoreError::Integrity(format!("{}: missing columns", path.display())))?;

    for (name, values) in columns {
        let len = values.as_array().map(|a| a.len()).unwrap_or(0);
        if len != row_count {
            return Err(CoreError::Integrity(format!(
                "{}: column {} has {} values, expected {}",
                path.display(),
                name,
                len,
                row_count
            )));
        }
    }

    let mut chunks = Vec::with_capacity(row_count);
    for i in 0..row_count {
        let mut row = serde_json::Map::new();
        for (name, values) in columns {
            if let Some(arr) = values.as_array() {
                row.insert(name.clone(), arr[i].clone());
            }
        }
        let chunk: Chunk = serde_json::from_value(Value::Object(row))?;
        chunks.push(chunk);
    }
    Ok(chunks)
}
