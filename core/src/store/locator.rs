use crate::config::{ParserBackend, RunConfig};
use std::path::{Path, PathBuf};

/// Backend-aware silver locator. Under the docling parser backend the
/// `silver_docling` mirror is preferred, falling back to `silver`.
pub fn locate_silver_dir(
    config: &RunConfig,
    data_root: &Path,
    org_id: &str,
    year: i32,
) -> Option<PathBuf> {
    let suffix = PathBuf::from(format!("org_id={}", org_id)).join(format!("year={}", year));
    if config.parser_backend == ParserBackend::Docling {
        let docling = data_root.join("silver_docling").join(&suffix);
        if docling.join(super::silver::MANIFEST_FILE).exists() {
            return Some(docling);
        }
    }
    let default = data_root.join("silver").join(&suffix);
    if default.join(super::silver::MANIFEST_FILE).exists() {
        return Some(default);
    }
    None
}
