pub mod chunker;
pub mod pdf;
pub mod text_clean;

use crate::config::RunConfig;
use crate::error::{CoreError, CoreResult};
use crate::model::Chunk;
use chunker::{chunk_segments, ChunkOptions, DocMeta, Segment};
use regex::Regex;
use std::path::Path;

/// Parses a raw document into ordered, page-tagged chunks. PDF pages come
/// from the parser; HTML is tag-stripped; TXT/CSV/JSONL pass through as flat
/// text with estimated pages.
pub fn extract(
    config: &RunConfig,
    file_path: &Path,
    meta: &DocMeta,
    opts: &ChunkOptions,
) -> CoreResult<Vec<Chunk>> {
    let ext = file_path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let segments = match ext.as_str() {
        "pdf" => {
            let doc = pdf::PdfDoc::open(file_path)?;
            doc.pages()
                .into_iter()
                .map(|(page, text)| Segment {
                    page: Some(page),
                    text,
                })
                .collect()
        }
        "html" | "htm" => {
            let raw = read_text(file_path)?;
            vec![Segment {
                page: None,
                text: strip_html_tags(&raw),
            }]
        }
        "txt" | "csv" | "jsonl" | "json" => {
            let raw = read_text(file_path)?;
            vec![Segment {
                page: None,
                text: raw,
            }]
        }
        other => {
            return Err(CoreError::InvalidInput(format!(
                "unsupported document format: {:?} ({})",
                other,
                file_path.display()
            )));
        }
    };

    chunk_segments(config, meta, &segments, opts)
}

fn read_text(path: &Path) -> CoreResult<String> {
    let bytes = std::fs::read(path)
        .map_err(|e| CoreError::InputMissing(format!("{}: {}", path.display(), e)))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Replaces tags (and script/style bodies) with spaces so char offsets keep a
/// stable relationship to the visible text.
pub fn strip_html_tags(html: &str) -> String {
    let script_re = Regex::new(r"(?is)<(script|style)\b.*?</(script|style)>")
        .unwrap_or_else(|_| Regex::new("^$").unwrap());
    let without_scripts = script_re.replace_all(html, " ");
    let tag_re = Regex::new(r"<[^>]*>").unwrap_or_else(|_| Regex::new("^$").unwrap());
    let stripped = tag_re.replace_all(&without_scripts, " ");
    stripped
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&nbsp;", " ")
        .replace("&quot;", "\"")
}
