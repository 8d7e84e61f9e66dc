use crate::config::RunConfig;
use crate::determinism::hash::sha256_hex;
use crate::error::{CoreError, CoreResult};
use crate::extract::text_clean::{clean_text, is_binary_like, quality_score};
use crate::model::{Chunk, SCHEMA_VERSION};

#[derive(Debug, Clone)]
pub struct ChunkOptions {
    pub chunk_size: usize,
    pub overlap: usize,
    /// Chars per page used to estimate a page number for flat text sources.
    pub page_char_estimate: usize,
    /// Chunks below this quality are flagged suspect, never dropped.
    pub quality_threshold: f32,
}

impl Default for ChunkOptions {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            overlap: 200,
            page_char_estimate: 3000,
            quality_threshold: 0.5,
        }
    }
}

/// Document-level provenance carried onto every chunk.
#[derive(Debug, Clone)]
pub struct DocMeta {
    pub doc_id: String,
    pub org_id: String,
    pub year: i32,
    pub provider: String,
    pub source_url: Option<String>,
    pub doc_hash: String,
}

/// One extractor segment: a page of text when the parser exposes page
/// boundaries, or the whole document with `page = None`.
#[derive(Debug, Clone)]
pub struct Segment {
    pub page: Option<u32>,
    pub text: String,
}

/// Sliding-window chunker. Segments with a known page keep it; flat segments
/// get an estimated page from the character offset. Offsets are char indices
/// into the cleaned document text, accumulated across segments.
pub fn chunk_segments(
    config: &RunConfig,
    meta: &DocMeta,
    segments: &[Segment],
    opts: &ChunkOptions,
) -> CoreResult<Vec<Chunk>> {
    if opts.overlap >= opts.chunk_size {
        return Err(CoreError::InvalidInput(format!(
            "chunk overlap {} must be smaller than chunk size {}",
            opts.overlap, opts.chunk_size
        )));
    }

    let created_at = config.now();
    let mut chunks = Vec::new();
    let mut seq = 0usize;
    let mut doc_offset = 0usize;

    for segment in segments {
        let binaryish = is_binary_like(&segment.text);
        let cleaned = clean_text(&segment.text);
        if cleaned.is_empty() {
            continue;
        }
        let mut base_quality = quality_score(&segment.text);
        if binaryish {
            base_quality = base_quality.min(quality_score(&cleaned) * 0.5);
        }

        for (start, end, window) in windows(&cleaned, opts.chunk_size, opts.overlap) {
            let text = window.trim().to_string();
            if text.is_empty() {
                continue;
            }
            let char_start = doc_offset + start;
            let char_end = doc_offset + end;
            let page = segment
                .page
                .unwrap_or_else(|| (char_start / opts.page_char_estimate) as u32 + 1)
                .max(1);
            let quality = base_quality.min(quality_score(&text));
            chunks.push(Chunk {
                chunk_id: Chunk::chunk_id_for(&meta.doc_id, page, seq),
                evidence_id: String::new(),
                doc_id: meta.doc_id.clone(),
                org_id: meta.org_id.clone(),
                year: meta.year,
                theme: String::new(),
                page: Some(page),
                section: None,
                sha256: sha256_hex(text.as_bytes()),
                char_start,
                char_end,
                text,
                source_url: meta.source_url.clone(),
                provider: meta.provider.clone(),
                doc_hash: meta.doc_hash.clone(),
                quality,
                suspect: quality < opts.quality_threshold,
                schema_version: SCHEMA_VERSION,
                created_at: created_at.clone(),
            });
            seq += 1;
        }
        doc_offset += cleaned.chars().count();
    }

    Ok(chunks)
}

/// Char-offset sliding windows over `text`. The last window may be shorter;
/// a trailing window fully covered by the previous one is not emitted.
fn windows(text: &str, chunk_size: usize, overlap: usize) -> Vec<(usize, usize, String)> {
    let chars: Vec<char> = text.chars().collect();
    let total = chars.len();
    if total == 0 {
        return Vec::new();
    }
    let step = chunk_size - overlap;
    let mut out = Vec::new();
    let mut start = 0usize;
    loop {
        let end = (start + chunk_size).min(total);
        out.push((start, end, chars[start..end].iter().collect()));
        if end == total {
            break;
        }
        start += step;
    }
    out
}
