use crate::determinism::hash::{is_hex64, sha256_hex};
use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const SCHEMA_VERSION: u32 = 1;

/// One page-tagged text chunk. The unit stored in bronze partitions and the
/// consolidated silver table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub chunk_id: String,
    /// Stable silver sort key, assigned at bronze-write time.
    pub evidence_id: String,
    pub doc_id: String,
    pub org_id: String,
    pub year: i32,
    pub theme: String,
    pub page: Option<u32>,
    #[serde(default)]
    pub section: Option<String>,
    pub text: String,
    pub char_start: usize,
    pub char_end: usize,
    pub sha256: String,
    #[serde(default)]
    pub source_url: Option<String>,
    pub provider: String,
    pub doc_hash: String,
    pub quality: f32,
    pub suspect: bool,
    pub schema_version: u32,
    pub created_at: String,
}

impl Chunk {
    pub fn chunk_id_for(doc_id: &str, page: u32, seq: usize) -> String {
        format!("{}_p{}_c{}", doc_id, page, seq)
    }

    /// Recomputes the text hash; bronze and silver readers call this on every
    /// load so corruption surfaces as `integrity_error` instead of bad data.
    pub fn verify_sha256(&self) -> CoreResult<()> {
        let actual = sha256_hex(self.text.as_bytes());
        if actual != self.sha256 {
            return Err(CoreError::Integrity(format!(
                "chunk {} sha256 mismatch (stored {}, computed {})",
                self.chunk_id, self.sha256, actual
            )));
        }
        Ok(())
    }
}

/// Intermediate per-source record; input to evidence selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub finding_id: String,
    pub text: String,
    pub theme: String,
    pub source_id: String,
    pub doc_id: String,
    pub page: Option<u32>,
    pub char_start: usize,
    pub char_end: usize,
    #[serde(default)]
    pub entities: Vec<String>,
    #[serde(default)]
    pub frameworks: Vec<String>,
    pub org_id: String,
    pub year: i32,
    /// Chunk the finding was drawn from; required for parity validation.
    pub chunk_id: Option<String>,
}

/// A ≤30-word quote with full provenance supporting one theme claim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    pub evidence_id: String,
    pub doc_id: String,
    pub theme_code: String,
    pub extract_30w: String,
    /// Explicitly None for non-paginated sources (e.g. SEC filings).
    pub page: Option<u32>,
    pub span_start: usize,
    pub span_end: usize,
    pub sha256: String,
    pub org_id: String,
    pub year: i32,
    pub source_id: String,
    pub chunk_id: Option<String>,
}

impl Evidence {
    pub fn word_count(&self) -> usize {
        self.extract_30w.split_whitespace().count()
    }
}

/// Per-fetch record emitted by the acquirer. The raw document it points at is
/// never mutated after acquisition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcquisitionRecord {
    pub local_path: String,
    pub source_url: String,
    pub sha256: String,
    pub size_bytes: u64,
    pub fetched_at: String,
    pub provider: String,
    pub http_headers: BTreeMap<String, String>,
    /// Locally-recovered conditions (e.g. robots.txt transport failure).
    #[serde(default)]
    pub diagnostics: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartitionManifest {
    pub org_id: String,
    pub year: i32,
    pub theme: String,
    pub row_count: usize,
    pub schema_version: u32,
    pub source_sha256: Vec<String>,
    pub partition_sha256: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SilverManifest {
    pub org_id: String,
    pub year: i32,
    pub record_count: usize,
    pub schema_version: u32,
    pub themes: Vec<String>,
    pub data_hash: String,
    pub columnar_file: String,
    pub jsonl_file: String,
    pub source_layer: String,
    pub transformation: String,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub chunk_id: String,
    pub fused_score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub query_fingerprint: String,
    pub theme: String,
    pub ranked: Vec<ScoredChunk>,
}

impl RetrievalResult {
    pub fn chunk_ids(&self) -> Vec<String> {
        self.ranked.iter().map(|s| s.chunk_id.clone()).collect()
    }
}

/// Boundary validation for evidence records. Everything downstream (gates,
/// gold export) may assume a validated record.
pub fn validate_evidence(evidence: &[Evidence]) -> CoreResult<()> {
    for ev in evidence {
        if ev.evidence_id.is_empty()
            || ev.doc_id.is_empty()
            || ev.theme_code.is_empty()
            || ev.extract_30w.is_empty()
            || ev.org_id.is_empty()
        {
            return Err(CoreError::InvalidInput(format!(
                "evidence {} missing required fields",
                ev.evidence_id
            )));
        }
        if !is_hex64(&ev.sha256) {
            return Err(CoreError::InvalidInput(format!(
                "evidence {} sha256 must be 64 hex chars",
                ev.evidence_id
            )));
        }
        if ev.word_count() > 30 {
            return Err(CoreError::InvalidInput(format!(
                "evidence {} exceeds 30 words ({})",
                ev.evidence_id,
                ev.word_count()
            )));
        }
        if ev.span_end < ev.span_start {
            return Err(CoreError::InvalidInput(format!(
                "evidence {} has inverted span",
                ev.evidence_id
            )));
        }
    }
    Ok(())
}
