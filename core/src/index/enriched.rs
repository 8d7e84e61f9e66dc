use crate::config::RunConfig;
use crate::error::{CoreError, CoreResult};
use crate::index::embedder::{Embedding, HashTfEmbedder};
use crate::model::Chunk;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

pub const LONG_TEXT_CHARS: usize = 2000;

/// One row of the enriched retrieval table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedDoc {
    pub id: String,
    pub org: String,
    pub theme: String,
    pub title: String,
    pub text: String,
    pub published_at: Option<String>,
    pub text_len: usize,
    pub long_text_flag: bool,
    pub age_days: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichedIndex {
    pub docs: Vec<EnrichedDoc>,
    pub embeddings: Vec<Embedding>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexParity {
    pub doc_count: usize,
    pub embedding_count: usize,
    pub docs_without_embedding: Vec<String>,
    pub embeddings_without_doc: Vec<String>,
}

impl IndexParity {
    pub fn ok(&self) -> bool {
        self.doc_count == self.embedding_count
            && self.docs_without_embedding.is_empty()
            && self.embeddings_without_doc.is_empty()
    }
}

/// Builds the enriched index from silver chunks: one row and one embedding per
/// chunk, rows sorted by (published_at DESC NULLS LAST, id) so equal retrieval
/// scores resolve to a stable top-K.
pub fn build_index(
    config: &RunConfig,
    chunks: &[Chunk],
    embedder: &HashTfEmbedder,
) -> CoreResult<EnrichedIndex> {
    let reference = parse_rfc3339(&config.fixed_time);
    let mut docs: Vec<EnrichedDoc> = chunks
        .iter()
        .map(|c| {
            let published_at = Some(c.created_at.clone());
            let age_days = match (reference, parse_rfc3339(&c.created_at)) {
                (Some(now), Some(then)) => Some((now - then).whole_days()),
                _ => None,
            };
            let text_len = c.text.chars().count();
            EnrichedDoc {
                id: c.chunk_id.clone(),
                org: c.org_id.clone(),
                theme: c.theme.clone(),
                title: format!("{} p{}", c.doc_id, c.page.unwrap_or(0)),
                text: c.text.clone(),
                published_at,
                text_len,
                long_text_flag: text_len > LONG_TEXT_CHARS,
                age_days,
            }
        })
        .collect();

    docs.sort_by(|a, b| cmp_published_desc_nulls_last(a, b));
    let embeddings = embedder.embed_chunks(config, chunks);

    let index = EnrichedIndex { docs, embeddings };
    let parity = verify_parity(&index);
    if !parity.ok() {
        return Err(CoreError::Integrity(format!(
            "index parity violated: {} docs vs {} embeddings ({} orphan docs, {} orphan embeddings)",
            parity.doc_count,
            parity.embedding_count,
            parity.docs_without_embedding.len(),
            parity.embeddings_without_doc.len()
        )));
    }
    Ok(index)
}

/// RFC3339 strings compare lexicographically in chronological order, so the
/// DESC NULLS LAST ordering reduces to a reversed string compare.
pub fn cmp_published_desc_nulls_last(a: &EnrichedDoc, b: &EnrichedDoc) -> std::cmp::Ordering {
    match (&a.published_at, &b.published_at) {
        (Some(pa), Some(pb)) => pb.cmp(pa).then_with(|| a.id.cmp(&b.id)),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => a.id.cmp(&b.id),
    }
}

pub fn verify_parity(index: &EnrichedIndex) -> IndexParity {
    let doc_ids: BTreeSet<&str> = index.docs.iter().map(|d| d.id.as_str()).collect();
    let emb_ids: BTreeSet<&str> = index.embeddings.iter().map(|e| e.chunk_id.as_str()).collect();
    IndexParity {
        doc_count: index.docs.len(),
        embedding_count: index.embeddings.len(),
        docs_without_embedding: doc_ids
            .difference(&emb_ids)
            .map(|s| s.to_string())
            .collect(),
        embeddings_without_doc: emb_ids
            .difference(&doc_ids)
            .map(|s| s.to_string())
            .collect(),
    }
}

fn parse_rfc3339(s: &str) -> Option<OffsetDateTime> {
    OffsetDateTime::parse(s, &Rfc3339).ok()
}
