use crate::determinism::hash::canonical_sha256;
use crate::error::CoreResult;
use crate::index::embedder::{cosine, HashTfEmbedder};
use crate::index::enriched::{EnrichedDoc, EnrichedIndex};
use crate::model::{RetrievalResult, ScoredChunk};
use crate::retrieve::prefilter::prefilter;
use std::collections::{BTreeMap, BTreeSet};

pub const LEXICAL_WEIGHT: f64 = 0.6;
pub const VECTOR_WEIGHT: f64 = 0.4;

const BM25_K1: f64 = 1.5;
const BM25_B: f64 = 0.75;

/// Second retrieval tier: fuses a BM25-style lexical score with vector cosine
/// against the embedded query. Scores are min-max normalized per tier and
/// combined with a fixed convex weight; equal fused scores break by chunk_id
/// ascending, so the result order is fully defined.
pub fn retrieve(
    index: &EnrichedIndex,
    embedder: &HashTfEmbedder,
    org: Option<&str>,
    theme: Option<&str>,
    query: &str,
    k: usize,
    strict: bool,
) -> CoreResult<RetrievalResult> {
    let query_fingerprint = canonical_sha256(&serde_json::json!({
        "org": org,
        "theme": theme,
        "query": query,
        "k": k,
    }))?;
    let theme_label = theme.unwrap_or("").to_string();

    if k == 0 {
        return Ok(RetrievalResult {
            query_fingerprint,
            theme: theme_label,
            ranked: Vec::new(),
        });
    }

    let candidates = prefilter(&index.docs, org, theme, k, strict)?;
    if candidates.is_empty() {
        return Ok(RetrievalResult {
            query_fingerprint,
            theme: theme_label,
            ranked: Vec::new(),
        });
    }

    let vectors: BTreeMap<&str, &[f32]> = index
        .embeddings
        .iter()
        .map(|e| (e.chunk_id.as_str(), e.vector.as_slice()))
        .collect();

    let lexical: Vec<f64> = bm25_scores(&candidates, query);
    let query_vec = embedder.embed_text(query);
    let vector: Vec<f64> = candidates
        .iter()
        .map(|d| {
            vectors
                .get(d.id.as_str())
                .map(|v| cosine(&query_vec, v))
                .unwrap_or(0.0)
        })
        .collect();

    let lexical = min_max_normalize(&lexical);
    let vector = min_max_normalize(&vector);

    let mut ranked: Vec<ScoredChunk> = candidates
        .iter()
        .enumerate()
        .map(|(i, d)| ScoredChunk {
            chunk_id: d.id.clone(),
            fused_score: LEXICAL_WEIGHT * lexical[i] + VECTOR_WEIGHT * vector[i],
        })
        .collect();

    ranked.sort_by(|a, b| {
        b.fused_score
            .partial_cmp(&a.fused_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.chunk_id.cmp(&b.chunk_id))
    });
    ranked.truncate(k);

    Ok(RetrievalResult {
        query_fingerprint,
        theme: theme_label,
        ranked,
    })
}

fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_string())
        .collect()
}

fn bm25_scores(candidates: &[&EnrichedDoc], query: &str) -> Vec<f64> {
    let docs_tokens: Vec<Vec<String>> = candidates.iter().map(|d| tokenize(&d.text)).collect();
    let n = docs_tokens.len() as f64;
    let avg_len = docs_tokens.iter().map(|t| t.len() as f64).sum::<f64>() / n.max(1.0);

    let query_terms: BTreeSet<String> = tokenize(query).into_iter().collect();
    let mut df: BTreeMap<&str, f64> = BTreeMap::new();
    for term in &query_terms {
        let count = docs_tokens
            .iter()
            .filter(|tokens| tokens.iter().any(|t| t == term))
            .count() as f64;
        df.insert(term.as_str(), count);
    }

    docs_tokens
        .iter()
        .map(|tokens| {
            let len = tokens.len() as f64;
            let mut score = 0.0;
            for term in &query_terms {
                let tf = tokens.iter().filter(|t| *t == term).count() as f64;
                if tf == 0.0 {
                    continue;
                }
                let dfv = df[term.as_str()];
                let idf = ((n - dfv + 0.5) / (dfv + 0.5) + 1.0).ln();
                let denom = tf + BM25_K1 * (1.0 - BM25_B + BM25_B * len / avg_len.max(1.0));
                score += idf * tf * (BM25_K1 + 1.0) / denom;
            }
            score
        })
        .collect()
}

fn min_max_normalize(scores: &[f64]) -> Vec<f64> {
    let min = scores.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = scores.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if !min.is_finite() || !max.is_finite() || (max - min).abs() < f64::EPSILON {
        return vec![0.5; scores.len()];
    }
    scores.iter().map(|s| (s - min) / (max - min)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RunConfig;
    use crate::determinism::hash::sha256_hex;
    use crate::index::enriched::build_index;
    use crate::model::{Chunk, SCHEMA_VERSION};
    use std::path::Path;

    fn chunk(id: usize, theme: &str, text: &str) -> Chunk {
        Chunk {
            chunk_id: format!("demo_2023_p{}_c{}", id + 1, id),
            evidence_id: format!("{}:demo_2023_p{}_c{}", theme, id + 1, id),
            doc_id: "demo_2023".to_string(),
            org_id: "demo".to_string(),
            year: 2023,
            theme: theme.to_string(),
            page: Some(id as u32 + 1),
            section: None,
            text: text.to_string(),
            char_start: 0,
            char_end: text.len(),
            sha256: sha256_hex(text.as_bytes()),
            source_url: None,
            provider: "local".to_string(),
            doc_hash: sha256_hex(b"doc"),
            quality: 1.0,
            suspect: false,
            schema_version: SCHEMA_VERSION,
            created_at: "2025-10-28T06:00:00Z".to_string(),
        }
    }

    fn fixture_index() -> EnrichedIndex {
        let cfg = RunConfig::replay_fixture(Path::new("."));
        let chunks = vec![
            chunk(0, "GHG", "Scope 1 and 2 emissions decreased seven percent."),
            chunk(1, "GHG", "Our emissions reduction program targets scope 3 emissions."),
            chunk(2, "GHG", "Board compensation details and audit fees."),
            chunk(3, "TSP", "Net-zero target validated by the Science Based Targets initiative."),
        ];
        build_index(&cfg, &chunks, &HashTfEmbedder::default()).unwrap()
    }

    #[test]
    fn retrieval_is_deterministic_across_calls() {
        let index = fixture_index();
        let embedder = HashTfEmbedder::default();
        let a = retrieve(&index, &embedder, Some("demo"), Some("GHG"), "emissions", 3, false)
            .unwrap();
        let b = retrieve(&index, &embedder, Some("demo"), Some("GHG"), "emissions", 3, false)
            .unwrap();
        assert_eq!(a.ranked, b.ranked);
        assert_eq!(a.query_fingerprint, b.query_fingerprint);
    }

    #[test]
    fn relevant_chunks_outrank_unrelated_ones() {
        let index = fixture_index();
        let embedder = HashTfEmbedder::default();
        let result = retrieve(
            &index,
            &embedder,
            Some("demo"),
            Some("GHG"),
            "scope emissions reduction",
            3,
            false,
        )
        .unwrap();
        assert_eq!(result.ranked.len(), 3);
        let last = result.ranked.last().unwrap();
        assert_eq!(last.chunk_id, "demo_2023_p3_c2");
    }

    #[test]
    fn equal_scores_break_by_chunk_id_ascending() {
        let scores = min_max_normalize(&[1.0, 1.0, 1.0]);
        assert_eq!(scores, vec![0.5, 0.5, 0.5]);

        // Identical text gives every candidate the same fused score.
        let cfg = RunConfig::replay_fixture(Path::new("."));
        let same = "Renewable energy capacity reached four gigawatts.";
        let chunks = vec![
            chunk(2, "EI", same),
            chunk(0, "EI", same),
            chunk(1, "EI", same),
        ];
        let index = build_index(&cfg, &chunks, &HashTfEmbedder::default()).unwrap();
        let embedder = HashTfEmbedder::default();
        let result = retrieve(
            &index,
            &embedder,
            Some("demo"),
            Some("EI"),
            "renewable energy",
            3,
            false,
        )
        .unwrap();
        let ids: Vec<&str> = result.ranked.iter().map(|s| s.chunk_id.as_str()).collect();
        assert_eq!(
            ids,
            vec!["demo_2023_p1_c0", "demo_2023_p2_c1", "demo_2023_p3_c2"]
        );
    }

    #[test]
    fn k_zero_returns_empty() {
        let index = fixture_index();
        let embedder = HashTfEmbedder::default();
        let result =
            retrieve(&index, &embedder, Some("demo"), Some("GHG"), "emissions", 0, false).unwrap();
        assert!(result.ranked.is_empty());
    }
}
