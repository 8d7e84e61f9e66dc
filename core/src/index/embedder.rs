use crate::config::RunConfig;
use crate::determinism::hash::sha256_hex;
use crate::model::Chunk;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

pub const EMBEDDING_DIM: usize = 256;
pub const MODEL_ID: &str = "hash-tf-256-v1";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embedding {
    pub chunk_id: String,
    pub sha256: String,
    pub model_id: String,
    pub vector: Vec<f32>,
    pub text_len: usize,
    pub created_at: String,
}

/// Deterministic hash-TF embedder: lowercased whitespace tokens, SHA-256 term
/// bucketing over a fixed dimension, sorted term iteration, L2-normalized
/// output. Same text always yields the same vector.
pub struct HashTfEmbedder {
    dim: usize,
}

impl Default for HashTfEmbedder {
    fn default() -> Self {
        Self { dim: EMBEDDING_DIM }
    }
}

impl HashTfEmbedder {
    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vec = vec![0f32; self.dim];
        let mut tf: BTreeMap<String, u32> = BTreeMap::new();
        for term in text.to_lowercase().split_whitespace() {
            *tf.entry(term.to_string()).or_insert(0) += 1;
        }
        if tf.is_empty() {
            return vec;
        }
        for (term, count) in tf {
            vec[bucket_of(&term, self.dim)] += count as f32;
        }
        l2_normalize(&mut vec);
        vec
    }

    pub fn embed_chunks(&self, config: &RunConfig, chunks: &[Chunk]) -> Vec<Embedding> {
        let created_at = config.now();
        chunks
            .iter()
            .map(|c| Embedding {
                chunk_id: c.chunk_id.clone(),
                sha256: sha256_hex(c.text.as_bytes()),
                model_id: MODEL_ID.to_string(),
                vector: self.embed_text(&c.text),
                text_len: c.text.chars().count(),
                created_at: created_at.clone(),
            })
            .collect()
    }
}

fn bucket_of(term: &str, dim: usize) -> usize {
    let mut h = Sha256::new();
    h.update(term.as_bytes());
    let digest = h.finalize();
    let mut value = 0u64;
    for b in digest.iter().take(8) {
        value = (value << 8) | *b as u64;
    }
    (value % dim as u64) as usize
}

fn l2_normalize(vec: &mut [f32]) {
    let norm = vec.iter().map(|v| (*v as f64) * (*v as f64)).sum::<f64>().sqrt();
    if norm > 0.0 {
        for v in vec.iter_mut() {
            *v = (*v as f64 / norm) as f32;
        }
    }
}

/// Cosine similarity; for L2-normalized inputs this is the dot product, but
/// the norms are folded in so raw vectors also compare correctly.
pub fn cosine(a: &[f32], b: &[f32]) -> f64 {
    let mut dot = 0f64;
    let mut na = 0f64;
    let mut nb = 0f64;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += *x as f64 * *y as f64;
        na += *x as f64 * *x as f64;
        nb += *y as f64 * *y as f64;
    }
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    dot / (na.sqrt() * nb.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_text_same_vector() {
        let embedder = HashTfEmbedder::default();
        let a = embedder.embed_text("Net-zero emissions across the value chain by 2050");
        let b = embedder.embed_text("Net-zero emissions across the value chain by 2050");
        assert_eq!(a, b);
        assert_eq!(a.len(), EMBEDDING_DIM);
    }

    #[test]
    fn vectors_are_l2_normalized() {
        let embedder = HashTfEmbedder::default();
        let v = embedder.embed_text("carbon capture and storage at scale");
        let norm: f64 = v.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn empty_text_embeds_to_zero() {
        let embedder = HashTfEmbedder::default();
        let v = embedder.embed_text("   ");
        assert!(v.iter().all(|x| *x == 0.0));
        assert_eq!(cosine(&v, &v), 0.0);
    }

    #[test]
    fn cosine_ranks_related_text_higher() {
        let embedder = HashTfEmbedder::default();
        let query = embedder.embed_text("scope 1 emissions reduction");
        let related = embedder.embed_text("scope 1 and scope 2 emissions reduction targets");
        let unrelated = embedder.embed_text("board oversight of audit committees");
        assert!(cosine(&query, &related) > cosine(&query, &unrelated));
    }
}
