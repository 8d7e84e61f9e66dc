use crate::error::{CoreError, CoreResult};
use crate::index::embedder::Embedding;
use std::collections::BTreeMap;

/// Outbound vector-store seam: a collection-oriented API with create-if-absent
/// and upsert-by-id. Callers upsert in silver sort order.
pub trait VectorSink {
    fn ensure_collection(&mut self, name: &str, dimension: usize) -> CoreResult<()>;
    fn upsert(&mut self, collection: &str, id: &str, vector: &[f32]) -> CoreResult<()>;
}

/// In-process sink used by tests and the self-audit run.
#[derive(Default)]
pub struct InMemoryVectorSink {
    collections: BTreeMap<String, (usize, BTreeMap<String, Vec<f32>>)>,
}

impl InMemoryVectorSink {
    pub fn len(&self, collection: &str) -> usize {
        self.collections
            .get(collection)
            .map(|(_, rows)| rows.len())
            .unwrap_or(0)
    }

    pub fn get(&self, collection: &str, id: &str) -> Option<&Vec<f32>> {
        self.collections.get(collection).and_then(|(_, rows)| rows.get(id))
    }
}

impl VectorSink for InMemoryVectorSink {
    fn ensure_collection(&mut self, name: &str, dimension: usize) -> CoreResult<()> {
        match self.collections.get(name) {
            Some((existing, _)) if *existing != dimension => Err(CoreError::InvalidInput(format!(
                "collection {} exists with dimension {} (requested {})",
                name, existing, dimension
            ))),
            Some(_) => Ok(()),
            None => {
                self.collections
                    .insert(name.to_string(), (dimension, BTreeMap::new()));
                Ok(())
            }
        }
    }

    fn upsert(&mut self, collection: &str, id: &str, vector: &[f32]) -> CoreResult<()> {
        let (dimension, rows) = self
            .collections
            .get_mut(collection)
            .ok_or_else(|| CoreError::InvalidInput(format!("unknown collection {}", collection)))?;
        if vector.len() != *dimension {
            return Err(CoreError::InvalidInput(format!(
                "vector dimension {} does not match collection {} dimension {}",
                vector.len(),
                collection,
                dimension
            )));
        }
        rows.insert(id.to_string(), vector.to_vec());
        Ok(())
    }
}

/// Pushes embeddings into a sink in the order given (the silver sort order).
pub fn load_embeddings(
    sink: &mut dyn VectorSink,
    collection: &str,
    dimension: usize,
    embeddings: &[Embedding],
) -> CoreResult<usize> {
    sink.ensure_collection(collection, dimension)?;
    for e in embeddings {
        sink.upsert(collection, &e.chunk_id, &e.vector)?;
    }
    Ok(embeddings.len())
}
