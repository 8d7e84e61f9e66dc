pub mod embedder;
pub mod enriched;
pub mod vector_sink;
