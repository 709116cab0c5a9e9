//! Retrieval engine: embeddings, exact nearest-neighbor search and
//! neighbor-expanded evidence spans over knowledge chunks.

pub mod embedding;
pub mod engine;
pub mod index;

pub use embedding::{BertEmbedder, EmbeddingBackend, DEFAULT_EMBEDDING_MODEL};
pub use engine::{RetrievalEngine, RetrievalParams, ScoredSpan};
pub use index::{RetrievalHit, VectorIndex};
