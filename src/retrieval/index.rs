//! Exact in-process nearest-neighbor index.
//!
//! Built fresh per retrieval call over the chunk embeddings of one source.
//! Squared L2 distance, ascending order, ties broken by chunk index. With
//! exact search a store smaller than `top_k` simply yields a shorter hit
//! list; there is no "missing index" sentinel to filter out.

use std::cmp::Ordering;

/// Raw nearest-neighbor result, lower distance = more relevant
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalHit {
    pub chunk_index: usize,
    pub distance: f32,
}

/// Flat vector store over one chunk set
pub struct VectorIndex {
    vectors: Vec<Vec<f32>>,
}

impl VectorIndex {
    pub fn new(vectors: Vec<Vec<f32>>) -> Self {
        Self { vectors }
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// Top `top_k` nearest stored vectors to the query
    pub fn search(&self, query: &[f32], top_k: usize) -> Vec<RetrievalHit> {
        let mut hits: Vec<RetrievalHit> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(chunk_index, vector)| RetrievalHit {
                chunk_index,
                distance: squared_l2(query, vector),
            })
            .collect();

        hits.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(Ordering::Equal)
                .then(a.chunk_index.cmp(&b.chunk_index))
        });
        hits.truncate(top_k);
        hits
    }
}

fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}
