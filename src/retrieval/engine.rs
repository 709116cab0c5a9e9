//! Evidence-span retrieval.
//!
//! Embeds one source's chunks and the query, takes the nearest hits under
//! a score threshold, expands each hit into its same-source neighborhood
//! under a character budget, then merges contiguous index runs into scored
//! evidence spans.

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::collections::HashSet;

use crate::errors::Result;
use crate::knowledge::Chunk;
use crate::retrieval::embedding::EmbeddingBackend;
use crate::retrieval::index::{RetrievalHit, VectorIndex};

/// Parameters of one retrieval call
#[derive(Debug, Clone)]
pub struct RetrievalParams {
    pub top_k: usize,
    /// Hits farther than this are dropped; `<= 0` disables the filter
    pub score_threshold: f32,
    /// Character budget for one expanded neighborhood, merged text included
    pub chunk_size_budget: usize,
}

/// One merged evidence span, lower score = more relevant
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredSpan {
    pub text: String,
    pub score: f32,
}

/// Retrieval engine over an injected embedding backend
pub struct RetrievalEngine {
    backend: Box<dyn EmbeddingBackend>,
}

impl RetrievalEngine {
    pub fn new(backend: Box<dyn EmbeddingBackend>) -> Self {
        Self { backend }
    }

    /// Retrieve ranked evidence spans for a query over one chunk set.
    ///
    /// An empty chunk set, an empty query or a fully filtered hit list all
    /// return an empty span list; none of those is an error.
    pub fn retrieve(
        &self,
        chunks: &[Chunk],
        query: &str,
        params: &RetrievalParams,
    ) -> Result<Vec<ScoredSpan>> {
        if chunks.is_empty() || query.trim().is_empty() {
            return Ok(Vec::new());
        }

        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        let vectors = self.backend.embed_batch(&texts)?;
        let query_vector = self.backend.embed(query)?;

        let index = VectorIndex::new(vectors);
        let mut hits = index.search(&query_vector, params.top_k);
        if params.score_threshold > 0.0 {
            hits.retain(|hit| hit.distance <= params.score_threshold);
        }

        let mut visited: BTreeSet<usize> = hits.iter().map(|h| h.chunk_index).collect();
        let mut absorbed: HashSet<usize> = HashSet::new();

        for hit in &hits {
            if absorbed.contains(&hit.chunk_index) {
                continue;
            }
            expand_neighborhood(
                chunks,
                hit.chunk_index,
                params.chunk_size_budget,
                &mut visited,
                &mut absorbed,
            );
        }

        if visited.is_empty() {
            return Ok(Vec::new());
        }

        let indices: Vec<usize> = visited.into_iter().collect();
        let mut spans: Vec<ScoredSpan> = group_runs(chunks, &indices)
            .into_iter()
            .map(|run| score_run(chunks, &hits, &run))
            .collect();

        spans.sort_by(|a, b| a.score.partial_cmp(&b.score).unwrap_or(Ordering::Equal));
        Ok(spans)
    }
}

/// Symmetric neighbor expansion around one hit.
///
/// Probes `center + k` then `center - k` for growing `k`. A neighbor from
/// another source or one that would push the merged text past the budget
/// stops the whole expansion; an out-of-bounds direction is merely skipped.
fn expand_neighborhood(
    chunks: &[Chunk],
    center: usize,
    budget: usize,
    visited: &mut BTreeSet<usize>,
    absorbed: &mut HashSet<usize>,
) {
    let source = chunks[center].source_id;
    let mut merged_chars = chunks[center].text.chars().count();

    for k in 1..chunks.len() {
        let forward = center.checked_add(k).filter(|&j| j < chunks.len());
        let backward = center.checked_sub(k);
        if forward.is_none() && backward.is_none() {
            return;
        }

        for j in [forward, backward].into_iter().flatten() {
            let neighbor = &chunks[j];
            if neighbor.source_id != source {
                return;
            }
            let add = neighbor.text.chars().count();
            if merged_chars + add > budget {
                return;
            }
            merged_chars += add;
            visited.insert(j);
            absorbed.insert(j);
        }
    }
}

/// Group a sorted index list into maximal runs of consecutive indices
/// sharing one source
fn group_runs(chunks: &[Chunk], indices: &[usize]) -> Vec<Vec<usize>> {
    let mut runs: Vec<Vec<usize>> = Vec::new();
    for &idx in indices {
        let extends = runs
            .last()
            .and_then(|run| run.last())
            .is_some_and(|&last| {
                last + 1 == idx && chunks[last].source_id == chunks[idx].source_id
            });
        match runs.last_mut() {
            Some(run) if extends => run.push(idx),
            _ => runs.push(vec![idx]),
        }
    }
    runs
}

/// Merge a run's chunk texts and score it by its best member hit
fn score_run(chunks: &[Chunk], hits: &[RetrievalHit], run: &[usize]) -> ScoredSpan {
    let text = run
        .iter()
        .map(|&i| chunks[i].text.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    let score = hits
        .iter()
        .filter(|hit| run.contains(&hit.chunk_index))
        .map(|hit| hit.distance)
        .fold(f32::INFINITY, f32::min);
    ScoredSpan { text, score }
}
