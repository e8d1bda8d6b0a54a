//! Per-document nearest-neighbor search over unit vectors.

use std::cmp::Ordering;

use crate::error::{Result, RetrievalError};

/// Read-only similarity search over a fixed set of vectors.
///
/// Positions are the 0-based insertion order, which is also the chunk order of
/// the document the vectors belong to.
pub trait VectorSearch: Send + Sync {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Up to `min(k, len)` `(position, score)` pairs, best first, ties broken by
    /// lower position.
    fn search(&self, query: &[f32], k: usize) -> Result<Vec<(usize, f32)>>;

    fn vector(&self, position: usize) -> Option<&[f32]>;
}

/// Exact inner-product index; with unit vectors the score is cosine similarity.
#[derive(Debug, Clone)]
pub struct FlatIndex {
    dimension: usize,
    data: Vec<f32>,
}

impl FlatIndex {
    /// Build an index in one step. Nothing is kept if any vector has the wrong
    /// dimension.
    pub fn build(dimension: usize, vectors: &[Vec<f32>]) -> Result<Self> {
        let mut data = Vec::with_capacity(dimension * vectors.len());
        for v in vectors {
            if v.len() != dimension {
                return Err(RetrievalError::DimensionMismatch { expected: dimension, actual: v.len() });
            }
            data.extend_from_slice(v);
        }
        Ok(Self { dimension, data })
    }
}

impl VectorSearch for FlatIndex {
    fn len(&self) -> usize {
        if self.dimension == 0 { 0 } else { self.data.len() / self.dimension }
    }

    fn search(&self, query: &[f32], k: usize) -> Result<Vec<(usize, f32)>> {
        if query.len() != self.dimension {
            return Err(RetrievalError::DimensionMismatch { expected: self.dimension, actual: query.len() });
        }
        if k == 0 || self.is_empty() {
            return Ok(Vec::new());
        }

        let mut scored: Vec<(usize, f32)> = self
            .data
            .chunks_exact(self.dimension)
            .enumerate()
            .map(|(pos, v)| {
                let dot: f32 = v.iter().zip(query).map(|(a, b)| a * b).sum();
                (pos, dot.clamp(-1.0, 1.0))
            })
            .collect();
        // partial sort for top-k
        let k = k.min(scored.len());
        if k < scored.len() {
            scored.select_nth_unstable_by(k - 1, rank);
            scored.truncate(k);
        }
        scored.sort_by(rank);
        Ok(scored)
    }

    fn vector(&self, position: usize) -> Option<&[f32]> {
        let start = position.checked_mul(self.dimension)?;
        self.data.get(start..start + self.dimension)
    }
}

fn rank(a: &(usize, f32), b: &(usize, f32)) -> Ordering {
    b.1.total_cmp(&a.1).then(a.0.cmp(&b.0))
}
