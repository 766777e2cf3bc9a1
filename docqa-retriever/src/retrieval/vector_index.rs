//! Exact nearest-neighbor search over a flat vector table

use crate::error::IndexBuildError;
use itertools::Itertools;
use serde::Serialize;

/// One search hit: the row of the matching vector and its squared distance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Neighbor {
    pub position: usize,
    pub distance: f32,
}

/// Append-only table of equal-length vectors searched by linear scan.
///
/// Rows are stored contiguously; row `i` is the vector of chunk `i`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FlatIndex {
    dimension: usize,
    data: Vec<f32>,
}

impl FlatIndex {
    /// Build a fresh index from `vectors`.
    ///
    /// Every vector must have the dimension of the first. No vectors gives an
    /// empty index of dimension 0.
    pub fn build(vectors: &[Vec<f32>]) -> Result<Self, IndexBuildError> {
        let dimension = vectors.first().map(Vec::len).unwrap_or(0);
        let mut data = Vec::with_capacity(dimension * vectors.len());

        for (position, vector) in vectors.iter().enumerate() {
            if vector.len() != dimension {
                return Err(IndexBuildError::DimensionMismatch {
                    expected: dimension,
                    found: vector.len(),
                    position,
                });
            }
            data.extend_from_slice(vector);
        }

        Ok(Self { dimension, data })
    }

    /// Reassemble an index from its raw row-major storage.
    pub(crate) fn from_raw(dimension: usize, data: Vec<f32>) -> Self {
        Self { dimension, data }
    }

    pub(crate) fn raw(&self) -> &[f32] {
        &self.data
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn len(&self) -> usize {
        if self.dimension == 0 {
            0
        } else {
            self.data.len() / self.dimension
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn row(&self, position: usize) -> Option<&[f32]> {
        self.data.chunks_exact(self.dimension.max(1)).nth(position)
    }

    /// The `k` stored vectors closest to `query` by squared Euclidean distance.
    ///
    /// Results are ascending by distance, ties broken by ascending position. `k`
    /// is clamped to the number of stored vectors.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>, IndexBuildError> {
        if self.is_empty() || k == 0 {
            return Ok(Vec::new());
        }
        if query.len() != self.dimension {
            return Err(IndexBuildError::QueryDimension {
                expected: self.dimension,
                found: query.len(),
            });
        }

        let neighbors = self
            .data
            .chunks_exact(self.dimension)
            .enumerate()
            .map(|(position, row)| Neighbor {
                position,
                distance: squared_euclidean(query, row),
            })
            .k_smallest_by(k.min(self.len()), |a, b| {
                a.distance
                    .total_cmp(&b.distance)
                    .then(a.position.cmp(&b.position))
            })
            .collect();

        Ok(neighbors)
    }
}

pub fn squared_euclidean(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}
