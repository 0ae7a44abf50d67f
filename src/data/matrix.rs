//! # Dissimilarity Matrix
//!
//! The externally supplied sample-to-sample genetic dissimilarity matrix:
//! square, symmetric, indexed by sample ID. Precomputed upstream (e.g.
//! Euclidean distance over ancestry-component vectors); the core treats the
//! values as opaque numbers and never mutates them.

use ndarray::Array2;
use rustc_hash::FxHashMap;

use crate::error::{Result, StargenError};

/// Tolerance for the symmetry check on load.
const SYMMETRY_TOLERANCE: f64 = 1e-9;

/// Read-only, symmetric, sample-ID-indexed dissimilarity matrix.
#[derive(Clone, Debug)]
pub struct DissimilarityMatrix {
    ids: Vec<String>,
    index: FxHashMap<String, usize>,
    values: Array2<f64>,
}

impl DissimilarityMatrix {
    /// Build a matrix from parallel ID and value arrays, validating shape
    /// and symmetry.
    pub fn new(ids: Vec<String>, values: Array2<f64>) -> Result<Self> {
        let n = ids.len();
        if values.nrows() != n || values.ncols() != n {
            return Err(StargenError::invalid_data(format!(
                "matrix shape {}x{} does not match {} sample IDs",
                values.nrows(),
                values.ncols(),
                n
            )));
        }

        for i in 0..n {
            for j in (i + 1)..n {
                if (values[[i, j]] - values[[j, i]]).abs() > SYMMETRY_TOLERANCE {
                    return Err(StargenError::invalid_data(format!(
                        "matrix is not symmetric at ({}, {}): {} vs {}",
                        ids[i],
                        ids[j],
                        values[[i, j]],
                        values[[j, i]]
                    )));
                }
            }
        }

        let mut index = FxHashMap::default();
        for (i, id) in ids.iter().enumerate() {
            if index.insert(id.clone(), i).is_some() {
                return Err(StargenError::invalid_data(format!(
                    "duplicate sample ID in matrix: {id}"
                )));
            }
        }

        Ok(Self { ids, index, values })
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    /// Row index of a sample ID, if present.
    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    /// Dissimilarity between two samples by row index.
    #[inline]
    pub fn value(&self, i: usize, j: usize) -> f64 {
        self.values[[i, j]]
    }

    /// Mean of the submatrix between two index lists, diagonal included.
    ///
    /// This is the aggregate used for cell pairs: for a self-pair both lists
    /// are the same and the full internal submatrix (with its zero diagonal)
    /// enters the mean.
    pub fn submatrix_mean(&self, rows: &[usize], cols: &[usize]) -> f64 {
        let mut sum = 0.0;
        for &i in rows {
            for &j in cols {
                sum += self.values[[i, j]];
            }
        }
        sum / (rows.len() * cols.len()) as f64
    }
}
