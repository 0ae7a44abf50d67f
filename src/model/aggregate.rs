//! # Pairwise Distance Aggregator
//!
//! Mean genetic dissimilarity between the sample sets of two cells,
//! memoized per unordered cell pair. The cache is caller-owned and
//! bin-local: it is built from one time bin's samples and queried for the
//! rest of that bin's pipeline, so parallel bins never share state.

use h3o::CellIndex;
use rustc_hash::FxHashMap;

use crate::data::matrix::DissimilarityMatrix;
use crate::data::sample::SampleTable;
use crate::data::time_bin::TimeBin;
use crate::error::{Result, StargenError};

/// Ring-distance attenuation: `d / (0.9 + k/10)` for neighbors found beyond
/// ring 1. A heuristic confidence knob, not a statistical correction;
/// default off.
pub fn attenuate(distance: f64, ring: u32) -> f64 {
    if ring <= 1 {
        distance
    } else {
        distance / (0.9 + ring as f64 / 10.0)
    }
}

/// Unordered cell pair used as the memo key.
#[inline]
pub fn pair_key(a: CellIndex, b: CellIndex) -> (CellIndex, CellIndex) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Memoized mean-dissimilarity lookups for one time bin.
pub struct PairCache<'a> {
    matrix: &'a DissimilarityMatrix,
    /// Matrix row indices of each occupied cell's samples.
    samples_by_cell: FxHashMap<CellIndex, Vec<usize>>,
    cache: FxHashMap<(CellIndex, CellIndex), f64>,
}

impl<'a> PairCache<'a> {
    /// Group the bin's samples by cell and resolve each to its matrix row.
    ///
    /// A sample missing from the matrix is a hard input error: the matrix
    /// is supposed to cover the full table.
    pub fn new(
        table: &SampleTable,
        bin: &TimeBin,
        matrix: &'a DissimilarityMatrix,
    ) -> Result<Self> {
        let mut samples_by_cell: FxHashMap<CellIndex, Vec<usize>> = FxHashMap::default();
        for &idx in &bin.indices {
            let sample = table.get(idx);
            let row = matrix.index_of(&sample.id).ok_or_else(|| {
                StargenError::invalid_data(format!(
                    "sample {} is not present in the dissimilarity matrix",
                    sample.id
                ))
            })?;
            samples_by_cell.entry(sample.cell).or_default().push(row);
        }

        Ok(Self {
            matrix,
            samples_by_cell,
            cache: FxHashMap::default(),
        })
    }

    /// Occupied cells in this bin.
    pub fn cells(&self) -> impl Iterator<Item = CellIndex> + '_ {
        self.samples_by_cell.keys().copied()
    }

    pub fn n_cells(&self) -> usize {
        self.samples_by_cell.len()
    }

    /// Number of samples in a cell (zero if unoccupied).
    pub fn cell_size(&self, cell: CellIndex) -> usize {
        self.samples_by_cell.get(&cell).map_or(0, Vec::len)
    }

    /// Mean dissimilarity between two cells' sample sets, memoized by the
    /// unordered pair. A self-pair averages the full internal submatrix,
    /// diagonal included.
    pub fn average(&mut self, a: CellIndex, b: CellIndex) -> Result<f64> {
        let key = pair_key(a, b);
        if let Some(&cached) = self.cache.get(&key) {
            return Ok(cached);
        }

        let rows = self
            .samples_by_cell
            .get(&a)
            .ok_or_else(|| StargenError::empty_cell(a))?;
        let cols = self
            .samples_by_cell
            .get(&b)
            .ok_or_else(|| StargenError::empty_cell(b))?;

        let mean = self.matrix.submatrix_mean(rows, cols);
        self.cache.insert(key, mean);
        Ok(mean)
    }
}
