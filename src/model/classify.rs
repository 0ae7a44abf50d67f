//! # Barrier & Isolation Classifier
//!
//! Partitions cell pairs into direct-neighbor barrier edges and far-apart
//! line barriers whose dissimilarity is painted across every cell on the
//! connecting grid path, then flags cells whose neighbor dissimilarities
//! all sit above the isolation threshold.
//!
//! Every input pair contributes to both endpoints' neighbor-distance lists
//! (that is what isolation is judged on); pairs whose cells share a grid
//! boundary additionally become drawable edges, and pairs further apart
//! paint the cells between them when the path is short enough.

use h3o::CellIndex;
use rustc_hash::FxHashMap;
use tracing::debug;

use crate::geo;
use crate::model::aggregate::pair_key;

/// Fixed rounding applied to painted-cell intensities (2 decimals) so
/// comparisons and tests are stable across accumulation order.
pub fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Classifier knobs.
#[derive(Clone, Copy, Debug)]
pub struct ClassifierParams {
    /// A cell is isolated when every neighbor distance is >= this.
    pub isolation_threshold: f64,
    /// Longest grid path (in steps) a far-apart pair may paint across.
    pub max_path_length: usize,
    /// Evaluate cells with no neighbor distances against their own painted
    /// intensity. Conflates aggregated and attributed quantities; kept
    /// configurable.
    pub isolation_fallback: bool,
    /// Exclude cells with neither neighbor distances nor painted intensity
    /// from the isolated set instead of flagging them vacuously.
    pub strict_isolation: bool,
}

/// Classification outputs for one time bin.
#[derive(Clone, Debug, Default)]
pub struct Classification {
    /// Cells whose every known neighbor distance met the threshold.
    pub isolated: Vec<CellIndex>,
    /// Direct grid-neighbor edges with their distances.
    pub barrier_edges: FxHashMap<(CellIndex, CellIndex), f64>,
    /// Path-attributed intensity per intermediate cell, mean over all
    /// contributing pairs, rounded to 2 decimals.
    pub barrier_cells: FxHashMap<CellIndex, f64>,
    /// Input pairs that survived pruning: direct edges plus paths within
    /// the length bound.
    pub filtered_pairs: FxHashMap<(CellIndex, CellIndex), f64>,
}

/// Classify one bin's pair distances.
pub fn classify(
    pairs: &FxHashMap<(CellIndex, CellIndex), f64>,
    params: &ClassifierParams,
) -> Classification {
    let mut neighbor_lists: FxHashMap<CellIndex, Vec<f64>> = FxHashMap::default();
    let mut painted: FxHashMap<CellIndex, Vec<f64>> = FxHashMap::default();
    let mut edges: FxHashMap<(CellIndex, CellIndex), f64> = FxHashMap::default();
    let mut filtered: FxHashMap<(CellIndex, CellIndex), f64> = FxHashMap::default();

    for (&(a, b), &distance) in pairs {
        if a == b {
            continue; // internal dissimilarity is not an edge
        }
        neighbor_lists.entry(a).or_default().push(distance);
        neighbor_lists.entry(b).or_default().push(distance);

        if a.is_neighbor_with(b).unwrap_or(false) {
            edges.insert(pair_key(a, b), distance);
            filtered.insert(pair_key(a, b), distance);
            continue;
        }

        // Far-apart pair: paint the connecting path if one exists and is
        // short enough. Path failure is expected for very distant or
        // antimeridian-crossing pairs and simply drops the pair.
        let path = match geo::path_between(a, b, geo::MAX_BISECT_DEPTH) {
            Ok(path) => path,
            Err(err) => {
                debug!(%a, %b, %err, "no path for pair; excluded from painting");
                continue;
            }
        };
        let steps = path.len().saturating_sub(1);
        if steps > params.max_path_length {
            continue;
        }

        filtered.insert(pair_key(a, b), distance);
        for &cell in &path[1..path.len().saturating_sub(1)] {
            painted.entry(cell).or_default().push(distance);
        }
    }

    let barrier_cells: FxHashMap<CellIndex, f64> = painted
        .iter()
        .map(|(&cell, values)| {
            (cell, round2(values.iter().sum::<f64>() / values.len() as f64))
        })
        .collect();

    // Isolation over every cell that appears in the input, self-pairs
    // included (a cell whose only entry is its internal distance still has
    // to be judged).
    let mut universe: Vec<CellIndex> = pairs
        .keys()
        .flat_map(|&(a, b)| [a, b])
        .collect::<rustc_hash::FxHashSet<_>>()
        .into_iter()
        .collect();
    universe.sort_unstable();

    let mut isolated = Vec::new();
    for cell in universe {
        match neighbor_lists.get(&cell) {
            Some(distances) => {
                if distances.iter().all(|&d| d >= params.isolation_threshold) {
                    isolated.push(cell);
                }
            }
            None => {
                if params.isolation_fallback {
                    if let Some(&intensity) = barrier_cells.get(&cell) {
                        if intensity >= params.isolation_threshold {
                            isolated.push(cell);
                        }
                        continue;
                    }
                }
                // No neighbor distances and no painted signal: vacuously
                // isolated unless the strict policy excludes unevaluable
                // cells.
                if !params.strict_isolation {
                    isolated.push(cell);
                }
            }
        }
    }

    Classification {
        isolated,
        barrier_edges: edges,
        barrier_cells,
        filtered_pairs: filtered,
    }
}
