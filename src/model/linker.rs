//! # Nearest-Population Linker
//!
//! Second pass over the isolated set: a cell flagged isolated by its
//! immediate neighborhood may still have a genetically close population
//! somewhere else in the same time bin. For each isolated cell the linker
//! scans every other occupied cell, takes the minimum average dissimilarity
//! and re-expresses it through the bin's scaling model so the threshold
//! comparison is geography-normalized. Below the threshold the cell gains a
//! migration link and leaves the isolated set.
//!
//! The all-pairs scan is quadratic per bin; per-bin cell counts are small
//! (hundreds), so the cost is negligible next to aggregation.

use h3o::CellIndex;
use rustc_hash::FxHashMap;

use crate::error::Result;
use crate::geo;
use crate::model::aggregate::PairCache;
use crate::model::scaling::ScaledDistanceModel;

/// Migration links plus the cells no link could rescue.
#[derive(Clone, Debug, Default)]
pub struct LinkerOutcome {
    /// (isolated cell, nearest population) -> scaled distance.
    pub links: FxHashMap<(CellIndex, CellIndex), f64>,
    pub still_isolated: Vec<CellIndex>,
}

/// Resolve each isolated cell against every other occupied cell in the bin.
///
/// Uses the bin's existing pair cache and its already-fitted scaling model;
/// the model is never refit here, so thresholds stay comparable with the
/// classifier's.
pub fn link(
    isolated: &[CellIndex],
    cache: &mut PairCache<'_>,
    model: &ScaledDistanceModel,
    threshold: f64,
) -> Result<LinkerOutcome> {
    let cells: Vec<CellIndex> = {
        let mut v: Vec<CellIndex> = cache.cells().collect();
        v.sort_unstable();
        v
    };

    let mut outcome = LinkerOutcome::default();

    for &cell in isolated {
        let mut nearest: Option<(CellIndex, f64)> = None;
        for &other in &cells {
            if other == cell || cache.cell_size(other) == 0 {
                continue;
            }
            let distance = cache.average(cell, other)?;
            let closer = match nearest {
                Some((_, best)) => distance < best,
                None => true,
            };
            if closer {
                nearest = Some((other, distance));
            }
        }

        let Some((other, raw)) = nearest else {
            // Single-cell bin: nothing to link against.
            outcome.still_isolated.push(cell);
            continue;
        };

        let scaled = model.scale(raw, geo::centroid_distance_km(cell, other));
        if scaled < threshold {
            outcome.links.insert((cell, other), scaled);
        } else {
            outcome.still_isolated.push(cell);
        }
    }

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::matrix::DissimilarityMatrix;
    use crate::data::sample::{Sample, SampleTable};
    use crate::data::time_bin::TimeBin;
    use crate::model::scaling::ScalingMethod;
    use h3o::{LatLng, Resolution};
    use ndarray::array;

    fn cell(lat: f64, lng: f64) -> CellIndex {
        LatLng::new(lat, lng).unwrap().to_cell(Resolution::Three)
    }

    fn fixture(far_dist: f64) -> (SampleTable, TimeBin, DissimilarityMatrix) {
        let iso = cell(48.85, 2.35);
        let near = cell(41.9, 12.5);
        let far = cell(37.98, 23.73);
        let mk = |id: &str, c: CellIndex, lat: f64, lon: f64| Sample {
            id: id.to_string(),
            lat,
            lon,
            age: 500.0,
            cell: c,
        };
        let table = SampleTable::from_samples(vec![
            mk("i0", iso, 48.85, 2.35),
            mk("n0", near, 41.9, 12.5),
            mk("f0", far, 37.98, 23.73),
        ]);
        let bin = TimeBin {
            label: "test".to_string(),
            min_age: 500.0,
            max_age: 500.0,
            indices: vec![0, 1, 2],
        };
        let values = array![
            [0.0, 0.2, far_dist],
            [0.2, 0.0, 0.3],
            [far_dist, 0.3, 0.0],
        ];
        let ids = vec!["i0".to_string(), "n0".to_string(), "f0".to_string()];
        (table, bin, DissimilarityMatrix::new(ids, values).unwrap())
    }

    fn flat_model() -> ScaledDistanceModel {
        // Constant expectation 0.2 at every distance.
        ScaledDistanceModel::fit(
            ScalingMethod::Loess,
            &[(100.0, 0.2), (1000.0, 0.2), (2000.0, 0.2)],
        )
        .unwrap()
    }

    #[test]
    fn test_link_rescues_cell_below_threshold() {
        let (table, bin, matrix) = fixture(0.9);
        let mut cache = PairCache::new(&table, &bin, &matrix).unwrap();
        let iso = cell(48.85, 2.35);
        let near = cell(41.9, 12.5);

        let outcome = link(&[iso], &mut cache, &flat_model(), 1.0).unwrap();
        // Minimum raw distance is 0.2 to `near`; scaled ~ log2(0.2/0.2) = 0.
        let scaled = outcome.links.get(&(iso, near)).copied().unwrap();
        assert!(scaled.abs() < 1e-9);
        assert!(outcome.still_isolated.is_empty());
    }

    #[test]
    fn test_link_keeps_cell_when_everything_is_far() {
        let (table, bin, matrix) = fixture(0.9);
        let mut cache = PairCache::new(&table, &bin, &matrix).unwrap();
        let iso = cell(48.85, 2.35);

        // Threshold below the best achievable scaled distance.
        let outcome = link(&[iso], &mut cache, &flat_model(), -1.0).unwrap();
        assert!(outcome.links.is_empty());
        assert_eq!(outcome.still_isolated, vec![iso]);
    }

    #[test]
    fn test_link_picks_global_minimum() {
        let (table, bin, matrix) = fixture(0.05);
        let mut cache = PairCache::new(&table, &bin, &matrix).unwrap();
        let iso = cell(48.85, 2.35);
        let far = cell(37.98, 23.73);

        let outcome = link(&[iso], &mut cache, &flat_model(), 1.0).unwrap();
        // far_dist 0.05 beats the 0.2 to the nearer cell.
        assert_eq!(outcome.links.len(), 1);
        assert!(outcome.links.contains_key(&(iso, far)));
    }
}
