//! # Run Report
//!
//! Serializable per-bin outputs for downstream rendering: cell->value maps
//! for choropleths, coordinate-pair edges for line layers, isolated cells
//! and migration links for route layers. Cells serialize as H3 string
//! indexes; maps are ordered so reports are byte-stable across runs.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use anyhow::Context;
use h3o::CellIndex;
use serde::Serialize;

use crate::geo;
use crate::pipelines::barrier::BinAnalysis;

/// A cell-pair value with both centroids, ready for line rendering.
#[derive(Clone, Debug, Serialize)]
pub struct EdgeValue {
    pub from: String,
    pub to: String,
    /// (latitude, longitude) of the `from` centroid.
    pub from_coord: (f64, f64),
    /// (latitude, longitude) of the `to` centroid.
    pub to_coord: (f64, f64),
    pub value: f64,
}

/// One rescued isolated cell and its nearest population.
#[derive(Clone, Debug, Serialize)]
pub struct MigrationLink {
    pub isolated: String,
    pub nearest: String,
    pub scaled_distance: f64,
}

/// Everything derived for one time bin.
#[derive(Clone, Debug, Serialize)]
pub struct BinReport {
    pub label: String,
    pub n_samples: usize,
    pub n_cells: usize,
    /// Internal dissimilarity per occupied cell.
    pub internal: BTreeMap<String, f64>,
    /// Direct-neighbor barrier edges.
    pub barrier_edges: Vec<EdgeValue>,
    /// Path-attributed barrier intensity per cell.
    pub barrier_cells: BTreeMap<String, f64>,
    /// Imputed intensity; never overlaps `barrier_cells`.
    pub imputed_cells: BTreeMap<String, f64>,
    /// Pruned pair graph (direct edges plus within-length paths).
    pub filtered_pairs: Vec<EdgeValue>,
    /// Min-max normalized pair distances.
    pub normalized_pairs: Vec<EdgeValue>,
    /// Cells no link could rescue.
    pub isolated: Vec<String>,
    pub migration_links: Vec<MigrationLink>,
}

/// A bin whose scaling-dependent outputs could not be computed.
#[derive(Clone, Debug, Serialize)]
pub struct BinFailure {
    pub label: String,
    pub error: String,
}

/// The full run: successful bins plus reported failures.
#[derive(Clone, Debug, Serialize, Default)]
pub struct RunReport {
    pub bins: Vec<BinReport>,
    pub failures: Vec<BinFailure>,
}

impl BinReport {
    pub fn from_analysis(analysis: &BinAnalysis) -> Self {
        let mut isolated: Vec<String> = analysis
            .links
            .still_isolated
            .iter()
            .map(CellIndex::to_string)
            .collect();
        isolated.sort_unstable();

        let mut migration_links: Vec<MigrationLink> = analysis
            .links
            .links
            .iter()
            .map(|(&(iso, nearest), &scaled)| MigrationLink {
                isolated: iso.to_string(),
                nearest: nearest.to_string(),
                scaled_distance: scaled,
            })
            .collect();
        migration_links.sort_by(|a, b| a.isolated.cmp(&b.isolated));

        Self {
            label: analysis.label.clone(),
            n_samples: analysis.n_samples,
            n_cells: analysis.n_cells,
            internal: cell_map(&analysis.internal),
            barrier_edges: edge_list(&analysis.classification.barrier_edges),
            barrier_cells: cell_map(&analysis.classification.barrier_cells),
            imputed_cells: cell_map(&analysis.imputed),
            filtered_pairs: edge_list(&analysis.classification.filtered_pairs),
            normalized_pairs: edge_list(&analysis.normalized_pairs),
            isolated,
            migration_links,
        }
    }
}

fn cell_map(map: &rustc_hash::FxHashMap<CellIndex, f64>) -> BTreeMap<String, f64> {
    map.iter().map(|(&c, &v)| (c.to_string(), v)).collect()
}

fn edge_list(map: &rustc_hash::FxHashMap<(CellIndex, CellIndex), f64>) -> Vec<EdgeValue> {
    let mut edges: Vec<EdgeValue> = map
        .iter()
        .map(|(&(a, b), &value)| {
            let ca = geo::centroid(a);
            let cb = geo::centroid(b);
            EdgeValue {
                from: a.to_string(),
                to: b.to_string(),
                from_coord: (ca.lat(), ca.lng()),
                to_coord: (cb.lat(), cb.lng()),
                value,
            }
        })
        .collect();
    edges.sort_by(|x, y| (&x.from, &x.to).cmp(&(&y.from, &y.to)));
    edges
}

/// Write the run report as pretty JSON.
pub fn write_report(path: &Path, report: &RunReport) -> anyhow::Result<()> {
    let file = File::create(path)
        .with_context(|| format!("creating report file {}", path.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(file), report)
        .with_context(|| format!("serializing report to {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::classify::Classification;
    use crate::model::linker::LinkerOutcome;
    use h3o::{LatLng, Resolution};
    use rustc_hash::FxHashMap;

    fn cell(lat: f64, lng: f64) -> CellIndex {
        LatLng::new(lat, lng).unwrap().to_cell(Resolution::Three)
    }

    fn minimal_analysis() -> BinAnalysis {
        let a = cell(48.85, 2.35);
        let b = cell(41.9, 12.5);
        let mut barrier_cells = FxHashMap::default();
        barrier_cells.insert(a, 0.8);
        let mut imputed = FxHashMap::default();
        imputed.insert(b, 0.4);

        BinAnalysis {
            label: "100 AD - 500 BC".to_string(),
            n_samples: 3,
            n_cells: 2,
            internal: FxHashMap::default(),
            pair_distances: FxHashMap::default(),
            normalized_pairs: FxHashMap::default(),
            classification: Classification {
                barrier_cells,
                ..Default::default()
            },
            imputed,
            links: LinkerOutcome::default(),
        }
    }

    #[test]
    fn test_report_round_trips_through_json() {
        let report = RunReport {
            bins: vec![BinReport::from_analysis(&minimal_analysis())],
            failures: vec![],
        };
        let json = serde_json::to_string(&report).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        let bin = &value["bins"][0];
        assert_eq!(bin["label"], "100 AD - 500 BC");
        assert_eq!(bin["barrier_cells"].as_object().unwrap().len(), 1);
    }

    #[test]
    fn test_observed_and_imputed_stay_disjoint_in_report() {
        let report = BinReport::from_analysis(&minimal_analysis());
        for key in report.imputed_cells.keys() {
            assert!(!report.barrier_cells.contains_key(key));
        }
    }

    #[test]
    fn test_write_report_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        let report = RunReport::default();
        write_report(&path, &report).unwrap();
        assert!(path.exists());
    }
}
