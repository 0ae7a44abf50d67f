//! # Barrier Pipeline
//!
//! Per-time-bin orchestration of the engine, in dependency order:
//! adjacency -> pairwise aggregation -> geographic scaling -> barrier and
//! isolation classification -> nearest-population linking -> spatial
//! imputation. Bins are independent and run in parallel; every derived
//! structure (pair cache, scaling model, classification) is bin-local.

use h3o::CellIndex;
use rayon::prelude::*;
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, info, instrument};

use crate::data::matrix::DissimilarityMatrix;
use crate::data::sample::SampleTable;
use crate::data::time_bin::TimeBin;
use crate::error::Result;
use crate::geo;
use crate::model::adjacency::{self, AdjacencyMethod};
use crate::model::aggregate::{attenuate, pair_key, PairCache};
use crate::model::classify::{classify, round2, Classification, ClassifierParams};
use crate::model::impute::{self, ImputationMethod, VariogramModel};
use crate::model::linker::{link, LinkerOutcome};
use crate::model::scaling::{ScaledDistanceModel, ScalingMethod};

/// All tunables of one run. Defaults mirror the original tool.
#[derive(Clone, Copy, Debug)]
pub struct BarrierParams {
    pub adjacency: AdjacencyMethod,
    /// Neighbor search radius in grid rings.
    pub k_neighbors: u32,
    /// Keep expanding rings until a neighbor is found.
    pub allow_k_distance: bool,
    /// Attenuate pair distances found beyond ring 1.
    pub attenuate_by_ring: bool,
    pub scaling: ScalingMethod,
    pub isolation_threshold: f64,
    /// Longest grid path (steps) a far-apart pair may paint across.
    pub max_path_length: usize,
    pub isolation_fallback: bool,
    pub strict_isolation: bool,
    pub imputation: ImputationMethod,
    pub variogram: VariogramModel,
    pub impute_rounds: usize,
}

impl Default for BarrierParams {
    fn default() -> Self {
        Self {
            adjacency: AdjacencyMethod::Ring,
            k_neighbors: 1,
            allow_k_distance: false,
            attenuate_by_ring: false,
            scaling: ScalingMethod::Loess,
            isolation_threshold: 1.0,
            max_path_length: 10,
            isolation_fallback: true,
            strict_isolation: false,
            imputation: ImputationMethod::NeighborAverage,
            variogram: VariogramModel::Linear,
            impute_rounds: 6,
        }
    }
}

/// Everything the engine derives for one time bin.
#[derive(Clone, Debug)]
pub struct BinAnalysis {
    pub label: String,
    pub n_samples: usize,
    pub n_cells: usize,
    /// Internal (self-pair) dissimilarity per occupied cell.
    pub internal: FxHashMap<CellIndex, f64>,
    /// Scaled pair distances for every adjacency-resolved pair.
    pub pair_distances: FxHashMap<(CellIndex, CellIndex), f64>,
    /// Min-max normalized view of `pair_distances`.
    pub normalized_pairs: FxHashMap<(CellIndex, CellIndex), f64>,
    pub classification: Classification,
    /// Imputed barrier intensity; keys disjoint from the observed set.
    pub imputed: FxHashMap<CellIndex, f64>,
    pub links: LinkerOutcome,
}

/// Runs the full engine over a set of time bins.
pub struct BarrierPipeline<'a> {
    table: &'a SampleTable,
    matrix: &'a DissimilarityMatrix,
    params: BarrierParams,
}

impl<'a> BarrierPipeline<'a> {
    pub fn new(
        table: &'a SampleTable,
        matrix: &'a DissimilarityMatrix,
        params: BarrierParams,
    ) -> Self {
        Self {
            table,
            matrix,
            params,
        }
    }

    /// Run every bin; bins are independent, so failures stay per-bin.
    #[instrument(name = "barrier_run", skip_all, fields(n_bins = bins.len()))]
    pub fn run(&self, bins: &[TimeBin]) -> Vec<(String, Result<BinAnalysis>)> {
        bins.par_iter()
            .map(|bin| (bin.label.clone(), self.run_bin(bin)))
            .collect()
    }

    /// Full engine pass over one bin.
    #[instrument(name = "barrier_bin", skip_all, fields(bin = %bin.label, n_samples = bin.len()))]
    pub fn run_bin(&self, bin: &TimeBin) -> Result<BinAnalysis> {
        let p = &self.params;
        let mut cache = PairCache::new(self.table, bin, self.matrix)?;

        let occupied: FxHashSet<CellIndex> = cache.cells().collect();
        let strategy = adjacency::strategy_for(p.adjacency, p.k_neighbors, p.allow_k_distance);
        let neighbor_map = strategy.neighbors(&occupied);

        // Raw mean dissimilarity per unordered neighbor pair.
        let mut raw_pairs: FxHashMap<(CellIndex, CellIndex), f64> = FxHashMap::default();
        for (&cell, neighbors) in &neighbor_map {
            for &neighbor in neighbors {
                let key = pair_key(cell, neighbor);
                if raw_pairs.contains_key(&key) {
                    continue;
                }
                let mut distance = cache.average(cell, neighbor)?;
                if p.attenuate_by_ring {
                    let ring = geo::grid_distance(cell, neighbor).unwrap_or(1);
                    distance = attenuate(distance, ring);
                }
                raw_pairs.insert(key, round2(distance));
            }
        }

        let mut internal: FxHashMap<CellIndex, f64> = FxHashMap::default();
        for &cell in &occupied {
            internal.insert(cell, round2(cache.average(cell, cell)?));
        }

        // Fit the scaling model once per bin; every scaled lookup below,
        // including the linker's, reuses it.
        let observations: Vec<(f64, f64)> = raw_pairs
            .iter()
            .map(|(&(a, b), &d)| (geo::centroid_distance_km(a, b), d))
            .collect();
        let model = ScaledDistanceModel::fit(p.scaling, &observations)?;

        let mut scaled_pairs: FxHashMap<(CellIndex, CellIndex), f64> = FxHashMap::default();
        for (&(a, b), &raw) in &raw_pairs {
            let scaled = model.scale(raw, geo::centroid_distance_km(a, b));
            scaled_pairs.insert((a, b), round2(scaled));
        }
        debug!(n_pairs = scaled_pairs.len(), "pair distances scaled");

        // Classification universe: scaled pairs plus a self-pair per cell,
        // so cells with no resolved neighbor are still judged.
        let mut classified_input = scaled_pairs.clone();
        for &cell in &occupied {
            classified_input.entry((cell, cell)).or_insert(0.0);
        }
        let classification = classify(
            &classified_input,
            &ClassifierParams {
                isolation_threshold: p.isolation_threshold,
                max_path_length: p.max_path_length,
                isolation_fallback: p.isolation_fallback,
                strict_isolation: p.strict_isolation,
            },
        );

        let links = link(
            &classification.isolated,
            &mut cache,
            &model,
            p.isolation_threshold,
        )?;

        let imputer = impute::strategy_for(p.imputation, p.variogram);
        let imputed = imputer.impute(&classification.barrier_cells, p.impute_rounds);

        let normalized_pairs = normalize(&scaled_pairs);

        info!(
            n_cells = cache.n_cells(),
            n_edges = classification.barrier_edges.len(),
            n_isolated = links.still_isolated.len(),
            n_imputed = imputed.len(),
            "bin analysis complete"
        );

        Ok(BinAnalysis {
            label: bin.label.clone(),
            n_samples: bin.len(),
            n_cells: cache.n_cells(),
            internal,
            pair_distances: scaled_pairs,
            normalized_pairs,
            classification,
            imputed,
            links,
        })
    }
}

/// Min-max rescale of a distance map onto [0, 1], rounded to 5 decimals.
/// A degenerate map (max == min) carries no variation to normalize and
/// yields all zeros rather than NaN.
pub fn normalize<K: Copy + Eq + std::hash::Hash>(map: &FxHashMap<K, f64>) -> FxHashMap<K, f64> {
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for &v in map.values() {
        min = min.min(v);
        max = max.max(v);
    }
    let span = max - min;

    map.iter()
        .map(|(&k, &v)| {
            let scaled = if span > 0.0 { (v - min) / span } else { 0.0 };
            (k, (scaled * 1e5).round() / 1e5)
        })
        .collect()
}
