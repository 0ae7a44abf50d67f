//! # Spatial Imputation Engine
//!
//! Extends the barrier-intensity field into cells that had no samples. Two
//! interchangeable strategies behind one trait:
//!
//! - **NeighborAverage**: iterative diffusion; an unresolved cell joins the
//!   resolved set once at least 3 distinct resolved ring-1 neighbors vouch
//!   for it, taking their mean.
//! - **Kriging**: ordinary kriging with a moment-fitted variogram (linear
//!   or spherical) over resolved-cell centroids, interpolated at every cell
//!   within `rounds` grid steps of the resolved set.
//!
//! Output keys are disjoint from the input: imputation only fills gaps,
//! never overwrites observed values.

use h3o::CellIndex;
use nalgebra::{DMatrix, DVector};
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;

use crate::geo;

/// Contributions required before a cell is accepted into the resolved set.
const MIN_CONTRIBUTORS: usize = 3;

/// Strategy choice, selected by configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImputationMethod {
    NeighborAverage,
    Kriging,
}

/// Variogram shape for the kriging strategy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VariogramModel {
    Linear,
    Spherical,
}

/// Fills unsampled cells from already-resolved neighbors.
pub trait ImputationStrategy {
    /// Impute values for cells near `observed`; the returned map never
    /// shares a key with the input.
    fn impute(
        &self,
        observed: &FxHashMap<CellIndex, f64>,
        rounds: usize,
    ) -> FxHashMap<CellIndex, f64>;
}

/// Build the configured strategy.
pub fn strategy_for(
    method: ImputationMethod,
    variogram: VariogramModel,
) -> Box<dyn ImputationStrategy + Send + Sync> {
    match method {
        ImputationMethod::NeighborAverage => Box::new(NeighborAverageImputation),
        ImputationMethod::Kriging => Box::new(KrigingImputation { variogram }),
    }
}

/// Iterative diffusion from the resolved set.
pub struct NeighborAverageImputation;

impl ImputationStrategy for NeighborAverageImputation {
    fn impute(
        &self,
        observed: &FxHashMap<CellIndex, f64>,
        rounds: usize,
    ) -> FxHashMap<CellIndex, f64> {
        let mut resolved: FxHashMap<CellIndex, f64> = observed.clone();

        for _ in 0..rounds {
            // Candidates judged against the previous round's resolved set,
            // so acceptance order within a round cannot matter.
            let mut contributions: FxHashMap<CellIndex, Vec<f64>> = FxHashMap::default();
            for (&cell, &value) in &resolved {
                for neighbor in geo::ring(cell, 1) {
                    if !resolved.contains_key(&neighbor) {
                        contributions.entry(neighbor).or_default().push(value);
                    }
                }
            }

            let mut grew = false;
            for (cell, values) in contributions {
                if values.len() >= MIN_CONTRIBUTORS {
                    let mean = values.iter().sum::<f64>() / values.len() as f64;
                    resolved.insert(cell, mean);
                    grew = true;
                }
            }
            if !grew {
                break;
            }
        }

        resolved
            .into_iter()
            .filter(|(cell, _)| !observed.contains_key(cell))
            .collect()
    }
}

/// Ordinary kriging over resolved-cell centroids.
pub struct KrigingImputation {
    pub variogram: VariogramModel,
}

impl ImputationStrategy for KrigingImputation {
    fn impute(
        &self,
        observed: &FxHashMap<CellIndex, f64>,
        rounds: usize,
    ) -> FxHashMap<CellIndex, f64> {
        let mut out = FxHashMap::default();
        if observed.len() < 3 || rounds == 0 {
            return out;
        }

        let mut sources: Vec<(CellIndex, f64)> =
            observed.iter().map(|(&c, &v)| (c, v)).collect();
        sources.sort_unstable_by_key(|&(c, _)| c);
        let n = sources.len();

        let variogram = match fit_variogram(self.variogram, &sources) {
            Some(v) => v,
            None => {
                debug!("degenerate variogram; kriging produced no values");
                return out;
            }
        };

        // Ordinary kriging system with a Lagrange multiplier row; the
        // factorization is shared by every target.
        let mut system = DMatrix::<f64>::zeros(n + 1, n + 1);
        for i in 0..n {
            for j in 0..n {
                let h = geo::centroid_distance_km(sources[i].0, sources[j].0);
                system[(i, j)] = variogram.gamma(h);
            }
            system[(i, n)] = 1.0;
            system[(n, i)] = 1.0;
        }
        let lu = system.lu();

        // Targets: everything within `rounds` grid steps of the resolved set.
        let mut targets: FxHashSet<CellIndex> = FxHashSet::default();
        for &(cell, _) in &sources {
            targets.extend(
                cell.grid_disk::<Vec<_>>(rounds as u32)
                    .into_iter()
                    .filter(|c| !observed.contains_key(c)),
            );
        }

        for target in targets {
            let mut rhs = DVector::<f64>::zeros(n + 1);
            for i in 0..n {
                let h = geo::centroid_distance_km(sources[i].0, target);
                rhs[i] = variogram.gamma(h);
            }
            rhs[n] = 1.0;

            let Some(weights) = lu.solve(&rhs) else {
                debug!(%target, "singular kriging system; target skipped");
                continue;
            };
            let value: f64 = (0..n).map(|i| weights[i] * sources[i].1).sum();
            if value.is_finite() {
                out.insert(target, value);
            }
        }

        out
    }
}

/// Fitted variogram, evaluated as semivariance at lag `h` (km).
struct FittedVariogram {
    model: VariogramModel,
    /// Linear: slope; spherical: sill.
    scale: f64,
    /// Spherical only: range beyond which semivariance plateaus.
    range: f64,
}

impl FittedVariogram {
    fn gamma(&self, h: f64) -> f64 {
        match self.model {
            VariogramModel::Linear => self.scale * h,
            VariogramModel::Spherical => {
                if h >= self.range {
                    self.scale
                } else {
                    let r = h / self.range;
                    self.scale * (1.5 * r - 0.5 * r.powi(3))
                }
            }
        }
    }
}

/// Moment-based variogram fit over all resolved pairs: linear by ordinary
/// least squares through the origin-nugget cloud, spherical from the value
/// variance and the maximum lag.
fn fit_variogram(model: VariogramModel, sources: &[(CellIndex, f64)]) -> Option<FittedVariogram> {
    let n = sources.len();
    let mut max_lag = 0.0f64;
    let (mut sum_hh, mut sum_hg) = (0.0f64, 0.0f64);

    for i in 0..n {
        for j in (i + 1)..n {
            let h = geo::centroid_distance_km(sources[i].0, sources[j].0);
            let g = 0.5 * (sources[i].1 - sources[j].1).powi(2);
            max_lag = max_lag.max(h);
            sum_hh += h * h;
            sum_hg += h * g;
        }
    }
    if max_lag <= 0.0 {
        return None;
    }

    match model {
        VariogramModel::Linear => {
            if sum_hh <= 0.0 {
                return None;
            }
            Some(FittedVariogram {
                model,
                scale: (sum_hg / sum_hh).max(1e-12),
                range: 0.0,
            })
        }
        VariogramModel::Spherical => {
            let mean = sources.iter().map(|s| s.1).sum::<f64>() / n as f64;
            let var =
                sources.iter().map(|s| (s.1 - mean).powi(2)).sum::<f64>() / n as f64;
            Some(FittedVariogram {
                model,
                scale: var.max(1e-12),
                range: max_lag,
            })
        }
    }
}
