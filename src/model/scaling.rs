//! # Geographic Scaling Model
//!
//! Fits a smooth curve relating geographic distance (km) to expected
//! genetic dissimilarity, then re-expresses each observed dissimilarity as
//! a log2 ratio against that expectation. Two interchangeable fits:
//!
//! - **Loess**: tricube-weighted local linear regression over the observed
//!   cloud, yielding a lookup table on the observed support; prediction
//!   snaps to the nearest support point.
//! - **Logistic**: 3-parameter sigmoid `L / (1 + exp(-k(x - x0)))` fit by
//!   damped Gauss-Newton least squares; prediction is the closed form.
//!
//! The model is fit once per time bin and reused for every pair evaluation
//! in that bin, including the nearest-population linker. Refitting mid-bin
//! would silently shift the threshold semantics.

use nalgebra::{Matrix3, Vector3};

use crate::error::{Result, StargenError};

/// Fraction of the observations entering each local Loess regression.
const LOESS_SPAN: f64 = 0.5;

/// Gauss-Newton iteration cap for the logistic fit.
const MAX_FIT_ITERATIONS: usize = 100;

/// Fitting strategy, selected by configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScalingMethod {
    Loess,
    Logistic,
}

/// A fitted geographic-distance -> expected-dissimilarity model.
#[derive(Clone, Debug)]
pub enum ScaledDistanceModel {
    Loess(LoessModel),
    Logistic(LogisticModel),
}

impl ScaledDistanceModel {
    /// Fit the chosen model to observed (geo_km, genetic_dist) pairs.
    ///
    /// Non-convergence or degenerate input is a hard failure: there is no
    /// sane distance-scaled interpretation for the bin without a model.
    pub fn fit(method: ScalingMethod, observations: &[(f64, f64)]) -> Result<Self> {
        match method {
            ScalingMethod::Loess => LoessModel::fit(observations).map(Self::Loess),
            ScalingMethod::Logistic => LogisticModel::fit(observations).map(Self::Logistic),
        }
    }

    /// Expected genetic dissimilarity at a geographic distance.
    pub fn predict(&self, geo_km: f64) -> f64 {
        match self {
            Self::Loess(m) => m.predict(geo_km),
            Self::Logistic(m) => m.predict(geo_km),
        }
    }

    /// Observed dissimilarity re-expressed against the expectation.
    ///
    /// An observation of exactly zero scales to exactly zero, never to
    /// negative infinity; a non-positive expectation carries no information
    /// and also scales to zero.
    pub fn scale(&self, observed: f64, geo_km: f64) -> f64 {
        if observed == 0.0 {
            return 0.0;
        }
        let expected = self.predict(geo_km);
        if expected <= 0.0 {
            return 0.0;
        }
        (observed / expected).log2()
    }
}

/// Lookup table produced by local regression; support sorted by distance.
#[derive(Clone, Debug)]
pub struct LoessModel {
    support: Vec<(f64, f64)>,
}

impl LoessModel {
    pub fn fit(observations: &[(f64, f64)]) -> Result<Self> {
        if observations.len() < 2 {
            return Err(StargenError::model_fit(format!(
                "need at least 2 observations to fit, got {}",
                observations.len()
            )));
        }

        let mut obs: Vec<(f64, f64)> = observations.to_vec();
        obs.sort_by(|a, b| a.0.total_cmp(&b.0));

        let n = obs.len();
        let q = ((LOESS_SPAN * n as f64).ceil() as usize).clamp(2, n);

        let mut support: Vec<(f64, f64)> = Vec::with_capacity(n);
        for i in 0..n {
            let x0 = obs[i].0;

            // q nearest observations by distance along x.
            let mut nearest: Vec<(f64, f64, f64)> = obs
                .iter()
                .map(|&(x, y)| ((x - x0).abs(), x, y))
                .collect();
            nearest.sort_by(|a, b| a.0.total_cmp(&b.0));
            nearest.truncate(q);

            let dmax = nearest.last().map(|t| t.0).unwrap_or(0.0);
            let yhat = if dmax <= 0.0 {
                // All support points coincide with x0.
                nearest.iter().map(|t| t.2).sum::<f64>() / nearest.len() as f64
            } else {
                weighted_linear_fit(&nearest, x0, dmax)
            };

            if !yhat.is_finite() {
                return Err(StargenError::model_fit(format!(
                    "local regression diverged at distance {x0}"
                )));
            }
            support.push((x0, yhat));
        }

        // Collapse duplicate support distances to their mean fit.
        support.dedup_by(|next, kept| {
            if (next.0 - kept.0).abs() < f64::EPSILON {
                kept.1 = (kept.1 + next.1) / 2.0;
                true
            } else {
                false
            }
        });

        Ok(Self { support })
    }

    /// Fitted value at the support point nearest to `geo_km`.
    pub fn predict(&self, geo_km: f64) -> f64 {
        let idx = self
            .support
            .partition_point(|&(x, _)| x < geo_km)
            .min(self.support.len() - 1);
        let right = self.support[idx];
        if idx == 0 {
            return right.1;
        }
        let left = self.support[idx - 1];
        // Ties snap to the lower support point.
        if (geo_km - left.0).abs() <= (right.0 - geo_km).abs() {
            left.1
        } else {
            right.1
        }
    }

    pub fn support(&self) -> &[(f64, f64)] {
        &self.support
    }
}

/// Tricube-weighted least-squares line through the neighborhood, evaluated
/// at `x0`. Entries are (|x - x0|, x, y).
fn weighted_linear_fit(nearest: &[(f64, f64, f64)], x0: f64, dmax: f64) -> f64 {
    let (mut sw, mut swx, mut swy, mut swxx, mut swxy) = (0.0, 0.0, 0.0, 0.0, 0.0);
    for &(d, x, y) in nearest {
        let u = (d / dmax).min(1.0);
        let w = (1.0 - u.powi(3)).powi(3);
        sw += w;
        swx += w * x;
        swy += w * y;
        swxx += w * x * x;
        swxy += w * x * y;
    }
    let denom = sw * swxx - swx * swx;
    if denom.abs() < 1e-12 {
        swy / sw
    } else {
        let slope = (sw * swxy - swx * swy) / denom;
        let intercept = (swy - slope * swx) / sw;
        intercept + slope * x0
    }
}

/// 3-parameter sigmoid growth curve.
#[derive(Clone, Copy, Debug)]
pub struct LogisticModel {
    /// Upper asymptote.
    pub l: f64,
    /// Growth rate.
    pub k: f64,
    /// Distance of the inflection point.
    pub x0: f64,
}

impl LogisticModel {
    /// Least-squares fit by Gauss-Newton with multiplicative damping.
    pub fn fit(observations: &[(f64, f64)]) -> Result<Self> {
        if observations.len() < 3 {
            return Err(StargenError::model_fit(format!(
                "need at least 3 observations for a 3-parameter fit, got {}",
                observations.len()
            )));
        }

        let xs: Vec<f64> = observations.iter().map(|o| o.0).collect();
        let ys: Vec<f64> = observations.iter().map(|o| o.1).collect();
        let y_max = ys.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let x_min = xs.iter().copied().fold(f64::INFINITY, f64::min);
        let x_max = xs.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        if y_max <= 0.0 {
            return Err(StargenError::model_fit(
                "all observed dissimilarities are zero; nothing to fit",
            ));
        }
        if x_max - x_min < f64::EPSILON {
            return Err(StargenError::model_fit(
                "degenerate geographic support; all distances equal",
            ));
        }

        let mut params = Self {
            l: y_max * 1.05,
            k: 4.0 / (x_max - x_min),
            x0: (x_min + x_max) / 2.0,
        };
        let mut sse = sum_squared_error(&params, observations);
        let mut lambda = 1e-3;
        let mut improved = false;

        for _ in 0..MAX_FIT_ITERATIONS {
            let (jtj, jtr) = normal_equations(&params, observations);

            // Damped normal equations: (JtJ + lambda * diag(JtJ)) step = Jtr
            let mut damped = jtj;
            for i in 0..3 {
                damped[(i, i)] += lambda * jtj[(i, i)].max(1e-12);
            }
            let Some(step) = damped.lu().solve(&jtr) else {
                lambda *= 10.0;
                if lambda > 1e8 {
                    break;
                }
                continue;
            };

            let candidate = Self {
                l: params.l + step[0],
                k: params.k + step[1],
                x0: params.x0 + step[2],
            };
            let candidate_sse = sum_squared_error(&candidate, observations);

            if candidate_sse.is_finite() && candidate_sse < sse {
                let delta = sse - candidate_sse;
                params = candidate;
                sse = candidate_sse;
                lambda = (lambda / 10.0).max(1e-12);
                improved = true;
                if delta < 1e-12 * (1.0 + sse) {
                    break;
                }
            } else {
                lambda *= 10.0;
                if lambda > 1e8 {
                    break;
                }
            }
        }

        if !improved || !params.l.is_finite() || !params.k.is_finite() || !params.x0.is_finite() {
            return Err(StargenError::model_fit(
                "logistic fit did not converge on this bin",
            ));
        }
        Ok(params)
    }

    pub fn predict(&self, geo_km: f64) -> f64 {
        self.l / (1.0 + (-self.k * (geo_km - self.x0)).exp())
    }
}

fn sum_squared_error(m: &LogisticModel, obs: &[(f64, f64)]) -> f64 {
    obs.iter()
        .map(|&(x, y)| {
            let r = y - m.predict(x);
            r * r
        })
        .sum()
}

/// Accumulate JtJ and Jt·r for the current parameters.
fn normal_equations(m: &LogisticModel, obs: &[(f64, f64)]) -> (Matrix3<f64>, Vector3<f64>) {
    let mut jtj = Matrix3::zeros();
    let mut jtr = Vector3::zeros();

    for &(x, y) in obs {
        let e = (-m.k * (x - m.x0)).exp();
        let s = 1.0 / (1.0 + e);
        let f = m.l * s;
        let r = y - f;

        let dl = s;
        let dk = m.l * s * s * e * (x - m.x0);
        let dx0 = -m.l * s * s * e * m.k;
        let j = Vector3::new(dl, dk, dx0);

        jtj += j * j.transpose();
        jtr += j * r;
    }

    (jtj, jtr)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loess_monotone_predict_nearest_support() {
        let obs = [(100.0, 0.0), (500.0, 0.2), (900.0, 0.4)];
        let model = ScaledDistanceModel::fit(ScalingMethod::Loess, &obs).unwrap();

        // Unseen distance snaps to the nearest fitted support point.
        let near_low = model.predict(120.0);
        let at_low = model.predict(100.0);
        assert_eq!(near_low.to_bits(), at_low.to_bits());

        let near_high = model.predict(2000.0);
        let at_high = model.predict(900.0);
        assert_eq!(near_high.to_bits(), at_high.to_bits());

        // Monotone input stays monotone-ish across the support.
        assert!(model.predict(100.0) < model.predict(900.0));
    }

    #[test]
    fn test_loess_prediction_deterministic() {
        let obs = [(10.0, 0.1), (20.0, 0.15), (30.0, 0.3), (40.0, 0.35)];
        let a = LoessModel::fit(&obs).unwrap();
        let b = LoessModel::fit(&obs).unwrap();
        for x in [5.0, 12.0, 25.0, 60.0] {
            assert_eq!(a.predict(x).to_bits(), b.predict(x).to_bits());
        }
    }

    #[test]
    fn test_logistic_recovers_sigmoid() {
        let truth = LogisticModel {
            l: 0.8,
            k: 0.01,
            x0: 500.0,
        };
        let obs: Vec<(f64, f64)> = (0..20)
            .map(|i| {
                let x = 100.0 * i as f64;
                (x, truth.predict(x))
            })
            .collect();
        let fitted = LogisticModel::fit(&obs).unwrap();
        assert!((fitted.l - truth.l).abs() < 0.05);
        assert!((fitted.x0 - truth.x0).abs() < 50.0);
        for &(x, y) in &obs {
            assert!((fitted.predict(x) - y).abs() < 0.02);
        }
    }

    #[test]
    fn test_logistic_rejects_degenerate_input() {
        // All y zero
        assert!(LogisticModel::fit(&[(1.0, 0.0), (2.0, 0.0), (3.0, 0.0)]).is_err());
        // All x equal
        assert!(LogisticModel::fit(&[(5.0, 0.1), (5.0, 0.2), (5.0, 0.3)]).is_err());
        // Too few points
        assert!(LogisticModel::fit(&[(1.0, 0.1), (2.0, 0.2)]).is_err());
    }

    #[test]
    fn test_scale_zero_observation_is_exactly_zero() {
        let obs = [(100.0, 0.1), (500.0, 0.2), (900.0, 0.4)];
        for method in [ScalingMethod::Loess, ScalingMethod::Logistic] {
            let model = ScaledDistanceModel::fit(method, &obs).unwrap();
            let scaled = model.scale(0.0, 300.0);
            assert_eq!(scaled, 0.0);
            assert!(scaled.is_finite());
        }
    }

    #[test]
    fn test_scale_is_log2_ratio() {
        let obs = [(100.0, 0.2), (500.0, 0.2), (900.0, 0.2)];
        let model = ScaledDistanceModel::fit(ScalingMethod::Loess, &obs).unwrap();
        let expected = model.predict(500.0);
        let scaled = model.scale(2.0 * expected, 500.0);
        assert!((scaled - 1.0).abs() < 1e-9);
    }
}
