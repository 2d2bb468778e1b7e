//! Latin-hypercube stratified sampling
//!
//! The unit interval is split into `n` equal-probability strata and each
//! realization draws from a different stratum, so the ensemble covers the
//! marginal's probability mass evenly. Stratum assignment is a fresh random
//! permutation per cell, which keeps realizations spatially independent
//! while pinning each cell's `n` draws to distinct strata.
//!
//! Cell substreams come from a seed branch separate from the realization
//! substreams, so stratified and random ensembles under the same master
//! seed share no random numbers.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng;
use stochmap_core::rng::cell_rng;
use stochmap_core::{Ensemble, Field, Result};

use crate::model::{MarginalDistribution, NumericSpatialModel, ScalarDistribution, ScalarModel};
use crate::sample::{unknown_method, SampleMethod, SampleParams};

fn uniform01(rng: &mut StdRng) -> f64 {
    rng.sample::<f64, _>(rand::distributions::Standard)
}

/// Inverse of the standard normal CDF.
///
/// Peter Acklam's rational approximation, relative error below 1.15e-9
/// over the open unit interval.
fn inverse_normal_cdf(p: f64) -> f64 {
    const A: [f64; 6] = [
        -3.969683028665376e+01,
        2.209460984245205e+02,
        -2.759285104469687e+02,
        1.383577518672690e+02,
        -3.066479806614716e+01,
        2.506628277459239e+00,
    ];
    const B: [f64; 5] = [
        -5.447609879822406e+01,
        1.615858368580409e+02,
        -1.556989798598866e+02,
        6.680131188771972e+01,
        -1.328068155288572e+01,
    ];
    const C: [f64; 6] = [
        -7.784894002430293e-03,
        -3.223964580411365e-01,
        -2.400758277161838e+00,
        -2.549732539343734e+00,
        4.374664141464968e+00,
        2.938163982698783e+00,
    ];
    const D: [f64; 4] = [
        7.784695709041462e-03,
        3.224671290700398e-01,
        2.445134137142996e+00,
        3.754408661907416e+00,
    ];
    const P_LOW: f64 = 0.02425;

    if p < P_LOW {
        let q = (-2.0 * p.ln()).sqrt();
        (((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5])
            / ((((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0)
    } else if p <= 1.0 - P_LOW {
        let q = p - 0.5;
        let r = q * q;
        (((((A[0] * r + A[1]) * r + A[2]) * r + A[3]) * r + A[4]) * r + A[5]) * q
            / (((((B[0] * r + B[1]) * r + B[2]) * r + B[3]) * r + B[4]) * r + 1.0)
    } else {
        let q = (-2.0 * (1.0 - p).ln()).sqrt();
        -(((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5])
            / ((((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0)
    }
}

/// Stratum probabilities for one cell: a shuffled stratum per realization,
/// jittered uniformly within the stratum.
fn cell_probabilities(rng: &mut StdRng, n: usize) -> Vec<f64> {
    let mut order: Vec<usize> = (0..n).collect();
    order.shuffle(rng);
    order
        .into_iter()
        .map(|stratum| {
            let p = (stratum as f64 + uniform01(rng)) / n as f64;
            p.clamp(1e-12, 1.0 - 1e-12)
        })
        .collect()
}

fn quantile_of(distribution: &MarginalDistribution, row: usize, col: usize, p: f64) -> f64 {
    match distribution {
        MarginalDistribution::Normal { mean, sd } => {
            let m = unsafe { mean.get_unchecked(row, col) };
            let s = unsafe { sd.get_unchecked(row, col) };
            if mean.is_nodata(m) || sd.is_nodata(s) {
                f64::NAN
            } else {
                m + s * inverse_normal_cdf(p)
            }
        }
        MarginalDistribution::Uniform { lower, upper } => {
            let lo = unsafe { lower.get_unchecked(row, col) };
            let hi = unsafe { upper.get_unchecked(row, col) };
            if lower.is_nodata(lo) || upper.is_nodata(hi) {
                f64::NAN
            } else {
                lo + p * (hi - lo)
            }
        }
    }
}

pub(crate) fn numeric_stratified(
    model: &NumericSpatialModel,
    params: &SampleParams,
) -> Result<Ensemble<f64>> {
    let template = model.distribution.template();
    let (rows, cols) = template.shape();

    let mut fields: Vec<Field<f64>> = (0..params.n)
        .map(|_| {
            let mut f = template.with_same_shape::<f64>();
            f.set_nodata(Some(f64::NAN));
            f
        })
        .collect();

    for row in 0..rows {
        for col in 0..cols {
            let cell = row * cols + col;
            let mut rng = cell_rng(params.seed, cell);
            let probabilities = cell_probabilities(&mut rng, params.n);
            for (i, &p) in probabilities.iter().enumerate() {
                let v = quantile_of(&model.distribution, row, col, p);
                unsafe { fields[i].set_unchecked(row, col, v) };
            }
        }
    }

    let mut ensemble = Ensemble::with_capacity(params.n);
    for f in fields {
        ensemble.push(f)?;
    }
    Ok(ensemble)
}

pub(crate) fn scalar_stratified(model: &ScalarModel, params: &SampleParams) -> Result<Vec<f64>> {
    let mut rng = cell_rng(params.seed, 0);
    let probabilities = cell_probabilities(&mut rng, params.n);

    probabilities
        .into_iter()
        .map(|p| match model.distribution {
            ScalarDistribution::Normal { mean, sd } => Ok(mean + sd * inverse_normal_cdf(p)),
            ScalarDistribution::Uniform { lower, upper } => Ok(lower + p * (upper - lower)),
            ScalarDistribution::Beta { .. } => {
                Err(unknown_method(SampleMethod::Stratified, "beta scalar"))
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use stochmap_core::Field;

    fn params(n: usize, seed: u64) -> SampleParams {
        SampleParams {
            n,
            method: SampleMethod::Stratified,
            seed,
        }
    }

    #[test]
    fn test_inverse_normal_cdf_known_values() {
        assert_relative_eq!(inverse_normal_cdf(0.5), 0.0, epsilon = 1e-9);
        assert_relative_eq!(inverse_normal_cdf(0.975), 1.959964, epsilon = 1e-5);
        assert_relative_eq!(inverse_normal_cdf(0.025), -1.959964, epsilon = 1e-5);
        assert_relative_eq!(inverse_normal_cdf(0.841344746), 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_inverse_normal_cdf_symmetric_tails() {
        for p in [1e-6, 1e-3, 0.01] {
            assert_relative_eq!(
                inverse_normal_cdf(p),
                -inverse_normal_cdf(1.0 - p),
                epsilon = 1e-6
            );
        }
    }

    #[test]
    fn test_each_cell_covers_all_strata() {
        let model = NumericSpatialModel::new(
            true,
            MarginalDistribution::Uniform {
                lower: Field::filled(3, 3, 0.0),
                upper: Field::filled(3, 3, 1.0),
            },
            None,
        )
        .unwrap();

        let n = 10;
        let e = numeric_stratified(&model, &params(n, 21)).unwrap();

        // Uniform(0,1) quantile is the identity, so each cell's n values
        // must land in n distinct strata.
        for row in 0..3 {
            for col in 0..3 {
                let mut strata: Vec<usize> = (0..n)
                    .map(|i| {
                        let v = e.member(i).unwrap().get(row, col).unwrap();
                        ((v * n as f64).floor() as usize).min(n - 1)
                    })
                    .collect();
                strata.sort_unstable();
                strata.dedup();
                assert_eq!(strata.len(), n, "cell ({}, {}) reuses a stratum", row, col);
            }
        }
    }

    #[test]
    fn test_stratified_mean_close_to_target() {
        let model = NumericSpatialModel::new(
            true,
            MarginalDistribution::Normal {
                mean: Field::filled(2, 2, 50.0),
                sd: Field::filled(2, 2, 10.0),
            },
            None,
        )
        .unwrap();

        let e = numeric_stratified(&model, &params(100, 5)).unwrap();
        let mut sum = 0.0;
        for member in &e {
            sum += member.get(0, 0).unwrap();
        }
        let mean = sum / e.len() as f64;
        assert!((mean - 50.0).abs() < 1.0, "stratified mean {} off target", mean);
    }

    #[test]
    fn test_nodata_cells_stay_nodata() {
        let mut mean = Field::filled(3, 3, 1.0);
        mean.set_nodata(Some(f64::NAN));
        mean.set(0, 2, f64::NAN).unwrap();
        let sd = Field::filled(3, 3, 0.5);
        let model =
            NumericSpatialModel::new(true, MarginalDistribution::Normal { mean, sd }, None)
                .unwrap();
        let e = numeric_stratified(&model, &params(4, 8)).unwrap();
        for member in &e {
            assert!(member.get(0, 2).unwrap().is_nan());
        }
    }

    #[test]
    fn test_scalar_beta_rejected() {
        let model = ScalarModel::new(true, ScalarDistribution::Beta { alpha: 2.0, beta: 5.0 })
            .unwrap();
        assert!(scalar_stratified(&model, &params(5, 1)).is_err());
    }

    #[test]
    fn test_scalar_stratified_deterministic() {
        let model = ScalarModel::new(
            true,
            ScalarDistribution::Normal {
                mean: 0.0,
                sd: 1.0,
            },
        )
        .unwrap();
        let a = scalar_stratified(&model, &params(20, 9)).unwrap();
        let b = scalar_stratified(&model, &params(20, 9)).unwrap();
        assert_eq!(a, b);
    }
}
