//! Independent per-cell sampling

use nalgebra::{DMatrix, DVector};
use rand::rngs::StdRng;
use rand::Rng;
use rand_distr::{Beta, Distribution, StandardNormal};
use stochmap_core::rng::realization_rng;
use stochmap_core::{Ensemble, Error, Field, Result};

use crate::maybe_rayon::*;
use crate::model::{
    CategoricalSpatialModel, JointNumericSpatialModel, JointScalarModel, MarginalDistribution,
    NumericSpatialModel, ScalarDistribution, ScalarModel,
};
use crate::sample::SampleParams;

fn uniform01(rng: &mut StdRng) -> f64 {
    rng.sample::<f64, _>(rand::distributions::Standard)
}

fn collect_ensemble(fields: Vec<Field<f64>>) -> Result<Ensemble<f64>> {
    let mut ensemble = Ensemble::with_capacity(fields.len());
    for f in fields {
        ensemble.push(f)?;
    }
    Ok(ensemble)
}

/// One realization field from independent per-cell draws.
fn draw_field(distribution: &MarginalDistribution, rng: &mut StdRng) -> Field<f64> {
    let template = distribution.template();
    let (rows, cols) = template.shape();
    let mut out = template.with_same_shape::<f64>();
    out.set_nodata(Some(f64::NAN));

    for row in 0..rows {
        for col in 0..cols {
            let v = match distribution {
                MarginalDistribution::Normal { mean, sd } => {
                    let m = unsafe { mean.get_unchecked(row, col) };
                    let s = unsafe { sd.get_unchecked(row, col) };
                    if mean.is_nodata(m) || sd.is_nodata(s) {
                        f64::NAN
                    } else {
                        let z: f64 = StandardNormal.sample(rng);
                        m + s * z
                    }
                }
                MarginalDistribution::Uniform { lower, upper } => {
                    let lo = unsafe { lower.get_unchecked(row, col) };
                    let hi = unsafe { upper.get_unchecked(row, col) };
                    if lower.is_nodata(lo) || upper.is_nodata(hi) {
                        f64::NAN
                    } else {
                        lo + uniform01(rng) * (hi - lo)
                    }
                }
            };
            unsafe { out.set_unchecked(row, col, v) };
        }
    }
    out
}

pub(crate) fn numeric_random(
    model: &NumericSpatialModel,
    params: &SampleParams,
) -> Result<Ensemble<f64>> {
    let fields: Vec<Field<f64>> = (0..params.n)
        .into_par_iter()
        .map(|i| {
            let mut rng = realization_rng(params.seed, i);
            draw_field(&model.distribution, &mut rng)
        })
        .collect();

    collect_ensemble(fields)
}

pub(crate) fn categorical_random(
    model: &CategoricalSpatialModel,
    params: &SampleParams,
) -> Result<Ensemble<u16>> {
    let template = &model.probabilities[0];
    let (rows, cols) = template.shape();

    let fields: Vec<Field<u16>> = (0..params.n)
        .into_par_iter()
        .map(|i| {
            let mut rng = realization_rng(params.seed, i);
            let mut out: Field<u16> = template.with_same_shape();
            out.set_nodata(Some(u16::MAX));

            for row in 0..rows {
                for col in 0..cols {
                    let mut label = u16::MAX;
                    let mut valid = true;
                    let u = uniform01(&mut rng);
                    let mut cumulative = 0.0;
                    for (k, p_field) in model.probabilities.iter().enumerate() {
                        let p = unsafe { p_field.get_unchecked(row, col) };
                        if p_field.is_nodata(p) {
                            valid = false;
                            break;
                        }
                        cumulative += p;
                        if u < cumulative {
                            label = model.labels[k];
                            break;
                        }
                        // Rounding can leave the total a hair under 1
                        if k == model.probabilities.len() - 1 {
                            label = model.labels[k];
                        }
                    }
                    if !valid {
                        label = u16::MAX;
                    }
                    unsafe { out.set_unchecked(row, col, label) };
                }
            }
            out
        })
        .collect();

    let mut ensemble = Ensemble::with_capacity(fields.len());
    for f in fields {
        ensemble.push(f)?;
    }
    Ok(ensemble)
}

pub(crate) fn scalar_random(model: &ScalarModel, params: &SampleParams) -> Result<Vec<f64>> {
    let mut out = Vec::with_capacity(params.n);
    for i in 0..params.n {
        let mut rng = realization_rng(params.seed, i);
        let v = match model.distribution {
            ScalarDistribution::Normal { mean, sd } => {
                let z: f64 = StandardNormal.sample(&mut rng);
                mean + sd * z
            }
            ScalarDistribution::Uniform { lower, upper } => {
                lower + uniform01(&mut rng) * (upper - lower)
            }
            ScalarDistribution::Beta { alpha, beta } => {
                let dist = Beta::new(alpha, beta).map_err(|e| Error::InvalidParameter {
                    name: "alpha/beta",
                    value: format!("{}/{}", alpha, beta),
                    reason: e.to_string(),
                })?;
                dist.sample(&mut rng)
            }
        };
        out.push(v);
    }
    Ok(out)
}

fn cross_factor(cross: &DMatrix<f64>) -> Result<DMatrix<f64>> {
    cross
        .clone()
        .cholesky()
        .map(|c| c.l())
        .ok_or_else(|| Error::Other("cross-correlation matrix is not positive definite".into()))
}

pub(crate) fn joint_numeric_random(
    model: &JointNumericSpatialModel,
    params: &SampleParams,
) -> Result<Vec<Ensemble<f64>>> {
    let l = cross_factor(&model.cross_correlation)?;
    let k = model.components.len();
    let template = model.components[0].distribution.template();
    let (rows, cols) = template.shape();

    // Realization-major draw, then regrouped variable-major.
    let realizations: Vec<Vec<Field<f64>>> = (0..params.n)
        .into_par_iter()
        .map(|i| {
            let mut rng = realization_rng(params.seed, i);
            let mut fields: Vec<Field<f64>> = model
                .components
                .iter()
                .map(|c| {
                    let mut f = c.distribution.template().with_same_shape::<f64>();
                    f.set_nodata(Some(f64::NAN));
                    f
                })
                .collect();

            for row in 0..rows {
                for col in 0..cols {
                    let z: Vec<f64> =
                        (0..k).map(|_| StandardNormal.sample(&mut rng)).collect();
                    for (v, component) in model.components.iter().enumerate() {
                        let MarginalDistribution::Normal { mean, sd } = &component.distribution
                        else {
                            unreachable!("joint components are Normal by construction");
                        };
                        let m = unsafe { mean.get_unchecked(row, col) };
                        let s = unsafe { sd.get_unchecked(row, col) };
                        let value = if mean.is_nodata(m) || sd.is_nodata(s) {
                            f64::NAN
                        } else {
                            let mut mixed = 0.0;
                            for w in 0..=v {
                                mixed += l[(v, w)] * z[w];
                            }
                            m + s * mixed
                        };
                        unsafe { fields[v].set_unchecked(row, col, value) };
                    }
                }
            }
            fields
        })
        .collect();

    let mut out: Vec<Ensemble<f64>> = (0..k).map(|_| Ensemble::with_capacity(params.n)).collect();
    for realization in realizations {
        for (ensemble, field) in out.iter_mut().zip(realization) {
            ensemble.push(field)?;
        }
    }
    Ok(out)
}

pub(crate) fn joint_scalar_random(
    model: &JointScalarModel,
    params: &SampleParams,
) -> Result<Vec<Vec<f64>>> {
    let l = cross_factor(&model.cross_correlation)?;
    let k = model.means.len();

    let mut out = Vec::with_capacity(params.n);
    for i in 0..params.n {
        let mut rng = realization_rng(params.seed, i);
        let z = DVector::from_fn(k, |_, _| StandardNormal.sample(&mut rng));
        let y = &l * z;
        let values: Vec<f64> = (0..k)
            .map(|v| model.means[v] + model.sds[v] * y[v])
            .collect();
        out.push(values);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::SampleMethod;

    fn params(n: usize, seed: u64) -> SampleParams {
        SampleParams {
            n,
            method: SampleMethod::Random,
            seed,
        }
    }

    #[test]
    fn test_nodata_propagates_into_realizations() {
        let mut mean = Field::filled(3, 3, 10.0);
        mean.set_nodata(Some(f64::NAN));
        mean.set(1, 1, f64::NAN).unwrap();
        let sd = Field::filled(3, 3, 1.0);
        let model =
            NumericSpatialModel::new(true, MarginalDistribution::Normal { mean, sd }, None)
                .unwrap();

        let e = numeric_random(&model, &params(5, 7)).unwrap();
        for member in &e {
            assert!(member.get(1, 1).unwrap().is_nan());
            assert!(!member.get(0, 0).unwrap().is_nan());
        }
    }

    #[test]
    fn test_deterministic_for_same_seed() {
        let model = NumericSpatialModel::new(
            true,
            MarginalDistribution::Normal {
                mean: Field::filled(4, 4, 0.0),
                sd: Field::filled(4, 4, 1.0),
            },
            None,
        )
        .unwrap();

        let a = numeric_random(&model, &params(3, 123)).unwrap();
        let b = numeric_random(&model, &params(3, 123)).unwrap();
        for (fa, fb) in a.iter().zip(b.iter()) {
            assert_eq!(fa.data(), fb.data());
        }

        let c = numeric_random(&model, &params(3, 124)).unwrap();
        assert_ne!(a.member(0).unwrap().data(), c.member(0).unwrap().data());
    }

    #[test]
    fn test_categorical_draws_only_known_labels() {
        let p1 = Field::filled(4, 4, 0.3);
        let p2 = Field::filled(4, 4, 0.7);
        let model = CategoricalSpatialModel::new(true, vec![2, 9], vec![p1, p2]).unwrap();
        let e = categorical_random(&model, &params(10, 5)).unwrap();
        for member in &e {
            for row in 0..4 {
                for col in 0..4 {
                    let v = member.get(row, col).unwrap();
                    assert!(v == 2 || v == 9, "unexpected label {}", v);
                }
            }
        }
    }

    #[test]
    fn test_joint_scalar_correlation_sign() {
        let cross = DMatrix::from_row_slice(2, 2, &[1.0, 0.9, 0.9, 1.0]);
        let model = JointScalarModel::new(vec![0.0, 0.0], vec![1.0, 1.0], cross).unwrap();
        let draws = joint_scalar_random(&model, &params(2000, 42)).unwrap();

        let mut sum_xy = 0.0;
        for pair in &draws {
            sum_xy += pair[0] * pair[1];
        }
        let corr = sum_xy / draws.len() as f64;
        assert!(corr > 0.7, "expected strong positive correlation, got {}", corr);
    }
}
