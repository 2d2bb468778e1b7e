//! Ensemble summary statistics
//!
//! Per-cell reductions over the realization axis of an ensemble. Every
//! reduction returns a field on the ensemble's geometry with NaN nodata.
//!
//! Quantiles follow the linear-interpolation convention (type 7 in the
//! Hyndman & Fan taxonomy): `h = (n - 1) p`, interpolating between the
//! order statistics at `floor(h)` and `floor(h) + 1`.

use serde::{Deserialize, Serialize};
use stochmap_core::{Ensemble, Error, Field, Result};

/// How a reduction treats cells where some realizations are nodata.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MissingPolicy {
    /// Any nodata realization makes the output cell nodata
    #[default]
    Propagate,
    /// Reduce over the valid realizations only; nodata output only when no
    /// realization is valid
    Ignore,
}

fn check_ensemble(ensemble: &Ensemble<f64>) -> Result<(usize, usize)> {
    let Some(shape) = ensemble.shape() else {
        return Err(Error::InvalidCount {
            n: 0,
            reason: "statistics need a non-empty ensemble".into(),
        });
    };
    Ok(shape)
}

/// Values of one cell across realizations, or `None` under the policy.
fn cell_values(
    ensemble: &Ensemble<f64>,
    row: usize,
    col: usize,
    policy: MissingPolicy,
) -> Option<Vec<f64>> {
    let mut values = Vec::with_capacity(ensemble.len());
    for member in ensemble {
        let v = unsafe { member.get_unchecked(row, col) };
        if member.is_nodata(v) {
            match policy {
                MissingPolicy::Propagate => return None,
                MissingPolicy::Ignore => continue,
            }
        } else {
            values.push(v);
        }
    }
    if values.is_empty() { None } else { Some(values) }
}

fn reduce<R>(ensemble: &Ensemble<f64>, policy: MissingPolicy, reducer: R) -> Result<Field<f64>>
where
    R: Fn(&[f64]) -> f64,
{
    let (rows, cols) = check_ensemble(ensemble)?;
    let template = ensemble.first().expect("non-empty ensemble");
    let mut out = template.with_same_shape::<f64>();
    out.set_nodata(Some(f64::NAN));

    for row in 0..rows {
        for col in 0..cols {
            let v = match cell_values(ensemble, row, col, policy) {
                Some(values) => reducer(&values),
                None => f64::NAN,
            };
            unsafe { out.set_unchecked(row, col, v) };
        }
    }
    Ok(out)
}

pub fn scalar_mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (n - 1 denominator); 0 for a single value.
pub fn scalar_sd(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }
    let mean = scalar_mean(values);
    let ss: f64 = values.iter().map(|v| (v - mean) * (v - mean)).sum();
    (ss / (n - 1) as f64).sqrt()
}

/// Linear-interpolation quantile of unsorted values, `p` in the open unit
/// interval.
pub fn scalar_quantile(values: &[f64], p: f64) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let h = (sorted.len() - 1) as f64 * p;
    let lo = h.floor() as usize;
    let hi = h.ceil() as usize;
    if lo == hi {
        sorted[lo]
    } else {
        sorted[lo] + (h - lo as f64) * (sorted[hi] - sorted[lo])
    }
}

/// Per-cell mean across realizations.
pub fn ensemble_mean(ensemble: &Ensemble<f64>, policy: MissingPolicy) -> Result<Field<f64>> {
    reduce(ensemble, policy, scalar_mean)
}

/// Per-cell sample standard deviation across realizations.
pub fn ensemble_sd(ensemble: &Ensemble<f64>, policy: MissingPolicy) -> Result<Field<f64>> {
    reduce(ensemble, policy, scalar_sd)
}

/// Per-cell quantile across realizations.
///
/// # Errors
/// `InvalidParameter` unless `0 < p < 1`.
pub fn ensemble_quantile(
    ensemble: &Ensemble<f64>,
    p: f64,
    policy: MissingPolicy,
) -> Result<Field<f64>> {
    if !(p > 0.0 && p < 1.0) {
        return Err(Error::InvalidParameter {
            name: "p",
            value: format!("{}", p),
            reason: "quantile probability must lie strictly between 0 and 1".into(),
        });
    }
    reduce(ensemble, policy, |values| scalar_quantile(values, p))
}

/// Per-cell fraction of realizations strictly above `threshold`.
pub fn exceedance_probability(
    ensemble: &Ensemble<f64>,
    threshold: f64,
    policy: MissingPolicy,
) -> Result<Field<f64>> {
    reduce(ensemble, policy, move |values| {
        let above = values.iter().filter(|&&v| v > threshold).count();
        above as f64 / values.len() as f64
    })
}

/// Per-cell modal category across realizations (lowest label on ties).
pub fn modal_class(ensemble: &Ensemble<u16>) -> Result<Field<u16>> {
    let Some((rows, cols)) = ensemble.shape() else {
        return Err(Error::InvalidCount {
            n: 0,
            reason: "statistics need a non-empty ensemble".into(),
        });
    };
    let template = ensemble.first().expect("non-empty ensemble");
    let mut out: Field<u16> = template.with_same_shape();
    out.set_nodata(Some(u16::MAX));

    for row in 0..rows {
        for col in 0..cols {
            let mut counts: Vec<(u16, usize)> = Vec::new();
            for member in ensemble {
                let v = unsafe { member.get_unchecked(row, col) };
                if member.is_nodata(v) {
                    continue;
                }
                match counts.iter_mut().find(|(label, _)| *label == v) {
                    Some((_, count)) => *count += 1,
                    None => counts.push((v, 1)),
                }
            }
            counts.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
            let v = counts.first().map_or(u16::MAX, |&(label, _)| label);
            unsafe { out.set_unchecked(row, col, v) };
        }
    }
    Ok(out)
}

/// Per-cell fraction of realizations equal to `label`, over valid
/// realizations.
pub fn class_frequency(ensemble: &Ensemble<u16>, label: u16) -> Result<Field<f64>> {
    let Some((rows, cols)) = ensemble.shape() else {
        return Err(Error::InvalidCount {
            n: 0,
            reason: "statistics need a non-empty ensemble".into(),
        });
    };
    let template = ensemble.first().expect("non-empty ensemble");
    let mut out = template.with_same_shape::<f64>();
    out.set_nodata(Some(f64::NAN));

    for row in 0..rows {
        for col in 0..cols {
            let mut hits = 0usize;
            let mut valid = 0usize;
            for member in ensemble {
                let v = unsafe { member.get_unchecked(row, col) };
                if member.is_nodata(v) {
                    continue;
                }
                valid += 1;
                if v == label {
                    hits += 1;
                }
            }
            let v = if valid == 0 {
                f64::NAN
            } else {
                hits as f64 / valid as f64
            };
            unsafe { out.set_unchecked(row, col, v) };
        }
    }
    Ok(out)
}
