//! Unconditional Gaussian simulation
//!
//! Produces a standard-normal field ε with unit variance and cell-pair
//! correlation given by the correlogram (self-covariance 1; the nugget is
//! the unexplained remainder), then composes the realization as
//! `mean + sd ⊙ ε`.
//!
//! Two paths:
//! - **Dense**: full covariance matrix over valid cells, factored with a
//!   Cholesky decomposition. Exact, but O(cells³); rejected above
//!   [`DENSE_CELL_CAP`] cells.
//! - **Sequential**: sequential Gaussian simulation with a deterministic
//!   random visiting order. Each cell is conditioned on up to `k` nearest
//!   already-simulated cells through a simple-kriging system, then drawn
//!   from `N(Σwᵢεᵢ, 1 − Σwᵢc₀ᵢ)`.
//!
//! Reference:
//! Deutsch, C.V. & Journel, A.G. (1998). GSLIB: Geostatistical Software
//! Library and User's Guide. Oxford University Press.

use nalgebra::{DMatrix, DVector};
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand_distr::{Distribution, StandardNormal};
use stochmap_core::rng::realization_rng;
use stochmap_core::{Ensemble, Error, Field, GridTransform, Result};

use crate::maybe_rayon::*;
use crate::model::{JointNumericSpatialModel, MarginalDistribution, NumericSpatialModel};
use crate::sample::SampleParams;
use stochmap_geostat::CorrelogramModel;

/// Valid-cell limit for the full-grid Cholesky path.
pub const DENSE_CELL_CAP: usize = 10_000;

/// Cells participating in the simulation: those valid in the template.
fn simulation_mask(template: &Field<f64>) -> Vec<(usize, usize)> {
    let (rows, cols) = template.shape();
    let mut mask = Vec::new();
    for row in 0..rows {
        for col in 0..cols {
            let v = unsafe { template.get_unchecked(row, col) };
            if !template.is_nodata(v) {
                mask.push((row, col));
            }
        }
    }
    mask
}

fn cell_distance(transform: &GridTransform, a: (usize, usize), b: (usize, usize)) -> f64 {
    let (xa, ya) = transform.pixel_to_geo(a.1, a.0);
    let (xb, yb) = transform.pixel_to_geo(b.1, b.0);
    ((xa - xb).powi(2) + (ya - yb).powi(2)).sqrt()
}

/// Factor the covariance matrix, nudging the diagonal when floating-point
/// error pushes a marginally valid matrix out of positive definiteness.
fn cholesky_with_jitter(cov: DMatrix<f64>) -> Result<DMatrix<f64>> {
    for jitter in [0.0, 1e-10, 1e-8, 1e-6] {
        let n = cov.nrows();
        let trial = &cov + DMatrix::<f64>::identity(n, n) * jitter;
        if let Some(chol) = trial.cholesky() {
            return Ok(chol.l());
        }
    }
    Err(Error::Other(
        "correlogram covariance matrix is not positive definite".into(),
    ))
}

/// Full-grid simulation of a standard-normal field over the mask.
fn simulate_dense(
    correlogram: &CorrelogramModel,
    transform: &GridTransform,
    shape: (usize, usize),
    mask: &[(usize, usize)],
    rng: &mut StdRng,
) -> Result<Array2<f64>> {
    let n = mask.len();
    if n > DENSE_CELL_CAP {
        return Err(Error::InvalidParameter {
            name: "max_neighbors",
            value: "None".into(),
            reason: format!(
                "{} valid cells exceed the full-grid simulation cap of {}; set a neighborhood cap",
                n, DENSE_CELL_CAP
            ),
        });
    }

    let cov = DMatrix::from_fn(n, n, |i, j| {
        if i == j {
            1.0
        } else {
            correlogram.correlation(cell_distance(transform, mask[i], mask[j]))
        }
    });
    let l = cholesky_with_jitter(cov)?;

    let z = DVector::from_fn(n, |_, _| StandardNormal.sample(rng));
    let eps = &l * z;

    let mut out = Array2::from_elem(shape, f64::NAN);
    for (idx, &(row, col)) in mask.iter().enumerate() {
        out[(row, col)] = eps[idx];
    }
    Ok(out)
}

/// Simulated neighbors of `target` found by an expanding ring search over
/// the grid, nearest `k` by center distance.
fn nearest_simulated(
    simulated: &Array2<f64>,
    transform: &GridTransform,
    target: (usize, usize),
    k: usize,
) -> Vec<(usize, usize, f64)> {
    let (rows, cols) = simulated.dim();
    let r_max = rows.max(cols) as isize;
    let mut candidates: Vec<(usize, usize, f64)> = Vec::new();
    let mut found_at: Option<isize> = None;

    for r in 1..=r_max {
        for dr in -r..=r {
            for dc in -r..=r {
                // Ring cells only
                if dr.abs() != r && dc.abs() != r {
                    continue;
                }
                let nr = target.0 as isize + dr;
                let nc = target.1 as isize + dc;
                if nr < 0 || nc < 0 || nr as usize >= rows || nc as usize >= cols {
                    continue;
                }
                let (nr, nc) = (nr as usize, nc as usize);
                if simulated[(nr, nc)].is_nan() {
                    continue;
                }
                let d = cell_distance(transform, target, (nr, nc));
                candidates.push((nr, nc, d));
            }
        }
        if candidates.len() >= k && found_at.is_none() {
            found_at = Some(r);
        }
        // One extra ring: a closer cell can still appear there because
        // within-ring distances vary up to r·√2.
        if let Some(fr) = found_at
            && r > fr
        {
            break;
        }
    }

    candidates.sort_by(|a, b| a.2.partial_cmp(&b.2).unwrap_or(std::cmp::Ordering::Equal));
    candidates.truncate(k);
    candidates
}

/// Solve Ax = b by Gaussian elimination with partial pivoting.
/// Specialized for the small per-cell kriging systems.
fn solve_small(n: usize, mat: &mut [f64], rhs: &mut [f64]) -> Result<Vec<f64>> {
    for col in 0..n {
        let mut max_val = mat[col * n + col].abs();
        let mut max_row = col;
        for row in (col + 1)..n {
            let val = mat[row * n + col].abs();
            if val > max_val {
                max_val = val;
                max_row = row;
            }
        }

        if max_val < 1e-14 {
            return Err(Error::Other("singular kriging system".into()));
        }

        if max_row != col {
            for j in 0..n {
                mat.swap(col * n + j, max_row * n + j);
            }
            rhs.swap(col, max_row);
        }

        let pivot = mat[col * n + col];
        for row in (col + 1)..n {
            let factor = mat[row * n + col] / pivot;
            mat[row * n + col] = 0.0;
            for j in (col + 1)..n {
                mat[row * n + j] -= factor * mat[col * n + j];
            }
            rhs[row] -= factor * rhs[col];
        }
    }

    let mut x = vec![0.0_f64; n];
    for col in (0..n).rev() {
        let mut sum = rhs[col];
        for j in (col + 1)..n {
            sum -= mat[col * n + j] * x[j];
        }
        x[col] = sum / mat[col * n + col];
    }

    Ok(x)
}

/// Sequential Gaussian simulation of a standard-normal field.
fn simulate_sequential(
    correlogram: &CorrelogramModel,
    transform: &GridTransform,
    shape: (usize, usize),
    mask: &[(usize, usize)],
    max_neighbors: usize,
    rng: &mut StdRng,
) -> Result<Array2<f64>> {
    let mut order: Vec<(usize, usize)> = mask.to_vec();
    order.shuffle(rng);

    let mut eps = Array2::from_elem(shape, f64::NAN);

    for &(row, col) in &order {
        let neighbors = nearest_simulated(&eps, transform, (row, col), max_neighbors);
        let z: f64 = StandardNormal.sample(rng);

        let value = if neighbors.is_empty() {
            z
        } else {
            let m = neighbors.len();
            let mut mat = vec![0.0_f64; m * m];
            let mut rhs = vec![0.0_f64; m];
            for i in 0..m {
                mat[i * m + i] = 1.0;
                for j in (i + 1)..m {
                    let d = cell_distance(
                        transform,
                        (neighbors[i].0, neighbors[i].1),
                        (neighbors[j].0, neighbors[j].1),
                    );
                    let c = correlogram.correlation(d);
                    mat[i * m + j] = c;
                    mat[j * m + i] = c;
                }
                rhs[i] = correlogram.correlation(neighbors[i].2);
            }

            match solve_small(m, &mut mat, &mut rhs.clone()) {
                Ok(weights) => {
                    let mut mean = 0.0;
                    let mut explained = 0.0;
                    for (i, &(nr, nc, _)) in neighbors.iter().enumerate() {
                        mean += weights[i] * eps[(nr, nc)];
                        explained += weights[i] * rhs[i];
                    }
                    let var = (1.0 - explained).clamp(0.0, 1.0);
                    mean + var.sqrt() * z
                }
                // Degenerate neighborhood (coincident cells): draw
                // unconditionally rather than failing the realization.
                Err(_) => z,
            }
        };

        eps[(row, col)] = value;
    }

    Ok(eps)
}

/// One standard-normal field under the chosen path.
fn simulate_standard_field(
    correlogram: &CorrelogramModel,
    transform: &GridTransform,
    shape: (usize, usize),
    mask: &[(usize, usize)],
    max_neighbors: Option<usize>,
    rng: &mut StdRng,
) -> Result<Array2<f64>> {
    match max_neighbors {
        None => simulate_dense(correlogram, transform, shape, mask, rng),
        Some(k) => {
            if k < 1 {
                return Err(Error::InvalidParameter {
                    name: "max_neighbors",
                    value: "0".into(),
                    reason: "neighborhood cap must be at least 1".into(),
                });
            }
            simulate_sequential(correlogram, transform, shape, mask, k, rng)
        }
    }
}

fn compose(mean: &Field<f64>, sd: &Field<f64>, eps: &Array2<f64>) -> Field<f64> {
    let (rows, cols) = mean.shape();
    let mut out = mean.with_same_shape::<f64>();
    out.set_nodata(Some(f64::NAN));
    for row in 0..rows {
        for col in 0..cols {
            let m = unsafe { mean.get_unchecked(row, col) };
            let s = unsafe { sd.get_unchecked(row, col) };
            let e = eps[(row, col)];
            let v = if mean.is_nodata(m) || sd.is_nodata(s) || e.is_nan() {
                f64::NAN
            } else {
                m + s * e
            };
            unsafe { out.set_unchecked(row, col, v) };
        }
    }
    out
}

pub(crate) fn numeric_simulation(
    model: &NumericSpatialModel,
    correlogram: &CorrelogramModel,
    max_neighbors: Option<usize>,
    params: &SampleParams,
) -> Result<Ensemble<f64>> {
    let MarginalDistribution::Normal { mean, sd } = &model.distribution else {
        // The constructor whitelist makes this unreachable; keep the typed
        // failure for direct callers.
        return Err(Error::UnsupportedCombination(
            "spatially-correlated sampling is only defined for the Normal marginal".into(),
        ));
    };

    let mask = simulation_mask(mean);
    let transform = *mean.transform();
    let shape = mean.shape();

    let fields: Vec<Result<Field<f64>>> = (0..params.n)
        .into_par_iter()
        .map(|i| {
            let mut rng = realization_rng(params.seed, i);
            let eps = simulate_standard_field(
                correlogram,
                &transform,
                shape,
                &mask,
                max_neighbors,
                &mut rng,
            )?;
            Ok(compose(mean, sd, &eps))
        })
        .collect();

    let mut ensemble = Ensemble::with_capacity(params.n);
    for f in fields {
        ensemble.push(f?)?;
    }
    Ok(ensemble)
}

pub(crate) fn joint_simulation(
    model: &JointNumericSpatialModel,
    correlogram: &CorrelogramModel,
    max_neighbors: Option<usize>,
    params: &SampleParams,
) -> Result<Vec<Ensemble<f64>>> {
    let l = model
        .cross_correlation
        .clone()
        .cholesky()
        .map(|c| c.l())
        .ok_or_else(|| Error::Other("cross-correlation matrix is not positive definite".into()))?;

    let k = model.components.len();
    let template = model.components[0].distribution.template();
    let mask = simulation_mask(template);
    let transform = *template.transform();
    let shape = template.shape();

    let realizations: Vec<Result<Vec<Field<f64>>>> = (0..params.n)
        .into_par_iter()
        .map(|i| {
            let mut rng = realization_rng(params.seed, i);

            // One independent standard field per variable, then mixed per
            // cell through the cross-correlation factor (intrinsic
            // coregionalization).
            let mut eps: Vec<Array2<f64>> = Vec::with_capacity(k);
            for _ in 0..k {
                eps.push(simulate_standard_field(
                    correlogram,
                    &transform,
                    shape,
                    &mask,
                    max_neighbors,
                    &mut rng,
                )?);
            }

            let mut fields = Vec::with_capacity(k);
            for (v, component) in model.components.iter().enumerate() {
                let MarginalDistribution::Normal { mean, sd } = &component.distribution else {
                    unreachable!("joint components are Normal by construction");
                };
                let mut mixed = Array2::from_elem(shape, f64::NAN);
                for &(row, col) in &mask {
                    let mut acc = 0.0;
                    for w in 0..=v {
                        acc += l[(v, w)] * eps[w][(row, col)];
                    }
                    mixed[(row, col)] = acc;
                }
                fields.push(compose(mean, sd, &mixed));
            }
            Ok(fields)
        })
        .collect();

    let mut out: Vec<Ensemble<f64>> = (0..k).map(|_| Ensemble::with_capacity(params.n)).collect();
    for realization in realizations {
        for (ensemble, field) in out.iter_mut().zip(realization?) {
            ensemble.push(field)?;
        }
    }
    Ok(out)
}
