//! Spatial autocorrelation diagnostics
//!
//! Global Moran's I with a queen-case (8-neighbor) weight matrix. Used as
//! the smoothness metric when comparing realizations simulated under
//! different correlogram sills.

use ndarray::Array2;
use stochmap_core::{Error, Field, Result};

/// Result of Global Moran's I computation
#[derive(Debug, Clone)]
pub struct MoransI {
    /// Moran's I statistic (-1 to +1)
    pub i: f64,
    /// Expected I under spatial randomness
    pub expected: f64,
    /// Z-score under the randomization assumption
    pub z_score: f64,
    /// Two-tailed p-value
    pub p_value: f64,
}

/// Compute Global Moran's I for a field.
///
/// Uses a queen-case (8-neighbor) spatial weight matrix; no-data cells
/// carry no weight.
///
/// # Returns
/// [`MoransI`] with the statistic, z-score, and p-value.
pub fn global_morans_i(field: &Field<f64>) -> Result<MoransI> {
    let (rows, cols) = field.shape();

    let mut values: Vec<(usize, usize, f64)> = Vec::new();
    for row in 0..rows {
        for col in 0..cols {
            let v = unsafe { field.get_unchecked(row, col) };
            if !field.is_nodata(v) {
                values.push((row, col, v));
            }
        }
    }

    let n = values.len() as f64;
    if n < 3.0 {
        return Err(Error::Other("need at least 3 valid cells".into()));
    }

    let mean = values.iter().map(|(_, _, v)| v).sum::<f64>() / n;
    let deviations: Vec<f64> = values.iter().map(|(_, _, v)| v - mean).collect();
    let sum_sq = deviations.iter().map(|d| d * d).sum::<f64>();

    if sum_sq.abs() < f64::EPSILON {
        return Ok(MoransI {
            i: 0.0,
            expected: -1.0 / (n - 1.0),
            z_score: 0.0,
            p_value: 1.0,
        });
    }

    // Index lookup for neighbor access
    let mut grid: Array2<Option<usize>> = Array2::from_elem((rows, cols), None);
    for (idx, &(row, col, _)) in values.iter().enumerate() {
        grid[(row, col)] = Some(idx);
    }

    // Numerator: Σ w_ij (x_i - mean)(x_j - mean), w_ij = 1 for queen neighbors
    let mut numerator = 0.0;
    let mut w_sum = 0.0;

    for &(row, col, _) in &values {
        let Some(i_idx) = grid[(row, col)] else {
            continue;
        };
        let dev_i = deviations[i_idx];

        for dr in -1_isize..=1 {
            for dc in -1_isize..=1 {
                if dr == 0 && dc == 0 {
                    continue;
                }
                let nr = row as isize + dr;
                let nc = col as isize + dc;
                if nr >= 0
                    && nc >= 0
                    && (nr as usize) < rows
                    && (nc as usize) < cols
                    && let Some(j_idx) = grid[(nr as usize, nc as usize)]
                {
                    numerator += dev_i * deviations[j_idx];
                    w_sum += 1.0;
                }
            }
        }
    }

    let morans_i = (n / w_sum) * (numerator / sum_sq);
    let expected_i = -1.0 / (n - 1.0);

    // Variance under the randomization assumption
    let s1 = 2.0 * w_sum;
    let s2: f64 = values
        .iter()
        .map(|&(row, col, _)| {
            let mut neighbors = 0.0_f64;
            for dr in -1_isize..=1 {
                for dc in -1_isize..=1 {
                    if dr == 0 && dc == 0 {
                        continue;
                    }
                    let nr = row as isize + dr;
                    let nc = col as isize + dc;
                    if nr >= 0
                        && nc >= 0
                        && (nr as usize) < rows
                        && (nc as usize) < cols
                        && grid[(nr as usize, nc as usize)].is_some()
                    {
                        neighbors += 1.0;
                    }
                }
            }
            let total = neighbors * 2.0;
            total * total
        })
        .sum();

    let s0 = w_sum;
    let nn1 = n - 1.0;

    let var_i = (n * ((n * n - 3.0 * n + 3.0) * s1 - n * s2 + 3.0 * s0 * s0)
        - (n * n - n) * s1
        + 2.0 * n * s2
        - 6.0 * s0 * s0)
        / ((n - 1.0) * (n - 2.0) * (n - 3.0) * s0 * s0);

    let var_i_safe = if var_i > 0.0 { var_i } else { 1.0 / (nn1 * nn1) };
    let z_score = (morans_i - expected_i) / var_i_safe.sqrt();
    let p_value = 2.0 * normal_cdf(-z_score.abs());

    Ok(MoransI {
        i: morans_i,
        expected: expected_i,
        z_score,
        p_value,
    })
}

/// Approximate CDF of the standard normal distribution
/// Uses the Abramowitz & Stegun approximation (error < 7.5e-8)
pub(crate) fn normal_cdf(x: f64) -> f64 {
    if x < -8.0 {
        return 0.0;
    }
    if x > 8.0 {
        return 1.0;
    }

    let t = 1.0 / (1.0 + 0.2316419 * x.abs());
    let d = 0.3989422804014327; // 1/sqrt(2*pi)
    let p = d
        * (-x * x / 2.0).exp()
        * (t * (0.3193815
            + t * (-0.3565638 + t * (1.781478 + t * (-1.821256 + t * 1.330274)))));

    if x > 0.0 {
        1.0 - p
    } else {
        p
    }
}
