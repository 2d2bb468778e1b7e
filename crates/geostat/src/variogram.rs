//! Empirical variogram of a gridded field and correlogram fitting
//!
//! The semivariance γ(h) measures spatial dissimilarity as a function of
//! separation distance h:
//! ```text
//! γ(h) = (1/2N(h)) Σ [z(cᵢ) - z(cⱼ)]²   for all cell pairs at distance ∈ h±Δh/2
//! ```
//! For a variable with variance σ², the correlogram follows as
//! ρ(h) = 1 − γ(h)/σ², which is the form the samplers consume.
//!
//! Reference:
//! Matheron, G. (1963). Principles of geostatistics. Economic Geology.
//! Cressie, N. (1993). Statistics for Spatial Data. Wiley.

use crate::correlogram::{CorrelogramFamily, CorrelogramModel};
use stochmap_core::{Error, Field, Result};

/// Empirical variogram: semivariance values at discrete lag distances.
#[derive(Debug, Clone)]
pub struct EmpiricalVariogram {
    /// Lag distances (bin centers)
    pub lags: Vec<f64>,
    /// Semivariance values γ(h) at each lag
    pub semivariance: Vec<f64>,
    /// Number of cell pairs contributing to each lag bin
    pub pair_counts: Vec<usize>,
    /// Sample variance of the field, used to normalize fits
    pub variance: f64,
}

/// Parameters for empirical variogram computation
#[derive(Debug, Clone)]
pub struct VariogramParams {
    /// Upper bound on the number of lag bins (default 15); bins are never
    /// narrower than one cell, so coarse grids may yield fewer
    pub n_lags: usize,
    /// Maximum lag distance. If None, a quarter of the grid diagonal.
    pub max_lag: Option<f64>,
    /// Anchor-cell stride for subsampling large grids (default 1 = all cells)
    pub stride: usize,
}

impl Default for VariogramParams {
    fn default() -> Self {
        Self {
            n_lags: 15,
            max_lag: None,
            stride: 1,
        }
    }
}

/// Compute the empirical variogram of a gridded field.
///
/// Cell pairs are enumerated by window offsets around each anchor cell
/// (lexicographically positive offsets only, so each pair counts once)
/// and binned by center-to-center distance. Anchor cells can be strided
/// to keep large grids tractable.
///
/// # Arguments
/// * `field` — Input field; no-data cells are skipped
/// * `params` — Number of lags, maximum lag, anchor stride
///
/// # Returns
/// [`EmpiricalVariogram`] with lag distances, semivariance, and pair counts.
pub fn empirical_variogram(
    field: &Field<f64>,
    params: &VariogramParams,
) -> Result<EmpiricalVariogram> {
    if params.n_lags == 0 {
        return Err(Error::InvalidParameter {
            name: "n_lags",
            value: "0".into(),
            reason: "need at least one lag bin".into(),
        });
    }
    if params.stride == 0 {
        return Err(Error::InvalidParameter {
            name: "stride",
            value: "0".into(),
            reason: "stride must be >= 1".into(),
        });
    }

    let (rows, cols) = field.shape();
    let cell = field.cell_size();
    if cell <= 0.0 {
        return Err(Error::InvalidParameter {
            name: "cell_size",
            value: format!("{}", cell),
            reason: "field needs a positive cell size".into(),
        });
    }

    let summary = field.summary();
    if summary.valid_count < 2 {
        return Err(Error::Other(
            "need at least 2 valid cells for a variogram".into(),
        ));
    }
    let mean = summary.mean.unwrap_or(0.0);

    let max_lag = match params.max_lag {
        Some(m) if m > 0.0 => m,
        Some(m) => {
            return Err(Error::InvalidParameter {
                name: "max_lag",
                value: format!("{}", m),
                reason: "max lag must be positive".into(),
            })
        }
        None => {
            let diag = ((rows * rows + cols * cols) as f64).sqrt() * cell;
            diag / 4.0
        }
    };

    // The shortest possible pair distance is one cell, so a bin narrower
    // than the cell size could never fill. Floor the width there and carry
    // fewer bins when the requested count does not fit below max_lag.
    let bin_width = (max_lag / params.n_lags as f64).max(cell);
    let n_bins = (((max_lag / bin_width) - 1e-9).ceil() as usize)
        .clamp(1, params.n_lags);
    let window = (max_lag / cell).ceil() as isize;

    let mut lags = Vec::with_capacity(n_bins);
    let mut semivariance = vec![0.0_f64; n_bins];
    let mut pair_counts = vec![0_usize; n_bins];
    for k in 0..n_bins {
        lags.push((k as f64 + 0.5) * bin_width);
    }

    // Field variance over valid cells (for correlogram normalization)
    let mut ssq = 0.0;
    let mut valid = 0usize;

    for row in (0..rows).step_by(params.stride) {
        for col in (0..cols).step_by(params.stride) {
            let z = unsafe { field.get_unchecked(row, col) };
            if field.is_nodata(z) {
                continue;
            }
            ssq += (z - mean) * (z - mean);
            valid += 1;

            // Offsets (dr, dc) with dr > 0, or dr == 0 and dc > 0.
            for dr in 0..=window {
                let nr = row as isize + dr;
                if nr as usize >= rows {
                    break;
                }
                let dc_start = if dr == 0 { 1 } else { -window };
                for dc in dc_start..=window {
                    let nc = col as isize + dc;
                    if nc < 0 || nc as usize >= cols {
                        continue;
                    }
                    let d = ((dr * dr + dc * dc) as f64).sqrt() * cell;
                    if d > max_lag {
                        continue;
                    }
                    let zj = unsafe { field.get_unchecked(nr as usize, nc as usize) };
                    if field.is_nodata(zj) {
                        continue;
                    }
                    // Bins close on their upper edge, so the one-cell pair
                    // distance lands in the first bin.
                    let bin = ((d / bin_width).ceil() as usize)
                        .saturating_sub(1)
                        .min(n_bins - 1);
                    let dz = z - zj;
                    semivariance[bin] += dz * dz;
                    pair_counts[bin] += 1;
                }
            }
        }
    }

    for k in 0..n_bins {
        if pair_counts[k] > 0 {
            semivariance[k] /= 2.0 * pair_counts[k] as f64;
        } else {
            semivariance[k] = f64::NAN;
        }
    }

    let variance = if valid > 1 {
        ssq / (valid - 1) as f64
    } else {
        0.0
    };

    Ok(EmpiricalVariogram {
        lags,
        semivariance,
        pair_counts,
        variance,
    })
}

/// Fit a correlogram model of the given family to an empirical variogram.
///
/// Normalizes the semivariance by the field variance, turning each lag into
/// an observed correlation ρ̂(h) = 1 − γ̂(h)/σ², then grid-searches
/// (sill, range) weighted by pair counts (Cressie-style weighting).
///
/// # Returns
/// [`CorrelogramModel`] with the best (sill, range) for the family.
pub fn fit_correlogram(
    empirical: &EmpiricalVariogram,
    family: CorrelogramFamily,
) -> Result<CorrelogramModel> {
    if empirical.variance <= 0.0 {
        return Err(Error::Other(
            "cannot fit a correlogram to a constant field".into(),
        ));
    }

    // Observed correlations per lag, clamped to the valid correlogram band.
    let observed: Vec<(f64, f64, usize)> = empirical
        .lags
        .iter()
        .zip(empirical.semivariance.iter())
        .zip(empirical.pair_counts.iter())
        .filter(|((_, sv), cnt)| !sv.is_nan() && **cnt > 0)
        .map(|((&lag, &sv), &cnt)| (lag, (1.0 - sv / empirical.variance).clamp(0.0, 1.0), cnt))
        .collect();

    if observed.len() < 3 {
        return Err(Error::Other(
            "need at least 3 valid lag bins to fit a correlogram".into(),
        ));
    }

    let max_lag = observed.last().map(|(l, _, _)| *l).unwrap_or(1.0);

    let n_sill = 20;
    let n_range = 40;

    let mut best_rss = f64::MAX;
    let mut best_sill = 0.5;
    let mut best_range = max_lag;

    for is in 1..=n_sill {
        let sill = is as f64 / n_sill as f64;
        for ir in 1..=n_range {
            let range = max_lag * 2.0 * ir as f64 / n_range as f64;
            let trial = CorrelogramModel::new(family, sill, range)?;

            let mut rss = 0.0;
            for &(lag, rho, cnt) in &observed {
                let residual = rho - trial.correlation(lag);
                rss += cnt as f64 * residual * residual;
            }

            if rss < best_rss {
                best_rss = rss;
                best_sill = sill;
                best_range = range;
            }
        }
    }

    CorrelogramModel::new(family, best_sill, best_range)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wavy_field(size: usize, wavelength: f64) -> Field<f64> {
        // Smooth periodic surface plus deterministic high-frequency jitter
        let mut field = Field::from_fn(size, size, |r, c| {
            let x = c as f64;
            let y = r as f64;
            let jitter = (((r * 7 + c * 13) % 97) as f64 / 97.0 - 0.5) * 0.4;
            (x / wavelength).sin() + (y / wavelength).sin() + jitter
        });
        field.set_nodata(Some(f64::NAN));
        field
    }

    #[test]
    fn test_empirical_variogram_shape() {
        let field = wavy_field(40, 15.0);
        let emp = empirical_variogram(&field, &VariogramParams::default()).unwrap();

        assert_eq!(emp.lags.len(), 15);
        assert_eq!(emp.semivariance.len(), 15);
        assert!(emp.pair_counts[0] > 0);
        assert!(emp.variance > 0.0);
    }

    #[test]
    fn test_small_grid_first_bin_populated() {
        // On a 30x30 grid the default 15-way split of max_lag would make
        // bins narrower than one cell; the cell-size floor keeps the
        // one-cell pairs in the first bin and trims the bin count.
        let field = wavy_field(30, 10.0);
        let emp = empirical_variogram(&field, &VariogramParams::default()).unwrap();

        assert_eq!(emp.lags.len(), 11);
        assert!(emp.pair_counts[0] > 0);
        assert!(emp.semivariance[0].is_finite());
        assert!(emp.pair_counts.iter().all(|&c| c > 0));
    }

    #[test]
    fn test_semivariance_increases_for_structured_field() {
        let field = wavy_field(40, 20.0);
        let emp = empirical_variogram(&field, &VariogramParams::default()).unwrap();

        let valid: Vec<f64> = emp
            .semivariance
            .iter()
            .copied()
            .filter(|v| !v.is_nan())
            .collect();
        assert!(valid.len() >= 5);
        assert!(
            valid[0] < *valid.last().unwrap(),
            "semivariance should grow with lag: first={:.3}, last={:.3}",
            valid[0],
            valid.last().unwrap()
        );
    }

    #[test]
    fn test_constant_field_rejected_by_fit() {
        let field = Field::filled(20, 20, 3.0);
        let emp = empirical_variogram(&field, &VariogramParams::default()).unwrap();
        assert!(fit_correlogram(&emp, CorrelogramFamily::Exponential).is_err());
    }

    #[test]
    fn test_fit_returns_valid_model() {
        let field = wavy_field(48, 12.0);
        let emp = empirical_variogram(&field, &VariogramParams::default()).unwrap();
        let model = fit_correlogram(&emp, CorrelogramFamily::Spherical).unwrap();

        assert!(model.sill() > 0.0 && model.sill() <= 1.0);
        assert!(model.range() > 0.0);
        // Structured field: a meaningful share of variance is spatial
        assert!(model.sill() > 0.3, "sill too low: {}", model.sill());
    }

    #[test]
    fn test_stride_subsampling() {
        let field = wavy_field(60, 18.0);
        let full = empirical_variogram(&field, &VariogramParams::default()).unwrap();
        let strided = empirical_variogram(
            &field,
            &VariogramParams {
                stride: 3,
                ..Default::default()
            },
        )
        .unwrap();

        assert!(strided.pair_counts.iter().sum::<usize>() < full.pair_counts.iter().sum::<usize>());
        assert!(strided.pair_counts[0] > 0);
    }

    #[test]
    fn test_too_few_cells() {
        let mut field: Field<f64> = Field::new(2, 2);
        field.set_nodata(Some(f64::NAN));
        for r in 0..2 {
            for c in 0..2 {
                field.set(r, c, f64::NAN).unwrap();
            }
        }
        assert!(empirical_variogram(&field, &VariogramParams::default()).is_err());
    }
}
