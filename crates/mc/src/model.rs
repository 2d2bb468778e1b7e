//! Uncertainty model descriptors
//!
//! An [`UncertaintyModel`] bundles everything the samplers need to draw
//! realizations of one uncertain input: the marginal distribution of each
//! value, and optionally a correlogram describing how errors co-vary in
//! space. Models are validated once at construction and read-only
//! afterwards; the sampler dispatches over the kind tag with an exhaustive
//! match, so adding a kind is a compile-checked change.

use nalgebra::DMatrix;
use stochmap_core::{Error, Field, Result};
use stochmap_geostat::CorrelogramModel;

const PROBABILITY_SUM_TOLERANCE: f64 = 1e-6;
const MATRIX_TOLERANCE: f64 = 1e-9;

/// Marginal distribution of a numeric spatial variable, parameterized by
/// aligned fields.
#[derive(Debug, Clone)]
pub enum MarginalDistribution {
    /// Per-cell Normal(mean, sd)
    Normal { mean: Field<f64>, sd: Field<f64> },
    /// Per-cell Uniform(lower, upper)
    Uniform { lower: Field<f64>, upper: Field<f64> },
}

impl MarginalDistribution {
    /// Whether a spatially-correlated sampling procedure exists for this
    /// marginal. This is the explicit whitelist: only the Normal case has
    /// one (correlate a standard-normal field, then scale and shift).
    pub fn supports_correlated_sampling(&self) -> bool {
        matches!(self, MarginalDistribution::Normal { .. })
    }

    /// Field carrying the shared geometry of the parameter fields.
    pub(crate) fn template(&self) -> &Field<f64> {
        match self {
            MarginalDistribution::Normal { mean, .. } => mean,
            MarginalDistribution::Uniform { lower, .. } => lower,
        }
    }

    fn validate(&self) -> Result<()> {
        match self {
            MarginalDistribution::Normal { mean, sd } => {
                check_aligned(mean, sd)?;
                for (&m, &s) in mean.data().iter().zip(sd.data().iter()) {
                    if mean.is_nodata(m) || sd.is_nodata(s) {
                        continue;
                    }
                    if s < 0.0 {
                        return Err(Error::InvalidParameter {
                            name: "sd",
                            value: format!("{}", s),
                            reason: "standard deviation must be non-negative".into(),
                        });
                    }
                }
            }
            MarginalDistribution::Uniform { lower, upper } => {
                check_aligned(lower, upper)?;
                for (&lo, &hi) in lower.data().iter().zip(upper.data().iter()) {
                    if lower.is_nodata(lo) || upper.is_nodata(hi) {
                        continue;
                    }
                    if hi < lo {
                        return Err(Error::InvalidParameter {
                            name: "upper",
                            value: format!("{}", hi),
                            reason: format!("upper bound below lower bound {}", lo),
                        });
                    }
                }
            }
        }
        Ok(())
    }
}

fn check_aligned(a: &Field<f64>, b: &Field<f64>) -> Result<()> {
    if !a.aligned_with(b) {
        return Err(Error::DimensionMismatch {
            expected: a.shape(),
            actual: b.shape(),
        });
    }
    Ok(())
}

/// Stochastic model of one numeric spatial variable.
#[derive(Debug, Clone)]
pub struct NumericSpatialModel {
    pub(crate) uncertain: bool,
    pub(crate) distribution: MarginalDistribution,
    pub(crate) correlogram: Option<CorrelogramModel>,
}

impl NumericSpatialModel {
    /// Define a numeric spatial model.
    ///
    /// # Errors
    /// - `DimensionMismatch` when the parameter fields are not aligned
    /// - `InvalidParameter` for negative sd cells or inverted uniform bounds
    /// - `UnsupportedCombination` when a correlogram accompanies a marginal
    ///   outside the correlated-sampling whitelist
    pub fn new(
        uncertain: bool,
        distribution: MarginalDistribution,
        correlogram: Option<CorrelogramModel>,
    ) -> Result<Self> {
        distribution.validate()?;
        if correlogram.is_some() && !distribution.supports_correlated_sampling() {
            return Err(Error::UnsupportedCombination(
                "spatially-correlated sampling is only defined for the Normal marginal".into(),
            ));
        }
        Ok(Self {
            uncertain,
            distribution,
            correlogram,
        })
    }

    pub fn uncertain(&self) -> bool {
        self.uncertain
    }

    pub fn distribution(&self) -> &MarginalDistribution {
        &self.distribution
    }

    pub fn correlogram(&self) -> Option<&CorrelogramModel> {
        self.correlogram.as_ref()
    }

    /// Central value field: the mean for Normal, the midpoint for Uniform.
    pub fn central(&self) -> Field<f64> {
        match &self.distribution {
            MarginalDistribution::Normal { mean, .. } => mean.clone(),
            MarginalDistribution::Uniform { lower, upper } => {
                let mut out = lower.clone();
                out.set_nodata(Some(f64::NAN));
                let (rows, cols) = lower.shape();
                for row in 0..rows {
                    for col in 0..cols {
                        let lo = unsafe { lower.get_unchecked(row, col) };
                        let hi = unsafe { upper.get_unchecked(row, col) };
                        let v = if lower.is_nodata(lo) || upper.is_nodata(hi) {
                            f64::NAN
                        } else {
                            0.5 * (lo + hi)
                        };
                        unsafe { out.set_unchecked(row, col, v) };
                    }
                }
                out
            }
        }
    }
}

/// Stochastic model of one categorical spatial variable: per-category
/// probability fields over a shared grid.
#[derive(Debug, Clone)]
pub struct CategoricalSpatialModel {
    pub(crate) uncertain: bool,
    pub(crate) labels: Vec<u16>,
    pub(crate) probabilities: Vec<Field<f64>>,
}

impl CategoricalSpatialModel {
    /// Define a categorical spatial model.
    ///
    /// Correlograms are not accepted for categorical variables; there is no
    /// spatially-correlated sampling procedure for them, so the constructor
    /// simply never takes one.
    ///
    /// # Errors
    /// - `InvalidParameter` for empty/duplicated labels, negative
    ///   probabilities, or per-cell probabilities not summing to 1
    /// - `DimensionMismatch` for misaligned probability fields
    pub fn new(uncertain: bool, labels: Vec<u16>, probabilities: Vec<Field<f64>>) -> Result<Self> {
        if labels.is_empty() || labels.len() != probabilities.len() {
            return Err(Error::InvalidParameter {
                name: "labels",
                value: format!("{}", labels.len()),
                reason: format!(
                    "need one label per probability field, got {} fields",
                    probabilities.len()
                ),
            });
        }
        let mut seen = labels.clone();
        seen.sort_unstable();
        seen.dedup();
        if seen.len() != labels.len() {
            return Err(Error::InvalidParameter {
                name: "labels",
                value: format!("{:?}", labels),
                reason: "labels must be unique".into(),
            });
        }

        let first = &probabilities[0];
        for p in &probabilities[1..] {
            check_aligned(first, p)?;
        }

        let (rows, cols) = first.shape();
        for row in 0..rows {
            for col in 0..cols {
                let mut sum = 0.0;
                let mut valid = true;
                for p in &probabilities {
                    let v = unsafe { p.get_unchecked(row, col) };
                    if p.is_nodata(v) {
                        valid = false;
                        break;
                    }
                    if v < 0.0 {
                        return Err(Error::InvalidParameter {
                            name: "probability",
                            value: format!("{}", v),
                            reason: format!("negative probability at cell ({}, {})", row, col),
                        });
                    }
                    sum += v;
                }
                if valid && (sum - 1.0).abs() > PROBABILITY_SUM_TOLERANCE {
                    return Err(Error::InvalidParameter {
                        name: "probability",
                        value: format!("{}", sum),
                        reason: format!("probabilities at cell ({}, {}) must sum to 1", row, col),
                    });
                }
            }
        }

        Ok(Self {
            uncertain,
            labels,
            probabilities,
        })
    }

    pub fn uncertain(&self) -> bool {
        self.uncertain
    }

    pub fn labels(&self) -> &[u16] {
        &self.labels
    }

    pub fn probabilities(&self) -> &[Field<f64>] {
        &self.probabilities
    }

    /// Modal category per cell (highest probability, lowest label on ties).
    pub fn central(&self) -> Field<u16> {
        let template = &self.probabilities[0];
        let mut out: Field<u16> = template.with_same_shape();
        out.set_nodata(Some(u16::MAX));
        let (rows, cols) = template.shape();

        // Lowest label wins ties, so visit categories in label order.
        let mut order: Vec<usize> = (0..self.labels.len()).collect();
        order.sort_by_key(|&i| self.labels[i]);

        for row in 0..rows {
            for col in 0..cols {
                let mut best: Option<(u16, f64)> = None;
                let mut valid = true;
                for &i in &order {
                    let p = unsafe { self.probabilities[i].get_unchecked(row, col) };
                    if self.probabilities[i].is_nodata(p) {
                        valid = false;
                        break;
                    }
                    if best.is_none_or(|(_, bp)| p > bp) {
                        best = Some((self.labels[i], p));
                    }
                }
                let v = match (valid, best) {
                    (true, Some((label, _))) => label,
                    _ => u16::MAX,
                };
                unsafe { out.set_unchecked(row, col, v) };
            }
        }
        out
    }
}

/// Marginal distribution of a non-spatial scalar.
#[derive(Debug, Clone, Copy)]
pub enum ScalarDistribution {
    Normal { mean: f64, sd: f64 },
    Uniform { lower: f64, upper: f64 },
    Beta { alpha: f64, beta: f64 },
}

impl ScalarDistribution {
    fn validate(&self) -> Result<()> {
        match *self {
            ScalarDistribution::Normal { sd, .. } => {
                if !(sd >= 0.0) || !sd.is_finite() {
                    return Err(Error::InvalidParameter {
                        name: "sd",
                        value: format!("{}", sd),
                        reason: "standard deviation must be non-negative".into(),
                    });
                }
            }
            ScalarDistribution::Uniform { lower, upper } => {
                if upper < lower {
                    return Err(Error::InvalidParameter {
                        name: "upper",
                        value: format!("{}", upper),
                        reason: format!("upper bound below lower bound {}", lower),
                    });
                }
            }
            ScalarDistribution::Beta { alpha, beta } => {
                if !(alpha > 0.0) || !(beta > 0.0) {
                    return Err(Error::InvalidParameter {
                        name: "alpha/beta",
                        value: format!("{}/{}", alpha, beta),
                        reason: "Beta shape parameters must be positive".into(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Central value: mean (Normal), midpoint (Uniform), α/(α+β) (Beta).
    pub fn central(&self) -> f64 {
        match *self {
            ScalarDistribution::Normal { mean, .. } => mean,
            ScalarDistribution::Uniform { lower, upper } => 0.5 * (lower + upper),
            ScalarDistribution::Beta { alpha, beta } => alpha / (alpha + beta),
        }
    }
}

/// Stochastic model of one non-spatial scalar.
#[derive(Debug, Clone, Copy)]
pub struct ScalarModel {
    pub(crate) uncertain: bool,
    pub(crate) distribution: ScalarDistribution,
}

impl ScalarModel {
    pub fn new(uncertain: bool, distribution: ScalarDistribution) -> Result<Self> {
        distribution.validate()?;
        Ok(Self {
            uncertain,
            distribution,
        })
    }

    pub fn uncertain(&self) -> bool {
        self.uncertain
    }

    pub fn distribution(&self) -> &ScalarDistribution {
        &self.distribution
    }
}

/// Check a cross-correlation matrix: square of size `k`, symmetric, unit
/// diagonal, positive definite.
fn check_cross_correlation(cross: &DMatrix<f64>, k: usize) -> Result<()> {
    if cross.nrows() != k || cross.ncols() != k {
        return Err(Error::InvalidParameter {
            name: "cross_correlation",
            value: format!("{}x{}", cross.nrows(), cross.ncols()),
            reason: format!("matrix must be {}x{}", k, k),
        });
    }
    for i in 0..k {
        if (cross[(i, i)] - 1.0).abs() > MATRIX_TOLERANCE {
            return Err(Error::InvalidParameter {
                name: "cross_correlation",
                value: format!("{}", cross[(i, i)]),
                reason: "diagonal entries must be 1".into(),
            });
        }
        for j in (i + 1)..k {
            if (cross[(i, j)] - cross[(j, i)]).abs() > MATRIX_TOLERANCE {
                return Err(Error::InvalidParameter {
                    name: "cross_correlation",
                    value: format!("{} vs {}", cross[(i, j)], cross[(j, i)]),
                    reason: "matrix must be symmetric".into(),
                });
            }
        }
    }
    if cross.clone().cholesky().is_none() {
        return Err(Error::InvalidParameter {
            name: "cross_correlation",
            value: "-".into(),
            reason: "matrix must be positive definite".into(),
        });
    }
    Ok(())
}

/// Joint model of two or more Normal spatial variables on one grid, linked
/// by a cross-correlation matrix and a shared correlogram (intrinsic
/// coregionalization).
#[derive(Debug, Clone)]
pub struct JointNumericSpatialModel {
    pub(crate) components: Vec<NumericSpatialModel>,
    pub(crate) cross_correlation: DMatrix<f64>,
}

impl JointNumericSpatialModel {
    /// Define a joint numeric spatial model.
    ///
    /// # Errors
    /// - `UnsupportedCombination` when a component is non-Normal or the
    ///   component correlograms differ
    /// - `DimensionMismatch` when component grids are misaligned
    /// - `InvalidParameter` for an ill-shaped or non-PD matrix
    pub fn new(components: Vec<NumericSpatialModel>, cross_correlation: DMatrix<f64>) -> Result<Self> {
        if components.len() < 2 {
            return Err(Error::InvalidParameter {
                name: "components",
                value: format!("{}", components.len()),
                reason: "a joint model needs at least 2 components".into(),
            });
        }
        for c in &components {
            if !matches!(c.distribution, MarginalDistribution::Normal { .. }) {
                return Err(Error::UnsupportedCombination(
                    "joint spatial models are restricted to Normal components".into(),
                ));
            }
        }
        let first_corr = components[0].correlogram;
        for c in &components[1..] {
            if c.correlogram != first_corr {
                return Err(Error::UnsupportedCombination(
                    "joint spatial components must share one correlogram".into(),
                ));
            }
        }
        let template = components[0].distribution.template();
        for c in &components[1..] {
            check_aligned(template, c.distribution.template())?;
        }
        check_cross_correlation(&cross_correlation, components.len())?;

        Ok(Self {
            components,
            cross_correlation,
        })
    }

    pub fn components(&self) -> &[NumericSpatialModel] {
        &self.components
    }

    pub fn cross_correlation(&self) -> &DMatrix<f64> {
        &self.cross_correlation
    }

    /// Shared correlogram of the components, if any.
    pub fn correlogram(&self) -> Option<&CorrelogramModel> {
        self.components[0].correlogram.as_ref()
    }
}

/// Joint model of Normal scalars linked by a cross-correlation matrix.
#[derive(Debug, Clone)]
pub struct JointScalarModel {
    pub(crate) means: Vec<f64>,
    pub(crate) sds: Vec<f64>,
    pub(crate) cross_correlation: DMatrix<f64>,
}

impl JointScalarModel {
    pub fn new(means: Vec<f64>, sds: Vec<f64>, cross_correlation: DMatrix<f64>) -> Result<Self> {
        if means.len() < 2 || means.len() != sds.len() {
            return Err(Error::InvalidParameter {
                name: "means",
                value: format!("{}", means.len()),
                reason: format!("need matching means/sds of length >= 2, got {} sds", sds.len()),
            });
        }
        for &s in &sds {
            if !(s >= 0.0) || !s.is_finite() {
                return Err(Error::InvalidParameter {
                    name: "sd",
                    value: format!("{}", s),
                    reason: "standard deviation must be non-negative".into(),
                });
            }
        }
        check_cross_correlation(&cross_correlation, means.len())?;

        Ok(Self {
            means,
            sds,
            cross_correlation,
        })
    }

    pub fn means(&self) -> &[f64] {
        &self.means
    }

    pub fn sds(&self) -> &[f64] {
        &self.sds
    }

    pub fn cross_correlation(&self) -> &DMatrix<f64> {
        &self.cross_correlation
    }
}

/// Tagged-variant uncertainty model over all supported kinds.
#[derive(Debug, Clone)]
pub enum UncertaintyModel {
    NumericSpatial(NumericSpatialModel),
    CategoricalSpatial(CategoricalSpatialModel),
    Scalar(ScalarModel),
    JointNumericSpatial(JointNumericSpatialModel),
    JointScalar(JointScalarModel),
}

impl UncertaintyModel {
    /// Kind tag for diagnostics and error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            UncertaintyModel::NumericSpatial(_) => "numeric spatial",
            UncertaintyModel::CategoricalSpatial(_) => "categorical spatial",
            UncertaintyModel::Scalar(_) => "scalar",
            UncertaintyModel::JointNumericSpatial(_) => "joint numeric spatial",
            UncertaintyModel::JointScalar(_) => "joint scalar",
        }
    }
}
