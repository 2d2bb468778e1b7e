//! Realization samplers
//!
//! [`sample`] turns an [`UncertaintyModel`] into a [`SampleSet`] of `n`
//! realizations. Three methods exist:
//! - **Random**: independent per-cell draws from the marginal. No spatial
//!   coherence; every realization is unstructured noise scaled by the local
//!   sd, which is the wrong tool for spatially structured inputs.
//! - **GaussianSimulation**: unconditional simulation of a standard-normal
//!   field with the covariance implied by the correlogram, then scaled and
//!   shifted by the sd/mean fields (Normal marginals only).
//! - **Stratified**: per-cell Latin-hypercube stratification of the
//!   marginal's probability mass, reducing sampling variance at equal `n`.
//!
//! Realization `i` always draws from the substream derived from
//! `(seed, i)`, so ensembles are bit-identical for any worker count.

mod gaussian;
mod random;
mod stratified;

use serde::{Deserialize, Serialize};
use std::fmt;
use stochmap_core::{Ensemble, Error, Result};

use crate::model::{
    CategoricalSpatialModel, JointNumericSpatialModel, JointScalarModel, NumericSpatialModel,
    ScalarModel, UncertaintyModel,
};

pub use gaussian::DENSE_CELL_CAP;

/// Sampling method tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SampleMethod {
    /// Independent per-cell draws
    Random,
    /// Unconditional Gaussian simulation; `max_neighbors` selects the
    /// sequential path (kriging over up to that many simulated neighbors)
    /// instead of the full-grid Cholesky path
    GaussianSimulation { max_neighbors: Option<usize> },
    /// Per-cell equal-probability strata (Latin hypercube)
    Stratified,
}

impl fmt::Display for SampleMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SampleMethod::Random => write!(f, "random"),
            SampleMethod::GaussianSimulation { .. } => write!(f, "gaussian simulation"),
            SampleMethod::Stratified => write!(f, "stratified"),
        }
    }
}

/// Parameters for one sampling run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SampleParams {
    /// Ensemble size
    pub n: usize,
    /// Sampling method
    pub method: SampleMethod,
    /// Master seed; realization `i` uses the substream `(seed, i)`
    pub seed: u64,
}

/// Kind-matched sampler output.
#[derive(Debug, Clone)]
pub enum SampleSet {
    /// Realizations of a numeric spatial variable
    Fields(Ensemble<f64>),
    /// Realizations of a categorical spatial variable
    Categories(Ensemble<u16>),
    /// Realizations of a scalar
    Scalars(Vec<f64>),
    /// One ensemble per joint spatial variable, index-aligned across
    /// variables
    FieldsJoint(Vec<Ensemble<f64>>),
    /// Joint scalar realizations, realization-major
    ScalarsJoint(Vec<Vec<f64>>),
}

impl SampleSet {
    /// Number of realizations in the set
    pub fn len(&self) -> usize {
        match self {
            SampleSet::Fields(e) => e.len(),
            SampleSet::Categories(e) => e.len(),
            SampleSet::Scalars(v) => v.len(),
            SampleSet::FieldsJoint(es) => es.first().map_or(0, |e| e.len()),
            SampleSet::ScalarsJoint(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The field ensemble, when this set holds one
    pub fn into_fields(self) -> Option<Ensemble<f64>> {
        match self {
            SampleSet::Fields(e) => Some(e),
            _ => None,
        }
    }
}

fn check_count(n: usize) -> Result<()> {
    if n < 1 {
        return Err(Error::InvalidCount {
            n,
            reason: "ensemble size must be at least 1".into(),
        });
    }
    Ok(())
}

fn unknown_method(method: SampleMethod, kind: &str) -> Error {
    Error::UnknownMethod(format!("{} sampling of a {} model", method, kind))
}

/// Draw `params.n` realizations from an uncertainty model.
///
/// Dispatches over the model kind; each kind also exposes a typed
/// `sample` method returning its natural output shape.
///
/// # Errors
/// `InvalidCount` when `n < 1`; `UnknownMethod` when the method has no
/// procedure for the model kind.
pub fn sample(model: &UncertaintyModel, params: &SampleParams) -> Result<SampleSet> {
    match model {
        UncertaintyModel::NumericSpatial(m) => m.sample(params).map(SampleSet::Fields),
        UncertaintyModel::CategoricalSpatial(m) => m.sample(params).map(SampleSet::Categories),
        UncertaintyModel::Scalar(m) => m.sample(params).map(SampleSet::Scalars),
        UncertaintyModel::JointNumericSpatial(m) => m.sample(params).map(SampleSet::FieldsJoint),
        UncertaintyModel::JointScalar(m) => m.sample(params).map(SampleSet::ScalarsJoint),
    }
}

impl NumericSpatialModel {
    /// Draw an ensemble of realizations of this variable.
    pub fn sample(&self, params: &SampleParams) -> Result<Ensemble<f64>> {
        check_count(params.n)?;

        if !self.uncertain {
            let central = self.central();
            let mut ensemble = Ensemble::with_capacity(params.n);
            for _ in 0..params.n {
                ensemble.push(central.clone())?;
            }
            return Ok(ensemble);
        }

        match params.method {
            SampleMethod::Random => random::numeric_random(self, params),
            SampleMethod::GaussianSimulation { max_neighbors } => {
                let Some(correlogram) = self.correlogram() else {
                    return Err(Error::UnknownMethod(
                        "gaussian simulation of a model without a correlogram".into(),
                    ));
                };
                gaussian::numeric_simulation(self, correlogram, max_neighbors, params)
            }
            SampleMethod::Stratified => stratified::numeric_stratified(self, params),
        }
    }
}

impl CategoricalSpatialModel {
    /// Draw an ensemble of category realizations.
    pub fn sample(&self, params: &SampleParams) -> Result<Ensemble<u16>> {
        check_count(params.n)?;

        if !self.uncertain {
            let central = self.central();
            let mut ensemble = Ensemble::with_capacity(params.n);
            for _ in 0..params.n {
                ensemble.push(central.clone())?;
            }
            return Ok(ensemble);
        }

        match params.method {
            SampleMethod::Random => random::categorical_random(self, params),
            method => Err(unknown_method(method, "categorical spatial")),
        }
    }
}

impl ScalarModel {
    /// Draw `n` scalar realizations.
    pub fn sample(&self, params: &SampleParams) -> Result<Vec<f64>> {
        check_count(params.n)?;

        if !self.uncertain {
            return Ok(vec![self.distribution.central(); params.n]);
        }

        match params.method {
            SampleMethod::Random => random::scalar_random(self, params),
            SampleMethod::Stratified => stratified::scalar_stratified(self, params),
            method => Err(unknown_method(method, "scalar")),
        }
    }
}

impl JointNumericSpatialModel {
    /// Draw one ensemble per component, index-aligned across components.
    pub fn sample(&self, params: &SampleParams) -> Result<Vec<Ensemble<f64>>> {
        check_count(params.n)?;

        if self.components.iter().all(|c| !c.uncertain) {
            let mut out = Vec::with_capacity(self.components.len());
            for c in &self.components {
                let central = c.central();
                let mut ensemble = Ensemble::with_capacity(params.n);
                for _ in 0..params.n {
                    ensemble.push(central.clone())?;
                }
                out.push(ensemble);
            }
            return Ok(out);
        }

        match params.method {
            SampleMethod::Random => random::joint_numeric_random(self, params),
            SampleMethod::GaussianSimulation { max_neighbors } => {
                let Some(correlogram) = self.correlogram().copied() else {
                    return Err(Error::UnknownMethod(
                        "gaussian simulation of a joint model without a correlogram".into(),
                    ));
                };
                gaussian::joint_simulation(self, &correlogram, max_neighbors, params)
            }
            method => Err(unknown_method(method, "joint numeric spatial")),
        }
    }
}

impl JointScalarModel {
    /// Draw `n` joint realizations, realization-major.
    pub fn sample(&self, params: &SampleParams) -> Result<Vec<Vec<f64>>> {
        check_count(params.n)?;

        match params.method {
            SampleMethod::Random => random::joint_scalar_random(self, params),
            method => Err(unknown_method(method, "joint scalar")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MarginalDistribution;
    use stochmap_core::Field;

    fn normal_model(rows: usize, cols: usize) -> NumericSpatialModel {
        NumericSpatialModel::new(
            true,
            MarginalDistribution::Normal {
                mean: Field::filled(rows, cols, 100.0),
                sd: Field::filled(rows, cols, 5.0),
            },
            None,
        )
        .unwrap()
    }

    #[test]
    fn test_invalid_count() {
        let m = normal_model(2, 2);
        let err = m
            .sample(&SampleParams {
                n: 0,
                method: SampleMethod::Random,
                seed: 1,
            })
            .unwrap_err();
        assert!(matches!(err, Error::InvalidCount { n: 0, .. }));
    }

    #[test]
    fn test_certain_model_yields_copies_of_central() {
        let m = NumericSpatialModel::new(
            false,
            MarginalDistribution::Normal {
                mean: Field::filled(2, 2, 42.0),
                sd: Field::filled(2, 2, 5.0),
            },
            None,
        )
        .unwrap();
        let e = m
            .sample(&SampleParams {
                n: 3,
                method: SampleMethod::Random,
                seed: 1,
            })
            .unwrap();
        assert_eq!(e.len(), 3);
        for member in &e {
            assert_eq!(member.get(1, 1).unwrap(), 42.0);
        }
    }

    #[test]
    fn test_simulation_without_correlogram_is_unknown_method() {
        let m = normal_model(3, 3);
        let err = m
            .sample(&SampleParams {
                n: 2,
                method: SampleMethod::GaussianSimulation { max_neighbors: None },
                seed: 1,
            })
            .unwrap_err();
        assert!(matches!(err, Error::UnknownMethod(_)));
    }

    #[test]
    fn test_stratified_categorical_is_unknown_method() {
        let p1 = Field::filled(2, 2, 0.4);
        let p2 = Field::filled(2, 2, 0.6);
        let m = CategoricalSpatialModel::new(true, vec![1, 2], vec![p1, p2]).unwrap();
        let err = m
            .sample(&SampleParams {
                n: 2,
                method: SampleMethod::Stratified,
                seed: 1,
            })
            .unwrap_err();
        assert!(matches!(err, Error::UnknownMethod(_)));
    }

    #[test]
    fn test_dispatch_matches_kind() {
        let m = UncertaintyModel::NumericSpatial(normal_model(2, 2));
        let set = sample(
            &m,
            &SampleParams {
                n: 4,
                method: SampleMethod::Random,
                seed: 9,
            },
        )
        .unwrap();
        assert_eq!(set.len(), 4);
        assert!(set.into_fields().is_some());
    }
}
