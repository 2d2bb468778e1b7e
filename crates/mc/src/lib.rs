//! Monte Carlo propagation of spatial uncertainty.
//!
//! The pipeline has three stages:
//! 1. describe each uncertain input with an [`UncertaintyModel`],
//! 2. draw an ensemble of equally probable realizations with [`sample`],
//! 3. push each realization through a deterministic [`ForwardModel`] with
//!    [`propagate`] and reduce the output ensemble with the [`stats`]
//!    functions.
//!
//! All randomness derives from one master seed through per-realization
//! substreams, so results are reproducible bit-for-bit regardless of how
//! many worker threads run the draws.

mod maybe_rayon;

pub mod model;
pub mod propagate;
pub mod sample;
pub mod stats;

pub use model::{
    CategoricalSpatialModel, JointNumericSpatialModel, JointScalarModel, MarginalDistribution,
    NumericSpatialModel, ScalarDistribution, ScalarModel, UncertaintyModel,
};
pub use propagate::{propagate, propagate_multi, BoxError, ForwardModel, PropagateParams};
pub use sample::{sample, SampleMethod, SampleParams, SampleSet, DENSE_CELL_CAP};
pub use stats::{
    class_frequency, ensemble_mean, ensemble_quantile, ensemble_sd, exceedance_probability,
    modal_class, MissingPolicy,
};
