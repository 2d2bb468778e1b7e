//! # stochmap Geostatistics
//!
//! Correlogram models and spatial-structure diagnostics:
//! - [`CorrelogramModel`]: parametric spatial-autocorrelation descriptors
//!   (exponential, spherical, linear, Gaussian families)
//! - Empirical variogram of gridded fields and correlogram fitting
//! - Global Moran's I

pub mod autocorr;
pub mod correlogram;
pub mod variogram;

pub use autocorr::{global_morans_i, MoransI};
pub use correlogram::{CorrelogramFamily, CorrelogramModel};
pub use variogram::{empirical_variogram, fit_correlogram, EmpiricalVariogram, VariogramParams};
