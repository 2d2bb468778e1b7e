//! # stochmap Core
//!
//! Core types for the stochmap uncertainty-propagation workspace.
//!
//! This crate provides:
//! - `Field<T>`: Georeferenced grid type backing distribution parameters,
//!   realizations and summary maps
//! - `GridTransform`: Affine cell geometry
//! - `Ensemble<T>`: Order-preserving collection of realizations
//! - Deterministic per-realization random streams
//! - Minimal native GeoTIFF I/O

pub mod ensemble;
pub mod error;
pub mod field;
pub mod io;
pub mod rng;

pub use ensemble::Ensemble;
pub use error::{Error, Result};
pub use field::{Field, FieldElement, FieldSummary, GridTransform};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::ensemble::Ensemble;
    pub use crate::error::{Error, Result};
    pub use crate::field::{Field, FieldElement, GridTransform};
}
