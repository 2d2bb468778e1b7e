//! Georeferenced grid types

mod element;
mod grid;
mod transform;

pub use element::FieldElement;
pub use grid::{Field, FieldSummary};
pub use transform::GridTransform;
