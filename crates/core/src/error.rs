//! Error types for stochmap

use thiserror::Error;

/// Main error type for stochmap operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid field dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    #[error("Index out of bounds: ({row}, {col}) in field of size ({rows}, {cols})")]
    IndexOutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    #[error("Field dimension mismatch: expected {expected:?}, got {actual:?}")]
    DimensionMismatch {
        expected: (usize, usize),
        actual: (usize, usize),
    },

    #[error("Invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("Unsupported combination: {0}")]
    UnsupportedCombination(String),

    #[error("Invalid realization count {n}: {reason}")]
    InvalidCount { n: usize, reason: String },

    #[error("No sampling procedure for {0}")]
    UnknownMethod(String),

    #[error("Forward model failed at realization {realization}: {message}")]
    Transform { realization: usize, message: String },

    #[error("Unsupported data type: {0}")]
    UnsupportedDataType(String),

    #[error("{0}")]
    Other(String),
}

/// Result type alias for stochmap operations
pub type Result<T> = std::result::Result<T, Error>;
