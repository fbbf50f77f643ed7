//! Error types for the GAT citation library

use thiserror::Error;

/// Result type alias for this crate
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the library
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed delimited data file
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Dataset download failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Failed to parse a field of the dataset
    #[error("Failed to parse data: {0}")]
    Parse(String),

    /// Dataset violates a structural invariant
    #[error("Invalid dataset: {0}")]
    InvalidDataset(String),

    /// Invalid argument
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Not enough samples for the requested computation
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    /// Array dimensions do not line up
    #[error("Shape mismatch: expected {expected}, got {actual}")]
    ShapeMismatch { expected: String, actual: String },

    /// A metric is undefined for the given inputs
    #[error("Metric error: {0}")]
    Metric(String),
}

impl Error {
    /// Shorthand for a shape mismatch between two described shapes
    pub fn shape(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Error::ShapeMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }
}
