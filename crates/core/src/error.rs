//! Error types for SegElm

use thiserror::Error;

/// Main error type for SegElm operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid raster dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    #[error("Index out of bounds: ({row}, {col}) in raster of size ({rows}, {cols})")]
    IndexOutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    #[error("Raster size mismatch: expected ({er}, {ec}), got ({ar}, {ac})")]
    SizeMismatch { er: usize, ec: usize, ar: usize, ac: usize },

    #[error("Band count mismatch: expected {expected}, got {actual}")]
    BandMismatch { expected: usize, actual: usize },

    #[error("Segment count mismatch: registry has {expected} segments, sample table has {actual} columns")]
    SegmentCountMismatch { expected: usize, actual: usize },

    #[error("Invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Worker error: {0}")]
    Worker(String),

    #[error("Algorithm error: {0}")]
    Algorithm(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Shorthand for [`Error::InvalidParameter`]
    pub fn invalid_parameter(
        name: &'static str,
        value: impl ToString,
        reason: impl Into<String>,
    ) -> Self {
        Error::InvalidParameter {
            name,
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<ndarray::ShapeError> for Error {
    fn from(e: ndarray::ShapeError) -> Self {
        Error::Other(e.to_string())
    }
}

/// Result type alias for SegElm operations
pub type Result<T> = std::result::Result<T, Error>;
