//! Error types for cfx_core.

use thiserror::Error;

/// Result type alias using [`CoreError`].
pub type Result<T> = std::result::Result<T, CoreError>;

/// Core errors that can occur when handling images, predictions and oracles.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Invalid image shape provided.
    #[error("Invalid shape: expected {expected}, got {got}")]
    InvalidShape {
        /// Expected shape description.
        expected: String,
        /// Actual shape description.
        got: String,
    },

    /// Shape mismatch between two images or between data and shape.
    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    /// Dimension error.
    #[error("Dimension error: expected {expected} dimensions, got {got}")]
    DimensionError {
        /// Expected number of dimensions.
        expected: usize,
        /// Actual number of dimensions.
        got: usize,
    },

    /// A pixel value outside `[0, 1]` or not finite.
    #[error("Pixel value {value} at index {index} is outside [0, 1]")]
    OutOfRange {
        /// Flat index of the offending element.
        index: usize,
        /// The offending value.
        value: f32,
    },

    /// Class index outside the binary domain.
    #[error("Invalid class {0}: expected 0 or 1")]
    InvalidClass(usize),

    /// The scoring oracle failed to produce scores.
    #[error("Oracle error: {0}")]
    Oracle(String),

    /// A NaN or infinite value appeared where a finite one is required.
    #[error("Non-finite value: {0}")]
    NonFinite(String),

    /// Tensor data could not be read back from the backend.
    #[error("Data error: {0}")]
    Data(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}
