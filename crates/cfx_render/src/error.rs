//! Error types for decoding and rendering.

use thiserror::Error;

/// Result type alias for rendering operations.
pub type Result<T> = std::result::Result<T, RenderError>;

/// Errors that can occur while converting between image files and tensors.
#[derive(Error, Debug)]
pub enum RenderError {
    /// Input bytes are not a supported image.
    #[error("Failed to decode image: {0}")]
    Decode(String),

    /// PNG encoding failed.
    #[error("PNG encoding failed: {0}")]
    Encode(String),

    /// Only 1- and 3-channel images can be rendered.
    #[error("Unsupported channel count {0}: expected 1 or 3")]
    UnsupportedChannels(usize),

    /// Images that must share a shape do not.
    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    /// Core error.
    #[error("Core error: {0}")]
    CoreError(#[from] cfx_core::CoreError),

    /// I/O error.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}
