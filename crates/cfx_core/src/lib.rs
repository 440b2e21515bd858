//! # cfx_core
//!
//! Core types and traits for cfx counterfactual explanations.
//!
//! This crate provides:
//! - [`ImageShape`] for `(C, H, W)` image metadata
//! - [`Image`] wrapper for Burn tensors constrained to `[0, 1]`
//! - [`ImageData`] host buffers for results and rendering
//! - [`Prediction`] for binary class probabilities
//! - [`ScoringOracle`], the only view the searches have of a classifier
//! - Error types and a [`Seed`] for reproducible initialisation
//!
//! ## Example
//!
//! ```rust,ignore
//! use cfx_core::{Image, ImageData, ImageShape, ScoringOracle};
//!
//! let data = ImageData::filled(ImageShape::new(3, 224, 224), 0.5);
//! let image = Image::from_data(&data, &device)?;
//! let prediction = oracle.predict(&image)?;
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod image;
mod oracle;
mod prediction;
mod seed;
mod shape;

pub use error::{CoreError, Result};
pub use image::{tensor_to_scalar, tensor_to_vec, Image, ImageData};
pub use oracle::ScoringOracle;
pub use prediction::{flip_class, Prediction, CLASS_NAMES, NUM_CLASSES};
pub use seed::Seed;
pub use shape::ImageShape;

/// Backend type aliases for convenience
pub mod backend {
    #[cfg(feature = "backend-ndarray")]
    pub use burn_ndarray::NdArray;
}
