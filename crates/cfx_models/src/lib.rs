//! # cfx_models
//!
//! Image classifiers usable as scoring oracles.
//!
//! ## Models
//! - [`ImageMlp`] - Multilayer perceptron over flattened `(C, H, W)` images
//!
//! Every model implements [`cfx_core::ScoringOracle`] on autodiff backends and
//! can be saved and reloaded through [`checkpoint`].

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod checkpoint;
pub mod mlp;
mod traits;

pub use checkpoint::{
    load_image_mlp, load_record, metadata_path, save_image_mlp, save_model, CheckpointError,
    CheckpointMetadata, ModelCheckpoint,
};
pub use mlp::{ImageMlp, ImageMlpConfig};
