//! # cfx_render
//!
//! Image I/O and visualisation for counterfactual results.
//!
//! This crate provides:
//! - Decoding and resizing image files into `(C, H, W)` buffers
//! - PNG encoding of counterfactual images
//! - Heat maps of perturbation and difference maps
//! - A [`Renderer`] trait with a PNG implementation producing a comparison grid

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod codec;
pub mod colormap;
mod error;
mod renderer;

pub use codec::{decode_image, encode_png, image_to_png, load_image};
pub use colormap::heatmap;
pub use error::{RenderError, Result};
pub use renderer::{MethodImages, PngRenderer, Renderer, Visualizations};
