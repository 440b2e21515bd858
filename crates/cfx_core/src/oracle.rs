//! Scoring oracle trait.
//!
//! The classifier under explanation is only ever seen through this trait. The
//! searches take the oracle by reference on every call; nothing holds it
//! globally.

use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;

use crate::error::{CoreError, Result};
use crate::image::Image;
use crate::prediction::Prediction;
use crate::shape::ImageShape;

/// A differentiable two-class scoring function over images.
///
/// Implementors only need [`forward`](ScoringOracle::forward). Gradients with
/// respect to the input are obtained by calling it on a tensor marked with
/// `require_grad()` and running `backward()` on a scalar built from the
/// returned logits.
pub trait ScoringOracle<B: AutodiffBackend> {
    /// Forward pass returning raw class scores.
    ///
    /// # Arguments
    ///
    /// * `images` - Input tensor of shape (batch, channels, height, width)
    ///
    /// # Returns
    ///
    /// Logits tensor of shape (batch, 2)
    fn forward(&self, images: Tensor<B, 4>) -> Result<Tensor<B, 2>>;

    /// Input shape the oracle expects, if it is fixed.
    fn input_shape(&self) -> Option<ImageShape> {
        None
    }

    /// Predict the class of a single image without keeping the graph.
    fn predict(&self, image: &Image<B>) -> Result<Prediction> {
        if let Some(expected) = self.input_shape() {
            if expected != image.shape() {
                return Err(CoreError::InvalidShape {
                    expected: expected.to_string(),
                    got: image.shape().to_string(),
                });
            }
        }
        let logits = self.forward(image.batch().detach())?;
        Prediction::from_logits(logits.detach())
    }
}

impl<B: AutodiffBackend, O: ScoringOracle<B> + ?Sized> ScoringOracle<B> for &O {
    fn forward(&self, images: Tensor<B, 4>) -> Result<Tensor<B, 2>> {
        (**self).forward(images)
    }

    fn input_shape(&self) -> Option<ImageShape> {
        (**self).input_shape()
    }

    fn predict(&self, image: &Image<B>) -> Result<Prediction> {
        (**self).predict(image)
    }
}

impl<B: AutodiffBackend, O: ScoringOracle<B> + ?Sized> ScoringOracle<B> for Box<O> {
    fn forward(&self, images: Tensor<B, 4>) -> Result<Tensor<B, 2>> {
        (**self).forward(images)
    }

    fn input_shape(&self) -> Option<ImageShape> {
        (**self).input_shape()
    }

    fn predict(&self, image: &Image<B>) -> Result<Prediction> {
        (**self).predict(image)
    }
}
