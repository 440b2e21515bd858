//! Scoring oracle implementations for the models in this crate.

use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;
use cfx_core::{CoreError, ImageShape, ScoringOracle};

use crate::mlp::ImageMlp;

impl<B: AutodiffBackend> ScoringOracle<B> for ImageMlp<B> {
    fn forward(&self, images: Tensor<B, 4>) -> cfx_core::Result<Tensor<B, 2>> {
        let [_, channels, height, width] = images.dims();
        let got = ImageShape::new(channels, height, width);
        if got != self.shape() {
            return Err(CoreError::InvalidShape {
                expected: self.shape().to_string(),
                got: got.to_string(),
            });
        }
        Ok(ImageMlp::forward(self, images))
    }

    fn input_shape(&self) -> Option<ImageShape> {
        Some(self.shape())
    }
}
