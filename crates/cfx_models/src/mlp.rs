//! ImageMlp: multilayer perceptron over flattened images.
//!
//! A small two-class scorer used as the default oracle.

use burn::nn::{Linear, LinearConfig, Relu};
use burn::prelude::*;
use cfx_core::{ImageShape, Seed, NUM_CLASSES};
use serde::{Deserialize, Serialize};

/// Configuration for [`ImageMlp`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageMlpConfig {
    /// Number of input channels.
    pub channels: usize,
    /// Input height in pixels.
    pub height: usize,
    /// Input width in pixels.
    pub width: usize,
    /// Hidden layer sizes.
    pub hidden_sizes: Vec<usize>,
}

impl Default for ImageMlpConfig {
    fn default() -> Self {
        Self {
            channels: 3,
            height: 224,
            width: 224,
            hidden_sizes: vec![32],
        }
    }
}

impl ImageMlpConfig {
    /// Create a new config for square `size`×`size` images.
    pub fn new(channels: usize, size: usize) -> Self {
        Self {
            channels,
            height: size,
            width: size,
            ..Default::default()
        }
    }

    /// Set hidden layer sizes.
    #[must_use]
    pub fn with_hidden_sizes(mut self, sizes: Vec<usize>) -> Self {
        self.hidden_sizes = sizes;
        self
    }

    /// Input shape the model accepts.
    pub fn input_shape(&self) -> ImageShape {
        ImageShape::new(self.channels, self.height, self.width)
    }

    /// Initialize the model.
    pub fn init<B: Backend>(&self, device: &B::Device) -> ImageMlp<B> {
        ImageMlp::new(self.clone(), device)
    }

    /// Seed the backend generator, then initialize.
    pub fn init_seeded<B: Backend>(&self, seed: Seed, device: &B::Device) -> ImageMlp<B> {
        B::seed(seed.derive("image_mlp").value());
        self.init(device)
    }
}

/// Linear layer followed by ReLU.
#[derive(Module, Debug)]
struct MlpBlock<B: Backend> {
    linear: Linear<B>,
}

impl<B: Backend> MlpBlock<B> {
    fn new(in_features: usize, out_features: usize, device: &B::Device) -> Self {
        Self {
            linear: LinearConfig::new(in_features, out_features).init(device),
        }
    }

    fn forward(&self, x: Tensor<B, 2>) -> Tensor<B, 2> {
        Relu::new().forward(self.linear.forward(x))
    }
}

/// Two-class MLP over `(C, H, W)` images.
///
/// # Architecture
///
/// ```text
/// Input (B, C, H, W)
///       |
///       +---> [Flatten] -> (B, C*H*W)
///       |
///       +---> [Linear + ReLU] x N
///       |
///       +---> [Linear] -> Output (B, 2)
/// ```
///
/// # Example
///
/// ```rust,ignore
/// use cfx_models::ImageMlpConfig;
///
/// let config = ImageMlpConfig::new(1, 28).with_hidden_sizes(vec![64, 32]);
/// let model = config.init::<Autodiff<NdArray>>(&device);
///
/// let x = Tensor::random([4, 1, 28, 28], Distribution::Uniform(0.0, 1.0), &device);
/// let logits = model.forward(x);
/// // logits shape: [4, 2]
/// ```
#[derive(Module, Debug)]
pub struct ImageMlp<B: Backend> {
    /// Hidden layers.
    blocks: Vec<MlpBlock<B>>,
    /// Output layer.
    head: Linear<B>,
    #[module(skip)]
    channels: usize,
    #[module(skip)]
    height: usize,
    #[module(skip)]
    width: usize,
}

impl<B: Backend> ImageMlp<B> {
    /// Create a new model.
    pub fn new(config: ImageMlpConfig, device: &B::Device) -> Self {
        let mut blocks = Vec::new();
        let mut prev_size = config.input_shape().numel();
        for &hidden_size in &config.hidden_sizes {
            blocks.push(MlpBlock::new(prev_size, hidden_size, device));
            prev_size = hidden_size;
        }
        let head = LinearConfig::new(prev_size, NUM_CLASSES).init(device);

        Self {
            blocks,
            head,
            channels: config.channels,
            height: config.height,
            width: config.width,
        }
    }

    /// Input shape the model accepts.
    pub fn shape(&self) -> ImageShape {
        ImageShape::new(self.channels, self.height, self.width)
    }

    /// Forward pass returning logits.
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        let [batch_size, channels, height, width] = x.dims();

        let mut out = x.reshape([batch_size, channels * height * width]);
        for block in &self.blocks {
            out = block.forward(out);
        }
        self.head.forward(out)
    }
}
