//! Analytic oracles shared by the unit tests.

use std::ops::Range;

use burn::prelude::*;
use burn_autodiff::Autodiff;
use burn_ndarray::NdArray;
use cfx_core::{CoreError, Image, ImageData, ImageShape, ScoringOracle};

pub(crate) type TestBackend = Autodiff<NdArray>;

fn two_class(score: Tensor<TestBackend, 2>) -> Tensor<TestBackend, 2> {
    Tensor::cat(vec![score.clone().neg(), score], 1)
}

/// Class 1 when mean brightness exceeds `threshold`.
pub(crate) struct Brightness {
    pub gain: f32,
    pub threshold: f32,
}

impl Default for Brightness {
    fn default() -> Self {
        Self {
            gain: 10.0,
            threshold: 0.5,
        }
    }
}

impl ScoringOracle<TestBackend> for Brightness {
    fn forward(&self, images: Tensor<TestBackend, 4>) -> cfx_core::Result<Tensor<TestBackend, 2>> {
        let [batch, channels, height, width] = images.dims();
        let mean = images
            .reshape([batch, channels * height * width])
            .mean_dim(1);
        Ok(two_class((mean - self.threshold) * self.gain))
    }
}

/// Class 1 when the mean of one patch drops below `threshold`.
pub(crate) struct DarkPatch {
    pub rows: Range<usize>,
    pub cols: Range<usize>,
    pub gain: f32,
    pub threshold: f32,
}

impl ScoringOracle<TestBackend> for DarkPatch {
    fn forward(&self, images: Tensor<TestBackend, 4>) -> cfx_core::Result<Tensor<TestBackend, 2>> {
        let [batch, channels, ..] = images.dims();
        let patch = images.slice([
            0..batch,
            0..channels,
            self.rows.clone(),
            self.cols.clone(),
        ]);
        let numel = channels * self.rows.len() * self.cols.len();
        let mean = patch.reshape([batch, numel]).mean_dim(1);
        Ok(two_class((mean.neg() + self.threshold) * self.gain))
    }
}

/// Class 1 while the mean brightness is within `width` of `center`,
/// most confident at `center` itself.
pub(crate) struct Peak {
    pub center: f32,
    pub width: f32,
    pub gain: f32,
}

impl ScoringOracle<TestBackend> for Peak {
    fn forward(&self, images: Tensor<TestBackend, 4>) -> cfx_core::Result<Tensor<TestBackend, 2>> {
        let [batch, channels, height, width] = images.dims();
        let mean = images
            .reshape([batch, channels * height * width])
            .mean_dim(1);
        let distance = (mean - self.center).abs();
        Ok(two_class((distance.neg() + self.width) * self.gain))
    }
}

/// Always 50/50.
pub(crate) struct CoinFlip;

impl ScoringOracle<TestBackend> for CoinFlip {
    fn forward(&self, images: Tensor<TestBackend, 4>) -> cfx_core::Result<Tensor<TestBackend, 2>> {
        let [batch, channels, height, width] = images.dims();
        let zero = images
            .reshape([batch, channels * height * width])
            .sum_dim(1)
            * 0.0;
        Ok(two_class(zero))
    }
}

/// Fails on every call.
pub(crate) struct Broken;

impl ScoringOracle<TestBackend> for Broken {
    fn forward(&self, _images: Tensor<TestBackend, 4>) -> cfx_core::Result<Tensor<TestBackend, 2>> {
        Err(CoreError::Oracle("model not loaded".to_string()))
    }
}

/// Emits NaN scores.
pub(crate) struct NanScores;

impl ScoringOracle<TestBackend> for NanScores {
    fn forward(&self, images: Tensor<TestBackend, 4>) -> cfx_core::Result<Tensor<TestBackend, 2>> {
        let [batch, ..] = images.dims();
        Ok(Tensor::full([batch, 2], f32::NAN, &images.device()))
    }
}

pub(crate) fn uniform(shape: ImageShape, value: f32) -> Image<TestBackend> {
    Image::from_data(&ImageData::filled(shape, value), &Default::default())
        .expect("uniform image is in range")
}

pub(crate) fn from_fn(shape: ImageShape, f: impl Fn(usize, usize, usize) -> f32) -> Image<TestBackend> {
    let mut values = Vec::with_capacity(shape.numel());
    for c in 0..shape.channels() {
        for y in 0..shape.height() {
            for x in 0..shape.width() {
                values.push(f(c, y, x));
            }
        }
    }
    let data = ImageData::new(shape, values).expect("length matches shape");
    Image::from_data(&data, &Default::default()).expect("values are in range")
}

pub(crate) fn assert_unit_range(data: &ImageData) {
    let (lo, hi) = data.min_max();
    assert!(lo >= 0.0 && hi <= 1.0, "values escaped [0, 1]: {lo}..{hi}");
}
