//! Image tensor types.
//!
//! [`Image`] wraps a device tensor of shape `(C, H, W)` and is what the searches
//! feed to the oracle. [`ImageData`] is the host-side copy carried by results
//! and renderers.

use burn::prelude::*;
use burn::tensor::TensorData;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::shape::ImageShape;

/// Read a tensor back to the host as a flat `f32` vector.
pub fn tensor_to_vec<B: Backend, const D: usize>(tensor: Tensor<B, D>) -> Result<Vec<f32>> {
    tensor
        .into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .map_err(|e| CoreError::Data(format!("{e:?}")))
}

/// Read a single-element tensor back to the host.
pub fn tensor_to_scalar<B: Backend, const D: usize>(tensor: Tensor<B, D>) -> f32 {
    tensor.into_scalar().elem::<f32>()
}

/// Host-side image buffer in row-major `(C, H, W)` order.
///
/// Unlike [`Image`], the values are not restricted to `[0, 1]` so the same type
/// also carries signed perturbation maps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageData {
    shape: ImageShape,
    values: Vec<f32>,
}

impl ImageData {
    /// Create a buffer from raw values.
    ///
    /// # Errors
    ///
    /// Returns an error if `values.len()` does not match the shape.
    pub fn new(shape: ImageShape, values: Vec<f32>) -> Result<Self> {
        if values.len() != shape.numel() {
            return Err(CoreError::ShapeMismatch(format!(
                "{} values for shape {} ({} elements)",
                values.len(),
                shape,
                shape.numel()
            )));
        }
        Ok(Self { shape, values })
    }

    /// Create a buffer filled with a constant.
    #[must_use]
    pub fn filled(shape: ImageShape, value: f32) -> Self {
        Self {
            shape,
            values: vec![value; shape.numel()],
        }
    }

    /// Get the shape.
    #[must_use]
    pub const fn shape(&self) -> ImageShape {
        self.shape
    }

    /// Get the flat values.
    #[must_use]
    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// Consume self and return the flat values.
    #[must_use]
    pub fn into_values(self) -> Vec<f32> {
        self.values
    }

    /// Value at `(c, y, x)`.
    #[must_use]
    pub fn get(&self, c: usize, y: usize, x: usize) -> f32 {
        self.values[self.shape.index(c, y, x)]
    }

    /// Mean over every element.
    #[must_use]
    pub fn mean(&self) -> f32 {
        if self.values.is_empty() {
            return 0.0;
        }
        let sum: f64 = self.values.iter().map(|&v| f64::from(v)).sum();
        (sum / self.values.len() as f64) as f32
    }

    /// Euclidean norm of the flattened buffer.
    #[must_use]
    pub fn l2_norm(&self) -> f32 {
        let sq: f64 = self.values.iter().map(|&v| f64::from(v) * f64::from(v)).sum();
        sq.sqrt() as f32
    }

    /// Smallest and largest value.
    #[must_use]
    pub fn min_max(&self) -> (f32, f32) {
        self.values
            .iter()
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            })
    }

    /// Elementwise `self - other`.
    pub fn difference(&self, other: &Self) -> Result<Self> {
        self.zip_with(other, |a, b| a - b)
    }

    /// Elementwise `|self - other|`.
    pub fn abs_difference(&self, other: &Self) -> Result<Self> {
        self.zip_with(other, |a, b| (a - b).abs())
    }

    fn zip_with(&self, other: &Self, f: impl Fn(f32, f32) -> f32) -> Result<Self> {
        if self.shape != other.shape {
            return Err(CoreError::ShapeMismatch(format!(
                "{} vs {}",
                self.shape, other.shape
            )));
        }
        let values = self
            .values
            .iter()
            .zip(&other.values)
            .map(|(&a, &b)| f(a, b))
            .collect();
        Ok(Self {
            shape: self.shape,
            values,
        })
    }

    /// Overwrite the rectangle `[x_start, x_end) x [y_start, y_end)` in every channel.
    ///
    /// The rectangle is clipped to the image bounds.
    /// An empty or inverted rectangle changes nothing.
    pub fn fill_rect(&mut self, x_start: usize, y_start: usize, x_end: usize, y_end: usize, value: f32) {
        let x_end = x_end.min(self.shape.width());
        let y_end = y_end.min(self.shape.height());
        if x_start >= x_end {
            return;
        }
        for c in 0..self.shape.channels() {
            for y in y_start..y_end {
                let row = self.shape.index(c, y, 0);
                self.values[row + x_start..row + x_end].fill(value);
            }
        }
    }

    /// Check that every value is finite and inside `[0, 1]`.
    pub fn validate_unit_range(&self) -> Result<()> {
        match self
            .values
            .iter()
            .position(|v| !v.is_finite() || !(0.0..=1.0).contains(v))
        {
            Some(index) => Err(CoreError::OutOfRange {
                index,
                value: self.values[index],
            }),
            None => Ok(()),
        }
    }
}

/// An image tensor of shape `(C, H, W)` with every value in `[0, 1]`.
///
/// # Example
///
/// ```rust,ignore
/// use cfx_core::{Image, ImageData, ImageShape};
///
/// let data = ImageData::filled(ImageShape::new(1, 28, 28), 0.5);
/// let image = Image::<NdArray>::from_data(&data, &device)?;
/// ```
#[derive(Debug, Clone)]
pub struct Image<B: Backend> {
    inner: Tensor<B, 3>,
    shape: ImageShape,
}

impl<B: Backend> Image<B> {
    /// Create an image from a Burn tensor.
    ///
    /// # Errors
    ///
    /// Returns an error if any value is outside `[0, 1]` or not finite.
    pub fn new(tensor: Tensor<B, 3>) -> Result<Self> {
        let shape = ImageShape::from(tensor.dims());
        let data = ImageData::new(shape, tensor_to_vec(tensor.clone())?)?;
        data.validate_unit_range()?;
        Ok(Self {
            inner: tensor,
            shape,
        })
    }

    /// Create an image by clamping an arbitrary tensor into `[0, 1]`.
    pub fn clamped(tensor: Tensor<B, 3>) -> Self {
        let shape = ImageShape::from(tensor.dims());
        Self {
            inner: tensor.clamp(0.0, 1.0),
            shape,
        }
    }

    /// Upload host data.
    ///
    /// # Errors
    ///
    /// Returns an error if any value is outside `[0, 1]` or not finite.
    pub fn from_data(data: &ImageData, device: &B::Device) -> Result<Self> {
        data.validate_unit_range()?;
        let shape = data.shape();
        let tensor = Tensor::from_data(
            TensorData::new(data.values().to_vec(), shape.as_array()),
            device,
        );
        Ok(Self {
            inner: tensor,
            shape,
        })
    }

    /// Download to host memory.
    pub fn to_data(&self) -> Result<ImageData> {
        ImageData::new(self.shape, tensor_to_vec(self.inner.clone())?)
    }

    /// Get the shape metadata.
    #[must_use]
    pub const fn shape(&self) -> ImageShape {
        self.shape
    }

    /// Get a reference to the underlying Burn tensor.
    #[must_use]
    pub const fn inner(&self) -> &Tensor<B, 3> {
        &self.inner
    }

    /// Consume self and return the underlying Burn tensor.
    #[must_use]
    pub fn into_inner(self) -> Tensor<B, 3> {
        self.inner
    }

    /// The image as a single-element batch `(1, C, H, W)`.
    #[must_use]
    pub fn batch(&self) -> Tensor<B, 4> {
        self.inner.clone().unsqueeze::<4>()
    }

    /// Get the device the tensor is on.
    pub fn device(&self) -> B::Device {
        self.inner.device()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::NdArray;

    type TestBackend = NdArray;

    #[test]
    fn test_image_data_length_checked() {
        let err = ImageData::new(ImageShape::new(1, 2, 2), vec![0.0; 3]).unwrap_err();
        assert!(matches!(err, CoreError::ShapeMismatch(_)));
    }

    #[test]
    fn test_fill_rect_covers_all_channels() {
        let mut data = ImageData::filled(ImageShape::new(2, 4, 4), 0.0);
        data.fill_rect(1, 2, 3, 4, 1.0);

        for c in 0..2 {
            for y in 0..4 {
                for x in 0..4 {
                    let inside = (1..3).contains(&x) && (2..4).contains(&y);
                    assert_eq!(data.get(c, y, x), if inside { 1.0 } else { 0.0 });
                }
            }
        }
    }

    #[test]
    fn test_fill_rect_clips_to_bounds() {
        let mut data = ImageData::filled(ImageShape::new(1, 3, 3), 0.0);
        data.fill_rect(2, 2, 10, 10, 1.0);
        assert_eq!(data.values().iter().filter(|&&v| v == 1.0).count(), 1);
    }

    #[test]
    fn test_fill_rect_ignores_inverted_rect() {
        let mut data = ImageData::filled(ImageShape::new(2, 4, 4), 0.0);
        data.fill_rect(3, 0, 1, 4, 1.0);
        data.fill_rect(5, 0, 8, 4, 1.0);
        data.fill_rect(0, 3, 4, 1, 1.0);
        assert!(data.values().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_norm_and_mean() {
        let data = ImageData::new(ImageShape::new(1, 1, 2), vec![3.0, 4.0]).unwrap();
        assert!((data.l2_norm() - 5.0).abs() < 1e-6);
        assert!((data.mean() - 3.5).abs() < 1e-6);
        assert_eq!(data.min_max(), (3.0, 4.0));
    }

    #[test]
    fn test_abs_difference_zero_for_identical() {
        let data = ImageData::filled(ImageShape::new(3, 4, 4), 0.3);
        let diff = data.abs_difference(&data).unwrap();
        assert_eq!(diff.l2_norm(), 0.0);
    }

    #[test]
    fn test_validate_unit_range() {
        let ok = ImageData::new(ImageShape::new(1, 1, 3), vec![0.0, 0.5, 1.0]).unwrap();
        assert!(ok.validate_unit_range().is_ok());

        let bad = ImageData::new(ImageShape::new(1, 1, 3), vec![0.0, 1.5, 1.0]).unwrap();
        assert!(matches!(
            bad.validate_unit_range(),
            Err(CoreError::OutOfRange { index: 1, .. })
        ));

        let nan = ImageData::new(ImageShape::new(1, 1, 1), vec![f32::NAN]).unwrap();
        assert!(nan.validate_unit_range().is_err());
    }

    #[test]
    fn test_image_round_trip_and_stats() {
        let device = Default::default();
        let data = ImageData::new(ImageShape::new(1, 2, 2), vec![0.0, 0.25, 0.75, 1.0]).unwrap();
        let image = Image::<TestBackend>::from_data(&data, &device).unwrap();

        assert_eq!(image.shape(), ImageShape::new(1, 2, 2));
        assert_eq!(image.batch().dims(), [1, 1, 2, 2]);
        assert_eq!(image.to_data().unwrap(), data);
    }

    #[test]
    fn test_image_rejects_out_of_range_tensor() {
        let device = Default::default();
        let tensor = Tensor::<TestBackend, 3>::ones([1, 2, 2], &device) * 2.0;
        assert!(Image::new(tensor).is_err());
    }

    #[test]
    fn test_clamped_image() {
        let device = Default::default();
        let tensor = Tensor::<TestBackend, 3>::ones([1, 2, 2], &device) * 2.0;
        let image = Image::clamped(tensor);
        let (lo, hi) = image.to_data().unwrap().min_max();
        assert_eq!((lo, hi), (1.0, 1.0));
    }
}
