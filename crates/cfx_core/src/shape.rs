//! Image shape metadata.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Shape metadata for image tensors.
///
/// Follows the convention `(C, H, W)`:
/// - `C`: Channels
/// - `H`: Height in pixels
/// - `W`: Width in pixels
///
/// # Example
///
/// ```rust
/// use cfx_core::ImageShape;
///
/// let shape = ImageShape::new(3, 224, 224);
/// assert_eq!(shape.channels(), 3);
/// assert_eq!(shape.numel(), 3 * 224 * 224);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageShape {
    channels: usize,
    height: usize,
    width: usize,
}

impl ImageShape {
    /// Create a new shape with the specified dimensions.
    #[must_use]
    pub const fn new(channels: usize, height: usize, width: usize) -> Self {
        Self {
            channels,
            height,
            width,
        }
    }

    /// Create an ImageShape from a slice of dimensions.
    ///
    /// # Errors
    ///
    /// Returns an error if the slice doesn't contain exactly 3 elements.
    ///
    /// ```rust
    /// use cfx_core::ImageShape;
    ///
    /// let shape = ImageShape::from_dims(&[1, 28, 28]).unwrap();
    /// assert_eq!(shape.height(), 28);
    /// assert!(ImageShape::from_dims(&[28, 28]).is_err());
    /// ```
    pub fn from_dims(dims: &[usize]) -> Result<Self> {
        if dims.len() != 3 {
            return Err(CoreError::DimensionError {
                expected: 3,
                got: dims.len(),
            });
        }
        Ok(Self::new(dims[0], dims[1], dims[2]))
    }

    /// Get the number of channels.
    #[must_use]
    pub const fn channels(&self) -> usize {
        self.channels
    }

    /// Get the height.
    #[must_use]
    pub const fn height(&self) -> usize {
        self.height
    }

    /// Get the width.
    #[must_use]
    pub const fn width(&self) -> usize {
        self.width
    }

    /// Check if this is an empty shape (any dimension is zero).
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.channels == 0 || self.height == 0 || self.width == 0
    }

    /// Get the total number of elements.
    #[must_use]
    pub const fn numel(&self) -> usize {
        self.channels * self.height * self.width
    }

    /// Flat row-major index of `(c, y, x)`.
    #[must_use]
    pub const fn index(&self, c: usize, y: usize, x: usize) -> usize {
        (c * self.height + y) * self.width + x
    }

    /// Convert to an array.
    #[must_use]
    pub const fn as_array(&self) -> [usize; 3] {
        [self.channels, self.height, self.width]
    }
}

impl std::fmt::Display for ImageShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {}, {})", self.channels, self.height, self.width)
    }
}

impl From<[usize; 3]> for ImageShape {
    fn from(dims: [usize; 3]) -> Self {
        Self::new(dims[0], dims[1], dims[2])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_accessors() {
        let shape = ImageShape::new(3, 4, 5);
        assert_eq!(shape.channels(), 3);
        assert_eq!(shape.height(), 4);
        assert_eq!(shape.width(), 5);
        assert_eq!(shape.numel(), 60);
        assert!(!shape.is_empty());
    }

    #[test]
    fn test_shape_index_is_row_major() {
        let shape = ImageShape::new(2, 3, 4);
        assert_eq!(shape.index(0, 0, 0), 0);
        assert_eq!(shape.index(0, 0, 3), 3);
        assert_eq!(shape.index(0, 1, 0), 4);
        assert_eq!(shape.index(1, 0, 0), 12);
        assert_eq!(shape.index(1, 2, 3), 23);
    }

    #[test]
    fn test_shape_from_dims_rejects_wrong_rank() {
        let err = ImageShape::from_dims(&[1, 2, 3, 4]).unwrap_err();
        assert!(matches!(err, CoreError::DimensionError { expected: 3, got: 4 }));
    }

    #[test]
    fn test_empty_shape() {
        assert!(ImageShape::new(1, 0, 8).is_empty());
    }

    #[test]
    fn test_shape_display() {
        assert_eq!(ImageShape::new(1, 28, 28).to_string(), "(1, 28, 28)");
    }
}
