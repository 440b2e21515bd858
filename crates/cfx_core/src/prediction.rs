//! Binary class predictions.

use burn::prelude::*;
use burn::tensor::activation::softmax;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::image::tensor_to_vec;

/// Number of classes in the binary domain.
pub const NUM_CLASSES: usize = 2;

/// Display names for the two classes.
pub const CLASS_NAMES: [&str; NUM_CLASSES] = ["normal", "fracture"];

/// The opposite class of a binary label.
///
/// # Errors
///
/// Returns [`CoreError::InvalidClass`] for anything other than 0 or 1.
///
/// ```rust
/// use cfx_core::flip_class;
///
/// assert_eq!(flip_class(0).unwrap(), 1);
/// assert_eq!(flip_class(1).unwrap(), 0);
/// assert!(flip_class(2).is_err());
/// ```
pub fn flip_class(class: usize) -> Result<usize> {
    match class {
        0 | 1 => Ok(1 - class),
        other => Err(CoreError::InvalidClass(other)),
    }
}

/// Oracle output for a single image.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// Index of the most probable class.
    pub predicted_class: usize,
    /// Probability of the predicted class.
    pub confidence: f32,
    /// Probability of each class; sums to 1.
    pub probabilities: [f32; NUM_CLASSES],
}

impl Prediction {
    /// Build a prediction from a probability pair.
    ///
    /// Ties resolve to the lower class index.
    ///
    /// # Errors
    ///
    /// Returns an error if a probability is not finite.
    pub fn from_probabilities(probabilities: [f32; NUM_CLASSES]) -> Result<Self> {
        if probabilities.iter().any(|p| !p.is_finite()) {
            return Err(CoreError::NonFinite(format!(
                "class probabilities {probabilities:?}"
            )));
        }
        let predicted_class = usize::from(probabilities[1] > probabilities[0]);
        Ok(Self {
            predicted_class,
            confidence: probabilities[predicted_class],
            probabilities,
        })
    }

    /// Build a prediction from a `(1, 2)` logits tensor.
    ///
    /// # Errors
    ///
    /// Returns an error if the tensor is not `(1, 2)` or contains NaN/inf.
    pub fn from_logits<B: Backend>(logits: Tensor<B, 2>) -> Result<Self> {
        let dims = logits.dims();
        if dims != [1, NUM_CLASSES] {
            return Err(CoreError::InvalidShape {
                expected: format!("[1, {NUM_CLASSES}]"),
                got: format!("{dims:?}"),
            });
        }
        let probs = tensor_to_vec(softmax(logits, 1))?;
        Self::from_probabilities([probs[0], probs[1]])
    }

    /// Probability assigned to `class`.
    #[must_use]
    pub fn probability(&self, class: usize) -> f32 {
        self.probabilities.get(class).copied().unwrap_or(0.0)
    }

    /// Whether the prediction lands on `class`.
    #[must_use]
    pub fn is_class(&self, class: usize) -> bool {
        self.predicted_class == class
    }

    /// Display name of the predicted class.
    #[must_use]
    pub fn class_name(&self) -> &'static str {
        CLASS_NAMES
            .get(self.predicted_class)
            .copied()
            .unwrap_or("unknown")
    }
}
