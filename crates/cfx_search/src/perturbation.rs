//! Sign-gradient perturbation search inside an L∞ ball.
//!
//! Starting from a zero perturbation, each iteration moves every pixel one
//! `step_size` against the sign of the target-class loss gradient, then
//! projects back onto the `epsilon` ball and the valid pixel range.

use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;
use cfx_core::{tensor_to_vec, CoreError, Image, ImageData, Prediction, ScoringOracle, NUM_CLASSES};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SearchError};
use crate::gradient::{finite_loss, target_nll, Probe};
use crate::result::{Method, MethodDetails, MethodOutcome, SearchResult};

/// Configuration for [`PerturbationSearch`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PerturbationConfig {
    /// Maximum absolute change per pixel.
    pub epsilon: f64,
    /// Change applied per iteration.
    pub step_size: f64,
    /// Iteration ceiling.
    pub max_iterations: usize,
    /// Stop once the target class is predicted above this confidence.
    pub early_stop_confidence: f32,
}

impl Default for PerturbationConfig {
    fn default() -> Self {
        Self {
            epsilon: 0.1,
            step_size: 0.01,
            max_iterations: 100,
            early_stop_confidence: 0.8,
        }
    }
}

impl PerturbationConfig {
    /// Set the L∞ radius.
    #[must_use]
    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self
    }

    /// Set the per-iteration step.
    #[must_use]
    pub fn with_step_size(mut self, step_size: f64) -> Self {
        self.step_size = step_size;
        self
    }

    /// Set the iteration ceiling.
    #[must_use]
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Set the early-stop confidence.
    #[must_use]
    pub fn with_early_stop_confidence(mut self, confidence: f32) -> Self {
        self.early_stop_confidence = confidence;
        self
    }

    /// Check the search preconditions.
    pub fn validate(&self) -> Result<()> {
        if !self.epsilon.is_finite() || self.epsilon <= 0.0 {
            return Err(SearchError::InvalidConfig(format!(
                "epsilon must be positive, got {}",
                self.epsilon
            )));
        }
        if !self.step_size.is_finite() || self.step_size <= 0.0 {
            return Err(SearchError::InvalidConfig(format!(
                "step_size must be positive, got {}",
                self.step_size
            )));
        }
        if self.max_iterations == 0 {
            return Err(SearchError::InvalidConfig(
                "max_iterations must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Gradient-sign perturbation search.
#[derive(Debug, Clone, Default)]
pub struct PerturbationSearch {
    config: PerturbationConfig,
}

impl PerturbationSearch {
    /// Create a search with the given configuration.
    pub fn new(config: PerturbationConfig) -> Self {
        Self { config }
    }

    /// Get the configuration.
    pub fn config(&self) -> &PerturbationConfig {
        &self.config
    }

    /// Predict the original image, then search.
    pub fn search<B, O>(&self, oracle: &O, image: &Image<B>, target_class: usize) -> Result<MethodOutcome>
    where
        B: AutodiffBackend,
        O: ScoringOracle<B> + ?Sized,
    {
        self.config.validate()?;
        let original_prediction = oracle.predict(image)?;
        self.search_from(oracle, image, original_prediction, target_class)
    }

    /// Search with an already computed prediction for the original image.
    pub fn search_from<B, O>(
        &self,
        oracle: &O,
        image: &Image<B>,
        original_prediction: Prediction,
        target_class: usize,
    ) -> Result<MethodOutcome>
    where
        B: AutodiffBackend,
        O: ScoringOracle<B> + ?Sized,
    {
        self.config.validate()?;
        if target_class >= NUM_CLASSES {
            return Err(CoreError::InvalidClass(target_class).into());
        }
        if original_prediction.is_class(target_class) {
            return Ok(MethodOutcome::AlreadyTarget {
                original_prediction,
                message: format!("Already predicting target class {target_class}"),
            });
        }

        let config = &self.config;
        let original = image.inner().clone().detach();
        let mut perturbation = original.zeros_like();
        let mut best: Option<(Tensor<B, 3>, f32)> = None;
        let mut iterations_used = 0;

        for iteration in 0..config.max_iterations {
            iterations_used = iteration + 1;

            let probe = Probe::run(oracle, original.clone() + perturbation.clone(), iteration)?;
            let prediction = probe.prediction();

            if prediction.is_class(target_class) {
                let confidence = prediction.probability(target_class);
                if best.as_ref().map_or(true, |(_, incumbent)| confidence > *incumbent) {
                    best = Some((perturbation.clone(), confidence));
                }
                if confidence > config.early_stop_confidence {
                    tracing::debug!(
                        "Perturbation search reached confidence {:.4} at iteration {}",
                        confidence,
                        iteration
                    );
                    break;
                }
            }

            let loss = target_nll(probe.logits(), target_class);
            finite_loss(&loss, iteration)?;
            let gradient = probe.backward(loss)?;

            let stepped = (perturbation - gradient.sign() * config.step_size)
                .clamp(-config.epsilon, config.epsilon);
            // Re-derive from the clamped candidate so the stored delta is exact.
            perturbation = (original.clone() + stepped).clamp(0.0, 1.0) - original.clone();
        }

        let perturbation = best.map_or(perturbation, |(delta, _)| delta);
        let counterfactual = Image::clamped(original + perturbation.clone());
        let counterfactual_prediction = oracle.predict(&counterfactual)?;
        let success = counterfactual_prediction.is_class(target_class);

        let perturbation_map = ImageData::new(image.shape(), tensor_to_vec(perturbation)?)?;
        let perturbation_magnitude = perturbation_map.l2_norm();
        let confidence_improvement = if success {
            counterfactual_prediction.confidence - original_prediction.confidence
        } else {
            0.0
        };

        tracing::info!(
            "Perturbation search: success={} confidence={:.4} magnitude={:.4} iterations={}",
            success,
            counterfactual_prediction.confidence,
            perturbation_magnitude,
            iterations_used
        );

        Ok(MethodOutcome::Searched(SearchResult {
            method: Method::Adversarial,
            success,
            original_prediction,
            counterfactual_prediction: Some(counterfactual_prediction),
            counterfactual_image: Some(counterfactual.to_data()?),
            auxiliary_map: Some(perturbation_map),
            perturbation_magnitude,
            iterations_used,
            details: MethodDetails::Perturbation {
                confidence_improvement,
            },
            message: (!success).then(|| {
                format!(
                    "No perturbation within epsilon {} reached target class {}",
                    config.epsilon, target_class
                )
            }),
        }))
    }
}
