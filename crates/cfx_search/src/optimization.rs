//! Regularized gradient optimization search.
//!
//! Minimizes `-ln(p_target + 1e-8) + λ·‖x − x₀‖₂` over the image with Adam,
//! keeping the candidate with the lowest total loss. Early stopping looks at
//! confidence instead, so the returned candidate need not be the last one.

use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;
use cfx_core::{CoreError, Image, Prediction, ScoringOracle, NUM_CLASSES};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SearchError};
use crate::gradient::{finite_loss, target_probability, Probe};
use crate::optimizer::{Adam, AdamConfig};
use crate::result::{Method, MethodDetails, MethodOutcome, SearchResult};

const LOG_EPSILON: f64 = 1e-8;
const NORM_EPSILON: f64 = 1e-12;

/// Configuration for [`OptimizationSearch`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizationConfig {
    /// Weight λ of the proximity term.
    pub regularization_weight: f64,
    /// Adam learning rate.
    pub learning_rate: f64,
    /// Iteration ceiling.
    pub max_iterations: usize,
    /// Stop once the target class is predicted above this confidence.
    pub early_stop_confidence: f32,
    /// Adam first moment decay.
    pub beta1: f64,
    /// Adam second moment decay.
    pub beta2: f64,
    /// Adam denominator epsilon.
    pub epsilon: f64,
}

impl Default for OptimizationConfig {
    fn default() -> Self {
        let adam = AdamConfig::default();
        Self {
            regularization_weight: 0.1,
            learning_rate: adam.lr,
            max_iterations: 200,
            early_stop_confidence: 0.7,
            beta1: adam.beta1,
            beta2: adam.beta2,
            epsilon: adam.epsilon,
        }
    }
}

impl OptimizationConfig {
    /// Set λ.
    #[must_use]
    pub fn with_regularization_weight(mut self, weight: f64) -> Self {
        self.regularization_weight = weight;
        self
    }

    /// Set the learning rate.
    #[must_use]
    pub fn with_learning_rate(mut self, lr: f64) -> Self {
        self.learning_rate = lr;
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

    /// Optimizer settings derived from this configuration.
    pub fn adam(&self) -> AdamConfig {
        AdamConfig::new(self.learning_rate)
            .with_beta1(self.beta1)
            .with_beta2(self.beta2)
            .with_epsilon(self.epsilon)
    }

    /// Check the search preconditions.
    pub fn validate(&self) -> Result<()> {
        if !self.regularization_weight.is_finite() || self.regularization_weight < 0.0 {
            return Err(SearchError::InvalidConfig(format!(
                "regularization_weight must be non-negative, got {}",
                self.regularization_weight
            )));
        }
        if !self.learning_rate.is_finite() || self.learning_rate <= 0.0 {
            return Err(SearchError::InvalidConfig(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            )));
        }
        if self.max_iterations == 0 {
            return Err(SearchError::InvalidConfig(
                "max_iterations must be at least 1".to_string(),
            ));
        }
        for (name, beta) in [("beta1", self.beta1), ("beta2", self.beta2)] {
            if !(0.0..1.0).contains(&beta) {
                return Err(SearchError::InvalidConfig(format!(
                    "{name} must be in [0, 1), got {beta}"
                )));
            }
        }
        if !self.epsilon.is_finite() || self.epsilon <= 0.0 {
            return Err(SearchError::InvalidConfig(format!(
                "epsilon must be positive, got {}",
                self.epsilon
            )));
        }
        Ok(())
    }
}

/// Adam-driven search over the image itself.
#[derive(Debug, Clone, Default)]
pub struct OptimizationSearch {
    config: OptimizationConfig,
}

impl OptimizationSearch {
    /// Create a search with the given configuration.
    pub fn new(config: OptimizationConfig) -> Self {
        Self { config }
    }

    /// Get the configuration.
    pub fn config(&self) -> &OptimizationConfig {
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

        let config = &self.config;
        let original = image.inner().clone().detach();
        let mut candidate = original.clone();
        let mut adam = Adam::<B, 3>::new(config.adam());

        let mut best_loss = f32::INFINITY;
        let mut best: Option<Tensor<B, 3>> = None;
        let mut iterations_used = 0;

        for iteration in 0..config.max_iterations {
            iterations_used = iteration + 1;

            let probe = Probe::run(oracle, candidate.clone(), iteration)?;
            let prediction = probe.prediction();

            let classification = (target_probability(probe.logits(), target_class) + LOG_EPSILON)
                .log()
                .neg();
            let proximity = ((probe.candidate() - original.clone()).powf_scalar(2.0).sum()
                + NORM_EPSILON)
                .sqrt();
            let loss = classification + proximity * config.regularization_weight;

            let loss_value = finite_loss(&loss, iteration)?;
            if loss_value < best_loss {
                best_loss = loss_value;
                best = Some(candidate.clone());
            }

            let gradient = probe.backward(loss)?;
            candidate = adam.step(candidate, gradient).clamp(0.0, 1.0);

            // Checked against the prediction made before this step.
            if prediction.is_class(target_class)
                && prediction.probability(target_class) > config.early_stop_confidence
            {
                tracing::debug!(
                    "Optimization search reached confidence {:.4} at iteration {}",
                    prediction.probability(target_class),
                    iteration
                );
                break;
            }
        }

        let counterfactual = Image::clamped(best.unwrap_or(candidate));
        let counterfactual_prediction = oracle.predict(&counterfactual)?;
        let success = counterfactual_prediction.is_class(target_class);

        let counterfactual_data = counterfactual.to_data()?;
        let difference = counterfactual_data.abs_difference(&image.to_data()?)?;
        let perturbation_magnitude = difference.l2_norm();

        tracing::info!(
            "Optimization search: success={} confidence={:.4} magnitude={:.4} loss={:.4} iterations={}",
            success,
            counterfactual_prediction.confidence,
            perturbation_magnitude,
            best_loss,
            iterations_used
        );

        Ok(MethodOutcome::Searched(SearchResult {
            method: Method::GradientOptimization,
            success,
            original_prediction,
            counterfactual_prediction: Some(counterfactual_prediction),
            counterfactual_image: Some(counterfactual_data),
            auxiliary_map: Some(difference),
            perturbation_magnitude,
            iterations_used,
            details: MethodDetails::Optimization {
                final_loss: best_loss,
            },
            message: (!success).then(|| {
                format!(
                    "Optimization did not reach target class {} in {} iterations",
                    target_class, iterations_used
                )
            }),
        }))
    }
}
