//! Adam optimizer over a raw tensor.
//!
//! Burn's optimizers update module parameters; the optimization search updates
//! the image itself, so the update rule lives here.
//!
//! Reference: Kingma & Ba, "Adam: A Method for Stochastic Optimization", ICLR 2015.

use burn::prelude::*;
use serde::{Deserialize, Serialize};

/// Adam optimizer configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdamConfig {
    /// Learning rate.
    pub lr: f64,
    /// First moment decay (beta1).
    pub beta1: f64,
    /// Second moment decay (beta2).
    pub beta2: f64,
    /// Small epsilon for numerical stability.
    pub epsilon: f64,
}

impl Default for AdamConfig {
    fn default() -> Self {
        Self {
            lr: 1e-2,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-8,
        }
    }
}

impl AdamConfig {
    /// Create a new Adam configuration with the given learning rate.
    pub fn new(lr: f64) -> Self {
        Self {
            lr,
            ..Default::default()
        }
    }

    /// Set beta1 (first moment decay).
    #[must_use]
    pub fn with_beta1(mut self, beta1: f64) -> Self {
        self.beta1 = beta1;
        self
    }

    /// Set beta2 (second moment decay).
    #[must_use]
    pub fn with_beta2(mut self, beta2: f64) -> Self {
        self.beta2 = beta2;
        self
    }

    /// Set epsilon for numerical stability.
    #[must_use]
    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self
    }
}

/// Adam state for one tensor.
#[derive(Debug, Clone)]
pub struct Adam<B: Backend, const D: usize> {
    config: AdamConfig,
    /// Current step.
    step: usize,
    /// First and second moment estimates, created on the first step.
    moments: Option<(Tensor<B, D>, Tensor<B, D>)>,
}

impl<B: Backend, const D: usize> Adam<B, D> {
    /// Create a new Adam optimizer.
    pub fn new(config: AdamConfig) -> Self {
        Self {
            config,
            step: 0,
            moments: None,
        }
    }

    /// Apply one update and return the new parameter value.
    pub fn step(&mut self, param: Tensor<B, D>, grad: Tensor<B, D>) -> Tensor<B, D> {
        self.step += 1;
        let t = self.step as i32;

        let beta1 = self.config.beta1;
        let beta2 = self.config.beta2;

        let (m, v) = self
            .moments
            .take()
            .unwrap_or_else(|| (grad.zeros_like(), grad.zeros_like()));

        // Update biased first and second moment estimates
        let m = m * beta1 + grad.clone() * (1.0 - beta1);
        let v = v * beta2 + grad.powf_scalar(2.0) * (1.0 - beta2);

        let m_hat = m.clone() / (1.0 - beta1.powi(t));
        let v_hat = v.clone() / (1.0 - beta2.powi(t));
        let update = m_hat / (v_hat.sqrt() + self.config.epsilon) * self.config.lr;

        self.moments = Some((m, v));
        param - update
    }
}
