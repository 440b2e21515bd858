//! Input-gradient plumbing over the scoring oracle.

use burn::prelude::*;
use burn::tensor::activation::{log_softmax, softmax};
use burn::tensor::backend::AutodiffBackend;
use cfx_core::{tensor_to_scalar, Prediction, ScoringOracle};

use crate::error::{Result, SearchError};

/// A forward pass whose graph is still alive, waiting for a loss.
pub(crate) struct Probe<B: AutodiffBackend> {
    candidate: Tensor<B, 3>,
    logits: Tensor<B, 2>,
    prediction: Prediction,
    iteration: usize,
}

impl<B: AutodiffBackend> Probe<B> {
    /// Run the oracle on `candidate`, tracking gradients with respect to it.
    pub(crate) fn run<O>(oracle: &O, candidate: Tensor<B, 3>, iteration: usize) -> Result<Self>
    where
        O: ScoringOracle<B> + ?Sized,
    {
        let candidate = candidate.detach().require_grad();
        let logits = oracle.forward(candidate.clone().unsqueeze::<4>())?;
        let prediction = Prediction::from_logits(logits.clone().detach())?;
        Ok(Self {
            candidate,
            logits,
            prediction,
            iteration,
        })
    }

    pub(crate) fn prediction(&self) -> Prediction {
        self.prediction
    }

    pub(crate) fn logits(&self) -> Tensor<B, 2> {
        self.logits.clone()
    }

    pub(crate) fn candidate(&self) -> Tensor<B, 3> {
        self.candidate.clone()
    }

    /// Backpropagate `loss` and return its gradient with respect to the candidate.
    pub(crate) fn backward(self, loss: Tensor<B, 1>) -> Result<Tensor<B, 3>> {
        let grads = loss.backward();
        let gradient = self
            .candidate
            .grad(&grads)
            .ok_or(SearchError::GradientUnavailable {
                iteration: self.iteration,
            })?;
        let gradient = Tensor::<B, 3>::from_inner(gradient);

        if !tensor_to_scalar(gradient.clone().abs().sum()).is_finite() {
            return Err(SearchError::NonFinite {
                what: "gradient",
                iteration: self.iteration,
            });
        }
        Ok(gradient)
    }
}

/// Read a scalar loss, rejecting NaN and infinity.
pub(crate) fn finite_loss<B: AutodiffBackend>(loss: &Tensor<B, 1>, iteration: usize) -> Result<f32> {
    let value = tensor_to_scalar(loss.clone().detach());
    if value.is_finite() {
        Ok(value)
    } else {
        Err(SearchError::NonFinite {
            what: "loss",
            iteration,
        })
    }
}

/// Negative log-probability of `target` for a `(1, 2)` logits tensor.
pub(crate) fn target_nll<B: Backend>(logits: Tensor<B, 2>, target: usize) -> Tensor<B, 1> {
    log_softmax(logits, 1)
        .slice([0..1, target..target + 1])
        .sum()
        .neg()
}

/// Probability of `target` for a `(1, 2)` logits tensor.
pub(crate) fn target_probability<B: Backend>(logits: Tensor<B, 2>, target: usize) -> Tensor<B, 1> {
    softmax(logits, 1).slice([0..1, target..target + 1]).sum()
}
