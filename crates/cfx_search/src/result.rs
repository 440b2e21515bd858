//! Result types shared by the strategies and the orchestrator.

use std::collections::BTreeMap;
use std::fmt;

use cfx_core::{ImageData, Prediction};
use serde::{Deserialize, Serialize};

/// Search strategy identifier.
///
/// Declaration order is registration order: the orchestrator runs the methods
/// in this order and breaks score ties in favour of the earlier one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Method {
    /// Sign-gradient perturbation inside an L∞ ball.
    Adversarial,
    /// Adam optimisation of classification loss plus proximity penalty.
    GradientOptimization,
    /// Sliding-window region masking.
    MaskBased,
}

impl Method {
    /// All methods in registration order.
    pub const ALL: [Method; 3] = [
        Method::Adversarial,
        Method::GradientOptimization,
        Method::MaskBased,
    ];

    /// Stable name used as the result key.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Method::Adversarial => "adversarial",
            Method::GradientOptimization => "gradient_optimization",
            Method::MaskBased => "mask_based",
        }
    }

    /// One-line description for reports.
    #[must_use]
    pub const fn description(&self) -> &'static str {
        match self {
            Method::Adversarial => "Minimal pixel-level changes to flip prediction",
            Method::GradientOptimization => "Gradient-based optimization to find counterfactual",
            Method::MaskBased => "Regional masking to identify critical areas",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A masked rectangle, end coordinates exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MaskRect {
    /// Left column.
    pub x_start: usize,
    /// Top row.
    pub y_start: usize,
    /// One past the right column.
    pub x_end: usize,
    /// One past the bottom row.
    pub y_end: usize,
}

impl MaskRect {
    /// Square of side `size` with its top-left corner at `(x, y)`.
    #[must_use]
    pub const fn square(x: usize, y: usize, size: usize) -> Self {
        Self {
            x_start: x,
            y_start: y,
            x_end: x + size,
            y_end: y + size,
        }
    }

    /// Whether `(x, y)` lies inside the rectangle.
    #[must_use]
    pub const fn contains(&self, x: usize, y: usize) -> bool {
        x >= self.x_start && x < self.x_end && y >= self.y_start && y < self.y_end
    }
}

/// Fields only one strategy reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MethodDetails {
    /// Perturbation search extras.
    Perturbation {
        /// Counterfactual confidence minus original confidence; 0 on failure.
        confidence_improvement: f32,
    },
    /// Optimization search extras.
    Optimization {
        /// Lowest total loss observed.
        final_loss: f32,
    },
    /// Region mask search extras.
    RegionMask {
        /// Winning rectangle.
        mask_position: Option<MaskRect>,
        /// Target-class confidence of the winning candidate.
        confidence_achieved: Option<f32>,
    },
}

/// Outcome of one completed strategy run.
///
/// `success` is true only when `counterfactual_prediction` lands on the target
/// class. Images are kept out of the JSON form; renderers read them directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    /// Strategy that produced the result.
    pub method: Method,
    /// Whether the counterfactual reaches the target class.
    pub success: bool,
    /// Prediction for the unmodified image.
    pub original_prediction: Prediction,
    /// Prediction for the counterfactual, if one was produced.
    pub counterfactual_prediction: Option<Prediction>,
    /// The counterfactual image, values in `[0, 1]`.
    #[serde(skip)]
    pub counterfactual_image: Option<ImageData>,
    /// Perturbation or difference map.
    #[serde(skip)]
    pub auxiliary_map: Option<ImageData>,
    /// Euclidean norm of counterfactual minus original.
    pub perturbation_magnitude: f32,
    /// Iterations (or mask positions) evaluated.
    pub iterations_used: usize,
    /// Method-specific fields.
    pub details: MethodDetails,
    /// Why no counterfactual was found, for unsuccessful searches.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl SearchResult {
    /// Ranking score `confidence / (1 + magnitude)` for successful results.
    #[must_use]
    pub fn score(&self) -> Option<f32> {
        if !self.success {
            return None;
        }
        self.counterfactual_prediction
            .map(|pred| pred.confidence / (1.0 + self.perturbation_magnitude))
    }
}

/// What happened when a strategy was invoked.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MethodOutcome {
    /// The search ran to completion, successfully or not.
    Searched(SearchResult),
    /// The oracle already predicts the target class; nothing was searched.
    AlreadyTarget {
        /// Prediction for the unmodified image.
        original_prediction: Prediction,
        /// Human-readable reason.
        message: String,
    },
    /// The strategy failed; the other strategies are unaffected.
    Failed {
        /// Error message.
        error: String,
    },
}

impl MethodOutcome {
    /// Whether the outcome is a successful counterfactual.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, MethodOutcome::Searched(result) if result.success)
    }

    /// The completed search result, if any.
    #[must_use]
    pub fn result(&self) -> Option<&SearchResult> {
        match self {
            MethodOutcome::Searched(result) => Some(result),
            _ => None,
        }
    }

    /// The error message for failed outcomes.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        match self {
            MethodOutcome::Failed { error } => Some(error),
            _ => None,
        }
    }

    /// Perturbation magnitude; 0 when nothing was changed.
    #[must_use]
    pub fn perturbation_magnitude(&self) -> f32 {
        self.result().map_or(0.0, |r| r.perturbation_magnitude)
    }

    /// Iterations executed; 0 when nothing was searched.
    #[must_use]
    pub fn iterations_used(&self) -> usize {
        self.result().map_or(0, |r| r.iterations_used)
    }
}

/// Aggregate view over all method outcomes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    /// Number of methods invoked.
    pub total_methods_tried: usize,
    /// Number of successful methods.
    pub successful_methods: usize,
    /// Successful methods in registration order.
    pub successful_method_names: Vec<Method>,
    /// Highest-scoring successful method.
    pub best_method: Option<Method>,
}

impl Summary {
    /// Summarise outcomes keyed by method.
    #[must_use]
    pub fn from_outcomes(outcomes: &BTreeMap<Method, MethodOutcome>) -> Self {
        let successful_method_names: Vec<Method> = outcomes
            .iter()
            .filter(|(_, outcome)| outcome.is_success())
            .map(|(method, _)| *method)
            .collect();

        Self {
            total_methods_tried: outcomes.len(),
            successful_methods: successful_method_names.len(),
            successful_method_names,
            best_method: best_method(outcomes),
        }
    }
}

/// Pick the successful method with the strictly highest score.
///
/// Iteration follows registration order and only a strictly greater score
/// replaces the incumbent, so exact ties keep the earlier method.
#[must_use]
pub fn best_method(outcomes: &BTreeMap<Method, MethodOutcome>) -> Option<Method> {
    let mut best: Option<(Method, f32)> = None;
    for (method, outcome) in outcomes {
        let Some(score) = outcome.result().and_then(SearchResult::score) else {
            continue;
        };
        if best.map_or(true, |(_, incumbent)| score > incumbent) {
            best = Some((*method, score));
        }
    }
    best.map(|(method, _)| method)
}

/// Everything the orchestrator learned about one image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComprehensiveResult {
    /// Class the caller reported for the image.
    pub original_class: usize,
    /// Class the searches aim for.
    pub target_class: usize,
    /// Prediction for the unmodified image; absent if the oracle failed on it.
    pub original_prediction: Option<Prediction>,
    /// Outcome per method, in registration order.
    pub counterfactuals: BTreeMap<Method, MethodOutcome>,
    /// Aggregate counts and the best method.
    pub summary: Summary,
    /// Wall-clock time spent in `generate`.
    pub elapsed_secs: f64,
}

impl ComprehensiveResult {
    /// Outcome for one method.
    #[must_use]
    pub fn outcome(&self, method: Method) -> Option<&MethodOutcome> {
        self.counterfactuals.get(&method)
    }

    /// Result of the best method, if any succeeded.
    #[must_use]
    pub fn best(&self) -> Option<&SearchResult> {
        self.summary
            .best_method
            .and_then(|method| self.outcome(method))
            .and_then(MethodOutcome::result)
    }
}
