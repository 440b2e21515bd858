//! Runs every strategy against one image and ranks the results.

use std::collections::BTreeMap;
use std::marker::PhantomData;
use std::path::Path;
use std::time::Instant;

use burn::tensor::backend::AutodiffBackend;
use cfx_core::{flip_class, Image, Prediction, ScoringOracle};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SearchError};
use crate::optimization::{OptimizationConfig, OptimizationSearch};
use crate::perturbation::{PerturbationConfig, PerturbationSearch};
use crate::region_mask::{RegionMaskConfig, RegionMaskSearch};
use crate::result::{ComprehensiveResult, Method, MethodOutcome, Summary};

/// Settings for all three strategies.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExplainerConfig {
    /// Perturbation search settings.
    pub perturbation: PerturbationConfig,
    /// Optimization search settings.
    pub optimization: OptimizationConfig,
    /// Region mask search settings.
    pub region_mask: RegionMaskConfig,
}

impl ExplainerConfig {
    /// Parse from JSON. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| SearchError::ConfigError(e.to_string()))
    }

    /// Load from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| SearchError::ConfigError(format!("{}: {}", path.display(), e)))?;
        Self::from_json_str(&json)
    }

    /// Serialize to pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| SearchError::ConfigError(e.to_string()))
    }

    /// Set the perturbation search settings.
    #[must_use]
    pub fn with_perturbation(mut self, config: PerturbationConfig) -> Self {
        self.perturbation = config;
        self
    }

    /// Set the optimization search settings.
    #[must_use]
    pub fn with_optimization(mut self, config: OptimizationConfig) -> Self {
        self.optimization = config;
        self
    }

    /// Set the region mask search settings.
    #[must_use]
    pub fn with_region_mask(mut self, config: RegionMaskConfig) -> Self {
        self.region_mask = config;
        self
    }
}

/// Counterfactual explainer over one scoring oracle.
///
/// # Example
///
/// ```rust,ignore
/// let explainer = CounterfactualExplainer::new(ExplainerConfig::default()).with_oracle(model);
/// let result = explainer.generate(&image, 0)?;
/// println!("best: {:?}", result.summary.best_method);
/// ```
#[derive(Debug, Clone)]
pub struct CounterfactualExplainer<B: AutodiffBackend, O> {
    config: ExplainerConfig,
    oracle: Option<O>,
    _backend: PhantomData<B>,
}

impl<B: AutodiffBackend, O: ScoringOracle<B>> CounterfactualExplainer<B, O> {
    /// Create an explainer without an oracle.
    pub fn new(config: ExplainerConfig) -> Self {
        Self {
            config,
            oracle: None,
            _backend: PhantomData,
        }
    }

    /// Attach the scoring oracle.
    #[must_use]
    pub fn with_oracle(mut self, oracle: O) -> Self {
        self.oracle = Some(oracle);
        self
    }

    /// Get the configuration.
    pub fn config(&self) -> &ExplainerConfig {
        &self.config
    }

    /// Search for counterfactuals of `image`, which the caller labels `original_class`.
    ///
    /// Fails only when no oracle is attached or the class is not 0 or 1.
    /// Strategy failures are recorded in the result.
    pub fn generate(&self, image: &Image<B>, original_class: usize) -> Result<ComprehensiveResult> {
        let oracle = self.oracle.as_ref().ok_or(SearchError::OracleUnavailable)?;
        let target_class = flip_class(original_class)?;
        let start = Instant::now();

        let original_prediction = match oracle.predict(image) {
            Ok(prediction) => Some(prediction),
            Err(e) => {
                tracing::warn!("Original prediction failed: {}", e);
                None
            }
        };

        let mut counterfactuals = BTreeMap::new();
        for method in Method::ALL {
            let outcome = match self.run(method, oracle, image, original_prediction, target_class) {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::warn!("Method {} failed: {}", method, e);
                    MethodOutcome::Failed {
                        error: e.to_string(),
                    }
                }
            };
            counterfactuals.insert(method, outcome);
        }

        let summary = Summary::from_outcomes(&counterfactuals);
        let elapsed_secs = start.elapsed().as_secs_f64();
        tracing::info!(
            "Counterfactuals: {}/{} methods succeeded, best = {} ({:.2}s)",
            summary.successful_methods,
            summary.total_methods_tried,
            summary.best_method.map_or("none", |m| m.as_str()),
            elapsed_secs
        );

        Ok(ComprehensiveResult {
            original_class,
            target_class,
            original_prediction,
            counterfactuals,
            summary,
            elapsed_secs,
        })
    }

    fn run(
        &self,
        method: Method,
        oracle: &O,
        image: &Image<B>,
        original_prediction: Option<Prediction>,
        target_class: usize,
    ) -> Result<MethodOutcome> {
        tracing::debug!("Running {}: {}", method, method.description());
        // Without a shared prediction each strategy predicts, and fails, on its own.
        match method {
            Method::Adversarial => {
                let search = PerturbationSearch::new(self.config.perturbation.clone());
                match original_prediction {
                    Some(p) => search.search_from(oracle, image, p, target_class),
                    None => search.search(oracle, image, target_class),
                }
            }
            Method::GradientOptimization => {
                let search = OptimizationSearch::new(self.config.optimization.clone());
                match original_prediction {
                    Some(p) => search.search_from(oracle, image, p, target_class),
                    None => search.search(oracle, image, target_class),
                }
            }
            Method::MaskBased => {
                let search = RegionMaskSearch::new(self.config.region_mask.clone());
                match original_prediction {
                    Some(p) => search.search_from(oracle, image, p, target_class),
                    None => search.search(oracle, image, target_class),
                }
            }
        }
    }
}

/// Run all strategies with default settings.
pub fn generate_comprehensive_counterfactuals<B, O>(
    oracle: &O,
    image: &Image<B>,
    original_class: usize,
) -> Result<ComprehensiveResult>
where
    B: AutodiffBackend,
    O: ScoringOracle<B> + ?Sized,
{
    CounterfactualExplainer::new(ExplainerConfig::default())
        .with_oracle(oracle)
        .generate(image, original_class)
}
