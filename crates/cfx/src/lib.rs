//! # cfx
//!
//! Counterfactual explanations for binary image classifiers.
//!
//! Given an image and the class a classifier assigns to it, cfx searches for
//! a minimally changed image that the classifier assigns to the other class:
//!
//! - **Perturbation search**: sign-gradient steps inside an L∞ ball
//! - **Optimization search**: Adam on classification loss plus an L2 proximity term
//! - **Region mask search**: replace square regions with the image mean
//!
//! The orchestrator runs all three, isolates their failures and ranks the
//! successful ones by `confidence / (1 + perturbation magnitude)`.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use cfx::prelude::*;
//!
//! let model = ImageMlpConfig::new(3, 224).init::<Autodiff<NdArray>>(&device);
//! let data = load_image("xray.png", model.shape())?;
//! let image = Image::from_data(&data, &device)?;
//!
//! let result = generate_comprehensive_counterfactuals(&model, &image, 0)?;
//! let visuals = PngRenderer::new(data).render(&result)?;
//! visuals.write_to_dir("out")?;
//! ```
//!
//! ## Feature Flags
//!
//! - `backend-ndarray` (default): CPU backend using ndarray

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

// Re-export all crates
pub use cfx_core as core;
pub use cfx_models as models;
pub use cfx_render as render;
pub use cfx_search as search;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use cfx::prelude::*;
/// ```
pub mod prelude {
    // Core types
    pub use cfx_core::{
        flip_class, CoreError, Image, ImageData, ImageShape, Prediction, ScoringOracle, Seed,
        CLASS_NAMES,
    };

    // Models
    pub use cfx_models::{load_image_mlp, save_image_mlp, CheckpointMetadata, ImageMlp, ImageMlpConfig};

    // Search
    pub use cfx_search::{
        generate_comprehensive_counterfactuals, ComprehensiveResult, CounterfactualExplainer,
        ExplainerConfig, MaskRect, Method, MethodDetails, MethodOutcome, OptimizationConfig,
        OptimizationSearch, PerturbationConfig, PerturbationSearch, RegionMaskConfig,
        RegionMaskSearch, SearchError, SearchResult,
    };

    // Rendering
    pub use cfx_render::{load_image, PngRenderer, Renderer, Visualizations};

    // Backend
    #[cfg(feature = "backend-ndarray")]
    pub use cfx_core::backend::NdArray;
}
