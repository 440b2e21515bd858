//! # cfx_search
//!
//! Counterfactual search for binary image classifiers.
//!
//! This crate provides:
//! - Perturbation search (sign-gradient steps inside an L∞ ball)
//! - Optimization search (Adam on classification loss plus proximity)
//! - Region mask search (sliding mean-filled window, optionally on rayon)
//! - An orchestrator that runs all three and picks the best result
//!
//! ## Example
//!
//! ```rust,ignore
//! use cfx_search::generate_comprehensive_counterfactuals;
//!
//! let result = generate_comprehensive_counterfactuals(&model, &image, 0)?;
//! if let Some(best) = result.best() {
//!     println!("{} flipped the prediction", best.method);
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod gradient;
pub mod optimization;
pub mod optimizer;
pub mod orchestrator;
pub mod perturbation;
pub mod region_mask;
mod result;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{Result, SearchError};
pub use optimization::{OptimizationConfig, OptimizationSearch};
pub use optimizer::{Adam, AdamConfig};
pub use orchestrator::{generate_comprehensive_counterfactuals, CounterfactualExplainer, ExplainerConfig};
pub use perturbation::{PerturbationConfig, PerturbationSearch};
pub use region_mask::{mask_positions, RegionMaskConfig, RegionMaskSearch};
pub use result::{
    best_method, ComprehensiveResult, MaskRect, Method, MethodDetails, MethodOutcome, SearchResult,
    Summary,
};
